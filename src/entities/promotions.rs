use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// 活动目标人群规则
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema, DeriveActiveEnum,
    EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(32))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PromotionType {
    /// 前 N 名到店签到
    #[sea_orm(string_value = "first_n_checkin")]
    FirstNCheckin,
    /// 前 N 名表示要去
    #[sea_orm(string_value = "first_n_going")]
    FirstNGoing,
}

/// 限量优惠活动
/// 说明:
/// - capacity_limit: 获奖名额 (>= 1)
/// - claims_count: 已分配的最大领取序号，即领取总数；仅在领取事务内（持有行锁）递增
/// - last_claimed_at: 最近一次领取时间，新领取的 claimed_at 不早于它
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "promotions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub venue_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub promotion_type: PromotionType,
    pub capacity_limit: i32,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub claims_count: i64,
    pub last_claimed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        now > self.ends_at
    }

    pub fn has_started(&self, now: DateTime<Utc>) -> bool {
        now >= self.starts_at
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.has_started(now) && !self.has_ended(now)
    }

    /// 名次是否在获奖名额内
    pub fn is_winning_rank(&self, rank: i64) -> bool {
        rank >= 1 && rank <= i64::from(self.capacity_limit)
    }

    pub fn spots_remaining(&self, claim_count: i64) -> i64 {
        (i64::from(self.capacity_limit) - claim_count).max(0)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::promotion_claims::Entity")]
    Claims,
}

impl Related<super::promotion_claims::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Claims.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
