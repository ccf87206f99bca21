use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema, DeriveActiveEnum,
    EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(32))")]
#[serde(rename_all = "snake_case")]
pub enum ClaimStatus {
    #[sea_orm(string_value = "claimed")]
    Claimed,
    #[sea_orm(string_value = "redeemed")]
    Redeemed,
    #[sea_orm(string_value = "expired")]
    Expired,
}

/// 领取记录
/// 说明:
/// - (promotion_id, user_id) 唯一
/// - sequence 即名次：在活动行锁内按插入顺序分配，从 1 开始且无空洞
/// - claimed_at 由服务端分配，同一活动内单调不减；相同时间以 sequence 区分先后
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "promotion_claims")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub promotion_id: i64,
    pub user_id: i64,
    pub sequence: i64,
    pub claimed_at: DateTime<Utc>,
    pub status: ClaimStatus,
    pub redeemed_at: Option<DateTime<Utc>>,
    pub redeemed_by: Option<i64>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    pub fn rank(&self) -> i64 {
        self.sequence
    }

    /// 结合活动时间窗得出的实际状态（未核销且活动已结束视为过期）
    pub fn effective_status(&self, promotion_ends_at: DateTime<Utc>, now: DateTime<Utc>) -> ClaimStatus {
        match self.status {
            ClaimStatus::Claimed if now > promotion_ends_at => ClaimStatus::Expired,
            status => status,
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::promotions::Entity",
        from = "Column::PromotionId",
        to = "super::promotions::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Promotion,
}

impl Related<super::promotions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Promotion.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
