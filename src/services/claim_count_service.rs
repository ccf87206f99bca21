use crate::entities::{promotion_claim_entity as claims, promotion_entity as promotions};
use crate::error::AppResult;
use crate::models::{ClaimCounts, MyClaimDetail, PromotionClaimOverview};
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect};
use std::collections::{BTreeSet, HashMap};

/// 领取计数聚合（只读，走只读副本；不会阻塞领取写入）
#[derive(Clone)]
pub struct ClaimCountService {
    replica: DatabaseConnection,
}

impl ClaimCountService {
    pub fn new(replica: DatabaseConnection) -> Self {
        Self { replica }
    }

    /// 批量统计领取总数（含未获奖）；没有领取的活动不出现在结果中
    pub async fn get_claim_counts(&self, promotion_ids: &[i64]) -> AppResult<ClaimCounts> {
        let ids = dedup(promotion_ids);
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows: Vec<(i64, i64)> = claims::Entity::find()
            .select_only()
            .column(claims::Column::PromotionId)
            .column_as(Expr::col(claims::Column::Id).count(), "claim_count")
            .filter(claims::Column::PromotionId.is_in(ids))
            .group_by(claims::Column::PromotionId)
            .into_tuple()
            .all(&self.replica)
            .await?;

        Ok(rows.into_iter().collect())
    }

    /// 计数 + 当前用户的领取详情（名次、是否获奖、状态），一次批量返回。
    /// 不存在的活动直接跳过。
    pub async fn get_claim_overview(
        &self,
        user_id: i64,
        promotion_ids: &[i64],
    ) -> AppResult<Vec<PromotionClaimOverview>> {
        let ids = dedup(promotion_ids);
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let promotion_list = promotions::Entity::find()
            .filter(promotions::Column::Id.is_in(ids.clone()))
            .order_by_asc(promotions::Column::Id)
            .all(&self.replica)
            .await?;

        let counts = self.get_claim_counts(&ids).await?;

        let mut my_claims: HashMap<i64, claims::Model> = claims::Entity::find()
            .filter(claims::Column::UserId.eq(user_id))
            .filter(claims::Column::PromotionId.is_in(ids))
            .all(&self.replica)
            .await?
            .into_iter()
            .map(|c| (c.promotion_id, c))
            .collect();

        let now = Utc::now();
        Ok(promotion_list
            .into_iter()
            .map(|p| {
                let count = counts.get(&p.id).copied().unwrap_or(0);
                let my_claim = my_claims.remove(&p.id).map(|c| MyClaimDetail {
                    claim_id: c.id,
                    rank: c.rank(),
                    is_winner: p.is_winning_rank(c.rank()),
                    status: c.effective_status(p.ends_at, now),
                    claimed_at: c.claimed_at,
                });
                PromotionClaimOverview {
                    promotion_id: p.id,
                    count,
                    capacity_limit: p.capacity_limit,
                    spots_remaining: p.spots_remaining(count),
                    my_claim,
                }
            })
            .collect())
    }
}

fn dedup(ids: &[i64]) -> Vec<i64> {
    ids.iter().copied().collect::<BTreeSet<_>>().into_iter().collect()
}
