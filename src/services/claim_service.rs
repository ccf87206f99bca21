use crate::entities::{ClaimStatus, promotion_claim_entity as claims, promotion_entity as promotions};
use crate::error::{AppError, AppResult};
use crate::models::{ALREADY_CLAIMED_MESSAGE, ClaimOutcome, claim_message};
use crate::services::locking::{is_contention, lock_promotion};
use crate::utils::ClaimCredential;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    IntoActiveModel, QueryFilter, QuerySelect, Set, SqlErr, TransactionTrait,
};
use std::time::Duration;

const MAX_CONTENTION_RETRIES: u32 = 8;

/// 单次领取事务的失败：业务拒绝直接返回，存储层失败视情况重做
enum ClaimAttemptError {
    Rejected(AppError),
    Storage(DbErr),
}

impl From<DbErr> for ClaimAttemptError {
    fn from(err: DbErr) -> Self {
        ClaimAttemptError::Storage(err)
    }
}

/// 领取仲裁
///
/// 同一活动的领取通过活动行锁（见 `locking::lock_promotion`）串行化：
/// 持锁期间检查重复、分配序号（= 名次）、插入领取记录并推进活动计数，
/// 全部在同一事务内提交。不同活动之间互不阻塞。
#[derive(Clone)]
pub struct ClaimService {
    pool: DatabaseConnection,
}

impl ClaimService {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }

    /// 领取 (Claim)
    ///
    /// 逻辑:
    /// 1. 锁定活动行；不存在 -> NotFound，已结束 -> Expired，未开始 -> NotStarted
    /// 2. 已有领取记录 -> 返回原名次（幂等，success = false）
    /// 3. 序号 = claims_count + 1，claimed_at 不早于上一次领取
    /// 4. 插入领取记录并更新活动计数，提交
    ///
    /// 锁冲突时整个事务有限次重做；其余存储层失败返回 ArbitrationFailure，调用方可原样重试。
    pub async fn claim(&self, promotion_id: i64, user_id: i64) -> AppResult<ClaimOutcome> {
        let mut retries = 0;
        loop {
            match self.try_claim(promotion_id, user_id).await {
                Ok(outcome) => return Ok(outcome),
                Err(ClaimAttemptError::Rejected(e)) => return Err(e),
                Err(ClaimAttemptError::Storage(e))
                    if is_contention(&e) && retries < MAX_CONTENTION_RETRIES =>
                {
                    retries += 1;
                    log::debug!(
                        "Claim contention on promotion {promotion_id}, retry {retries}: {e}"
                    );
                    tokio::time::sleep(Duration::from_millis(10 * u64::from(retries))).await;
                }
                Err(ClaimAttemptError::Storage(e)) => return Err(arbitration_failure(e)),
            }
        }
    }

    async fn try_claim(
        &self,
        promotion_id: i64,
        user_id: i64,
    ) -> Result<ClaimOutcome, ClaimAttemptError> {
        let txn = self.pool.begin().await?;
        let locked = lock_promotion(&txn, promotion_id).await?;

        let now = Utc::now();
        let promotion = match locked {
            Some(p) if p.has_started(now) && !p.has_ended(now) => p,
            other => {
                txn.rollback().await?;
                return Err(ClaimAttemptError::Rejected(match other {
                    None => AppError::NotFound("Promotion not found".to_string()),
                    Some(p) if p.has_ended(now) => AppError::Expired,
                    Some(_) => AppError::NotStarted,
                }));
            }
        };

        if let Some(existing) = find_user_claim(&txn, promotion_id, user_id).await? {
            txn.rollback().await?;
            log::debug!(
                "Idempotent claim replay: promotion={promotion_id} user={user_id} rank={}",
                existing.rank()
            );
            return Ok(build_outcome(&promotion, &existing, false, now));
        }

        let sequence = promotion.claims_count + 1;
        let claimed_at = promotion
            .last_claimed_at
            .map_or(now, |last| last.max(now));

        let inserted = claims::ActiveModel {
            promotion_id: Set(promotion_id),
            user_id: Set(user_id),
            sequence: Set(sequence),
            claimed_at: Set(claimed_at),
            status: Set(ClaimStatus::Claimed),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await;

        let claim = match inserted {
            Ok(claim) => claim,
            Err(e) if is_unique_violation(&e) => {
                // 唯一约束兜底：以已存在的记录为准
                txn.rollback().await?;
                return self
                    .existing_outcome(&promotion, user_id)
                    .await
                    .map_err(ClaimAttemptError::Rejected);
            }
            Err(e) => return Err(e.into()),
        };

        let mut am = promotion.clone().into_active_model();
        am.claims_count = Set(sequence);
        am.last_claimed_at = Set(Some(claimed_at));
        am.update(&txn).await?;

        txn.commit().await?;

        let outcome = build_outcome(&promotion, &claim, true, now);
        log::info!(
            "Promotion claimed: promotion={promotion_id} user={user_id} rank={} winner={}",
            outcome.rank,
            outcome.is_winner
        );
        Ok(outcome)
    }

    /// 将已结束活动中未核销的领取标记为过期，返回更新条数
    pub async fn expire_claims(&self) -> AppResult<u64> {
        let now = Utc::now();

        let promotion_ids: Vec<i64> = claims::Entity::find()
            .select_only()
            .column(claims::Column::PromotionId)
            .distinct()
            .filter(claims::Column::Status.eq(ClaimStatus::Claimed))
            .into_tuple()
            .all(&self.pool)
            .await?;
        if promotion_ids.is_empty() {
            return Ok(0);
        }

        let ended: Vec<i64> = promotions::Entity::find()
            .filter(promotions::Column::Id.is_in(promotion_ids))
            .all(&self.pool)
            .await?
            .into_iter()
            .filter(|p| p.has_ended(now))
            .map(|p| p.id)
            .collect();
        if ended.is_empty() {
            return Ok(0);
        }

        let result = claims::Entity::update_many()
            .col_expr(claims::Column::Status, Expr::value(ClaimStatus::Expired))
            .col_expr(claims::Column::UpdatedAt, Expr::value(now))
            .filter(claims::Column::PromotionId.is_in(ended))
            .filter(claims::Column::Status.eq(ClaimStatus::Claimed))
            .exec(&self.pool)
            .await?;

        Ok(result.rows_affected)
    }

    async fn existing_outcome(
        &self,
        promotion: &promotions::Model,
        user_id: i64,
    ) -> AppResult<ClaimOutcome> {
        let existing = find_user_claim(&self.pool, promotion.id, user_id)
            .await
            .map_err(arbitration_failure)?
            .ok_or_else(|| {
                AppError::ArbitrationFailure(format!(
                    "Conflicting claim sequence on promotion {}",
                    promotion.id
                ))
            })?;
        Ok(build_outcome(promotion, &existing, false, Utc::now()))
    }
}

async fn find_user_claim<C: ConnectionTrait>(
    conn: &C,
    promotion_id: i64,
    user_id: i64,
) -> Result<Option<claims::Model>, DbErr> {
    claims::Entity::find()
        .filter(claims::Column::PromotionId.eq(promotion_id))
        .filter(claims::Column::UserId.eq(user_id))
        .one(conn)
        .await
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

fn arbitration_failure(err: DbErr) -> AppError {
    log::error!("Claim storage failure: {err}");
    AppError::ArbitrationFailure(err.to_string())
}

/// 由活动与领取记录组装结果；`created` 为 false 时表示重复领取
pub(crate) fn build_outcome(
    promotion: &promotions::Model,
    claim: &claims::Model,
    created: bool,
    now: DateTime<Utc>,
) -> ClaimOutcome {
    let rank = claim.rank();
    let is_winner = promotion.is_winning_rank(rank);
    let message = if created {
        claim_message(rank, promotion.capacity_limit, is_winner)
    } else {
        ALREADY_CLAIMED_MESSAGE.to_string()
    };
    let credential = ClaimCredential {
        claim_id: claim.id,
        user_id: claim.user_id,
        promotion_id: claim.promotion_id,
        claimed_at: claim.claimed_at,
    };

    ClaimOutcome {
        success: created,
        claimed: true,
        rank,
        is_winner,
        claim_id: claim.id,
        promotion_id: promotion.id,
        capacity_limit: promotion.capacity_limit,
        claimed_at: claim.claimed_at,
        status: claim.effective_status(promotion.ends_at, now),
        credential: credential.encode(),
        message,
    }
}
