use crate::entities::{ClaimStatus, promotion_claim_entity as claims, promotion_entity as promotions};
use crate::error::{AppError, AppResult};
use crate::models::{RedemptionClaimDetails, RedemptionOutcome, RedemptionStatus};
use crate::services::{UserService, VenueService};
use crate::utils::ClaimCredential;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};

/// 核销（店员扫码）
#[derive(Clone)]
pub struct RedemptionService {
    pool: DatabaseConnection,
    venue_service: VenueService,
    user_service: UserService,
}

impl RedemptionService {
    pub fn new(
        pool: DatabaseConnection,
        venue_service: VenueService,
        user_service: UserService,
    ) -> Self {
        Self {
            pool,
            venue_service,
            user_service,
        }
    }

    /// 核销凭证
    ///
    /// 逻辑:
    /// 1. 解析凭证 `claimId|userId|promotionId|claimedAt`
    /// 2. 按凭证中的 promotionId 找到活动，校验调用者管理其所属场所；
    ///    在此之前不查询领取记录，无权限的调用者无法探知记录是否存在
    /// 3. 按 claimId 查找领取记录，userId / promotionId 不一致视为不存在
    /// 4. 已核销 -> already_redeemed；未获奖 -> not_winner；活动已结束 -> Expired
    /// 5. 条件更新 (where status = 'claimed')，并发核销时只有一次成功
    pub async fn redeem(
        &self,
        staff_user_id: i64,
        raw_credential: &str,
    ) -> AppResult<RedemptionOutcome> {
        let credential = ClaimCredential::decode(raw_credential)?;

        let Some(promotion) = promotions::Entity::find_by_id(credential.promotion_id)
            .one(&self.pool)
            .await?
        else {
            return Ok(RedemptionOutcome::not_found());
        };

        self.venue_service
            .ensure_manages_venue(staff_user_id, promotion.venue_id)
            .await?;

        let Some(claim) = claims::Entity::find_by_id(credential.claim_id)
            .one(&self.pool)
            .await?
        else {
            return Ok(RedemptionOutcome::not_found());
        };

        if claim.user_id != credential.user_id || claim.promotion_id != promotion.id {
            log::warn!(
                "Credential mismatch for claim {}: user {} promotion {}",
                claim.id,
                credential.user_id,
                credential.promotion_id
            );
            return Ok(RedemptionOutcome::not_found());
        }

        let details = self.claim_details(&claim, &promotion, claim.redeemed_at).await?;

        match claim.status {
            ClaimStatus::Redeemed => {
                return Ok(RedemptionOutcome::with_details(
                    RedemptionStatus::AlreadyRedeemed,
                    details,
                ));
            }
            ClaimStatus::Expired => return Err(AppError::Expired),
            ClaimStatus::Claimed => {}
        }

        let now = Utc::now();
        if promotion.has_ended(now) {
            return Err(AppError::Expired);
        }
        if !promotion.is_winning_rank(claim.rank()) {
            return Ok(RedemptionOutcome::with_details(
                RedemptionStatus::NotWinner,
                details,
            ));
        }

        let result = claims::Entity::update_many()
            .col_expr(claims::Column::Status, Expr::value(ClaimStatus::Redeemed))
            .col_expr(claims::Column::RedeemedAt, Expr::value(now))
            .col_expr(claims::Column::RedeemedBy, Expr::value(staff_user_id))
            .col_expr(claims::Column::UpdatedAt, Expr::value(now))
            .filter(claims::Column::Id.eq(claim.id))
            .filter(claims::Column::Status.eq(ClaimStatus::Claimed))
            .exec(&self.pool)
            .await?;

        if result.rows_affected == 1 {
            log::info!(
                "Claim {} redeemed by {staff_user_id} for promotion {}",
                claim.id,
                promotion.id
            );
            return Ok(RedemptionOutcome::with_details(
                RedemptionStatus::Success,
                RedemptionClaimDetails {
                    redeemed_at: Some(now),
                    ..details
                },
            ));
        }

        // 并发核销：另一请求已先完成
        let redeemed_at = claims::Entity::find_by_id(claim.id)
            .one(&self.pool)
            .await?
            .and_then(|c| c.redeemed_at);
        Ok(RedemptionOutcome::with_details(
            RedemptionStatus::AlreadyRedeemed,
            RedemptionClaimDetails {
                redeemed_at,
                ..details
            },
        ))
    }

    async fn claim_details(
        &self,
        claim: &claims::Model,
        promotion: &promotions::Model,
        redeemed_at: Option<DateTime<Utc>>,
    ) -> AppResult<RedemptionClaimDetails> {
        Ok(RedemptionClaimDetails {
            claim_id: claim.id,
            user_id: claim.user_id,
            display_name: self.user_service.display_name(claim.user_id).await?,
            promotion_id: promotion.id,
            promotion_title: promotion.title.clone(),
            rank: claim.rank(),
            claimed_at: claim.claimed_at,
            redeemed_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::ClaimService;
    use crate::test_utils::*;
    use chrono::Duration;

    fn service(db: &DatabaseConnection) -> RedemptionService {
        RedemptionService::new(
            db.clone(),
            VenueService::new(db.clone()),
            UserService::new(db.clone()),
        )
    }

    #[tokio::test]
    async fn test_redeem_twice_is_rejected_the_second_time() {
        let db = setup_db().await;
        let guest = seed_user(&db, "Bruna").await;
        let venue = seed_venue(&db, 500).await;
        let promotion = seed_active_promotion(&db, venue.id, 2).await;
        let outcome = ClaimService::new(db.clone())
            .claim(promotion.id, guest.id)
            .await
            .unwrap();
        let service = service(&db);

        let first = service.redeem(500, &outcome.credential).await.unwrap();
        assert_eq!(first.status, RedemptionStatus::Success);
        let details = first.claim_details.unwrap();
        assert_eq!(details.display_name.as_deref(), Some("Bruna"));
        assert_eq!(details.promotion_title, promotion.title);
        assert!(details.redeemed_at.is_some());

        let second = service.redeem(500, &outcome.credential).await.unwrap();
        assert_eq!(second.status, RedemptionStatus::AlreadyRedeemed);

        let stored = claims::Entity::find_by_id(outcome.claim_id)
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, ClaimStatus::Redeemed);
        assert_eq!(stored.redeemed_by, Some(500));
    }

    #[tokio::test]
    async fn test_staff_can_redeem_but_outsiders_cannot() {
        let db = setup_db().await;
        let venue = seed_venue(&db, 500).await;
        seed_staff(&db, venue.id, 501).await;
        let promotion = seed_active_promotion(&db, venue.id, 2).await;
        let outcome = ClaimService::new(db.clone())
            .claim(promotion.id, 1)
            .await
            .unwrap();
        let service = service(&db);

        assert!(matches!(
            service.redeem(999, &outcome.credential).await,
            Err(AppError::PermissionDenied)
        ));
        let stored = claims::Entity::find_by_id(outcome.claim_id)
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, ClaimStatus::Claimed);

        let redeemed = service.redeem(501, &outcome.credential).await.unwrap();
        assert_eq!(redeemed.status, RedemptionStatus::Success);
    }

    #[tokio::test]
    async fn test_outsider_cannot_tell_missing_claims_from_real_ones() {
        let db = setup_db().await;
        let venue = seed_venue(&db, 500).await;
        let promotion = seed_active_promotion(&db, venue.id, 2).await;
        let outcome = ClaimService::new(db.clone())
            .claim(promotion.id, 1)
            .await
            .unwrap();
        let service = service(&db);

        let missing = ClaimCredential {
            claim_id: outcome.claim_id + 100,
            user_id: 1,
            promotion_id: promotion.id,
            claimed_at: outcome.claimed_at,
        };
        assert!(matches!(
            service.redeem(999, &missing.encode()).await,
            Err(AppError::PermissionDenied)
        ));
        assert!(matches!(
            service.redeem(999, &outcome.credential).await,
            Err(AppError::PermissionDenied)
        ));
        assert_eq!(
            service.redeem(500, &missing.encode()).await.unwrap().status,
            RedemptionStatus::NotFound
        );
    }

    #[tokio::test]
    async fn test_forged_credential_is_not_found() {
        let db = setup_db().await;
        let venue = seed_venue(&db, 500).await;
        let promotion = seed_active_promotion(&db, venue.id, 2).await;
        let outcome = ClaimService::new(db.clone())
            .claim(promotion.id, 1)
            .await
            .unwrap();
        let service = service(&db);

        let forged = ClaimCredential {
            claim_id: outcome.claim_id,
            user_id: 2,
            promotion_id: promotion.id,
            claimed_at: outcome.claimed_at,
        };
        let result = service.redeem(500, &forged.encode()).await.unwrap();
        assert_eq!(result, RedemptionOutcome::not_found());

        let missing = ClaimCredential {
            claim_id: 9999,
            ..forged
        };
        let result = service.redeem(500, &missing.encode()).await.unwrap();
        assert_eq!(result.status, RedemptionStatus::NotFound);
    }

    #[tokio::test]
    async fn test_malformed_credential_is_validation_error() {
        let db = setup_db().await;
        let service = service(&db);
        assert!(matches!(
            service.redeem(1, "not-a-credential").await,
            Err(AppError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_non_winner_cannot_redeem() {
        let db = setup_db().await;
        let venue = seed_venue(&db, 500).await;
        let promotion = seed_active_promotion(&db, venue.id, 1).await;
        let claim_service = ClaimService::new(db.clone());
        claim_service.claim(promotion.id, 1).await.unwrap();
        let late = claim_service.claim(promotion.id, 2).await.unwrap();
        assert!(!late.is_winner);

        let result = service(&db).redeem(500, &late.credential).await.unwrap();
        assert_eq!(result.status, RedemptionStatus::NotWinner);
    }

    #[tokio::test]
    async fn test_claim_of_ended_promotion_is_expired() {
        let db = setup_db().await;
        let venue = seed_venue(&db, 500).await;
        let now = Utc::now();
        let promotion = seed_promotion(&db, venue.id, 5, now - Duration::hours(3), now - Duration::hours(1)).await;
        let claim = seed_claim(&db, promotion.id, 1, 1, ClaimStatus::Claimed).await;
        let credential = ClaimCredential {
            claim_id: claim.id,
            user_id: 1,
            promotion_id: promotion.id,
            claimed_at: claim.claimed_at,
        };

        assert!(matches!(
            service(&db).redeem(500, &credential.encode()).await,
            Err(AppError::Expired)
        ));
    }
}
