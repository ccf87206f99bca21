use crate::entities::{promotion_claim_entity as claims, promotion_entity as promotions};
use crate::error::{AppError, AppResult};
use crate::models::{
    ClaimListQuery, CreatePromotionRequest, PaginatedResponse, PaginationParams,
    PromotionClaimEntry, PromotionResponse, UpdatePromotionRequest, VenuePromotionQuery,
    validate_capacity, validate_title, validate_window,
};
use crate::services::locking::lock_promotion;
use crate::services::{UserService, VenueService};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};

/// 活动管理（场所所有者使用）
#[derive(Clone)]
pub struct PromotionService {
    pool: DatabaseConnection,
    venue_service: VenueService,
    user_service: UserService,
}

impl PromotionService {
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

    pub async fn create_promotion(
        &self,
        owner_id: i64,
        request: CreatePromotionRequest,
    ) -> AppResult<PromotionResponse> {
        request.validate()?;
        self.venue_service
            .ensure_owns_venue(owner_id, request.venue_id)
            .await?;

        let now = Utc::now();
        let model = promotions::ActiveModel {
            venue_id: Set(request.venue_id),
            title: Set(request.title.trim().to_string()),
            description: Set(request.description),
            promotion_type: Set(request.promotion_type),
            capacity_limit: Set(request.capacity_limit),
            starts_at: Set(request.starts_at),
            ends_at: Set(request.ends_at),
            claims_count: Set(0),
            last_claimed_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.pool)
        .await?;

        log::info!(
            "Promotion {} created for venue {} (capacity {})",
            model.id,
            model.venue_id,
            model.capacity_limit
        );
        Ok(model.into())
    }

    /// 修改活动；已分配的名次不变，获奖与否按新名额在读取时重新判断
    pub async fn update_promotion(
        &self,
        owner_id: i64,
        promotion_id: i64,
        request: UpdatePromotionRequest,
    ) -> AppResult<PromotionResponse> {
        let existing = self.find_promotion(promotion_id).await?;
        self.venue_service
            .ensure_owns_venue(owner_id, existing.venue_id)
            .await?;

        if let Some(title) = &request.title {
            validate_title(title)?;
        }
        if let Some(capacity_limit) = request.capacity_limit {
            validate_capacity(capacity_limit)?;
        }
        if let Some(ends_at) = request.ends_at {
            validate_window(existing.starts_at, ends_at)?;
        }

        // 与领取使用同一把行锁，避免覆盖并发领取推进的计数
        let txn = self.pool.begin().await?;
        let current = lock_promotion(&txn, promotion_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Promotion not found".to_string()))?;

        let mut am = current.into_active_model();
        if let Some(title) = request.title {
            am.title = Set(title.trim().to_string());
        }
        if let Some(description) = request.description {
            am.description = Set(Some(description));
        }
        if let Some(capacity_limit) = request.capacity_limit {
            am.capacity_limit = Set(capacity_limit);
        }
        if let Some(ends_at) = request.ends_at {
            am.ends_at = Set(ends_at);
        }
        am.updated_at = Set(Utc::now());
        let updated = am.update(&txn).await?;
        txn.commit().await?;

        Ok(updated.into())
    }

    /// 删除活动（先删除其全部领取记录），返回删除的领取条数
    ///
    /// 持有与领取相同的活动行锁，并发领取要么在删除前提交（随之删除），
    /// 要么在删除后看到活动不存在。
    pub async fn delete_promotion(&self, owner_id: i64, promotion_id: i64) -> AppResult<u64> {
        let existing = self.find_promotion(promotion_id).await?;
        self.venue_service
            .ensure_owns_venue(owner_id, existing.venue_id)
            .await?;

        let txn = self.pool.begin().await?;
        if lock_promotion(&txn, promotion_id).await?.is_none() {
            txn.rollback().await?;
            return Err(AppError::NotFound("Promotion not found".to_string()));
        }
        let removed = claims::Entity::delete_many()
            .filter(claims::Column::PromotionId.eq(promotion_id))
            .exec(&txn)
            .await?;
        promotions::Entity::delete_by_id(promotion_id)
            .exec(&txn)
            .await?;
        txn.commit().await?;

        log::info!(
            "Promotion {promotion_id} deleted with {} claims",
            removed.rows_affected
        );
        Ok(removed.rows_affected)
    }

    pub async fn get_promotion(&self, promotion_id: i64) -> AppResult<PromotionResponse> {
        Ok(self.find_promotion(promotion_id).await?.into())
    }

    /// 场所活动列表；active 为 true 时只保留当前时间窗内的活动
    pub async fn list_venue_promotions(
        &self,
        venue_id: i64,
        query: &VenuePromotionQuery,
    ) -> AppResult<Vec<PromotionResponse>> {
        let mut select = promotions::Entity::find()
            .filter(promotions::Column::VenueId.eq(venue_id))
            .order_by_asc(promotions::Column::Id);
        if let Some(promotion_type) = query.promotion_type {
            select = select.filter(promotions::Column::PromotionType.eq(promotion_type));
        }

        let now = Utc::now();
        let list = select.all(&self.pool).await?;
        Ok(list
            .into_iter()
            .filter(|p| !query.active || p.is_active(now))
            .map(Into::into)
            .collect())
    }

    /// 活动领取明细（按名次升序，分页），所有者或员工可见
    pub async fn list_promotion_claims(
        &self,
        user_id: i64,
        promotion_id: i64,
        query: &ClaimListQuery,
    ) -> AppResult<PaginatedResponse<PromotionClaimEntry>> {
        let promotion = self.find_promotion(promotion_id).await?;
        self.venue_service
            .ensure_manages_venue(user_id, promotion.venue_id)
            .await?;

        let params = PaginationParams::new(query.page, query.per_page);
        let base_query =
            claims::Entity::find().filter(claims::Column::PromotionId.eq(promotion_id));

        let total = base_query.clone().count(&self.pool).await? as i64;
        let items = base_query
            .order_by_asc(claims::Column::Sequence)
            .limit(params.get_limit() as u64)
            .offset(params.get_offset() as u64)
            .all(&self.pool)
            .await?;

        let user_ids: Vec<i64> = items.iter().map(|c| c.user_id).collect();
        let names = self.user_service.display_names(&user_ids).await?;

        let now = Utc::now();
        let entries = items
            .into_iter()
            .map(|c| PromotionClaimEntry {
                claim_id: c.id,
                user_id: c.user_id,
                display_name: names.get(&c.user_id).cloned(),
                rank: c.rank(),
                is_winner: promotion.is_winning_rank(c.rank()),
                status: c.effective_status(promotion.ends_at, now),
                claimed_at: c.claimed_at,
                redeemed_at: c.redeemed_at,
            })
            .collect();

        Ok(PaginatedResponse::new(
            entries,
            params.get_page(),
            params.get_limit(),
            total,
        ))
    }

    async fn find_promotion(&self, promotion_id: i64) -> AppResult<promotions::Model> {
        promotions::Entity::find_by_id(promotion_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Promotion not found".to_string()))
    }
}
