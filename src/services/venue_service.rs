use crate::entities::{venue_entity as venues, venue_staff_entity as staff};
use crate::error::{AppError, AppResult};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter};

/// 场所权限：回答“用户 U 是否拥有/管理场所 V”
#[derive(Clone)]
pub struct VenueService {
    pool: DatabaseConnection,
}

impl VenueService {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }

    async fn find_venue(&self, venue_id: i64) -> AppResult<venues::Model> {
        venues::Entity::find_by_id(venue_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Venue not found".to_string()))
    }

    pub async fn owns_venue(&self, user_id: i64, venue_id: i64) -> AppResult<bool> {
        Ok(self.find_venue(venue_id).await?.owner_id == user_id)
    }

    /// 所有者或登记的员工
    pub async fn manages_venue(&self, user_id: i64, venue_id: i64) -> AppResult<bool> {
        let venue = self.find_venue(venue_id).await?;
        if venue.owner_id == user_id {
            return Ok(true);
        }

        let staff_rows = staff::Entity::find()
            .filter(staff::Column::VenueId.eq(venue_id))
            .filter(staff::Column::UserId.eq(user_id))
            .count(&self.pool)
            .await?;
        Ok(staff_rows > 0)
    }

    pub async fn ensure_owns_venue(&self, user_id: i64, venue_id: i64) -> AppResult<()> {
        if self.owns_venue(user_id, venue_id).await? {
            Ok(())
        } else {
            log::warn!("User {user_id} is not the owner of venue {venue_id}");
            Err(AppError::PermissionDenied)
        }
    }

    pub async fn ensure_manages_venue(&self, user_id: i64, venue_id: i64) -> AppResult<()> {
        if self.manages_venue(user_id, venue_id).await? {
            Ok(())
        } else {
            log::warn!("User {user_id} does not manage venue {venue_id}");
            Err(AppError::PermissionDenied)
        }
    }
}
