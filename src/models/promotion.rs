use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::entities::{PromotionType, promotion_entity};
use crate::error::{AppError, AppResult};

/// 创建活动请求
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct CreatePromotionRequest {
    pub venue_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub promotion_type: PromotionType,
    /// 获奖名额 (>= 1)
    pub capacity_limit: i32,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

impl CreatePromotionRequest {
    pub fn validate(&self) -> AppResult<()> {
        validate_title(&self.title)?;
        validate_capacity(self.capacity_limit)?;
        validate_window(self.starts_at, self.ends_at)
    }
}

/// 修改活动请求（仅标题、描述、名额、结束时间可改）
#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
pub struct UpdatePromotionRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub capacity_limit: Option<i32>,
    pub ends_at: Option<DateTime<Utc>>,
}

pub(crate) fn validate_title(title: &str) -> AppResult<()> {
    if title.trim().is_empty() {
        return Err(AppError::ValidationError("Title must not be empty".into()));
    }
    Ok(())
}

pub(crate) fn validate_capacity(capacity_limit: i32) -> AppResult<()> {
    if capacity_limit < 1 {
        return Err(AppError::ValidationError(
            "Capacity limit must be at least 1".into(),
        ));
    }
    Ok(())
}

pub(crate) fn validate_window(starts_at: DateTime<Utc>, ends_at: DateTime<Utc>) -> AppResult<()> {
    if starts_at > ends_at {
        return Err(AppError::ValidationError(
            "Promotion start must not be after its end".into(),
        ));
    }
    Ok(())
}

/// 场所活动列表查询参数
#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct VenuePromotionQuery {
    /// 只返回当前有效期内的活动
    #[serde(default)]
    pub active: bool,
    pub promotion_type: Option<PromotionType>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PromotionResponse {
    pub id: i64,
    pub venue_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub promotion_type: PromotionType,
    pub capacity_limit: i32,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    /// 领取总数（含未获奖）
    pub claims_count: i64,
    pub spots_remaining: i64,
}

impl From<promotion_entity::Model> for PromotionResponse {
    fn from(m: promotion_entity::Model) -> Self {
        PromotionResponse {
            spots_remaining: m.spots_remaining(m.claims_count),
            id: m.id,
            venue_id: m.venue_id,
            title: m.title,
            description: m.description,
            promotion_type: m.promotion_type,
            capacity_limit: m.capacity_limit,
            starts_at: m.starts_at,
            ends_at: m.ends_at,
            claims_count: m.claims_count,
        }
    }
}
