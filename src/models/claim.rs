use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::ToSchema;

use crate::entities::ClaimStatus;

/// 领取结果
/// - success: 本次调用是否真正创建了领取记录（重复领取为 false）
/// - claimed: 用户是否已持有该活动的领取记录
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct ClaimOutcome {
    pub success: bool,
    pub claimed: bool,
    pub rank: i64,
    pub is_winner: bool,
    pub claim_id: i64,
    pub promotion_id: i64,
    pub capacity_limit: i32,
    pub claimed_at: DateTime<Utc>,
    pub status: ClaimStatus,
    /// 二维码凭证 `claimId|userId|promotionId|claimedAt`
    pub credential: String,
    pub message: String,
}

pub const ALREADY_CLAIMED_MESSAGE: &str = "already claimed";

pub fn claim_message(rank: i64, capacity_limit: i32, is_winner: bool) -> String {
    if is_winner {
        format!("Claimed! You are #{rank} of {capacity_limit} winners")
    } else {
        format!("Claimed as #{rank}, but only the first {capacity_limit} win")
    }
}

/// 批量查询的活动 ID 列表
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct PromotionIdsRequest {
    pub promotion_ids: Vec<i64>,
}

/// 活动 ID -> 领取总数；没有领取的活动不出现在结果中
pub type ClaimCounts = HashMap<i64, i64>;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ClaimCountsResponse {
    pub counts: ClaimCounts,
}

/// 当前用户在某活动下的领取详情
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct MyClaimDetail {
    pub claim_id: i64,
    pub rank: i64,
    pub is_winner: bool,
    pub status: ClaimStatus,
    pub claimed_at: DateTime<Utc>,
}

/// 活动领取概览（计数 + 本人领取详情）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct PromotionClaimOverview {
    pub promotion_id: i64,
    pub count: i64,
    pub capacity_limit: i32,
    pub spots_remaining: i64,
    pub my_claim: Option<MyClaimDetail>,
}

/// 活动领取明细（所有者看板）
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PromotionClaimEntry {
    pub claim_id: i64,
    pub user_id: i64,
    pub display_name: Option<String>,
    pub rank: i64,
    pub is_winner: bool,
    pub status: ClaimStatus,
    pub claimed_at: DateTime<Utc>,
    pub redeemed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct ClaimListQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}
