use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct RedeemRequest {
    /// 扫码得到的凭证 `claimId|userId|promotionId|claimedAt`
    pub credential: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RedemptionStatus {
    Success,
    AlreadyRedeemed,
    NotFound,
    /// 名次不在获奖名额内，不可核销
    NotWinner,
}

/// 供店员确认界面展示
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct RedemptionClaimDetails {
    pub claim_id: i64,
    pub user_id: i64,
    pub display_name: Option<String>,
    pub promotion_id: i64,
    pub promotion_title: String,
    pub rank: i64,
    pub claimed_at: DateTime<Utc>,
    pub redeemed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct RedemptionOutcome {
    pub status: RedemptionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claim_details: Option<RedemptionClaimDetails>,
}

impl RedemptionOutcome {
    pub fn not_found() -> Self {
        Self {
            status: RedemptionStatus::NotFound,
            claim_details: None,
        }
    }

    pub fn with_details(status: RedemptionStatus, details: RedemptionClaimDetails) -> Self {
        Self {
            status,
            claim_details: Some(details),
        }
    }
}
