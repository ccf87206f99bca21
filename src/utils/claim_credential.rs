//! 领取凭证（二维码内容）编解码
//!
//! 文本格式固定为 `claimId|userId|promotionId|claimedAt`，
//! 其中 claimedAt 为 RFC 3339 UTC 时间。

use crate::error::{AppError, AppResult};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const SEPARATOR: char = '|';

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimCredential {
    pub claim_id: i64,
    pub user_id: i64,
    pub promotion_id: i64,
    pub claimed_at: DateTime<Utc>,
}

impl ClaimCredential {
    pub fn encode(&self) -> String {
        self.to_string()
    }

    pub fn decode(raw: &str) -> AppResult<Self> {
        raw.parse()
    }
}

impl fmt::Display for ClaimCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{SEPARATOR}{}{SEPARATOR}{}{SEPARATOR}{}",
            self.claim_id,
            self.user_id,
            self.promotion_id,
            self.claimed_at.to_rfc3339_opts(SecondsFormat::Micros, true)
        )
    }
}

impl FromStr for ClaimCredential {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let invalid = || AppError::ValidationError("Malformed claim credential".to_string());

        let parts: Vec<&str> = raw.trim().split(SEPARATOR).collect();
        let [claim_id, user_id, promotion_id, claimed_at] = parts.as_slice() else {
            return Err(invalid());
        };

        Ok(Self {
            claim_id: claim_id.parse().map_err(|_| invalid())?,
            user_id: user_id.parse().map_err(|_| invalid())?,
            promotion_id: promotion_id.parse().map_err(|_| invalid())?,
            claimed_at: DateTime::parse_from_rfc3339(claimed_at)
                .map_err(|_| invalid())?
                .with_timezone(&Utc),
        })
    }
}
