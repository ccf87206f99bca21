use crate::entities::ClaimStatus;
use crate::models::{ClaimOutcome, MyClaimDetail, claim_message};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

/// 单个活动在本地的领取状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalClaimState {
    Claimed {
        rank: i64,
        is_winner: bool,
        status: ClaimStatus,
        message: String,
    },
    /// 确定没有领取成功（活动结束、未开始、不存在等）
    Failed { message: String },
    /// 重试用尽，结果未知；需要通过 refresh 确认
    Unknown { message: String },
}

impl From<&ClaimOutcome> for LocalClaimState {
    fn from(outcome: &ClaimOutcome) -> Self {
        LocalClaimState::Claimed {
            rank: outcome.rank,
            is_winner: outcome.is_winner,
            status: outcome.status,
            message: outcome.message.clone(),
        }
    }
}

impl LocalClaimState {
    pub(crate) fn from_detail(detail: &MyClaimDetail, capacity_limit: i32) -> Self {
        LocalClaimState::Claimed {
            rank: detail.rank,
            is_winner: detail.is_winner,
            status: detail.status,
            message: claim_message(detail.rank, capacity_limit, detail.is_winner),
        }
    }
}

/// UI 读取的领取视图 `{claimed, rank, is_winner, message}`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClaimStatusView {
    pub claimed: bool,
    pub rank: Option<i64>,
    pub is_winner: Option<bool>,
    pub status: Option<ClaimStatus>,
    pub message: Option<String>,
}

#[derive(Debug, Clone)]
struct StatusEntry {
    state: LocalClaimState,
    stale: bool,
}

#[derive(Debug, Clone, Copy)]
struct CountEntry {
    count: i64,
    fetched_at: DateTime<Utc>,
}

/// 领取状态与计数的本地缓存
///
/// 失效时机：领取成功（写入状态、计数失效）、收到核销通知（状态标记为过期待刷新）、
/// 计数超过 TTL。
#[derive(Debug)]
pub struct ClaimStatusCache {
    statuses: HashMap<i64, StatusEntry>,
    counts: HashMap<i64, CountEntry>,
    count_ttl: Duration,
}

impl ClaimStatusCache {
    pub fn new(count_ttl_secs: i64) -> Self {
        Self {
            statuses: HashMap::new(),
            counts: HashMap::new(),
            count_ttl: Duration::seconds(count_ttl_secs),
        }
    }

    pub fn view(&self, promotion_id: i64) -> ClaimStatusView {
        match self.statuses.get(&promotion_id).map(|e| &e.state) {
            Some(LocalClaimState::Claimed {
                rank,
                is_winner,
                status,
                message,
            }) => ClaimStatusView {
                claimed: true,
                rank: Some(*rank),
                is_winner: Some(*is_winner),
                status: Some(*status),
                message: Some(message.clone()),
            },
            Some(LocalClaimState::Failed { message } | LocalClaimState::Unknown { message }) => {
                ClaimStatusView {
                    message: Some(message.clone()),
                    ..Default::default()
                }
            }
            None => ClaimStatusView::default(),
        }
    }

    pub fn state(&self, promotion_id: i64) -> Option<&LocalClaimState> {
        self.statuses.get(&promotion_id).map(|e| &e.state)
    }

    pub fn is_claimed(&self, promotion_id: i64) -> bool {
        matches!(
            self.state(promotion_id),
            Some(LocalClaimState::Claimed { .. })
        )
    }

    /// 记录领取结果；成功领取时该活动的计数同时失效
    pub fn record(&mut self, promotion_id: i64, state: LocalClaimState) {
        if matches!(state, LocalClaimState::Claimed { .. }) {
            self.counts.remove(&promotion_id);
        }
        self.statuses.insert(
            promotion_id,
            StatusEntry {
                state,
                stale: false,
            },
        );
    }

    pub fn forget(&mut self, promotion_id: i64) {
        self.statuses.remove(&promotion_id);
        self.counts.remove(&promotion_id);
    }

    /// 核销通知：保留当前展示，等待下一次 refresh
    pub fn on_redeemed(&mut self, promotion_id: i64) {
        if let Some(entry) = self.statuses.get_mut(&promotion_id) {
            entry.stale = true;
        }
    }

    /// 需要刷新的活动：已过期标记或结果未知
    pub fn needs_refresh(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self
            .statuses
            .iter()
            .filter(|(_, e)| e.stale || matches!(e.state, LocalClaimState::Unknown { .. }))
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn count(&self, promotion_id: i64, now: DateTime<Utc>) -> Option<i64> {
        self.counts
            .get(&promotion_id)
            .filter(|e| now - e.fetched_at < self.count_ttl)
            .map(|e| e.count)
    }

    pub fn store_count(&mut self, promotion_id: i64, count: i64, now: DateTime<Utc>) {
        self.counts.insert(
            promotion_id,
            CountEntry {
                count,
                fetched_at: now,
            },
        );
    }
}
