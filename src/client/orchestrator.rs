use crate::client::api::PromotionApi;
use crate::client::cache::{ClaimStatusCache, ClaimStatusView, LocalClaimState};
use crate::config::ClientConfig;
use crate::entities::PromotionType;
use crate::error::{AppError, AppResult};
use crate::models::ClaimCounts;
use chrono::Utc;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

/// 触发领取的用户行为
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QualifyingAction {
    CheckIn,
    Going,
}

impl QualifyingAction {
    pub fn promotion_type(self) -> PromotionType {
        match self {
            QualifyingAction::CheckIn => PromotionType::FirstNCheckin,
            QualifyingAction::Going => PromotionType::FirstNGoing,
        }
    }
}

/// 签到 / 想去 事件；event_id 用于去重（同一事件只领取一次）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualifyingEvent {
    pub event_id: Uuid,
    pub user_id: i64,
    pub venue_id: i64,
    pub action: QualifyingAction,
}

impl QualifyingEvent {
    pub fn new(user_id: i64, venue_id: i64, action: QualifyingAction) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            user_id,
            venue_id,
            action,
        }
    }
}

/// 已处理事件的去重窗口大小
const PROCESSED_EVENT_CAPACITY: usize = 1024;

/// 最近处理过的事件 id，超出容量时淘汰最早的
struct RecentEvents {
    order: VecDeque<Uuid>,
    seen: HashSet<Uuid>,
    capacity: usize,
}

impl RecentEvents {
    fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(capacity),
            seen: HashSet::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// 首次出现返回 true
    fn insert(&mut self, event_id: Uuid) -> bool {
        if !self.seen.insert(event_id) {
            return false;
        }
        self.order.push_back(event_id);
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        true
    }

    fn remove(&mut self, event_id: &Uuid) {
        if self.seen.remove(event_id) {
            self.order.retain(|id| id != event_id);
        }
    }
}

/// 单个登录用户的领取编排；api 携带的令牌与 user_id 属于同一用户
pub struct ClaimOrchestrator<A: PromotionApi> {
    api: A,
    user_id: i64,
    cache: Arc<Mutex<ClaimStatusCache>>,
    processed_events: Arc<Mutex<RecentEvents>>,
    max_claim_attempts: u32,
    retry_backoff: Duration,
}

impl<A: PromotionApi> ClaimOrchestrator<A> {
    pub fn new(api: A, user_id: i64, config: &ClientConfig) -> Self {
        Self {
            api,
            user_id,
            cache: Arc::new(Mutex::new(ClaimStatusCache::new(
                config.count_cache_ttl_secs,
            ))),
            processed_events: Arc::new(Mutex::new(RecentEvents::new(PROCESSED_EVENT_CAPACITY))),
            max_claim_attempts: config.max_claim_attempts.max(1),
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }

    /// 处理一次签到 / 想去事件
    ///
    /// 每个匹配的进行中活动调用一次 claim；结果写入缓存并返回。
    /// 获取活动列表失败时返回错误，且事件不记为已处理，可重新投递。
    /// 其他用户的事件直接拒绝。
    pub async fn on_qualifying_action(
        &self,
        event: &QualifyingEvent,
    ) -> AppResult<Vec<(i64, LocalClaimState)>> {
        if event.user_id != self.user_id {
            log::warn!(
                "Qualifying event {} belongs to user {}, not {}",
                event.event_id,
                event.user_id,
                self.user_id
            );
            return Err(AppError::ValidationError(
                "Event belongs to another user".to_string(),
            ));
        }
        if !self.processed_events.lock().await.insert(event.event_id) {
            log::debug!("Qualifying event {} already processed", event.event_id);
            return Ok(Vec::new());
        }

        let promotions = match self
            .api
            .active_promotions(event.venue_id, event.action.promotion_type())
            .await
        {
            Ok(list) => list,
            Err(e) => {
                log::error!(
                    "Failed to load active promotions for venue {}: {e}",
                    event.venue_id
                );
                self.processed_events.lock().await.remove(&event.event_id);
                return Err(e);
            }
        };

        let mut results = Vec::with_capacity(promotions.len());
        for promotion in promotions {
            if self.cache.lock().await.is_claimed(promotion.id) {
                continue;
            }
            let state = self.claim_with_retry(promotion.id).await;
            self.cache.lock().await.record(promotion.id, state.clone());
            results.push((promotion.id, state));
        }
        Ok(results)
    }

    /// 同一请求重试：只有结果未知的错误才重试，依赖服务端幂等。
    /// 响应读取中途失败同样视为结果未知（请求可能已经生效）。
    async fn claim_with_retry(&self, promotion_id: i64) -> LocalClaimState {
        let mut last_error = String::new();
        for attempt in 1..=self.max_claim_attempts {
            match self.api.claim(promotion_id).await {
                Ok(outcome) => {
                    log::info!(
                        "Promotion {promotion_id} claimed with rank {} (winner: {})",
                        outcome.rank,
                        outcome.is_winner
                    );
                    return LocalClaimState::from(&outcome);
                }
                Err(e) if e.is_unknown_outcome() => {
                    log::warn!(
                        "Claim attempt {attempt}/{} for promotion {promotion_id} failed: {e}",
                        self.max_claim_attempts
                    );
                    last_error = e.to_string();
                    if attempt < self.max_claim_attempts {
                        tokio::time::sleep(self.retry_backoff * attempt).await;
                    }
                }
                Err(e) => {
                    log::warn!("Claim for promotion {promotion_id} rejected: {e}");
                    return LocalClaimState::Failed {
                        message: e.to_string(),
                    };
                }
            }
        }
        LocalClaimState::Unknown {
            message: format!("Claim status unknown, please refresh: {last_error}"),
        }
    }

    /// 通过 claim-overview 刷新状态（不会产生新领取）
    ///
    /// overview 读自可能滞后的副本：没有 my_claim 时不能断定领取未发生，
    /// 结果未知的记录保持 Unknown，由 `refresh_pending` 重新发起同一领取。
    pub async fn refresh(&self, promotion_ids: &[i64]) -> AppResult<()> {
        if promotion_ids.is_empty() {
            return Ok(());
        }
        let overview = self.api.claim_overview(promotion_ids).await?;
        let now = Utc::now();

        let mut cache = self.cache.lock().await;
        let mut seen = HashSet::new();
        for item in &overview {
            seen.insert(item.promotion_id);
            if let Some(detail) = &item.my_claim {
                cache.record(
                    item.promotion_id,
                    LocalClaimState::from_detail(detail, item.capacity_limit),
                );
            }
            cache.store_count(item.promotion_id, item.count, now);
        }
        // 已删除的活动；结果未知的留给重新领取确认
        for id in promotion_ids {
            let unresolved = matches!(cache.state(*id), Some(LocalClaimState::Unknown { .. }));
            if !seen.contains(id) && !unresolved {
                cache.forget(*id);
            }
        }
        Ok(())
    }

    /// 刷新所有待确认的活动
    ///
    /// 刷新后仍为 Unknown 的活动重新发起同一领取（服务端幂等，已领取时返回原名次）。
    pub async fn refresh_pending(&self) -> AppResult<()> {
        let ids = self.cache.lock().await.needs_refresh();
        self.refresh(&ids).await?;

        let unresolved: Vec<i64> = {
            let cache = self.cache.lock().await;
            ids.into_iter()
                .filter(|id| matches!(cache.state(*id), Some(LocalClaimState::Unknown { .. })))
                .collect()
        };
        for promotion_id in unresolved {
            log::info!("Re-issuing claim for unresolved promotion {promotion_id}");
            let state = self.claim_with_retry(promotion_id).await;
            self.cache.lock().await.record(promotion_id, state);
        }
        Ok(())
    }

    pub async fn on_redeemed(&self, promotion_id: i64) {
        self.cache.lock().await.on_redeemed(promotion_id);
    }

    pub async fn view(&self, promotion_id: i64) -> ClaimStatusView {
        self.cache.lock().await.view(promotion_id)
    }

    /// 领取数量（读缓存，过期或缺失的再批量拉取）；没有领取的活动计为 0
    pub async fn claim_counts(&self, promotion_ids: &[i64]) -> AppResult<ClaimCounts> {
        let now = Utc::now();
        let mut counts = ClaimCounts::new();
        let mut missing = Vec::new();
        {
            let cache = self.cache.lock().await;
            for id in promotion_ids {
                match cache.count(*id, now) {
                    Some(count) => {
                        counts.insert(*id, count);
                    }
                    None => missing.push(*id),
                }
            }
        }
        if missing.is_empty() {
            return Ok(counts);
        }

        let fetched = self.api.claim_counts(&missing).await?;
        let mut cache = self.cache.lock().await;
        for id in missing {
            let count = fetched.get(&id).copied().unwrap_or(0);
            cache.store_count(id, count, now);
            counts.insert(id, count);
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::ClaimStatus;
    use crate::error::AppError;
    use crate::models::{
        ClaimOutcome, MyClaimDetail, PromotionClaimOverview, PromotionResponse, claim_message,
    };
    use async_trait::async_trait;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct FakeApi {
        promotions: Vec<PromotionResponse>,
        claim_results: StdMutex<HashMap<i64, VecDeque<AppResult<ClaimOutcome>>>>,
        claim_calls: StdMutex<Vec<i64>>,
        overview: Vec<PromotionClaimOverview>,
        overview_calls: StdMutex<u32>,
        counts: ClaimCounts,
        count_calls: StdMutex<Vec<Vec<i64>>>,
        fail_listing: bool,
    }

    impl FakeApi {
        fn script(&self, promotion_id: i64, results: Vec<AppResult<ClaimOutcome>>) {
            self.claim_results
                .lock()
                .unwrap()
                .insert(promotion_id, results.into());
        }

        fn claim_calls(&self) -> Vec<i64> {
            self.claim_calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PromotionApi for FakeApi {
        async fn active_promotions(
            &self,
            _venue_id: i64,
            promotion_type: PromotionType,
        ) -> AppResult<Vec<PromotionResponse>> {
            if self.fail_listing {
                return Err(AppError::ExternalApiError("unavailable".into()));
            }
            Ok(self
                .promotions
                .iter()
                .filter(|p| p.promotion_type == promotion_type)
                .cloned()
                .collect())
        }

        async fn claim(&self, promotion_id: i64) -> AppResult<ClaimOutcome> {
            self.claim_calls.lock().unwrap().push(promotion_id);
            self.claim_results
                .lock()
                .unwrap()
                .get_mut(&promotion_id)
                .and_then(|q| q.pop_front())
                .unwrap_or_else(|| Err(AppError::InternalError("unscripted claim".into())))
        }

        async fn claim_overview(
            &self,
            _promotion_ids: &[i64],
        ) -> AppResult<Vec<PromotionClaimOverview>> {
            *self.overview_calls.lock().unwrap() += 1;
            Ok(self.overview.clone())
        }

        async fn claim_counts(&self, promotion_ids: &[i64]) -> AppResult<ClaimCounts> {
            self.count_calls.lock().unwrap().push(promotion_ids.to_vec());
            Ok(self.counts.clone())
        }
    }

    fn config() -> ClientConfig {
        ClientConfig {
            max_claim_attempts: 3,
            retry_backoff_ms: 0,
            ..Default::default()
        }
    }

    fn promotion(id: i64, promotion_type: PromotionType) -> PromotionResponse {
        let now = Utc::now();
        PromotionResponse {
            id,
            venue_id: 1,
            title: format!("Promo {id}"),
            description: None,
            promotion_type,
            capacity_limit: 2,
            starts_at: now - chrono::Duration::hours(1),
            ends_at: now + chrono::Duration::hours(1),
            claims_count: 0,
            spots_remaining: 2,
        }
    }

    fn outcome(promotion_id: i64, rank: i64) -> ClaimOutcome {
        let is_winner = rank <= 2;
        ClaimOutcome {
            success: true,
            claimed: true,
            rank,
            is_winner,
            claim_id: promotion_id * 100 + rank,
            promotion_id,
            capacity_limit: 2,
            claimed_at: Utc::now(),
            status: ClaimStatus::Claimed,
            credential: String::new(),
            message: claim_message(rank, 2, is_winner),
        }
    }

    fn arbitration_failure() -> AppResult<ClaimOutcome> {
        Err(AppError::ArbitrationFailure("lock timeout".into()))
    }

    #[tokio::test]
    async fn test_check_in_claims_matching_promotions_once_per_event() {
        let api = FakeApi {
            promotions: vec![
                promotion(1, PromotionType::FirstNCheckin),
                promotion(2, PromotionType::FirstNGoing),
            ],
            ..Default::default()
        };
        api.script(1, vec![Ok(outcome(1, 1))]);
        let orchestrator = ClaimOrchestrator::new(api, 7, &config());
        let event = QualifyingEvent::new(7, 1, QualifyingAction::CheckIn);

        let results = orchestrator.on_qualifying_action(&event).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, 1);

        let again = orchestrator.on_qualifying_action(&event).await.unwrap();
        assert!(again.is_empty());
        assert_eq!(orchestrator.api.claim_calls(), vec![1]);

        let view = orchestrator.view(1).await;
        assert!(view.claimed);
        assert_eq!(view.rank, Some(1));
        assert_eq!(view.is_winner, Some(true));
        assert_eq!(orchestrator.view(2).await, ClaimStatusView::default());
    }

    #[tokio::test]
    async fn test_unknown_outcome_is_retried_with_same_call() {
        let api = FakeApi {
            promotions: vec![promotion(1, PromotionType::FirstNGoing)],
            ..Default::default()
        };
        api.script(1, vec![arbitration_failure(), Ok(outcome(1, 3))]);
        let orchestrator = ClaimOrchestrator::new(api, 7, &config());

        let event = QualifyingEvent::new(7, 1, QualifyingAction::Going);
        orchestrator.on_qualifying_action(&event).await.unwrap();

        assert_eq!(orchestrator.api.claim_calls(), vec![1, 1]);
        let view = orchestrator.view(1).await;
        assert_eq!(view.rank, Some(3));
        assert_eq!(view.is_winner, Some(false));
    }

    #[tokio::test]
    async fn test_exhausted_retries_surface_unknown_state() {
        let api = FakeApi {
            promotions: vec![promotion(1, PromotionType::FirstNCheckin)],
            ..Default::default()
        };
        api.script(
            1,
            vec![
                arbitration_failure(),
                arbitration_failure(),
                arbitration_failure(),
            ],
        );
        let orchestrator = ClaimOrchestrator::new(api, 7, &config());

        let event = QualifyingEvent::new(7, 1, QualifyingAction::CheckIn);
        let results = orchestrator.on_qualifying_action(&event).await.unwrap();

        assert_eq!(orchestrator.api.claim_calls().len(), 3);
        assert!(matches!(results[0].1, LocalClaimState::Unknown { .. }));
        let view = orchestrator.view(1).await;
        assert!(!view.claimed);
        assert!(view.message.is_some());
    }

    #[tokio::test]
    async fn test_terminal_rejection_is_not_retried() {
        let api = FakeApi {
            promotions: vec![promotion(1, PromotionType::FirstNCheckin)],
            ..Default::default()
        };
        api.script(1, vec![Err(AppError::Expired)]);
        let orchestrator = ClaimOrchestrator::new(api, 7, &config());

        let event = QualifyingEvent::new(7, 1, QualifyingAction::CheckIn);
        let results = orchestrator.on_qualifying_action(&event).await.unwrap();

        assert_eq!(orchestrator.api.claim_calls(), vec![1]);
        assert_eq!(
            results[0].1,
            LocalClaimState::Failed {
                message: AppError::Expired.to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_listing_failure_leaves_event_retriable() {
        let api = FakeApi {
            fail_listing: true,
            ..Default::default()
        };
        let orchestrator = ClaimOrchestrator::new(api, 7, &config());
        let event = QualifyingEvent::new(7, 1, QualifyingAction::CheckIn);

        assert!(orchestrator.on_qualifying_action(&event).await.is_err());
        assert!(orchestrator.on_qualifying_action(&event).await.is_err());
    }

    #[tokio::test]
    async fn test_refresh_resolves_unknown_without_claiming() {
        let api = FakeApi {
            promotions: vec![promotion(1, PromotionType::FirstNCheckin)],
            overview: vec![PromotionClaimOverview {
                promotion_id: 1,
                count: 4,
                capacity_limit: 2,
                spots_remaining: 0,
                my_claim: Some(MyClaimDetail {
                    claim_id: 101,
                    rank: 2,
                    is_winner: true,
                    status: ClaimStatus::Redeemed,
                    claimed_at: Utc::now(),
                }),
            }],
            ..Default::default()
        };
        api.script(
            1,
            vec![
                arbitration_failure(),
                arbitration_failure(),
                arbitration_failure(),
            ],
        );
        let orchestrator = ClaimOrchestrator::new(api, 7, &config());
        let event = QualifyingEvent::new(7, 1, QualifyingAction::CheckIn);
        orchestrator.on_qualifying_action(&event).await.unwrap();

        orchestrator.refresh_pending().await.unwrap();

        assert_eq!(orchestrator.api.claim_calls().len(), 3);
        assert_eq!(*orchestrator.api.overview_calls.lock().unwrap(), 1);
        let view = orchestrator.view(1).await;
        assert!(view.claimed);
        assert_eq!(view.rank, Some(2));
        assert_eq!(view.status, Some(ClaimStatus::Redeemed));
        assert_eq!(orchestrator.claim_counts(&[1]).await.unwrap()[&1], 4);
        assert!(orchestrator.api.count_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_lagging_overview_keeps_unknown_and_reissues_claim() {
        let api = FakeApi {
            promotions: vec![promotion(1, PromotionType::FirstNCheckin)],
            overview: vec![PromotionClaimOverview {
                promotion_id: 1,
                count: 0,
                capacity_limit: 2,
                spots_remaining: 2,
                my_claim: None,
            }],
            ..Default::default()
        };
        api.script(
            1,
            vec![
                arbitration_failure(),
                arbitration_failure(),
                arbitration_failure(),
                Ok(outcome(1, 1)),
            ],
        );
        let orchestrator = ClaimOrchestrator::new(api, 7, &config());
        let event = QualifyingEvent::new(7, 1, QualifyingAction::CheckIn);
        orchestrator.on_qualifying_action(&event).await.unwrap();
        assert!(matches!(
            orchestrator.cache.lock().await.state(1),
            Some(LocalClaimState::Unknown { .. })
        ));

        orchestrator.refresh_pending().await.unwrap();

        assert_eq!(orchestrator.api.claim_calls(), vec![1, 1, 1, 1]);
        let view = orchestrator.view(1).await;
        assert!(view.claimed);
        assert_eq!(view.rank, Some(1));
        assert!(orchestrator.cache.lock().await.needs_refresh().is_empty());
    }

    #[tokio::test]
    async fn test_unresolved_claim_stays_pending_while_server_is_unreachable() {
        let api = FakeApi {
            promotions: vec![promotion(1, PromotionType::FirstNGoing)],
            ..Default::default()
        };
        api.script(1, (0..6).map(|_| arbitration_failure()).collect());
        let orchestrator = ClaimOrchestrator::new(api, 7, &config());
        let event = QualifyingEvent::new(7, 1, QualifyingAction::Going);
        orchestrator.on_qualifying_action(&event).await.unwrap();

        // 副本尚未出现该活动，也不能当作已删除
        orchestrator.refresh_pending().await.unwrap();

        assert_eq!(orchestrator.api.claim_calls().len(), 6);
        assert!(matches!(
            orchestrator.cache.lock().await.state(1),
            Some(LocalClaimState::Unknown { .. })
        ));
        assert_eq!(orchestrator.cache.lock().await.needs_refresh(), vec![1]);
    }

    #[tokio::test]
    async fn test_event_for_another_user_is_rejected() {
        let api = FakeApi {
            promotions: vec![promotion(1, PromotionType::FirstNCheckin)],
            ..Default::default()
        };
        let orchestrator = ClaimOrchestrator::new(api, 7, &config());
        let event = QualifyingEvent::new(8, 1, QualifyingAction::CheckIn);

        assert!(matches!(
            orchestrator.on_qualifying_action(&event).await,
            Err(AppError::ValidationError(_))
        ));
        assert!(orchestrator.api.claim_calls().is_empty());
    }

    #[test]
    fn test_recent_events_evict_oldest_beyond_capacity() {
        let mut events = RecentEvents::new(2);
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        assert!(events.insert(a));
        assert!(events.insert(b));
        assert!(!events.insert(a));
        assert!(events.insert(c));

        assert_eq!(events.order.len(), 2);
        assert_eq!(events.seen.len(), 2);
        assert!(events.insert(a));
        assert!(!events.insert(c));

        events.remove(&c);
        assert!(events.insert(c));
    }

    #[tokio::test]
    async fn test_redemption_notice_triggers_overview_refresh() {
        let api = FakeApi {
            promotions: vec![promotion(1, PromotionType::FirstNCheckin)],
            overview: vec![PromotionClaimOverview {
                promotion_id: 1,
                count: 1,
                capacity_limit: 2,
                spots_remaining: 1,
                my_claim: Some(MyClaimDetail {
                    claim_id: 101,
                    rank: 1,
                    is_winner: true,
                    status: ClaimStatus::Redeemed,
                    claimed_at: Utc::now(),
                }),
            }],
            ..Default::default()
        };
        api.script(1, vec![Ok(outcome(1, 1))]);
        let orchestrator = ClaimOrchestrator::new(api, 7, &config());
        let event = QualifyingEvent::new(7, 1, QualifyingAction::CheckIn);
        orchestrator.on_qualifying_action(&event).await.unwrap();
        assert_eq!(orchestrator.view(1).await.status, Some(ClaimStatus::Claimed));

        orchestrator.on_redeemed(1).await;
        orchestrator.refresh_pending().await.unwrap();

        assert_eq!(orchestrator.view(1).await.status, Some(ClaimStatus::Redeemed));
        assert_eq!(orchestrator.api.claim_calls(), vec![1]);
    }

    #[tokio::test]
    async fn test_counts_are_read_through_and_default_to_zero() {
        let api = FakeApi {
            counts: HashMap::from([(1, 5)]),
            ..Default::default()
        };
        let orchestrator = ClaimOrchestrator::new(api, 7, &config());

        let counts = orchestrator.claim_counts(&[1, 2]).await.unwrap();
        assert_eq!(counts[&1], 5);
        assert_eq!(counts[&2], 0);

        orchestrator.claim_counts(&[1, 2]).await.unwrap();
        assert_eq!(orchestrator.api.count_calls.lock().unwrap().len(), 1);
    }
}
