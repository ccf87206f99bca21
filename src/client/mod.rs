//! Consumer-side claim orchestration.
//!
//! Turns check-in / "going" events into exactly one claim call per matching
//! promotion and keeps a local view of the outcome for the UI.

pub mod api;
pub mod cache;
pub mod orchestrator;

pub use api::{ApiClient, PromotionApi};
pub use cache::{ClaimStatusCache, ClaimStatusView, LocalClaimState};
pub use orchestrator::{ClaimOrchestrator, QualifyingAction, QualifyingEvent};
