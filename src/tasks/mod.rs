//! Background scheduled tasks.
//!
//! Claims whose promotion window has closed are swept to `expired` on a fixed
//! interval. Reads already derive the same status, so the sweep only keeps the
//! stored column in line. Call `spawn_all` once during startup.

use crate::services::ClaimService;
use std::time::Duration;

/// Spawn all background tasks.
///
/// Detaches via `tokio::spawn`; it does not block.
pub fn spawn_all(claim_service: ClaimService, expiry_sweep_interval_secs: u64) {
    // 过期领取记录清理
    {
        let svc = claim_service.clone();
        let interval = Duration::from_secs(expiry_sweep_interval_secs.max(1));
        tokio::spawn(async move {
            loop {
                match svc.expire_claims().await {
                    Ok(n) if n > 0 => log::info!("Expired promotion claims processed: {n}"),
                    Ok(_) => {}
                    Err(e) => log::error!("Failed to expire promotion claims: {e:?}"),
                }
                tokio::time::sleep(interval).await;
            }
        });
    }
}
