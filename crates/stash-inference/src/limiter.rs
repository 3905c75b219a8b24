//! Process-wide inference request rate limiter.
//!
//! Constructed once at startup by the worker runtime and injected into every
//! component that calls the inference capability. The limit is per-process;
//! multi-process deployments coordinate through the shared job queue rather
//! than a shared limiter.

use std::num::NonZeroU32;

use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};
use tracing::info;

use stash_core::defaults;

/// Rate limiter gating calls to the inference capability.
pub struct InferenceLimiter {
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    requests_per_minute: u32,
}

impl InferenceLimiter {
    /// Create a limiter allowing `requests_per_minute` inference calls.
    pub fn new(requests_per_minute: u32) -> Self {
        let per_minute = requests_per_minute.max(1);
        let quota = Quota::per_minute(NonZeroU32::new(per_minute).expect("max(1) is non-zero"));
        info!(
            subsystem = "inference",
            component = "limiter",
            requests_per_minute = per_minute,
            "Inference rate limiter configured"
        );
        Self {
            limiter: RateLimiter::direct(quota),
            requests_per_minute: per_minute,
        }
    }

    /// Create from the `STASH_INFERENCE_RPM` environment variable.
    pub fn from_env() -> Self {
        let rpm = std::env::var("STASH_INFERENCE_RPM")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(defaults::INFERENCE_REQUESTS_PER_MINUTE);
        Self::new(rpm)
    }

    /// Wait until a request slot is available.
    pub async fn acquire(&self) {
        self.limiter.until_ready().await;
    }

    /// The configured requests-per-minute budget.
    pub fn requests_per_minute(&self) -> u32 {
        self.requests_per_minute
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_rpm_clamps_to_one() {
        let limiter = InferenceLimiter::new(0);
        assert_eq!(limiter.requests_per_minute(), 1);
    }

    #[tokio::test]
    async fn test_acquire_within_budget_is_immediate() {
        let limiter = InferenceLimiter::new(60);
        // First acquisition should not block
        tokio::time::timeout(std::time::Duration::from_millis(50), limiter.acquire())
            .await
            .expect("first acquire should be immediate");
    }
}
