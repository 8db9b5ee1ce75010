//! Vote rate limiting.
//!
//! Fixed 60-second windows backed by Redis INCR counters, one counter per
//! identity channel per window. The bucket index is baked into the key, so
//! windows roll over without any cleanup logic; EXPIRE reclaims old keys.
//!
//! The limiter fails open: if Redis is unreachable, voting proceeds and the
//! failure is logged. Limiting degrades, ground-truth voting does not.

#![allow(missing_docs)]

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use fred::clients::Client;
use fred::interfaces::KeysInterface;
use pollwave_common::{AppError, AppResult};
use pollwave_core::ResolvedIdentity;
use tracing::warn;

/// Per-channel vote rate limiter.
#[derive(Clone)]
pub struct VoteRateLimiter {
    redis: Arc<Client>,
    prefix: String,
    max_per_window: u32,
    window_secs: u64,
}

impl VoteRateLimiter {
    /// Create a new rate limiter.
    #[must_use]
    pub const fn new(
        redis: Arc<Client>,
        prefix: String,
        max_per_window: u32,
        window_secs: u64,
    ) -> Self {
        Self {
            redis,
            prefix,
            max_per_window,
            window_secs,
        }
    }

    /// Check the device and network channels independently; exceeding
    /// either rejects the request.
    pub async fn check_vote(&self, identity: &ResolvedIdentity) -> AppResult<()> {
        if let Some(device_hash) = identity.device_hash.as_deref() {
            self.check_channel("device", device_hash).await?;
        }
        if let Some(network_hash) = identity.network_hash.as_deref() {
            self.check_channel("net", network_hash).await?;
        }
        Ok(())
    }

    async fn check_channel(&self, kind: &str, hash: &str) -> AppResult<()> {
        let now = unix_seconds();
        let bucket = now / self.window_secs;
        let key = format!("{}:rl:{kind}:{hash}:{bucket}", self.prefix);

        let count: u64 = match self.redis.incr(key.clone()).await {
            Ok(count) => count,
            Err(e) => {
                warn!(kind, error = %e, "Rate limiter Redis unavailable, failing open");
                return Ok(());
            }
        };

        // Set expiry on first increment
        if count == 1
            && let Err(e) = self
                .redis
                .expire::<(), _>(key, self.window_secs as i64, None)
                .await
        {
            warn!(kind, error = %e, "Failed to set rate-limit key expiry");
        }

        if count > u64::from(self.max_per_window) {
            let retry_after = self.window_secs - (now % self.window_secs);
            return Err(AppError::RateLimited { retry_after });
        }

        Ok(())
    }
}

fn unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_rolls_over_per_window() {
        let window = 60;
        assert_eq!(119 / window, 1);
        assert_eq!(120 / window, 2);
    }

    #[test]
    fn test_retry_after_bounded_by_window() {
        let window = 60_u64;
        for now in [0_u64, 1, 59, 60, 61, 3599] {
            let retry_after = window - (now % window);
            assert!(retry_after >= 1 && retry_after <= window);
        }
    }

    #[test]
    fn test_unix_seconds_nonzero() {
        assert!(unix_seconds() > 1_700_000_000);
    }
}
