//! Request pacing towards the upstream.
//!
//! The brokerage throttles aggressive clients, so the runner waits on a
//! [`RequestThrottle`] before every download. The throttle admits one request
//! per interval (burst of one); a zero interval disables pacing entirely.

use std::time::Duration;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};

/// Spaces out requests to at most one per `min_interval`.
pub struct RequestThrottle {
    limiter: Option<DefaultDirectRateLimiter>,
    min_interval: Duration,
}

impl RequestThrottle {
    /// Builds a throttle; `Duration::ZERO` means no pacing.
    pub fn new(min_interval: Duration) -> Self {
        Self {
            limiter: Quota::with_period(min_interval).map(RateLimiter::direct),
            min_interval,
        }
    }

    /// The configured spacing between requests.
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Resolves once the next request may be sent.
    pub async fn wait(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }
}
