use std::future::Future;
use std::time::Duration;

use tokio_retry::strategy::ExponentialBackoff;
use tokio_retry::RetryIf;

use crate::api::ApiError;

pub const MAX_DELAY: Duration = Duration::from_secs(10);

/// Bounded exponential backoff for HTTP 429.
///
/// Retry `n` (starting at 0) waits `min(1000 * 2^n, 10000)` ms. Any other error
/// is returned immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RateLimitPolicy {
    pub retries: usize,
}

impl RateLimitPolicy {
    /// The purchase flow's policy: three retries.
    pub const PURCHASE: RateLimitPolicy = RateLimitPolicy { retries: 3 };

    pub fn new(retries: usize) -> Self {
        Self { retries }
    }

    pub fn delays(self) -> impl Iterator<Item = Duration> {
        // 2^(n+1) * 500ms == 1000ms * 2^n
        ExponentialBackoff::from_millis(2)
            .factor(500)
            .max_delay(MAX_DELAY)
            .take(self.retries)
    }

    pub async fn run<T, A, F>(self, action: A) -> Result<T, ApiError>
    where
        A: FnMut() -> F,
        F: Future<Output = Result<T, ApiError>>,
    {
        RetryIf::start(self.delays(), action, |error: &ApiError| {
            let retry = error.is_rate_limited();
            if retry {
                tracing::warn!(%error, "rate limited, backing off");
            }
            retry
        })
        .await
    }
}
