use std::future::Future;
use std::time::Duration;

use leptos::logging;

use super::QueryResponse;

const DEFAULT_RETRIES: u32 = 3;
const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

/// How often a failing producer is re-run before its error is reported.
///
/// Delays grow exponentially from `base_delay`, capped at `max_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Number of retries after the first attempt.
    pub retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_RETRIES)
    }
}

impl RetryPolicy {
    /// `retries` retries with the default back-off.
    pub const fn new(retries: u32) -> Self {
        Self {
            retries,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }

    /// Never retry.
    pub const fn none() -> Self {
        Self::new(0)
    }

    /// Set the delay before the first retry.
    pub fn set_base_delay(self, base_delay: Duration) -> Self {
        RetryPolicy { base_delay, ..self }
    }

    /// Delay before retry number `failures` (zero based).
    pub fn delay_for(&self, failures: u32) -> Duration {
        let factor = 1_u32 << failures.min(16);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Runs `attempt` until it succeeds or the retries are used up.
    pub async fn run<T, Fu>(&self, mut attempt: impl FnMut() -> Fu) -> QueryResponse<T>
    where
        Fu: Future<Output = QueryResponse<T>>,
    {
        let mut failures = 0;
        loop {
            match attempt().await {
                Ok(value) => return Ok(value),
                Err(error) if failures < self.retries => {
                    let delay = self.delay_for(failures);
                    logging::debug_warn!(
                        "Attempt {} failed: {error}. Retrying in {}ms.",
                        failures + 1,
                        delay.as_millis()
                    );
                    sleep(delay).await;
                    failures += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

async fn sleep(duration: Duration) {
    if duration.is_zero() {
        return;
    }
    cfg_if::cfg_if! {
        if #[cfg(feature = "hydrate")] {
            gloo_timers::future::sleep(duration).await;
        } else if #[cfg(feature = "ssr")] {
            tokio::time::sleep(duration).await;
        } else {
            let _ = duration;
        }
    }
}
