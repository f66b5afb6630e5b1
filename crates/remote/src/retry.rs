//! Retry wrapper and blocking-call boundary for remote API calls.
//!
//! Orchestration runs on cooperative tokio tasks; every remote call is
//! shipped to the blocking worker pool through [`RemoteExecutor::run`],
//! which also applies exponential-backoff retry for transient errors.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use thema_core::config::RetryConfig;
use thema_core::{RemoteError, RemoteResult};
use tracing::warn;

use crate::api::AdsApi;

/// Backoff duration before retry number `attempt + 1` (attempt is 0-indexed).
pub fn backoff_delay(cfg: &RetryConfig, attempt: u32) -> Duration {
    let base_ms = cfg.initial_backoff_ms as f64 * cfg.backoff_multiplier.powi(attempt as i32);
    let capped_ms = base_ms.min(cfg.max_backoff_ms as f64);

    let final_ms = if cfg.jitter {
        // ±25% jitter to spread synchronized retries
        let spread = capped_ms * 0.25;
        let offset = rand::thread_rng().gen_range(-spread..=spread);
        (capped_ms + offset).max(0.0)
    } else {
        capped_ms
    };

    Duration::from_millis(final_ms as u64)
}

/// Shared handle to the remote API plus the retry policy applied to every
/// call made through it.
#[derive(Clone)]
pub struct RemoteExecutor {
    api: Arc<dyn AdsApi>,
    retry: RetryConfig,
}

impl RemoteExecutor {
    pub fn new(api: Arc<dyn AdsApi>, retry: RetryConfig) -> Self {
        Self { api, retry }
    }

    /// Execute `call` against the API on the blocking pool.
    ///
    /// Transient errors are retried with exponential backoff up to the
    /// configured attempt budget; the last error is surfaced once the budget
    /// is exhausted. Permanent errors propagate immediately. The return
    /// contract of `call` is untouched, so single and batched operations
    /// compose the same way.
    pub async fn run<T, F>(&self, op: &'static str, call: F) -> RemoteResult<T>
    where
        T: Send + 'static,
        F: Fn(&dyn AdsApi) -> RemoteResult<T> + Send + Sync + 'static,
    {
        let call = Arc::new(call);
        let budget = self.retry.max_attempts.max(1);
        let mut attempt: u32 = 0;

        loop {
            let api = Arc::clone(&self.api);
            let call = Arc::clone(&call);
            let outcome = tokio::task::spawn_blocking(move || call(api.as_ref()))
                .await
                .map_err(|e| RemoteError::Permanent(format!("remote worker failed: {e}")))?;

            match outcome {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt + 1 < budget => {
                    let delay = backoff_delay(&self.retry, attempt);
                    attempt += 1;
                    warn!(
                        op,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient remote error, retrying"
                    );
                    metrics::counter!("remote.retries", "op" => op).increment(1);
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    if e.is_retryable() {
                        warn!(op, attempts = attempt + 1, error = %e, "retry budget exhausted");
                    }
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryAdsApi;

    fn fast_retry(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_backoff_ms: 1,
            max_backoff_ms: 4,
            backoff_multiplier: 2.0,
            jitter: false,
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let cfg = RetryConfig {
            max_attempts: 5,
            initial_backoff_ms: 100,
            max_backoff_ms: 300,
            backoff_multiplier: 2.0,
            jitter: false,
        };
        assert_eq!(backoff_delay(&cfg, 0), Duration::from_millis(100));
        assert_eq!(backoff_delay(&cfg, 1), Duration::from_millis(200));
        assert_eq!(backoff_delay(&cfg, 2), Duration::from_millis(300));
        assert_eq!(backoff_delay(&cfg, 3), Duration::from_millis(300));
    }

    #[tokio::test]
    async fn test_transient_errors_retried_until_success() {
        let api = Arc::new(InMemoryAdsApi::new());
        api.inject_fault("list_labels", RemoteError::Transient("RATE_LIMIT".into()));
        api.inject_fault("list_labels", RemoteError::Transient("RATE_LIMIT".into()));

        let executor = RemoteExecutor::new(api.clone(), fast_retry(3));
        let labels = executor
            .run("list_labels", |api| api.list_labels("111"))
            .await
            .unwrap();

        assert!(labels.is_empty());
        assert_eq!(api.calls("list_labels"), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let api = Arc::new(InMemoryAdsApi::new());
        api.inject_fault("list_labels", RemoteError::Permanent("AUTH".into()));

        let executor = RemoteExecutor::new(api.clone(), fast_retry(3));
        let err = executor
            .run("list_labels", |api| api.list_labels("111"))
            .await
            .unwrap_err();

        assert!(!err.is_retryable());
        assert_eq!(api.calls("list_labels"), 1);
    }

    #[tokio::test]
    async fn test_budget_exhaustion_surfaces_last_error() {
        let api = Arc::new(InMemoryAdsApi::new());
        for _ in 0..5 {
            api.inject_fault("list_labels", RemoteError::Transient("TIMEOUT".into()));
        }

        let executor = RemoteExecutor::new(api.clone(), fast_retry(3));
        let err = executor
            .run("list_labels", |api| api.list_labels("111"))
            .await
            .unwrap_err();

        assert_eq!(err, RemoteError::Transient("TIMEOUT".into()));
        assert_eq!(api.calls("list_labels"), 3);
    }
}
