//! Bounded-retry wrapper for external capability calls.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use weft_core::config::RetryConfig;
use weft_core::error::{Result, WeftError};

fn calculate_backoff(attempt: u32, config: &RetryConfig) -> Duration {
    let ms = (config.initial_backoff_ms * 2u64.pow(attempt)).min(config.max_backoff_ms);
    // Add jitter: 0.8x to 1.2x
    let jitter = 0.8 + rand::random::<f64>() * 0.4;
    Duration::from_millis((ms as f64 * jitter) as u64)
}

/// Run `op` with a per-attempt timeout, retrying transient failures with
/// exponential backoff. Non-transient errors return immediately.
pub async fn with_retry<T, F, Fut>(label: &str, config: &RetryConfig, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_err = None;
    for attempt in 0..=config.max_retries {
        let attempt_result =
            tokio::time::timeout(Duration::from_millis(config.call_timeout_ms), op()).await;

        let err = match attempt_result {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => {
                if !e.is_transient() {
                    return Err(e);
                }
                e
            }
            Err(_) => WeftError::InvocationTimeout {
                timeout_ms: config.call_timeout_ms,
            },
        };

        if attempt < config.max_retries {
            let backoff = calculate_backoff(attempt, config);
            warn!(
                label,
                attempt = attempt + 1,
                max_retries = config.max_retries,
                backoff_ms = backoff.as_millis() as u64,
                error = %err,
                "Retrying external call"
            );
            tokio::time::sleep(backoff).await;
        }
        last_err = Some(err);
    }

    Err(last_err.unwrap_or_else(|| WeftError::Invocation(format!("{label}: all attempts failed"))))
}
