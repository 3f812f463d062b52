//! Exponential backoff for idempotent reads. Order submission never goes
//! through this helper — orders are at-most-once.

use crate::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

const BACKOFF: [Duration; 3] = [
    Duration::from_secs(1),
    Duration::from_secs(2),
    Duration::from_secs(4),
];

/// Retry `op` up to `BACKOFF.len()` extra times on retryable errors.
pub async fn retry_read<T, F, Fut>(label: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if e.is_retryable() && attempt < BACKOFF.len() => {
                let delay = BACKOFF[attempt];
                warn!(label, attempt, delay_ms = delay.as_millis() as u64, error = %e, "retrying after transient error");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

pub fn classify_status(status: reqwest::StatusCode, body: &str) -> Error {
    if status.as_u16() == 429 || status.is_server_error() {
        Error::Transient(format!("{} status from venue: {}", status, truncate(body)))
    } else {
        Error::Protocol(format!("{} status from venue: {}", status, truncate(body)))
    }
}

fn truncate(s: &str) -> String {
    if s.len() > 200 {
        format!("{}...", &s[..200])
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_retries_until_success() {
        let calls = AtomicU32::new(0);
        let result = retry_read("test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(Error::Transient("boom".to_string()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_fails_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<i32> = retry_read("test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(Error::Protocol("nope".to_string())) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
