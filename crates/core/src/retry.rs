//! Opt-in retry with exponential backoff.
//!
//! Not wired into the auto-save controller or the notification store; callers
//! that want retries wrap their own operation in [`with_backoff`].

use std::future::Future;
use std::time::Duration;

use log::debug;
use rand::Rng;

use crate::errors::Result;

const BASE_BACKOFF_MS: u64 = 250;
const MAX_BACKOFF_MS: u64 = 8_000;

/// Exponential backoff with cap and jitter for a 1-based attempt number.
pub fn backoff_delay(attempt: usize) -> Duration {
    let exp = (attempt.saturating_sub(1) as u32).min(8);
    let backoff = (BASE_BACKOFF_MS.saturating_mul(1_u64 << exp)).min(MAX_BACKOFF_MS);
    let jitter = rand::thread_rng().gen_range(0..=(backoff / 5).max(1));
    Duration::from_millis(backoff.saturating_add(jitter))
}

/// Run `op` up to `max_attempts` times, sleeping between recoverable failures.
///
/// Non-recoverable errors (permission, constraint) fail immediately.
pub async fn with_backoff<T, F, Fut>(max_attempts: usize, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0usize;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_recoverable() && attempt < max_attempts => {
                let delay = backoff_delay(attempt);
                debug!(
                    "retrying after {} (attempt {}/{}, delay {:?})",
                    err.code(),
                    attempt,
                    max_attempts,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ServiceError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn backoff_is_exponential_and_capped() {
        let first = backoff_delay(1).as_millis() as u64;
        assert!((BASE_BACKOFF_MS..=BASE_BACKOFF_MS + BASE_BACKOFF_MS / 5 + 1).contains(&first));
        let capped = backoff_delay(20).as_millis() as u64;
        assert!(capped <= MAX_BACKOFF_MS + MAX_BACKOFF_MS / 5 + 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_recoverable_errors_until_success() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let result = with_backoff(5, move || {
            let counter = Arc::clone(&counter);
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(ServiceError::Network("flaky".into()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_errors_fail_without_retry() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let result: Result<()> = with_backoff(5, move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(ServiceError::Constraint("duplicate key".into()))
            }
        })
        .await;

        assert!(matches!(result, Err(ServiceError::Constraint(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
