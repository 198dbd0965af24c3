//! Activity execution: deadlines, bounded retry, error classification.
//!
//! Orchestrator code never performs I/O directly; every side effect runs as
//! an activity under a [`RetryPolicy`]. Transient failures are retried with
//! exponential backoff up to the attempt limit; permanent failures are not.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ActivityError {
    /// Worth retrying: connection loss, lock contention, deadline breach.
    #[error("transient: {0}")]
    Transient(String),

    /// Retrying cannot help: constraint violation, malformed input.
    #[error("permanent: {0}")]
    Permanent(String),
}

impl From<eventcast_store::StoreError> for ActivityError {
    fn from(err: eventcast_store::StoreError) -> Self {
        if err.is_transient() {
            ActivityError::Transient(err.to_string())
        } else {
            ActivityError::Permanent(err.to_string())
        }
    }
}

impl From<eventcast_delivery::DeliveryError> for ActivityError {
    fn from(err: eventcast_delivery::DeliveryError) -> Self {
        match err {
            eventcast_delivery::DeliveryError::Store(err) => err.into(),
            other => ActivityError::Permanent(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub start_to_close: Duration,
    pub max_attempts: u32,
    pub base_backoff: Duration,
}

/// Delivery fan-out: slow backends, generous deadline.
pub const DELIVERY_POLICY: RetryPolicy = RetryPolicy {
    start_to_close: Duration::from_secs(120),
    max_attempts: 3,
    base_backoff: Duration::from_secs(1),
};

/// Schedule CRUD against local storage.
pub const SCHEDULE_POLICY: RetryPolicy = RetryPolicy {
    start_to_close: Duration::from_secs(60),
    max_attempts: 3,
    base_backoff: Duration::from_secs(1),
};

/// Existence checks and other single reads.
pub const VALIDATION_POLICY: RetryPolicy = RetryPolicy {
    start_to_close: Duration::from_secs(30),
    max_attempts: 3,
    base_backoff: Duration::from_millis(500),
};

/// Run `op` under `policy`. Each attempt gets the full `start_to_close`
/// deadline; a breach counts as a transient failure.
pub async fn run_activity<T, F, Fut>(
    name: &str,
    policy: RetryPolicy,
    mut op: F,
) -> Result<T, ActivityError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ActivityError>>,
{
    let mut attempt = 1u32;
    loop {
        let outcome = match tokio::time::timeout(policy.start_to_close, op()).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ActivityError::Transient(format!(
                "deadline of {:?} exceeded",
                policy.start_to_close
            ))),
        };

        match outcome {
            Ok(value) => return Ok(value),
            Err(err @ ActivityError::Permanent(_)) => {
                tracing::error!(activity = name, err = %err, "activity failed permanently");
                return Err(err);
            }
            Err(err) if attempt >= policy.max_attempts => {
                tracing::error!(
                    activity = name,
                    attempts = attempt,
                    err = %err,
                    "activity retries exhausted"
                );
                return Err(err);
            }
            Err(err) => {
                let backoff = policy.base_backoff * 2u32.saturating_pow(attempt - 1);
                tracing::warn!(
                    activity = name,
                    attempt,
                    err = %err,
                    backoff_ms = backoff.as_millis() as u64,
                    "activity attempt failed, retrying"
                );
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            start_to_close: Duration::from_millis(200),
            max_attempts: 3,
            base_backoff: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn transient_errors_are_retried_until_success() {
        let calls = AtomicU32::new(0);
        let result = run_activity("t", fast_policy(), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(ActivityError::Transient("flaky".into()))
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = run_activity("p", fast_policy(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ActivityError::Permanent("broken".into())) }
        })
        .await;
        assert!(matches!(result, Err(ActivityError::Permanent(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn deadline_breach_counts_as_transient_and_exhausts() {
        let policy = RetryPolicy {
            start_to_close: Duration::from_millis(10),
            max_attempts: 2,
            base_backoff: Duration::from_millis(1),
        };
        let result: Result<(), _> = run_activity("slow", policy, || async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(ActivityError::Transient(_))));
    }
}
