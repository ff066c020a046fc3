//! Retry loop shared by every upstream request.
//!
//! An operation is attempted up to [`RetryPolicy::attempts`] times. Transient
//! failures sleep `backoff_base * 2^attempt` before the next try; permanent
//! failures stop immediately.

use std::future::Future;

use hnsift_shared::RetryPolicy;
use reqwest::StatusCode;
use tracing::{debug, warn};

/// How a single attempt failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptError {
    /// Worth another try: timeouts, 5xx, 408/429, dropped connections.
    Transient(String),
    /// Retrying cannot help: other 4xx statuses, unusable bodies.
    Permanent(String),
}

impl AttemptError {
    /// Classify a non-success HTTP status.
    pub fn from_status(status: StatusCode) -> Self {
        let msg = format!("HTTP {status}");
        if status.is_server_error()
            || status == StatusCode::REQUEST_TIMEOUT
            || status == StatusCode::TOO_MANY_REQUESTS
        {
            Self::Transient(msg)
        } else {
            Self::Permanent(msg)
        }
    }

    /// Classify a transport-level error.
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_builder() || err.is_redirect() {
            Self::Permanent(err.to_string())
        } else if err.is_timeout() {
            Self::Transient(format!("timeout: {err}"))
        } else {
            Self::Transient(err.to_string())
        }
    }
}

/// Why a retried operation produced no value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RetryFailure {
    #[error("gave up after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: String },

    #[error("not retryable: {0}")]
    Rejected(String),
}

/// Run `op` under `policy`. `op` receives the 0-based attempt number.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut op: F,
) -> Result<T, RetryFailure>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, AttemptError>>,
{
    let attempts = policy.attempts();
    let mut last_error = String::new();

    for attempt in 0..attempts {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(AttemptError::Permanent(reason)) => {
                debug!(what = label, error = %reason, "request rejected, not retrying");
                return Err(RetryFailure::Rejected(reason));
            }
            Err(AttemptError::Transient(reason)) => {
                warn!(
                    what = label,
                    attempt = attempt + 1,
                    attempts,
                    error = %reason,
                    "request failed"
                );
                last_error = reason;
            }
        }

        if attempt + 1 < attempts {
            tokio::time::sleep(policy.delay_for(attempt)).await;
        }
    }

    warn!(what = label, attempts, "retries exhausted");
    Err(RetryFailure::Exhausted {
        attempts,
        last_error,
    })
}
