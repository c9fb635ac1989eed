//! Timeout, cancellation and bounded retry around outbound calls.
//!
//! Every attempt races the network call against a timer. When the timer
//! wins, the in-flight future is dropped (which cancels the request) and the
//! attempt counts as a timeout. Only transport-level failures of a transient
//! class are retried; HTTP responses of any status are handed back to the
//! caller untouched.

use reqwest::{Client, RequestBuilder, Response};
use std::future::Future;
use std::io::ErrorKind;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{EdgeplaneError, Result, TransientKind, TransportError};

/// Default per-attempt timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Fixed delay between retries in milliseconds.
pub const RETRY_DELAY_MS: u64 = 500;

/// Timeout and retry budget for an outbound call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Budget for a single attempt.
    pub timeout: Duration,
    /// Retries allowed after the first attempt.
    pub max_retries: u32,
    /// Fixed pause between attempts.
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: Duration::from_millis(RETRY_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with the default retry delay.
    #[must_use]
    pub const fn new(timeout_ms: u64, max_retries: u32) -> Self {
        Self {
            timeout: Duration::from_millis(timeout_ms),
            max_retries,
            retry_delay: Duration::from_millis(RETRY_DELAY_MS),
        }
    }

    /// Sets the delay between attempts.
    #[must_use]
    pub const fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }
}

/// Runs `attempt` until it succeeds, fails non-transiently, or the retry
/// budget is spent. The last error is returned unchanged.
///
/// # Errors
///
/// Returns [`TransportError::Timeout`] when the final attempt ran out of
/// time, or whatever error the final attempt produced.
pub async fn retry_transient<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut attempt: F,
) -> std::result::Result<T, TransportError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, TransportError>>,
{
    let mut retries = 0;

    loop {
        let outcome = match tokio::time::timeout(policy.timeout, attempt()).await {
            Ok(outcome) => outcome,
            Err(_) => Err(TransportError::Timeout {
                operation: operation.to_string(),
                timeout_ms: u64::try_from(policy.timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        };

        match outcome {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && retries < policy.max_retries => {
                retries += 1;
                warn!(
                    "{operation}: attempt {retries} failed ({err}), retrying in {}ms",
                    policy.retry_delay.as_millis()
                );
                tokio::time::sleep(policy.retry_delay).await;
            }
            Err(err) => {
                debug!("{operation}: giving up after {} attempt(s)", retries + 1);
                return Err(err);
            }
        }
    }
}

/// Classifies a reqwest failure into a typed transport error.
#[must_use]
pub fn classify(operation: &str, err: &reqwest::Error) -> TransportError {
    let kind = match io_error_kind(err) {
        Some(ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted | ErrorKind::BrokenPipe) => {
            Some(TransientKind::ConnectionReset)
        }
        Some(ErrorKind::TimedOut) => Some(TransientKind::ConnectTimeout),
        Some(ErrorKind::ConnectionRefused) => None,
        _ if err.is_connect() && err.is_timeout() => Some(TransientKind::ConnectTimeout),
        _ if err.is_connect() => Some(TransientKind::DnsResolution),
        _ => None,
    };

    match kind {
        Some(kind) => TransportError::Transient {
            operation: operation.to_string(),
            kind,
            message: err.to_string(),
        },
        None => TransportError::Request {
            operation: operation.to_string(),
            message: err.to_string(),
        },
    }
}

/// Finds the first IO error in the source chain.
fn io_error_kind(err: &reqwest::Error) -> Option<ErrorKind> {
    let mut source = std::error::Error::source(err);
    while let Some(inner) = source {
        if let Some(io) = inner.downcast_ref::<std::io::Error>() {
            return Some(io.kind());
        }
        source = inner.source();
    }
    None
}

/// HTTP client that applies a [`RetryPolicy`] to every request.
#[derive(Debug, Clone)]
pub struct ResilientClient {
    /// HTTP client.
    client: Client,
    /// Timeout and retry budget.
    policy: RetryPolicy,
}

impl ResilientClient {
    /// Creates a new resilient client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(policy: RetryPolicy) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| EdgeplaneError::internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client, policy })
    }

    /// Returns the retry policy.
    #[must_use]
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Sends a request built by `build`, rebuilding it for every attempt.
    ///
    /// Non-2xx responses are returned as `Ok`; only transport failures are
    /// errors.
    ///
    /// # Errors
    ///
    /// Returns the last transport error once retries are exhausted.
    pub async fn send<F>(&self, operation: &str, build: F) -> std::result::Result<Response, TransportError>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        retry_transient(&self.policy, operation, || {
            let request = build(&self.client);
            async move { request.send().await.map_err(|e| classify(operation, &e)) }
        })
        .await
    }
}
