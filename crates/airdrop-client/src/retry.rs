//! Backoff for the read-only calls: the Guild snapshot fetch and the relay
//! allowance query.
//!
//! A call is repeated when the request probably never reached the server
//! (connect failure, timeout) or when the server explicitly asked the
//! client to come back later (429, 503). A `Retry-After` header in seconds
//! overrides the computed delay. Every other outcome, including builder and
//! body decode errors, is handed back after the first attempt.
//!
//! Transfer submissions must never go through here: a timeout after the
//! relay accepted the request would broadcast the batch twice.

use std::future::Future;
use std::time::Duration;

use reqwest::{Response, StatusCode};

#[derive(Debug, Clone, Copy)]
pub(crate) struct RetryPolicy {
    /// Attempts after the first one.
    pub max_retries: u32,
    /// First delay; doubles per attempt (200ms, 400ms, 800ms by default).
    pub base_delay: Duration,
    /// Upper bound for any single wait, `Retry-After` included.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.max_delay)
    }
}

fn is_transient(e: &reqwest::Error) -> bool {
    e.is_connect() || e.is_timeout()
}

/// Rate limiting and maintenance answers from the Guild API.
fn is_backoff_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::SERVICE_UNAVAILABLE
}

fn retry_after(resp: &Response) -> Option<Duration> {
    resp.headers()
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Send a read-only request, retrying per `policy`.
///
/// When retries run out the last result is returned as is, so a final 429
/// reaches the caller as a response rather than an error.
pub(crate) async fn retry_send<F, Fut>(
    policy: &RetryPolicy,
    endpoint: &str,
    f: F,
) -> Result<Response, reqwest::Error>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<Response, reqwest::Error>>,
{
    let mut attempt = 0;
    loop {
        let result = f().await;
        if attempt >= policy.max_retries {
            return result;
        }
        let delay = match &result {
            Err(e) if is_transient(e) => {
                let delay = policy.backoff(attempt);
                tracing::warn!(
                    endpoint,
                    attempt = attempt + 1,
                    max_retries = policy.max_retries,
                    ?delay,
                    error = %e,
                    "no response, retrying"
                );
                delay
            }
            Ok(resp) if is_backoff_status(resp.status()) => {
                let delay = retry_after(resp)
                    .unwrap_or_else(|| policy.backoff(attempt))
                    .min(policy.max_delay);
                tracing::warn!(
                    endpoint,
                    attempt = attempt + 1,
                    max_retries = policy.max_retries,
                    status = resp.status().as_u16(),
                    ?delay,
                    "server asked to back off, retrying"
                );
                delay
            }
            _ => return result,
        };
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
