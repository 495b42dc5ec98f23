// Retry with exponential backoff for transient API failures

use anyhow::Result;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

const BASE_DELAY_MS: u64 = 250;

/// Non-success HTTP status returned by a provider API
#[derive(Debug, Error)]
#[error("API request failed with status {status}: {body}")]
pub struct ApiStatusError {
    pub status: u16,
    pub body: String,
}

impl ApiStatusError {
    /// Rate limits and server errors are worth another attempt
    pub fn is_retryable(&self) -> bool {
        self.status == 429 || (500..600).contains(&self.status)
    }
}

fn is_retryable(err: &anyhow::Error) -> bool {
    if let Some(status) = err.downcast_ref::<ApiStatusError>() {
        return status.is_retryable();
    }
    err.chain().any(|cause| {
        cause
            .downcast_ref::<reqwest::Error>()
            .map_or(false, |e| e.is_connect() || e.is_timeout())
    })
}

/// Run `operation`, retrying retryable failures up to `max_retries` times
pub async fn with_retry<F, Fut, T>(max_retries: u32, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < max_retries && is_retryable(&e) => {
                let delay = Duration::from_millis(BASE_DELAY_MS * 2u64.pow(attempt));
                tracing::warn!(
                    attempt = attempt + 1,
                    max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Retrying provider request"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
