use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

use super::transport::{HttpReply, HttpRequest, HttpTransport};
use crate::error::{ProviderError, classify_http};

pub const RATE_LIMIT_MAX_RETRIES: usize = 3;
pub const RATE_LIMIT_BACKOFF_UNIT: Duration = Duration::from_secs(1);
pub const RATE_LIMIT_MAX_DELAY: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: usize,
    pub backoff_unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: RATE_LIMIT_MAX_RETRIES,
            backoff_unit: RATE_LIMIT_BACKOFF_UNIT,
        }
    }
}

impl RetryPolicy {
    // 2^attempt backoff units for the 1-based retry attempt.
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let factor = 1u32 << attempt.min(16) as u32;
        self.backoff_unit
            .saturating_mul(factor)
            .min(RATE_LIMIT_MAX_DELAY)
    }
}

pub async fn send_with_retry(
    transport: &dyn HttpTransport,
    request: &HttpRequest,
    policy: RetryPolicy,
) -> Result<HttpReply, ProviderError> {
    let mut attempt = 0usize;
    loop {
        let reply = transport.post_json(request).await?;
        if reply.is_success() {
            return Ok(reply);
        }
        if reply.status == 429 && attempt < policy.max_retries {
            attempt += 1;
            let mut wait = policy.delay_for(attempt);
            if let Some(retry_after) = reply.retry_after
                && retry_after > wait
            {
                wait = retry_after.min(RATE_LIMIT_MAX_DELAY);
            }
            warn!(
                "{} rate limited; retrying in {:.1}s (attempt {}/{})",
                request.provider,
                wait.as_secs_f32(),
                attempt,
                policy.max_retries
            );
            sleep(wait).await;
            continue;
        }
        return Err(classify_http(&request.provider, reply.status, &reply.body));
    }
}
