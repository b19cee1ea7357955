use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::error::ProviderError;

use super::CompletionProvider;

/// Bounded retry with exponential backoff around another provider.
/// Only transient failures (network, timeout, 429, 5xx) are retried.
pub struct RetryProvider {
    inner: Arc<dyn CompletionProvider>,
    max_retries: u32,
    backoff: Duration,
}

impl RetryProvider {
    pub fn new(inner: Arc<dyn CompletionProvider>, max_retries: u32, backoff: Duration) -> Self {
        Self {
            inner,
            max_retries,
            backoff,
        }
    }
}

#[async_trait]
impl CompletionProvider for RetryProvider {
    async fn complete(&self, system_prompt: &str, user_content: &str) -> Result<String, ProviderError> {
        let mut attempt = 0;
        loop {
            match self.inner.complete(system_prompt, user_content).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    let delay = self.backoff.saturating_mul(2u32.saturating_pow(attempt));
                    attempt += 1;
                    warn!(
                        "{} failed ({}), retry {}/{} in {:?}",
                        self.inner.name(),
                        e,
                        attempt,
                        self.max_retries,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn name(&self) -> &str {
        "retry"
    }
}
