pub mod openai_compat;
pub mod retry;

use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;

use crate::config::ProviderConfig;
use crate::error::{ConfigError, ProviderError};

/// Trait for the external text-generation service.
///
/// One call takes a system prompt plus a single user turn and returns the
/// assistant's text. Implementations must bound their own latency.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Generate assistant text for `user_content` under `system_prompt`.
    async fn complete(&self, system_prompt: &str, user_content: &str) -> Result<String, ProviderError>;

    /// Short provider name for logs.
    fn name(&self) -> &str;
}

/// Build the configured provider, wrapped in retries when `max_retries > 0`.
pub fn create_provider(config: &ProviderConfig) -> Result<Arc<dyn CompletionProvider>, ConfigError> {
    if config.api_key.is_empty() {
        return Err(ConfigError::NoApiKey);
    }
    if config.timeout_secs == 0 {
        return Err(ConfigError::Invalid("provider timeoutSecs must be greater than zero".to_string()));
    }

    let base = openai_compat::OpenAiCompatProvider::new(
        config.api_key.clone(),
        config.api_base.clone(),
        config.model.clone(),
    )
    .with_limits(config.max_tokens, config.temperature)
    .with_timeout(Duration::from_secs(config.timeout_secs));

    if config.max_retries == 0 {
        return Ok(Arc::new(base));
    }

    Ok(Arc::new(retry::RetryProvider::new(
        Arc::new(base),
        config.max_retries,
        Duration::from_millis(config.retry_backoff_ms),
    )))
}
