use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use crate::error::ProviderError;
use crate::types::{Message, TokenUsage};
use crate::util::http;

use super::CompletionProvider;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// OpenAI-compatible provider.
/// Works with DeepSeek, OpenAI, OpenRouter, Groq and any OpenAI-compatible API.
pub struct OpenAiCompatProvider {
    api_key: String,
    api_base: String,
    model: String,
    max_tokens: u32,
    temperature: f64,
    timeout: Duration,
}

impl OpenAiCompatProvider {
    pub fn new(api_key: String, api_base: Option<String>, model: String) -> Self {
        let base = api_base.unwrap_or_else(|| {
            let m = model.to_lowercase();
            if m.contains("openrouter") {
                "https://openrouter.ai/api/v1".to_string()
            } else if m.starts_with("gpt") || m.contains("openai") {
                "https://api.openai.com/v1".to_string()
            } else {
                "https://api.deepseek.com/v1".to_string()
            }
        });

        Self {
            api_key,
            api_base: base.trim_end_matches('/').to_string(),
            model,
            max_tokens: 1024,
            temperature: 0.7,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_limits(mut self, max_tokens: u32, temperature: f64) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn request_body(&self, messages: &[Message]) -> serde_json::Value {
        json!({
            "model": self.model.strip_prefix("openrouter/").unwrap_or(&self.model),
            "messages": messages,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
        })
    }

    async fn send(&self, messages: &[Message]) -> Result<String, ProviderError> {
        let url = format!("{}/chat/completions", self.api_base);
        debug!("OpenAI-compat request to {} with model {}", url, self.model);

        let response = http::client()
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&self.request_body(messages))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message: text,
            });
        }

        let data: serde_json::Value = response.json().await?;
        let (content, usage) = parse_openai_response(&data)?;
        debug!(
            "Completion used {} prompt + {} completion tokens",
            usage.prompt_tokens, usage.completion_tokens
        );
        Ok(content)
    }
}

#[async_trait]
impl CompletionProvider for OpenAiCompatProvider {
    async fn complete(&self, system_prompt: &str, user_content: &str) -> Result<String, ProviderError> {
        let messages = [Message::system(system_prompt), Message::user(user_content)];
        // The client's own request timeout is longer, but map it the same way if it fires.
        match tokio::time::timeout(self.timeout, self.send(&messages)).await {
            Ok(Err(ProviderError::Http(e))) if e.is_timeout() => {
                Err(ProviderError::Timeout(self.timeout.as_secs()))
            }
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(self.timeout.as_secs())),
        }
    }

    fn name(&self) -> &str {
        "openai-compat"
    }
}

/// Extract assistant text and usage from an OpenAI-format response.
pub fn parse_openai_response(data: &serde_json::Value) -> Result<(String, TokenUsage), ProviderError> {
    let choice = data
        .get("choices")
        .and_then(|c| c.get(0))
        .ok_or_else(|| ProviderError::Parse("No choices in response".to_string()))?;

    let content = choice
        .get("message")
        .ok_or_else(|| ProviderError::Parse("No message in choice".to_string()))?
        .get("content")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ProviderError::Parse("No text content in message".to_string()))?
        .to_string();

    let usage = if let Some(u) = data.get("usage") {
        TokenUsage {
            prompt_tokens: u.get("prompt_tokens").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
            completion_tokens: u
                .get("completion_tokens")
                .and_then(|v| v.as_u64())
                .unwrap_or(0) as u32,
            total_tokens: u.get("total_tokens").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
        }
    } else {
        TokenUsage::default()
    };

    Ok((content, usage))
}
