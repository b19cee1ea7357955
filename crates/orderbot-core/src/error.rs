use std::path::PathBuf;

/// Core error types for orderbot.
#[derive(Debug, thiserror::Error)]
pub enum OrderbotError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Invalid config: {0}")]
    Invalid(String),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("No API key configured")]
    NoApiKey,
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    #[error("No API key configured for provider")]
    NoApiKey,

    #[error("{0}")]
    Other(String),
}

impl ProviderError {
    /// Whether a retry has any chance of succeeding.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Http(_) | ProviderError::Timeout(_) => true,
            ProviderError::Api { status, .. } => *status == 429 || *status >= 500,
            ProviderError::Parse(_) | ProviderError::NoApiKey | ProviderError::Other(_) => false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("Failed to write record: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Write task failed: {0}")]
    Task(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Inbound message has no sender")]
    MissingSender,
}

pub type Result<T> = std::result::Result<T, OrderbotError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(ProviderError::Timeout(30).is_transient());
        assert!(ProviderError::Api { status: 503, message: String::new() }.is_transient());
        assert!(ProviderError::Api { status: 429, message: String::new() }.is_transient());
        assert!(!ProviderError::Api { status: 401, message: String::new() }.is_transient());
        assert!(!ProviderError::Parse("no choices".into()).is_transient());
    }

    #[test]
    fn test_from_conversions() {
        let err: OrderbotError = ProviderError::Timeout(5).into();
        assert!(matches!(err, OrderbotError::Provider(ProviderError::Timeout(5))));

        let err: OrderbotError = ValidationError::MissingSender.into();
        assert_eq!(err.to_string(), "Validation error: Inbound message has no sender");
    }
}
