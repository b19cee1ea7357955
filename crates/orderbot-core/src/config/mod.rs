use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Root configuration for orderbot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub provider: ProviderConfig,
    pub gateway: GatewayConfig,
    pub storage: StorageConfig,
    pub checkout: CheckoutConfig,
}

impl Config {
    /// Resolved data directory (config value or `~/.orderbot`).
    pub fn data_dir(&self) -> PathBuf {
        match &self.storage.data_dir {
            Some(dir) => expand_home(dir),
            None => get_data_dir(),
        }
    }

    /// Path of the append-only orders file.
    pub fn orders_path(&self) -> PathBuf {
        self.data_dir().join(&self.storage.orders_file)
    }

    /// Path of the append-only conversation transcript.
    pub fn conversation_path(&self) -> PathBuf {
        self.data_dir().join(&self.storage.conversation_file)
    }

    /// Socket address the webhook server binds to.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.gateway.host, self.gateway.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderConfig {
    pub api_key: String,
    pub api_base: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: None,
            model: "deepseek-chat".to_string(),
            max_tokens: 1024,
            temperature: 0.7,
            timeout_secs: 30,
            max_retries: 0,
            retry_backoff_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    pub allow_from: Vec<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            allow_from: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StorageConfig {
    pub data_dir: Option<String>,
    pub orders_file: String,
    pub conversation_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            orders_file: "orders.csv".to_string(),
            conversation_file: "conversation_log.csv".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CheckoutConfig {
    /// Replaces the built-in sales assistant prompt when set.
    pub system_prompt: Option<String>,
    pub payment_prompt: String,
    pub apology_text: String,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            system_prompt: None,
            payment_prompt: crate::checkout::DEFAULT_PAYMENT_PROMPT.to_string(),
            apology_text: crate::checkout::DEFAULT_APOLOGY.to_string(),
        }
    }
}

fn expand_home(path: &str) -> PathBuf {
    if path.starts_with("~/") || path.starts_with("~\\") {
        if let Some(home) = dirs::home_dir() {
            return home.join(&path[2..]);
        }
    }
    PathBuf::from(path)
}

fn split_list(v: &str) -> Vec<String> {
    v.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Load config from the default file, then overlay environment variables.
pub fn load_config_from_env() -> Config {
    let path = std::env::var("ORDERBOT_CONFIG_PATH").ok().map(PathBuf::from);
    let mut cfg = load_config(path.as_deref());
    apply_env(&mut cfg, |key| std::env::var(key).ok());
    cfg
}

/// Overlay variables found through `var` onto `cfg`.
fn apply_env(cfg: &mut Config, var: impl Fn(&str) -> Option<String>) {
    // Provider
    if let Some(v) = var("OPENAI_API_KEY") {
        cfg.provider.api_key = v;
    }
    if let Some(v) = var("DEEPSEEK_API_KEY") {
        cfg.provider.api_key = v;
    }
    if let Some(v) = var("ORDERBOT_API_BASE") {
        cfg.provider.api_base = Some(v);
    }
    if let Some(v) = var("ORDERBOT_MODEL") {
        cfg.provider.model = v;
    }
    if let Some(v) = var("ORDERBOT_PROVIDER_TIMEOUT_SECS") {
        match v.parse() {
            Ok(secs) => cfg.provider.timeout_secs = secs,
            Err(_) => tracing::warn!("Ignoring invalid ORDERBOT_PROVIDER_TIMEOUT_SECS: {}", v),
        }
    }

    // Gateway
    if let Some(v) = var("ORDERBOT_HOST") {
        cfg.gateway.host = v;
    }
    if let Some(v) = var("PORT") {
        match v.parse() {
            Ok(port) => cfg.gateway.port = port,
            Err(_) => tracing::warn!("Ignoring invalid PORT: {}", v),
        }
    }
    if let Some(v) = var("ORDERBOT_ALLOW_FROM") {
        cfg.gateway.allow_from = split_list(&v);
    }

    // Storage
    if let Some(v) = var("ORDERBOT_DATA_DIR") {
        cfg.storage.data_dir = Some(v);
    }
}

/// Get the default configuration file path.
pub fn get_config_path() -> PathBuf {
    get_data_dir().join("config.json")
}

/// Get the orderbot data directory.
pub fn get_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".orderbot")
}

/// Load configuration from file or fall back to defaults.
pub fn load_config(config_path: Option<&Path>) -> Config {
    let path = config_path
        .map(|p| p.to_path_buf())
        .unwrap_or_else(get_config_path);

    if path.exists() {
        match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<Config>(&content) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!("Failed to parse config from {}: {}", path.display(), e);
                    tracing::warn!("Using default configuration.");
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read config from {}: {}", path.display(), e);
                tracing::warn!("Using default configuration.");
            }
        }
    }

    Config::default()
}

/// Save configuration to file.
pub fn save_config(config: &Config, config_path: Option<&Path>) -> std::result::Result<(), ConfigError> {
    let path = config_path
        .map(|p| p.to_path_buf())
        .unwrap_or_else(get_config_path);

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::Invalid(e.to_string()))?;
    }

    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(&path, json).map_err(|e| ConfigError::Invalid(e.to_string()))?;
    Ok(())
}
