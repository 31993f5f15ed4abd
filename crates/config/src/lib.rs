//! Configuration loading, validation, and management for ScholaRAG.
//!
//! Loads configuration from `$SCHOLARAG_CONFIG` or
//! `~/.scholarag/config.toml`, then applies environment variable overrides.
//! Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.scholarag/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Anthropic API key. Usually supplied via `ANTHROPIC_API_KEY`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Generation model
    #[serde(default = "default_model")]
    pub model: String,

    /// Max tokens per generated answer
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature; unset leaves the backend default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Whole-request timeout for backend calls
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Generation backend settings
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Context retrieval configuration
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

fn default_model() -> String {
    "claude-3-5-sonnet-20241022".into()
}
fn default_max_tokens() -> u32 {
    2048
}
fn default_request_timeout_secs() -> u64 {
    300
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("provider", &self.provider)
            .field("gateway", &self.gateway)
            .field("retrieval", &self.retrieval)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Base URL of the Messages API (override for proxies and tests)
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

fn default_base_url() -> String {
    "https://api.anthropic.com".into()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,
}

fn default_port() -> u16 {
    3000
}
fn default_host() -> String {
    "127.0.0.1".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

/// Which retriever backs the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalBackend {
    /// No retrieval; answers are ungrounded
    None,
    /// Remote search service over HTTP
    Http,
    /// In-process keyword search over a local docs directory
    Static,
}

impl std::str::FromStr for RetrievalBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "http" => Ok(Self::Http),
            "static" => Ok(Self::Static),
            other => Err(ConfigError::ValidationError(format!(
                "unknown retrieval backend '{other}' (expected none, http or static)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_retrieval_backend")]
    pub backend: RetrievalBackend,

    /// Search endpoint for the `http` backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Documentation root for the `static` backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docs_dir: Option<PathBuf>,

    /// Passages requested per question
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Upper bound on one retrieval call; past it the answer is ungrounded
    #[serde(default = "default_retrieval_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_retrieval_backend() -> RetrievalBackend {
    RetrievalBackend::None
}
fn default_top_k() -> usize {
    5
}
fn default_retrieval_timeout_ms() -> u64 {
    3000
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            backend: default_retrieval_backend(),
            url: None,
            docs_dir: None,
            top_k: default_top_k(),
            timeout_ms: default_retrieval_timeout_ms(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path, then apply environment
    /// overrides.
    ///
    /// API key lookup order:
    /// - `api_key` in the config file
    /// - `ANTHROPIC_API_KEY`
    /// - `SCHOLARAG_API_KEY`
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(&Self::config_path(), |key| std::env::var(key).ok())
    }

    /// Parse `path`, apply overrides from `lookup`, then validate once.
    pub fn load_with<F>(path: &Path, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::read_file(path)?;
        config.apply_env_overrides(lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::read_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse the file without validating; a missing file yields defaults.
    fn read_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Ok(config)
    }

    /// Apply overrides from an environment lookup function.
    ///
    /// Takes a lookup closure so tests don't have to mutate the process
    /// environment.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if self.api_key.is_none() {
            self.api_key = non_empty("ANTHROPIC_API_KEY").or_else(|| non_empty("SCHOLARAG_API_KEY"));
        }
        if let Some(model) = non_empty("SCHOLARAG_MODEL") {
            self.model = model;
        }
        if let Some(host) = non_empty("SCHOLARAG_HOST") {
            self.gateway.host = host;
        }
        if let Some(port) = non_empty("SCHOLARAG_PORT") {
            self.gateway.port = port.parse().map_err(|_| {
                ConfigError::ValidationError(format!("SCHOLARAG_PORT is not a valid port: {port}"))
            })?;
        }
        if let Some(backend) = non_empty("SCHOLARAG_RETRIEVAL_BACKEND") {
            self.retrieval.backend = backend.parse()?;
        }
        if let Some(url) = non_empty("SCHOLARAG_RETRIEVAL_URL") {
            self.retrieval.url = Some(url);
            // A URL alone only turns retrieval on; it never replaces a chosen backend
            if self.retrieval.backend == RetrievalBackend::None {
                self.retrieval.backend = RetrievalBackend::Http;
            }
        }
        Ok(())
    }

    /// Path of the config file: `$SCHOLARAG_CONFIG` or the default location.
    pub fn config_path() -> PathBuf {
        std::env::var("SCHOLARAG_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| Self::config_dir().join("config.toml"))
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".scholarag")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "max_tokens must be greater than 0".into(),
            ));
        }

        if let Some(t) = self.temperature {
            if !(0.0..=1.0).contains(&t) {
                return Err(ConfigError::ValidationError(
                    "temperature must be between 0.0 and 1.0".into(),
                ));
            }
        }

        if self.retrieval.top_k == 0 {
            return Err(ConfigError::ValidationError(
                "retrieval.top_k must be at least 1".into(),
            ));
        }

        match self.retrieval.backend {
            RetrievalBackend::Http if self.retrieval.url.is_none() => {
                return Err(ConfigError::ValidationError(
                    "retrieval.backend = \"http\" requires retrieval.url".into(),
                ));
            }
            RetrievalBackend::Static if self.retrieval.docs_dir.is_none() => {
                return Err(ConfigError::ValidationError(
                    "retrieval.backend = \"static\" requires retrieval.docs_dir".into(),
                ));
            }
            _ => {}
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }

    /// Socket address the gateway binds to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.gateway.host, self.gateway.port)
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: None,
            request_timeout_secs: default_request_timeout_secs(),
            provider: ProviderConfig::default(),
            gateway: GatewayConfig::default(),
            retrieval: RetrievalConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.model, "claude-3-5-sonnet-20241022");
        assert_eq!(config.max_tokens, 2048);
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.retrieval.backend, RetrievalBackend::None);
        assert!(!config.has_api_key());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.model, config.model);
        assert_eq!(parsed.gateway.port, config.gateway.port);
    }

    #[test]
    fn debug_output_redacts_api_key() {
        let config = AppConfig {
            api_key: Some("sk-ant-secret".into()),
            ..AppConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("sk-ant-secret"));
    }

    #[test]
    fn invalid_temperature_rejected() {
        let config = AppConfig {
            temperature: Some(1.5),
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn http_backend_requires_url() {
        let mut config = AppConfig::default();
        config.retrieval.backend = RetrievalBackend::Http;
        assert!(config.validate().is_err());

        config.retrieval.url = Some("http://localhost:8000/search".into());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn static_backend_requires_docs_dir() {
        let mut config = AppConfig::default();
        config.retrieval.backend = RetrievalBackend::Static;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        let config = result.unwrap();
        assert_eq!(config.model, "claude-3-5-sonnet-20241022");
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
max_tokens = 1024

[gateway]
port = 8081

[retrieval]
backend = "http"
url = "http://localhost:8000/search"
top_k = 3
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.max_tokens, 1024);
        assert_eq!(config.gateway.port, 8081);
        assert_eq!(config.retrieval.backend, RetrievalBackend::Http);
        assert_eq!(config.retrieval.top_k, 3);
    }

    #[test]
    fn invalid_file_reports_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "max_tokens = \"lots\"").unwrap();

        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn env_supplies_api_key() {
        let mut config = AppConfig::default();
        config
            .apply_env_overrides(env(&[("ANTHROPIC_API_KEY", "sk-ant-123")]))
            .unwrap();
        assert_eq!(config.api_key.as_deref(), Some("sk-ant-123"));
        assert!(config.has_api_key());
    }

    #[test]
    fn blank_env_key_is_ignored() {
        let mut config = AppConfig::default();
        config
            .apply_env_overrides(env(&[("ANTHROPIC_API_KEY", "   ")]))
            .unwrap();
        assert!(config.api_key.is_none());
    }

    #[test]
    fn file_key_wins_over_env() {
        let mut config = AppConfig {
            api_key: Some("from-file".into()),
            ..AppConfig::default()
        };
        config
            .apply_env_overrides(env(&[("ANTHROPIC_API_KEY", "from-env")]))
            .unwrap();
        assert_eq!(config.api_key.as_deref(), Some("from-file"));
    }

    #[test]
    fn retrieval_url_env_enables_http_backend() {
        let mut config = AppConfig::default();
        config
            .apply_env_overrides(env(&[("SCHOLARAG_RETRIEVAL_URL", "http://rag:8000/search")]))
            .unwrap();
        assert_eq!(config.retrieval.backend, RetrievalBackend::Http);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn retrieval_url_env_completes_file_http_backend() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[retrieval]\nbackend = \"http\"\n").unwrap();

        assert!(AppConfig::load_from(&path).is_err());

        let config = AppConfig::load_with(
            &path,
            env(&[("SCHOLARAG_RETRIEVAL_URL", "http://rag:8000/search")]),
        )
        .unwrap();
        assert_eq!(config.retrieval.backend, RetrievalBackend::Http);
        assert_eq!(config.retrieval.url.as_deref(), Some("http://rag:8000/search"));
    }

    #[test]
    fn retrieval_url_env_keeps_file_static_backend() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[retrieval]\nbackend = \"static\"\ndocs_dir = \"docs\"\n").unwrap();

        let config = AppConfig::load_with(
            &path,
            env(&[("SCHOLARAG_RETRIEVAL_URL", "http://rag:8000/search")]),
        )
        .unwrap();
        assert_eq!(config.retrieval.backend, RetrievalBackend::Static);
    }

    #[test]
    fn retrieval_backend_env_wins_over_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[retrieval]\nbackend = \"static\"\ndocs_dir = \"docs\"\n").unwrap();

        let config = AppConfig::load_with(
            &path,
            env(&[
                ("SCHOLARAG_RETRIEVAL_BACKEND", "http"),
                ("SCHOLARAG_RETRIEVAL_URL", "http://rag:8000/search"),
            ]),
        )
        .unwrap();
        assert_eq!(config.retrieval.backend, RetrievalBackend::Http);
    }

    #[test]
    fn load_with_validates_after_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.toml");
        let result = AppConfig::load_with(&path, env(&[("SCHOLARAG_RETRIEVAL_BACKEND", "static")]));
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn bad_port_env_rejected() {
        let mut config = AppConfig::default();
        let result = config.apply_env_overrides(env(&[("SCHOLARAG_PORT", "eighty")]));
        assert!(result.is_err());
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("claude-3-5-sonnet-20241022"));
        assert!(toml_str.contains("3000"));
        assert!(!toml_str.contains("api_key"));
    }
}
