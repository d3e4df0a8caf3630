//! Configuration loading, validation, and management for parrot.
//!
//! Loads configuration from `~/.parrot/config.toml` with environment
//! variable overrides. Everything is validated before the first request.

mod registry;

pub use registry::{ModelEntry, ModelRegistry, ProviderEntry, ProviderIndex, ResolvedModel, resolve_api_key};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.parrot/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Verbose logging and detailed error reports
    #[serde(default)]
    pub debug: bool,

    /// Stop a turn after this many model calls. Unset means no limit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<u32>,

    /// Tool failures in a row that end a turn
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,

    /// Wall-clock limit for one shell command
    #[serde(default = "default_shell_timeout_secs")]
    pub shell_timeout_secs: u64,

    /// Sampling defaults, overridden per model
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    /// Where JSONL session logs go. Defaults to `~/.parrot/sessions`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_dir: Option<PathBuf>,

    /// Currently selected model
    #[serde(default)]
    pub model: SelectedModel,

    /// Backends and the models they serve
    #[serde(default = "default_providers")]
    pub providers: Vec<ProviderConfig>,
}

fn default_max_consecutive_failures() -> u32 {
    3
}
fn default_shell_timeout_secs() -> u64 {
    120
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    8192
}

fn default_providers() -> Vec<ProviderConfig> {
    vec![
        ProviderConfig {
            id: "openrouter".into(),
            name: "OpenRouter".into(),
            base_url: "https://openrouter.ai/api/v1".into(),
            api_key: Some("env:OPENROUTER_API_KEY".into()),
            models: vec![
                ModelConfig::new("anthropic/claude-sonnet-4", "Claude Sonnet 4"),
                ModelConfig::new("moonshotai/kimi-k2", "Kimi K2"),
                ModelConfig::new("google/gemini-2.5-pro", "Gemini 2.5 Pro"),
            ],
        },
        ProviderConfig {
            id: "openai".into(),
            name: "OpenAI".into(),
            base_url: "https://api.openai.com/v1".into(),
            api_key: Some("env:OPENAI_API_KEY".into()),
            models: vec![
                ModelConfig::new("gpt-4.1", "GPT-4.1"),
                ModelConfig::new("gpt-4o", "GPT-4o"),
            ],
        },
    ]
}

/// The `provider:model` pair in use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedModel {
    pub provider: String,
    pub model: String,
}

impl Default for SelectedModel {
    fn default() -> Self {
        Self {
            provider: "openrouter".into(),
            model: "anthropic/claude-sonnet-4".into(),
        }
    }
}

impl SelectedModel {
    /// Parse `provider:model`. The model part may itself contain `:` or `/`.
    pub fn parse(spec: &str) -> Result<Self, ConfigError> {
        match spec.trim().split_once(':') {
            Some((provider, model)) if !provider.is_empty() && !model.is_empty() => Ok(Self {
                provider: provider.to_string(),
                model: model.to_string(),
            }),
            _ => Err(ConfigError::InvalidModelSpec(spec.to_string())),
        }
    }
}

impl std::fmt::Display for SelectedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.provider, self.model)
    }
}

/// One OpenAI-compatible backend.
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub id: String,
    pub name: String,
    pub base_url: String,

    /// A literal key, or `env:VAR_NAME`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default)]
    pub models: Vec<ModelConfig>,
}

/// Redact a secret for Debug output, keeping `env:` references readable.
fn redact(s: &Option<String>) -> String {
    match s {
        Some(key) if key.starts_with("env:") => key.clone(),
        Some(_) => "[REDACTED]".into(),
        None => "None".into(),
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("api_key", &redact(&self.api_key))
            .field("models", &self.models)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub id: String,
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
}

impl ModelConfig {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            max_tokens: None,
            temperature: None,
            top_p: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.parrot/config.toml).
    ///
    /// Environment overrides:
    /// - `PARROT_MODEL` selects the model as `provider:model`
    /// - `PARROT_API_KEY` is used by providers that resolve no key of their own
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from(&Self::config_path())?;

        if let Ok(spec) = std::env::var("PARROT_MODEL") {
            config.model = SelectedModel::parse(&spec)?;
        }

        Ok(config)
    }

    /// Read `path`, falling back to defaults when it does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
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

        config.validate()?;
        Ok(config)
    }

    /// Write the configuration to the default path.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let write_error = |reason: String| ConfigError::WriteError {
            path: path.to_path_buf(),
            reason,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| write_error(e.to_string()))?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| write_error(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| write_error(e.to_string()))?;
        tracing::debug!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    /// `~/.parrot`.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".parrot")
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Directory for session logs.
    pub fn session_dir(&self) -> PathBuf {
        self.session_dir
            .clone()
            .unwrap_or_else(|| Self::config_dir().join("sessions"))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_temperature("temperature", self.temperature)?;
        check_top_p("top_p", self.top_p)?;

        if self.max_consecutive_failures == 0 {
            return Err(ConfigError::ValidationError(
                "max_consecutive_failures must be at least 1".into(),
            ));
        }

        if self.max_iterations == Some(0) {
            return Err(ConfigError::ValidationError(
                "max_iterations must be at least 1 when set".into(),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for provider in &self.providers {
            if !seen.insert(provider.id.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate provider id '{}'",
                    provider.id
                )));
            }
            for model in &provider.models {
                let label = format!("{}:{}", provider.id, model.id);
                if let Some(t) = model.temperature {
                    check_temperature(&format!("temperature for {label}"), t)?;
                }
                check_top_p(&format!("top_p for {label}"), model.top_p)?;
            }
        }

        Ok(())
    }

    /// Build the provider/model lookup from this configuration.
    pub fn registry(&self) -> ModelRegistry {
        ModelRegistry::from_config(self, |var| std::env::var(var).ok())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

fn check_temperature(field: &str, value: f32) -> Result<(), ConfigError> {
    if !(0.0..=2.0).contains(&value) {
        return Err(ConfigError::ValidationError(format!(
            "{field} must be between 0.0 and 2.0"
        )));
    }
    Ok(())
}

fn check_top_p(field: &str, value: Option<f32>) -> Result<(), ConfigError> {
    if let Some(p) = value
        && !(0.0..=1.0).contains(&p)
    {
        return Err(ConfigError::ValidationError(format!(
            "{field} must be between 0.0 and 1.0"
        )));
    }
    Ok(())
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            debug: false,
            max_iterations: None,
            max_consecutive_failures: default_max_consecutive_failures(),
            shell_timeout_secs: default_shell_timeout_secs(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            top_p: None,
            session_dir: None,
            model: SelectedModel::default(),
            providers: default_providers(),
        }
    }
}

/// `$HOME`, or a platform fallback.
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

    #[error("Failed to write config file at {path}: {reason}")]
    WriteError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error("Invalid model '{0}'. Use provider:model (e.g., openrouter:anthropic/claude-sonnet-4)")]
    InvalidModelSpec(String),

    #[error("Provider '{0}' is not configured")]
    UnknownProvider(String),

    #[error("Model '{model}' not found for provider '{provider}'")]
    UnknownModel { provider: String, model: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.model.provider, "openrouter");
        assert_eq!(config.max_consecutive_failures, 3);
        assert_eq!(config.shell_timeout_secs, 120);
        assert!(config.max_iterations.is_none());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.model, config.model);
        assert_eq!(parsed.providers.len(), config.providers.len());
    }

    #[test]
    fn invalid_temperature_rejected() {
        let config = AppConfig {
            temperature: 5.0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_failure_budget_rejected() {
        let config = AppConfig {
            max_consecutive_failures: 0,
            ..AppConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn duplicate_provider_rejected() {
        let mut config = AppConfig::default();
        let copy = config.providers[0].clone();
        config.providers.push(copy);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate provider id"));
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.model, SelectedModel::default());
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "max_iterations = \"lots\"").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
max_iterations = 25

[model]
provider = "openai"
model = "gpt-4o"
"#,
        )
        .unwrap();
        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.max_iterations, Some(25));
        assert_eq!(config.model.to_string(), "openai:gpt-4o");
        assert_eq!(config.providers.len(), 2);
    }

    #[test]
    fn save_then_load() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("config.toml");
        let mut config = AppConfig::default();
        config.model = SelectedModel::parse("openai:gpt-4.1").unwrap();
        config.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.model.model, "gpt-4.1");
    }

    #[test]
    fn model_spec_parsing() {
        let spec = SelectedModel::parse("openrouter:moonshotai/kimi-k2").unwrap();
        assert_eq!(spec.provider, "openrouter");
        assert_eq!(spec.model, "moonshotai/kimi-k2");

        let spec = SelectedModel::parse("bedrock:anthropic.claude-3-haiku-20240307-v1:0").unwrap();
        assert_eq!(spec.model, "anthropic.claude-3-haiku-20240307-v1:0");

        assert!(SelectedModel::parse("no-colon").is_err());
        assert!(SelectedModel::parse(":model").is_err());
    }

    #[test]
    fn debug_output_redacts_literal_keys() {
        let mut provider = AppConfig::default().providers.remove(0);
        provider.api_key = Some("sk-secret".into());
        let debug = format!("{provider:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
