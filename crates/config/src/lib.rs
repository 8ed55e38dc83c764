//! Configuration loading, validation, and management for webpilot.
//!
//! Loads configuration from `~/.webpilot/config.toml` with environment
//! variable overrides. Validates all settings at load time.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use webpilot_core::{Exponential, RetryPolicy};

/// The root configuration structure.
///
/// Maps directly to `~/.webpilot/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Loop budgets and memory limits
    #[serde(default)]
    pub agent: AgentConfig,

    /// Retry policies for unreliable I/O
    #[serde(default)]
    pub retry: RetryConfig,

    /// Browser connector
    #[serde(default)]
    pub web: WebConfig,

    /// Desktop connector
    #[serde(default)]
    pub desktop: DesktopConfig,

    /// Remote observer (authorization handshake)
    #[serde(default)]
    pub remote: RemoteConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,

    /// Wall-clock budget per task; unlimited when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_duration_secs: Option<u64>,

    /// Thoughts shown to the provider
    #[serde(default = "default_thought_limit")]
    pub thought_limit: usize,

    /// Lifecycle events buffered per subscriber
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_max_steps() -> u32 {
    50
}
fn default_thought_limit() -> usize {
    20
}
fn default_event_capacity() -> usize {
    256
}

impl AgentConfig {
    pub fn max_duration(&self) -> Option<Duration> {
        self.max_duration_secs.map(Duration::from_secs)
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            max_duration_secs: None,
            thought_limit: default_thought_limit(),
            event_capacity: default_event_capacity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Completion requests
    #[serde(default = "default_provider_retry")]
    pub provider: RetryPolicy,

    /// Automation driver calls inside action resolvers
    #[serde(default = "default_driver_retry")]
    pub driver: RetryPolicy,
}

fn default_provider_retry() -> RetryPolicy {
    RetryPolicy::new(3)
        .with_delay(Duration::from_secs(1))
        .with_max_delay(Duration::from_secs(30))
        .with_exponential(Exponential::Enabled(true))
}

fn default_driver_retry() -> RetryPolicy {
    RetryPolicy::new(2).with_delay(Duration::from_millis(250))
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            provider: default_provider_retry(),
            driver: default_driver_retry(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebConfig {
    /// Page opened when the browser connector starts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_url: Option<String>,

    /// Report screenshots at this width instead of the real one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub virtual_width: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub virtual_height: Option<u32>,
}

impl WebConfig {
    pub fn virtual_screen(&self) -> Option<(u32, u32)> {
        self.virtual_width.zip(self.virtual_height)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DesktopConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Screenshots always kept in the rendered history
    #[serde(default = "default_min_screenshots")]
    pub min_screenshots: usize,
}

fn default_min_screenshots() -> usize {
    2
}

impl Default for DesktopConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            min_screenshots: default_min_screenshots(),
        }
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Observer endpoint (`ws://` or `wss://`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("url", &self.url)
            .field("api_key", &redact(&self.api_key))
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.webpilot/config.toml).
    ///
    /// Environment variables override the file:
    /// - `WEBPILOT_API_KEY`: remote observer credential
    /// - `WEBPILOT_REMOTE_URL`: remote observer endpoint
    /// - `WEBPILOT_START_URL`: page opened by the browser connector
    /// - `WEBPILOT_MAX_STEPS`: step budget per task
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        Self::load_with_env(&config_path, |key| std::env::var(key).ok())
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::read(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`, then apply overrides looked up through `env`.
    pub fn load_with_env(
        path: &Path,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::read(path)?;
        config.apply_env(env)?;
        config.validate()?;
        Ok(config)
    }

    fn read(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(key) = env("WEBPILOT_API_KEY") {
            self.remote.api_key = Some(key);
        }
        if let Some(url) = env("WEBPILOT_REMOTE_URL") {
            self.remote.url = Some(url);
        }
        if let Some(url) = env("WEBPILOT_START_URL") {
            self.web.start_url = Some(url);
        }
        if let Some(steps) = env("WEBPILOT_MAX_STEPS") {
            self.agent.max_steps = steps.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!(
                    "WEBPILOT_MAX_STEPS must be a positive integer, got '{steps}'"
                ))
            })?;
        }
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".webpilot")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agent.max_steps == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_steps must be > 0".into(),
            ));
        }

        if self.agent.max_duration_secs == Some(0) {
            return Err(ConfigError::ValidationError(
                "agent.max_duration_secs must be > 0 when set".into(),
            ));
        }

        if self.agent.event_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "agent.event_capacity must be > 0".into(),
            ));
        }

        for (name, policy) in [("provider", &self.retry.provider), ("driver", &self.retry.driver)] {
            if policy.exponential.multiplier() <= 0.0 {
                return Err(ConfigError::ValidationError(format!(
                    "retry.{name}.exponential must be positive"
                )));
            }
        }

        if self.web.start_url.as_deref().is_some_and(|u| u.trim().is_empty()) {
            return Err(ConfigError::ValidationError(
                "web.start_url must not be empty".into(),
            ));
        }

        match (self.web.virtual_width, self.web.virtual_height) {
            (Some(0), _) | (_, Some(0)) => {
                return Err(ConfigError::ValidationError(
                    "web virtual screen dimensions must be > 0".into(),
                ));
            }
            (Some(_), None) | (None, Some(_)) => {
                return Err(ConfigError::ValidationError(
                    "web.virtual_width and web.virtual_height must be set together".into(),
                ));
            }
            _ => {}
        }

        if self.desktop.min_screenshots == 0 {
            return Err(ConfigError::ValidationError(
                "desktop.min_screenshots must be > 0".into(),
            ));
        }

        if let Some(url) = &self.remote.url {
            if !(url.starts_with("ws://") || url.starts_with("wss://")) {
                return Err(ConfigError::ValidationError(format!(
                    "remote.url must be a ws:// or wss:// URL, got '{url}'"
                )));
            }
        }

        Ok(())
    }

    /// Check if a remote credential is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.remote.api_key.is_some()
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
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

    fn write_config(content: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.toml"), content).unwrap();
        dir
    }

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.agent.max_steps, 50);
        assert_eq!(config.retry.provider.retries, 3);
        assert!(!config.desktop.enabled);
        assert_eq!(config.desktop.min_screenshots, 2);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.agent.max_steps, config.agent.max_steps);
        assert_eq!(parsed.retry.provider, config.retry.provider);
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.agent.thought_limit, 20);
    }

    #[test]
    fn sections_parse_from_file() {
        let dir = write_config(
            r#"
[agent]
max_steps = 12
max_duration_secs = 300

[retry.provider]
retries = 5
delay_ms = 10
exponential = 3.0

[retry.driver]
retries = 0

[web]
start_url = "https://shop.test"
virtual_width = 1024
virtual_height = 768

[desktop]
enabled = true
min_screenshots = 4
"#,
        );
        let config = AppConfig::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config.agent.max_steps, 12);
        assert_eq!(config.agent.max_duration(), Some(Duration::from_secs(300)));
        assert_eq!(config.retry.provider.retries, 5);
        assert_eq!(config.retry.provider.exponential, Exponential::Multiplier(3.0));
        assert!(config.retry.provider.throw_on_exhaustion);
        assert_eq!(config.retry.driver.retries, 0);
        assert_eq!(config.web.virtual_screen(), Some((1024, 768)));
        assert!(config.desktop.enabled);
        assert_eq!(config.desktop.min_screenshots, 4);
    }

    #[test]
    fn exponential_accepts_bool() {
        let dir = write_config("[retry.driver]\nexponential = true\n");
        let config = AppConfig::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config.retry.driver.exponential, Exponential::Enabled(true));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let dir = write_config("[agent\nmax_steps = ");
        let err = AppConfig::load_from(&dir.path().join("config.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn invalid_values_rejected() {
        let cases = [
            "[agent]\nmax_steps = 0\n",
            "[agent]\nevent_capacity = 0\n",
            "[web]\nvirtual_width = 800\n",
            "[web]\nstart_url = \"  \"\n",
            "[desktop]\nmin_screenshots = 0\n",
            "[remote]\nurl = \"https://observer.test\"\n",
        ];
        for case in cases {
            let dir = write_config(case);
            let err = AppConfig::load_from(&dir.path().join("config.toml")).unwrap_err();
            assert!(matches!(err, ConfigError::ValidationError(_)), "{case}");
        }
    }

    #[test]
    fn environment_overrides_file() {
        let dir = write_config("[web]\nstart_url = \"https://file.test\"\n");
        let env: HashMap<&str, &str> = HashMap::from([
            ("WEBPILOT_START_URL", "https://env.test"),
            ("WEBPILOT_MAX_STEPS", "7"),
            ("WEBPILOT_API_KEY", "wp-secret"),
            ("WEBPILOT_REMOTE_URL", "wss://observer.test/ws"),
        ]);
        let config = AppConfig::load_with_env(&dir.path().join("config.toml"), |key| {
            env.get(key).map(|v| v.to_string())
        })
        .unwrap();

        assert_eq!(config.web.start_url.as_deref(), Some("https://env.test"));
        assert_eq!(config.agent.max_steps, 7);
        assert!(config.has_api_key());
        assert_eq!(config.remote.url.as_deref(), Some("wss://observer.test/ws"));
    }

    #[test]
    fn bad_environment_value_rejected() {
        let err = AppConfig::load_with_env(Path::new("/nonexistent/config.toml"), |key| {
            (key == "WEBPILOT_MAX_STEPS").then(|| "many".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn credential_is_redacted_in_debug() {
        let config = AppConfig {
            remote: RemoteConfig {
                url: None,
                api_key: Some("wp-secret".into()),
            },
            ..AppConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("wp-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("[agent]"));
        assert!(toml_str.contains("max_steps = 50"));
    }
}
