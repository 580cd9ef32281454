//! Configuration management for RevBot
//!
//! TOML-based configuration with defaults, validation and environment
//! overrides. Location: ~/.revbot/config.toml

use crate::agent::{AgentConfig, DEFAULT_SYSTEM_PROMPT};
use crate::bridge::BridgeConfig;
use crate::errors::{AgentError, Result};
use crate::logging::LogFormat;
use crate::types::MAX_EXECUTION_TIMEOUT;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Complete configuration for RevBot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub anthropic: AnthropicConfig,
    pub host: HostConfig,
    pub agent: AgentSettings,
    pub logging: LoggingConfig,
}

/// Completion API connection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnthropicConfig {
    pub model: String,
    pub max_tokens: u32,
    pub base_url: String,
    pub request_timeout_sec: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

/// Automation host connection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub cli_program: String,
    pub socket_host: String,
    /// No port means process transport only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub socket_port: Option<u16>,
    pub default_timeout_sec: u64,
    pub probe_timeout_sec: u64,
    pub scripts_dir: String,
}

/// Orchestrator behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    pub temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

/// Log output
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            model: "claude-3-5-sonnet-20241022".to_string(),
            max_tokens: 4096,
            base_url: "https://api.anthropic.com".to_string(),
            request_timeout_sec: 120,
            api_key: None,
        }
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            cli_program: "pyrevit".to_string(),
            socket_host: "127.0.0.1".to_string(),
            socket_port: None,
            default_timeout_sec: 30,
            probe_timeout_sec: 10,
            scripts_dir: "~/.pyrevit/scripts/revitai_temp".to_string(),
        }
    }
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            system_prompt: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Json,
        }
    }
}

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Load configuration from file or use defaults, then apply
    /// environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(config_path) => Self::load_from_file(config_path)?,
            None => Self::load_default()?,
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| AgentError::ConfigError(format!("Failed to read config: {}", e)))?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| AgentError::ConfigError(format!("Failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Load from ~/.revbot/config.toml or use built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Some(path) = Self::default_path() {
            if path.exists() {
                return Self::load_from_file(&path);
            }
        }

        Ok(Config::default())
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".revbot").join("config.toml"))
    }

    /// Apply environment overrides through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("ANTHROPIC_API_KEY") {
            self.anthropic.api_key = Some(key);
        }
        if let Some(url) = lookup("ANTHROPIC_BASE_URL") {
            self.anthropic.base_url = url;
        }
        if let Some(model) = lookup("ANTHROPIC_MODEL") {
            self.anthropic.model = model;
        }
        if let Some(port) = lookup("REVBOT_HOST_PORT") {
            self.host.socket_port = if port.trim().is_empty() {
                None
            } else {
                Some(port.trim().parse().map_err(|e| {
                    AgentError::ConfigError(format!("Invalid REVBOT_HOST_PORT '{}': {}", port, e))
                })?)
            };
        }
        if let Some(level) = lookup("REVBOT_LOG_LEVEL") {
            self.logging.level = level.to_lowercase();
        }
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.anthropic.max_tokens == 0 {
            return Err(AgentError::ConfigError(
                "max_tokens must be greater than 0".to_string(),
            ));
        }

        if self.anthropic.request_timeout_sec == 0 {
            return Err(AgentError::ConfigError(
                "request_timeout_sec must be greater than 0".to_string(),
            ));
        }

        if self.host.cli_program.trim().is_empty() {
            return Err(AgentError::ConfigError(
                "cli_program must not be empty".to_string(),
            ));
        }

        if self.host.socket_port == Some(0) {
            return Err(AgentError::ConfigError(
                "socket_port must be between 1 and 65535".to_string(),
            ));
        }

        if self.host.default_timeout_sec == 0 || self.host.probe_timeout_sec == 0 {
            return Err(AgentError::ConfigError(
                "host timeouts must be greater than 0".to_string(),
            ));
        }

        if self.host.default_timeout_sec > MAX_EXECUTION_TIMEOUT.as_secs() {
            return Err(AgentError::ConfigError(format!(
                "default_timeout_sec must be at most {}",
                MAX_EXECUTION_TIMEOUT.as_secs()
            )));
        }

        if !(0.0..=1.0).contains(&self.agent.temperature) {
            return Err(AgentError::ConfigError(
                "temperature must be between 0.0 and 1.0".to_string(),
            ));
        }

        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(AgentError::ConfigError(format!(
                "Invalid log level: {}",
                self.logging.level
            )));
        }

        Ok(())
    }

    /// Copy safe to display: the API key is masked
    pub fn redacted(&self) -> Self {
        let mut shown = self.clone();
        if shown.anthropic.api_key.is_some() {
            shown.anthropic.api_key = Some("********".to_string());
        }
        shown
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| AgentError::ConfigError(format!("Failed to serialize config: {}", e)))
    }

    /// Expand tilde in paths
    pub fn expand_path(path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(rest);
            }
        }
        PathBuf::from(path)
    }

    pub fn scripts_dir(&self) -> PathBuf {
        Self::expand_path(&self.host.scripts_dir)
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.host.default_timeout_sec)
    }

    pub fn bridge_config(&self) -> BridgeConfig {
        BridgeConfig {
            cli_program: self.host.cli_program.clone(),
            socket: self
                .host
                .socket_port
                .map(|port| (self.host.socket_host.clone(), port)),
            scripts_dir: self.scripts_dir(),
            probe_timeout: Duration::from_secs(self.host.probe_timeout_sec),
        }
    }

    pub fn agent_config(&self) -> AgentConfig {
        AgentConfig {
            model: self.anthropic.model.clone(),
            max_tokens: self.anthropic.max_tokens,
            temperature: self.agent.temperature,
            system_prompt: self
                .agent
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
        }
    }
}
