//! Doctor command for host and API diagnostics
//!
//! Checks that the automation host and the completion API are reachable
//! with the current configuration.

use crate::bridge::transport::probe_host_cli;
use crate::bridge::BridgeConfig;
use crate::cli::Config;
use colored::Colorize;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Health check result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    Pass,
    Warn(String),
    Fail(String),
}

/// Individual health check
#[derive(Debug, Clone)]
pub struct HealthCheck {
    pub name: String,
    pub status: HealthStatus,
    /// Extra information shown next to a passing check
    pub detail: Option<String>,
}

impl HealthCheck {
    fn pass(name: &str, detail: Option<String>) -> Self {
        Self {
            name: name.to_string(),
            status: HealthStatus::Pass,
            detail,
        }
    }

    fn warn(name: &str, message: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            status: HealthStatus::Warn(message.into()),
            detail: None,
        }
    }

    fn fail(name: &str, message: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            status: HealthStatus::Fail(message.into()),
            detail: None,
        }
    }
}

/// Doctor diagnostics system
pub struct Doctor {
    bridge: BridgeConfig,
    api_key_present: bool,
}

impl Doctor {
    pub fn new(bridge: BridgeConfig, api_key_present: bool) -> Self {
        Self {
            bridge,
            api_key_present,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let api_key_present = config
            .anthropic
            .api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty());
        Self::new(config.bridge_config(), api_key_present)
    }

    /// Run all health checks
    pub async fn run_diagnostics(&self) -> Vec<HealthCheck> {
        vec![
            self.check_host_cli().await,
            self.check_host_socket().await,
            self.check_api_key(),
            self.check_scripts_dir(),
        ]
    }

    /// Host CLI answers `--version`
    async fn check_host_cli(&self) -> HealthCheck {
        const NAME: &str = "Host CLI";

        match probe_host_cli(&self.bridge.cli_program, self.bridge.probe_timeout).await {
            Ok(version) => HealthCheck::pass(NAME, Some(version)),
            Err(e) => HealthCheck::fail(NAME, e.to_string()),
        }
    }

    /// Persistent channel accepts connections
    async fn check_host_socket(&self) -> HealthCheck {
        const NAME: &str = "Host Socket";

        let Some((host, port)) = &self.bridge.socket else {
            return HealthCheck::warn(NAME, "not configured, process transport only");
        };

        let addr = format!("{}:{}", host, port);
        let limit = self.bridge.probe_timeout.min(Duration::from_secs(5));
        match timeout(limit, TcpStream::connect(&addr)).await {
            Ok(Ok(_)) => HealthCheck::pass(NAME, Some(addr)),
            Ok(Err(e)) => HealthCheck::warn(
                NAME,
                format!("{} unreachable ({}), process transport will be used", addr, e),
            ),
            Err(_) => HealthCheck::warn(NAME, format!("{} did not answer within {:?}", addr, limit)),
        }
    }

    fn check_api_key(&self) -> HealthCheck {
        const NAME: &str = "API Key";

        if self.api_key_present {
            HealthCheck::pass(NAME, None)
        } else {
            HealthCheck::fail(NAME, "ANTHROPIC_API_KEY not set, generate and chat are disabled")
        }
    }

    /// Scripts directory exists or can be created, and is writable
    fn check_scripts_dir(&self) -> HealthCheck {
        const NAME: &str = "Scripts Dir";
        let dir = &self.bridge.scripts_dir;

        if let Err(e) = std::fs::create_dir_all(dir) {
            return HealthCheck::fail(NAME, format!("cannot create {}: {}", dir.display(), e));
        }

        match tempfile::Builder::new().prefix(".revbot_check").tempfile_in(dir) {
            Ok(_) => HealthCheck::pass(NAME, Some(dir.display().to_string())),
            Err(e) => HealthCheck::fail(NAME, format!("{} not writable: {}", dir.display(), e)),
        }
    }

    /// Display diagnostics results
    pub fn display_results(checks: &[HealthCheck]) {
        println!("\n{}\n", "RevBot Diagnostics".bold());
        println!("{:<16} {}", "Check", "Status");
        println!("{}", "=".repeat(60));

        for check in checks {
            let status = match &check.status {
                HealthStatus::Pass => match &check.detail {
                    Some(detail) => format!("{} {}", "PASS".green(), detail.dimmed()),
                    None => "PASS".green().to_string(),
                },
                HealthStatus::Warn(msg) => format!("{} {}", "WARN:".yellow(), msg),
                HealthStatus::Fail(msg) => format!("{} {}", "FAIL:".red(), msg),
            };
            println!("{:<16} {}", check.name, status);
        }

        println!();
    }

    /// No check failed
    pub fn overall_status(checks: &[HealthCheck]) -> bool {
        !checks.iter().any(|c| matches!(c.status, HealthStatus::Fail(_)))
    }
}
