//! RevBot - Main CLI Entry Point

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use revbot::{
    agent::AgentOrchestrator,
    bridge::ExecutionBridge,
    cli::{Args, Commands, Config},
    doctor::Doctor,
    llm::AnthropicClient,
    logging,
    service::{CodeService, GenerateRequest},
    tools::{ToolDispatcher, ToolRegistry},
    types::ConversationTurn,
};
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(level) = &args.log_level {
        config.logging.level = level.to_lowercase();
        config.validate()?;
    }
    if let Some(format) = args.log_format {
        config.logging.format = format;
    }
    logging::init(&config.logging.level, config.logging.format)?;

    run_command(&config, args.command).await
}

/// Wire bridge, registry, dispatcher and (when needed) the completion client
fn build_service(config: &Config, needs_model: bool) -> Result<CodeService> {
    let bridge = Arc::new(ExecutionBridge::new(&config.bridge_config()));
    debug!(transports = ?bridge.transport_names(), "execution bridge ready");

    let registry = Arc::new(ToolRegistry::standard(bridge, config.default_timeout())?);
    let dispatcher = ToolDispatcher::new(registry);
    let service = CodeService::new(dispatcher.clone());

    if !needs_model {
        return Ok(service);
    }

    let client = Arc::new(AnthropicClient::from_config(&config.anthropic)?);
    let orchestrator = AgentOrchestrator::new(client, dispatcher, config.agent_config());
    Ok(service.with_orchestrator(orchestrator))
}

async fn run_command(config: &Config, command: Commands) -> Result<()> {
    let needs_model = command.needs_model();
    let service = || build_service(config, needs_model);

    match command {
        Commands::Generate {
            prompt,
            context,
            history,
            temperature,
        } => {
            let request = GenerateRequest {
                prompt,
                context: context.as_deref().map(parse_context).transpose()?,
                history: match history {
                    Some(path) => load_history(&path).await?,
                    None => Vec::new(),
                },
                temperature,
            };
            let generated = service()?.generate_code(request).await?;
            print_json(&generated)
        }

        Commands::Execute {
            file,
            code,
            timeout,
            no_capture,
        } => {
            let code = match (file, code) {
                (Some(path), _) => tokio::fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("failed to read {}", path.display()))?,
                (None, Some(code)) => code,
                (None, None) => anyhow::bail!("either --file or --code is required"),
            };

            let report = service()?.execute_code(&code, timeout, !no_capture).await;
            print_json(&report)?;
            if !report.succeeded() {
                std::process::exit(1);
            }
            Ok(())
        }

        Commands::Chat { prompt, execute } => {
            let reply = service()?.chat(&prompt, execute).await?;
            print_json(&reply)?;
            if reply.execution.as_ref().is_some_and(|r| !r.succeeded()) {
                std::process::exit(1);
            }
            Ok(())
        }

        Commands::Tools => print_json(&service()?.tools()),

        Commands::Doctor => run_doctor(config).await,

        Commands::Config => {
            print!("{}", config.redacted().to_toml()?);
            Ok(())
        }
    }
}

async fn run_doctor(config: &Config) -> Result<()> {
    let doctor = Doctor::from_config(config);
    let checks = doctor.run_diagnostics().await;
    Doctor::display_results(&checks);

    if Doctor::overall_status(&checks) {
        println!("{}", "All checks passed.".green());
        Ok(())
    } else {
        println!("{}", "Some checks failed.".red());
        std::process::exit(1);
    }
}

fn parse_context(raw: &str) -> Result<Map<String, Value>> {
    serde_json::from_str(raw).context("--context must be a JSON object")
}

async fn load_history(path: &Path) -> Result<Vec<ConversationTurn>> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("{} is not a JSON array of turns", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
