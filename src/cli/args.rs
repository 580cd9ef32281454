//! Command-line argument parsing for RevBot
//!
//! clap-based CLI with one subcommand per broker operation.

use crate::logging::LogFormat;
use clap::{ArgGroup, Parser, Subcommand};
use std::path::PathBuf;

/// RevBot - broker between a tool-using LLM and a pyRevit automation host
#[derive(Parser, Debug)]
#[command(name = "revbot")]
#[command(version)]
#[command(about = "Generate and run pyRevit scripts through an LLM", long_about = None)]
pub struct Args {
    /// Configuration file path (default: ~/.revbot/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level override (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log format override
    #[arg(long, global = true, value_enum)]
    pub log_format: Option<LogFormat>,

    /// Subcommand
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate pyRevit code from a natural-language request
    Generate {
        /// What the script should do
        #[arg(value_name = "PROMPT")]
        prompt: String,

        /// Host context as a JSON object (active_view, selected_elements, document_info)
        #[arg(long, value_name = "JSON")]
        context: Option<String>,

        /// Prior conversation as a JSON array of {role, content} turns
        #[arg(long, value_name = "FILE")]
        history: Option<PathBuf>,

        /// Sampling temperature (0.0 - 1.0)
        #[arg(long)]
        temperature: Option<f64>,
    },

    /// Run a script on the automation host
    #[command(group(ArgGroup::new("source").required(true).args(["file", "code"])))]
    Execute {
        /// Script file to run
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Inline script source
        #[arg(long)]
        code: Option<String>,

        /// Timeout in seconds
        #[arg(short, long)]
        timeout: Option<f64>,

        /// Run the script without the output-capture harness
        #[arg(long)]
        no_capture: bool,
    },

    /// Generate code and optionally run it
    Chat {
        /// What the script should do
        #[arg(value_name = "PROMPT")]
        prompt: String,

        /// Execute the generated code on the host
        #[arg(long)]
        execute: bool,
    },

    /// List the tools advertised to the model
    Tools,

    /// Run host and API diagnostics
    Doctor,

    /// Display current configuration
    Config,
}

impl Commands {
    /// Whether the command needs the completion API
    pub fn needs_model(&self) -> bool {
        matches!(self, Commands::Generate { .. } | Commands::Chat { .. })
    }
}
