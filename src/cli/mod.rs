//! CLI module
//!
//! Command-line interface definitions and handlers for the workbench client.
//!
//! # Commands
//!
//! - `logs` - Follow the execution log of a test case
//! - `status` - Follow the job status of a test case
//! - `entries` - List stored test cases and their stream identities
//! - `run` - Create an execution job for a test case
//! - `generate` - Generate test cases from a prompt
//! - `chat` - Ask the log-analysis chat
//! - `config` - Configuration utilities (init)
//! - `completions` - Generate shell completions
//!
//! # Example
//!
//! ```bash
//! # Follow logs for one test case
//! optim logs --prompt-hash p1 --tc-hash tc1
//!
//! # Wait for a job to finish
//! optim status --prompt-hash p1 --tc-hash tc1 --initial pending
//!
//! # Generate shell completions
//! optim completions bash > ~/.bash_completion.d/optim
//! ```

pub mod chat;
pub mod completions;
pub mod config;
pub mod entries;
pub mod generate;
pub mod output;
pub mod run;
pub mod stream;

pub use completions::handle_completions;
pub use config::handle_config_init;

use crate::config::OptimConfig;
use crate::stream::JobStatus;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

/// optim - live test execution logs and job status
#[derive(Parser, Debug)]
#[command(
    name = "optim",
    version,
    about = "Follow live test execution logs and job status from the command line"
)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, default_value = "optim.toml")]
    pub config: PathBuf,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, env = "OPTIM_LOG_LEVEL")]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Follow the execution log of a test case
    Logs(LogsArgs),
    /// Follow the job status of a test case until it completes
    Status(StatusArgs),
    /// List stored test cases
    Entries(EntriesArgs),
    /// Create an execution job from a test case file
    Run(RunArgs),
    /// Generate test cases from a prompt
    Generate(GenerateArgs),
    /// Ask the log-analysis chat
    Chat(ChatArgs),
    /// Configuration utilities
    #[command(subcommand)]
    Config(ConfigCommands),
    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args, Debug)]
pub struct LogsArgs {
    /// Prompt hash of the test case
    #[arg(long)]
    pub prompt_hash: String,

    /// Test-case hash
    #[arg(long)]
    pub tc_hash: String,

    /// Print one JSON object per update
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Prompt hash of the test case
    #[arg(long)]
    pub prompt_hash: String,

    /// Test-case hash
    #[arg(long)]
    pub tc_hash: String,

    /// Status to show until the server reports one
    #[arg(long, default_value = "noJobsActive")]
    pub initial: JobStatus,

    /// Print one JSON object per update
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct EntriesArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// JSON file holding one test case
    pub file: PathBuf,

    /// Prompt hash, when the file does not carry one
    #[arg(long)]
    pub prompt_hash: Option<String>,

    /// Follow the job status until it completes
    #[arg(short, long)]
    pub follow: bool,
}

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Generation prompt (usually a request description or curl command)
    #[arg(short, long)]
    pub prompt: String,

    /// Model to generate with
    #[arg(short, long, default_value = "gpt-4o")]
    pub model: String,

    /// Print the raw response as JSON only
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ChatArgs {
    /// Question about the execution logs
    #[arg(short, long)]
    pub prompt: String,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Initialize a new configuration file
    Init(ConfigInitArgs),
}

#[derive(Args, Debug)]
pub struct ConfigInitArgs {
    /// Output file path
    #[arg(short, long, default_value = "optim.toml")]
    pub output: PathBuf,

    /// Overwrite existing file
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,
}

/// Load configuration with file, environment and CLI layers applied.
///
/// A missing config file at the default location falls back to defaults.
pub fn load_config_with_overrides(
    path: &Path,
    log_level: Option<&str>,
) -> Result<OptimConfig, Box<dyn std::error::Error>> {
    let mut config = if path.exists() {
        OptimConfig::load(Some(path))?
    } else {
        tracing::debug!("Config file not found, using defaults");
        OptimConfig::default()
    };

    config = config.with_env_overrides();

    if let Some(level) = log_level {
        config.logging.level = level.to_string();
    }

    config.validate()?;
    Ok(config)
}

/// Resolves when the user presses Ctrl-C.
pub async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
