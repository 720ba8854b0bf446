//! Top-level argument parser.

use clap::Parser;

use crate::commands::Commands;

/// Command-line interface for the model dashboard.
#[derive(Parser)]
#[command(name = "ollamadeck")]
#[command(about = "Manage local Ollama models and browse the registry")]
#[command(version)]
pub struct Cli {
    /// Path to a JSON settings file
    #[arg(long = "config", global = true)]
    pub config: Option<std::path::PathBuf>,

    /// Override the model-runner binary for this invocation
    #[arg(long = "runner", global = true)]
    pub runner_binary: Option<String>,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}
