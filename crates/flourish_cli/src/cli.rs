//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Shell assistant that runs model-requested commands behind an allowlist
#[derive(Parser)]
#[command(name = "flourish", about, version, propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format: text (human-readable) or json (machine-readable)
    #[arg(short, long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Policy file (default: FLOURISH_POLICY_FILE or ~/.config/flourish/commands.json)
    #[arg(long, global = true)]
    pub policy_file: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum OutputFormat {
    /// Colored terminal output for humans
    #[default]
    Text,
    /// Structured JSON for machine consumption
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run a single turn
    Run {
        /// What to ask the assistant
        prompt: String,
        /// Render output parts as they arrive
        #[arg(long)]
        stream: bool,
        /// Allowlist unknown commands automatically instead of refusing them
        #[arg(long)]
        auto_add: bool,
        /// Offer to allowlist refused commands and retry the turn once
        #[arg(long)]
        confirm: bool,
        #[command(flatten)]
        common: TurnArgs,
    },
    /// Interactive session; earlier turns are sent as context
    Chat {
        /// Allowlist unknown commands automatically instead of refusing them
        #[arg(long)]
        auto_add: bool,
        #[command(flatten)]
        common: TurnArgs,
    },
    /// Inspect and edit the command allowlist and blacklist
    Policy {
        #[command(subcommand)]
        action: PolicyAction,
    },
    /// Show what the security gate decides for a command, without running it
    Check {
        /// Command line to check
        command: String,
    },
}

#[derive(clap::Args)]
pub struct TurnArgs {
    /// Model to use (default: FLOURISH_MODEL or gpt-4o-mini)
    #[arg(long)]
    pub model: Option<String>,
    /// Working directory (default: current directory)
    #[arg(long)]
    pub workdir: Option<PathBuf>,
    /// Maximum provider rounds per turn
    #[arg(long)]
    pub max_rounds: Option<u32>,
}

#[derive(Subcommand)]
pub enum PolicyAction {
    /// Show the allowlist and blacklist
    List,
    /// Add an executable name to the allowlist
    Allow {
        /// Executable name, e.g. `git`
        command: String,
    },
    /// Remove an executable name from the allowlist
    Unallow { command: String },
    /// Add an entry to the blacklist
    Deny {
        /// Blacklist entry, e.g. `rm` or `chmod 777`
        command: String,
    },
    /// Remove an entry from the blacklist
    Undeny { command: String },
}
