//! CLI entry point for flourish.

mod cli;
mod commands;
mod output;

use std::path::PathBuf;

use clap::Parser;
use flourish_observability::ObservabilityConfig;

use crate::cli::Cli;

/// `~/.config/flourish`, where the policy file, logs and env file live.
pub(crate) fn config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".config").join("flourish"))
}

/// Load env files. Values already set in the process environment win, and
/// the nearest `.env` wins over the user-wide file.
/// Order: 1) `.env` (cwd or a parent)  2) `~/.config/flourish/env`
fn load_env_files() {
    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd;
        for _ in 0..32 {
            let env_file = dir.join(".env");
            if env_file.exists() {
                let _ = dotenvy::from_path(&env_file);
                break;
            }
            if let Some(parent) = dir.parent() {
                dir = parent.to_path_buf();
            } else {
                break;
            }
        }
    }
    if let Some(dir) = config_dir() {
        let global = dir.join("env");
        if global.exists() {
            let _ = dotenvy::from_path(&global);
        }
    }
}

fn init_logging(verbose: bool) {
    let mut config = ObservabilityConfig::from_env();
    if verbose {
        config = config.with_filter("flourish=debug,info");
    }
    if let Err(e) = flourish_observability::init(config) {
        output::warning(&format!("logging disabled: {e}"));
    }
}

#[tokio::main]
async fn main() {
    load_env_files();
    let cli = Cli::parse();
    output::init(cli.output);
    init_logging(cli.verbose);

    let outcome = commands::handle(cli).await;
    flourish_observability::shutdown();

    if let Err(e) = outcome {
        output::error(&e.to_string());
        std::process::exit(1);
    }
}
