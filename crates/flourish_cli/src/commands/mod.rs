//! Command dispatch.

pub mod chat;
pub mod check;
pub mod policy;
pub mod run;

use std::path::PathBuf;

use anyhow::{Context, Result};
use flourish_core::MutationPolicy;
use flourish_runtime::{Runtime, RuntimeConfig};
use flourish_toolbus::{PolicyDefaults, PolicyStore};

use crate::cli::{Cli, Command, TurnArgs};

pub async fn handle(cli: Cli) -> Result<()> {
    let policy_file = cli.policy_file;
    match cli.command {
        Command::Run {
            prompt,
            stream,
            auto_add,
            confirm,
            common,
        } => {
            let runtime = build_runtime(policy_file, &common, auto_add, false)?;
            run::handle(&runtime, &prompt, run::RunMode { stream, confirm }).await
        }
        Command::Chat { auto_add, common } => {
            let runtime = build_runtime(policy_file, &common, auto_add, true)?;
            chat::handle(&runtime).await
        }
        Command::Policy { action } => {
            let config = base_config(policy_file)?;
            policy::handle(&open_store(&config)?, action)
        }
        Command::Check { command } => {
            let config = base_config(policy_file)?;
            check::handle(&open_store(&config)?, &command)
        }
    }
}

/// Environment configuration with the CLI's file locations filled in.
fn base_config(policy_file: Option<PathBuf>) -> Result<RuntimeConfig> {
    let cwd = std::env::current_dir().context("cannot read the current directory")?;
    let mut config = RuntimeConfig::from_env(cwd);

    if let Some(path) = policy_file {
        config.policy_file = Some(path);
    }
    if let Some(dir) = crate::config_dir() {
        if config.policy_file.is_none() {
            config.policy_file = Some(dir.join("commands.json"));
        }
        if config.log_dir.is_none() {
            config.log_dir = Some(dir.join("logs"));
        }
    }
    Ok(config)
}

fn build_runtime(
    policy_file: Option<PathBuf>,
    args: &TurnArgs,
    auto_add: bool,
    carry_context: bool,
) -> Result<Runtime> {
    let mut config = base_config(policy_file)?;
    if let Some(model) = &args.model {
        config = config.with_model(model);
    }
    if let Some(dir) = &args.workdir {
        config.working_dir = dir.clone();
    }
    if let Some(max) = args.max_rounds {
        config = config.with_max_rounds(max);
    }
    if auto_add {
        config = config.with_mutation_policy(MutationPolicy::AutoAdd);
    }
    if carry_context {
        config = config.with_carry_context(true);
    }

    tracing::debug!(model = %config.model, workdir = %config.working_dir.display(), "building runtime");
    Ok(Runtime::new(config)?)
}

/// The policy store the runtime would use, without a provider.
fn open_store(config: &RuntimeConfig) -> Result<PolicyStore> {
    let path = config
        .policy_file
        .clone()
        .context("no policy file configured and no home directory to default to")?;
    Ok(PolicyStore::open(path)
        .with_defaults(PolicyDefaults {
            allowlist: config.default_allowlist.clone(),
            blacklist: config.default_blacklist.clone(),
        })
        .with_mutation(config.mutation_policy))
}
