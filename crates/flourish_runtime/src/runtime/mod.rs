//! Runtime: the provider, policy store, tool bus and audit sink shared by
//! every session.
//!
//! Split into focused submodules:
//! - **turn_loop**: turn lifecycle, provider rounds and state transitions
//! - **stream**: polling one provider round under timeout and cancellation
//! - **tools**: dispatching a tool call while the provider is paused

mod stream;
mod tools;
mod turn_loop;

pub(crate) use turn_loop::{run_turn, TurnTask};

use std::sync::Arc;

use flourish_core::SecurityPolicy;
use flourish_llms::{OpenAIConfig, OpenAIProvider, Provider, ToolDefinition};
use flourish_toolbus::{BashExecutor, PolicyDefaults, PolicyStore, ProcessRunner, ToolBus};
use tracing::info;

use crate::audit::{AuditSink, FanoutAuditSink, JsonlAuditSink, TracingAuditSink};
use crate::config::RuntimeConfig;
use crate::context;
use crate::error::{Result, RuntimeError};
use crate::session::Session;

pub(crate) struct Shared {
    pub(crate) config: RuntimeConfig,
    pub(crate) provider: Arc<dyn Provider>,
    pub(crate) store: Arc<PolicyStore>,
    pub(crate) toolbus: Arc<ToolBus>,
    pub(crate) tools: Vec<ToolDefinition>,
    pub(crate) audit: Arc<dyn AuditSink>,
}

/// Entry point for running turns. Cheap to clone.
#[derive(Clone)]
pub struct Runtime {
    shared: Arc<Shared>,
}

impl Runtime {
    /// Runtime talking to the configured OpenAI-compatible endpoint and
    /// running commands through `/bin/bash`.
    pub fn new(config: RuntimeConfig) -> Result<Self> {
        let provider = Self::create_provider(&config)?;
        let audit = Self::create_audit_sink(&config)?;
        Ok(Self::with_components(config, provider, Arc::new(BashExecutor))?.with_audit_sink(audit))
    }

    /// Runtime with an explicit provider and process runner. The audit sink
    /// defaults to `TracingAuditSink`.
    pub fn with_components(
        config: RuntimeConfig,
        provider: Arc<dyn Provider>,
        runner: Arc<dyn ProcessRunner>,
    ) -> Result<Self> {
        if !config.working_dir.is_dir() {
            return Err(RuntimeError::ConfigError(format!(
                "working directory does not exist: {}",
                config.working_dir.display()
            )));
        }

        let store = Arc::new(Self::create_store(&config));
        let toolbus = Arc::new(ToolBus::new(Arc::clone(&store), runner));
        let tools = context::tool_definitions(&toolbus);

        info!(
            provider = provider.provider_id(),
            model = %config.model,
            mutation = %config.mutation_policy,
            tools = tools.len(),
            "runtime initialized"
        );

        Ok(Self {
            shared: Arc::new(Shared {
                config,
                provider,
                store,
                toolbus,
                tools,
                audit: Arc::new(TracingAuditSink),
            }),
        })
    }

    /// Replace the audit sink. Sessions opened earlier keep the old one.
    pub fn with_audit_sink(self, audit: Arc<dyn AuditSink>) -> Self {
        let shared = &self.shared;
        Self {
            shared: Arc::new(Shared {
                config: shared.config.clone(),
                provider: Arc::clone(&shared.provider),
                store: Arc::clone(&shared.store),
                toolbus: Arc::clone(&shared.toolbus),
                tools: shared.tools.clone(),
                audit,
            }),
        }
    }

    fn create_provider(config: &RuntimeConfig) -> Result<Arc<dyn Provider>> {
        let key = config
            .api_key
            .clone()
            .ok_or_else(|| RuntimeError::ConfigError("API_KEY or OPENAI_API_KEY is not set".into()))?;
        let provider = OpenAIProvider::new(OpenAIConfig::new(key).with_base_url(&config.api_base))?;
        Ok(Arc::new(provider))
    }

    fn create_audit_sink(config: &RuntimeConfig) -> Result<Arc<dyn AuditSink>> {
        let Some(dir) = &config.log_dir else {
            return Ok(Arc::new(TracingAuditSink));
        };
        let jsonl = JsonlAuditSink::create(dir)?;
        info!(path = %jsonl.path().display(), "writing session audit log");
        Ok(Arc::new(
            FanoutAuditSink::new()
                .with_sink(Arc::new(TracingAuditSink))
                .with_sink(Arc::new(jsonl)),
        ))
    }

    fn create_store(config: &RuntimeConfig) -> PolicyStore {
        match &config.policy_file {
            Some(path) => PolicyStore::open(path)
                .with_defaults(PolicyDefaults {
                    allowlist: config.default_allowlist.clone(),
                    blacklist: config.default_blacklist.clone(),
                })
                .with_mutation(config.mutation_policy),
            None => PolicyStore::in_memory(
                SecurityPolicy::new()
                    .with_allowlist(config.default_allowlist.iter().cloned())
                    .with_blacklist(config.default_blacklist.iter().cloned())
                    .with_mutation(config.mutation_policy),
            ),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.shared.config
    }

    pub fn store(&self) -> &Arc<PolicyStore> {
        &self.shared.store
    }

    /// Tools advertised to the model.
    pub fn tools(&self) -> &[ToolDefinition] {
        &self.shared.tools
    }

    pub fn open_session(&self) -> Session {
        Session::open(Arc::clone(&self.shared))
    }
}
