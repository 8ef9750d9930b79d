pub mod bash;
pub mod policy_view;
pub mod set_cwd;

use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use flourish_core::{ToolCall, ToolInvocation, ToolResult};
use serde_json::Value as JsonValue;

pub use bash::{BashError, BashExecutor, ExecuteBash, ExecuteBashArgs};
pub use policy_view::{ListAllowlist, ListBlacklist};
pub use set_cwd::{SetCwd, SetCwdArgs};

/// A handler in the tool chain. The bus asks each handler in registration
/// order whether it handles a call and gives the call to the first that does.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn parameters_schema(&self) -> JsonValue;

    fn can_handle(&self, tool_name: &str) -> bool {
        tool_name == self.name()
    }

    async fn handle(&self, call: &ToolCall, ctx: &ToolContext) -> ToolOutcome;
}

/// What a handler produced: the result fed back to the model and, for
/// command execution, the audit record.
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    pub result: ToolResult,
    pub invocation: Option<ToolInvocation>,
}

impl ToolOutcome {
    pub fn result(result: ToolResult) -> Self {
        Self {
            result,
            invocation: None,
        }
    }

    pub fn from_invocation(invocation: ToolInvocation) -> Self {
        let result = invocation
            .result
            .clone()
            .unwrap_or_else(|| ToolResult::failure(&invocation.call_id, "no result", -1, 0));
        Self {
            result,
            invocation: Some(invocation),
        }
    }
}

/// Working directory shared by the tools of one session.
#[derive(Debug, Clone)]
pub struct WorkingDir(Arc<RwLock<PathBuf>>);

impl WorkingDir {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(Arc::new(RwLock::new(path.into())))
    }

    pub fn get(&self) -> PathBuf {
        self.0.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn set(&self, path: impl Into<PathBuf>) {
        *self.0.write().unwrap_or_else(|e| e.into_inner()) = path.into();
    }
}

#[derive(Debug, Clone)]
pub struct ToolContext {
    pub working_dir: WorkingDir,
    pub timeout: Duration,
}

impl ToolContext {
    pub fn new(working_dir: WorkingDir) -> Self {
        Self {
            working_dir,
            timeout: default_timeout(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

pub fn default_timeout() -> Duration {
    Duration::from_secs(60)
}
