pub mod dispatcher;
pub mod gate;
pub mod policy_store;
pub mod tools;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use flourish_core::{ToolCall, ToolResult};
use serde_json::Value as JsonValue;
use tracing::warn;

pub use dispatcher::{
    Dispatcher, ProcessOutput, ProcessRunner, EXIT_BLOCKED, EXIT_NOT_FOUND, EXIT_TIMEOUT,
    EXIT_USAGE,
};
pub use gate::SecurityGate;
pub use policy_store::{PolicyDefaults, PolicyStore};
pub use tools::{
    default_timeout, BashError, BashExecutor, ExecuteBash, ExecuteBashArgs, ListAllowlist,
    ListBlacklist, SetCwd, SetCwdArgs, Tool, ToolContext, ToolOutcome, WorkingDir,
};

/// Ordered chain of tool handlers.
pub struct ToolBus {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolBus {
    /// Bus with the default catalog: `execute_bash`, `list_allowlist`,
    /// `list_blacklist` and `set_cwd`.
    pub fn new(store: Arc<PolicyStore>, runner: Arc<dyn ProcessRunner>) -> Self {
        let mut bus = Self::empty();
        bus.register_defaults(store, runner);
        bus
    }

    pub fn empty() -> Self {
        Self { tools: Vec::new() }
    }

    fn register_defaults(&mut self, store: Arc<PolicyStore>, runner: Arc<dyn ProcessRunner>) {
        let dispatcher = Dispatcher::new(Arc::clone(&store), runner);
        self.register(ExecuteBash::new(dispatcher));
        self.register(ListAllowlist::new(Arc::clone(&store)));
        self.register(ListBlacklist::new(store));
        self.register(SetCwd);
    }

    /// Append a handler. A handler with the same name is replaced in place.
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        let tool: Arc<dyn Tool> = Arc::new(tool);
        match self.tools.iter_mut().find(|t| t.name() == tool.name()) {
            Some(slot) => *slot = tool,
            None => self.tools.push(tool),
        }
    }

    /// Route a call to the first handler that accepts it. Unknown tools come
    /// back as an error result rather than an error.
    pub async fn call(&self, call: &ToolCall, ctx: &ToolContext) -> ToolOutcome {
        let Some(tool) = self.tools.iter().find(|t| t.can_handle(&call.name)) else {
            warn!(tool = %call.name, "no handler for tool call");
            return ToolOutcome::result(ToolResult::failure(
                &call.call_id,
                format!("Tool not found: {}", call.name),
                EXIT_NOT_FOUND,
                0,
            ));
        };

        tool.handle(call, ctx).await
    }

    pub fn list_tools(&self) -> Vec<ToolInfo> {
        self.tools
            .iter()
            .map(|t| ToolInfo {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters_schema(),
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub parameters: JsonValue,
}
