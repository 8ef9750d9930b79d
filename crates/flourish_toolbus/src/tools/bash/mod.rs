mod args;
mod error;
mod executor;

pub use args::ExecuteBashArgs;
pub use error::BashError;
pub use executor::BashExecutor;

use std::sync::OnceLock;

use async_trait::async_trait;
use flourish_core::{ToolCall, ToolResult};
use serde_json::{json, Value as JsonValue};

use crate::dispatcher::{Dispatcher, EXIT_USAGE};
use crate::tools::{Tool, ToolContext, ToolOutcome};

fn schema() -> &'static JsonValue {
    static SCHEMA: OnceLock<JsonValue> = OnceLock::new();
    SCHEMA.get_or_init(|| {
        json!({
            "type": "object",
            "properties": {
                "cmd": {
                    "type": "string",
                    "description": "The shell command to run"
                }
            },
            "required": ["cmd"]
        })
    })
}

/// `execute_bash`: gated shell command execution.
pub struct ExecuteBash {
    dispatcher: Dispatcher,
}

impl ExecuteBash {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }
}

#[async_trait]
impl Tool for ExecuteBash {
    fn name(&self) -> &'static str {
        "execute_bash"
    }

    fn description(&self) -> &'static str {
        "Execute a shell command in the session's working directory and return its stdout, \
         stderr and exit code. Commands are checked against the allowlist and blacklist first."
    }

    fn parameters_schema(&self) -> JsonValue {
        schema().clone()
    }

    async fn handle(&self, call: &ToolCall, ctx: &ToolContext) -> ToolOutcome {
        let args: ExecuteBashArgs = match serde_json::from_value(call.arguments.clone()) {
            Ok(args) => args,
            Err(e) => {
                return ToolOutcome::result(ToolResult::failure(
                    &call.call_id,
                    format!("invalid arguments for execute_bash: {}", e),
                    EXIT_USAGE,
                    0,
                ));
            }
        };

        let invocation = self
            .dispatcher
            .dispatch(&call.call_id, &args.cmd, &ctx.working_dir.get(), ctx.timeout)
            .await;
        ToolOutcome::from_invocation(invocation)
    }
}
