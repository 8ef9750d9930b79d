use std::path::PathBuf;

use async_trait::async_trait;
use flourish_core::{ToolCall, ToolResult};
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tracing::info;

use crate::dispatcher::EXIT_USAGE;
use crate::tools::{Tool, ToolContext, ToolOutcome};

#[derive(Debug, Deserialize)]
pub struct SetCwdArgs {
    pub path: String,
}

/// `set_cwd`: moves the session's working directory. Relative paths resolve
/// against the current one.
pub struct SetCwd;

#[async_trait]
impl Tool for SetCwd {
    fn name(&self) -> &'static str {
        "set_cwd"
    }

    fn description(&self) -> &'static str {
        "Change the working directory used by later execute_bash calls in this session."
    }

    fn parameters_schema(&self) -> JsonValue {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory to switch to, absolute or relative to the current one"
                }
            },
            "required": ["path"]
        })
    }

    async fn handle(&self, call: &ToolCall, ctx: &ToolContext) -> ToolOutcome {
        let args: SetCwdArgs = match serde_json::from_value(call.arguments.clone()) {
            Ok(args) => args,
            Err(e) => {
                return ToolOutcome::result(ToolResult::failure(
                    &call.call_id,
                    format!("invalid arguments for set_cwd: {}", e),
                    EXIT_USAGE,
                    0,
                ));
            }
        };

        let requested = PathBuf::from(&args.path);
        let target = if requested.is_absolute() {
            requested
        } else {
            ctx.working_dir.get().join(requested)
        };

        let resolved = match tokio::fs::canonicalize(&target).await {
            Ok(path) if path.is_dir() => path,
            _ => {
                return ToolOutcome::result(ToolResult::failure(
                    &call.call_id,
                    format!("not a directory: {}", target.display()),
                    1,
                    0,
                ));
            }
        };

        ctx.working_dir.set(resolved.clone());
        info!(cwd = %resolved.display(), "working directory changed");
        ToolOutcome::result(ToolResult::success(
            &call.call_id,
            format!("working directory is now {}", resolved.display()),
            0,
        ))
    }
}
