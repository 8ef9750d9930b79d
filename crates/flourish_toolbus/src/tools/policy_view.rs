//! Read-only views of the command policy for the model.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use flourish_core::{ToolCall, ToolResult};
use serde_json::{json, Value as JsonValue};

use crate::policy_store::PolicyStore;
use crate::tools::{Tool, ToolContext, ToolOutcome};

fn empty_schema() -> JsonValue {
    json!({ "type": "object", "properties": {} })
}

fn render(call: &ToolCall, key: &str, entries: &BTreeSet<String>) -> ToolOutcome {
    let stdout = json!({ key: entries }).to_string();
    ToolOutcome::result(ToolResult::success(&call.call_id, stdout, 0))
}

pub struct ListAllowlist {
    store: Arc<PolicyStore>,
}

impl ListAllowlist {
    pub fn new(store: Arc<PolicyStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for ListAllowlist {
    fn name(&self) -> &'static str {
        "list_allowlist"
    }

    fn description(&self) -> &'static str {
        "List the commands that may run without confirmation."
    }

    fn parameters_schema(&self) -> JsonValue {
        empty_schema()
    }

    async fn handle(&self, call: &ToolCall, _ctx: &ToolContext) -> ToolOutcome {
        render(call, "allowlist", &self.store.read().allowlist)
    }
}

pub struct ListBlacklist {
    store: Arc<PolicyStore>,
}

impl ListBlacklist {
    pub fn new(store: Arc<PolicyStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for ListBlacklist {
    fn name(&self) -> &'static str {
        "list_blacklist"
    }

    fn description(&self) -> &'static str {
        "List the commands and patterns that are never executed."
    }

    fn parameters_schema(&self) -> JsonValue {
        empty_schema()
    }

    async fn handle(&self, call: &ToolCall, _ctx: &ToolContext) -> ToolOutcome {
        render(call, "blacklist", &self.store.read().blacklist)
    }
}
