use crate::tools::{ListAllowlist, ListBlacklist, Tool};
use crate::{PolicyStore, ToolContext, WorkingDir};
use flourish_core::{SecurityPolicy, ToolCall};
use serde_json::json;
use std::sync::Arc;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Runtime::new().unwrap()
}

fn store() -> Arc<PolicyStore> {
    Arc::new(PolicyStore::in_memory(
        SecurityPolicy::new()
            .with_allowlist(["git", "ls"])
            .with_blacklist(["rm", "chmod 777"]),
    ))
}

#[test]
fn test_list_allowlist() {
    let rt = runtime();
    rt.block_on(async {
        let ctx = ToolContext::new(WorkingDir::new("/tmp"));
        let outcome = ListAllowlist::new(store())
            .handle(&ToolCall::new("c1", "list_allowlist", json!({})), &ctx)
            .await;

        let value: serde_json::Value = serde_json::from_str(&outcome.result.stdout).unwrap();
        assert_eq!(value["allowlist"], json!(["git", "ls"]));
    });
}

#[test]
fn test_list_blacklist() {
    let rt = runtime();
    rt.block_on(async {
        let ctx = ToolContext::new(WorkingDir::new("/tmp"));
        let outcome = ListBlacklist::new(store())
            .handle(&ToolCall::new("c1", "list_blacklist", json!({})), &ctx)
            .await;

        let value: serde_json::Value = serde_json::from_str(&outcome.result.stdout).unwrap();
        assert_eq!(value["blacklist"], json!(["chmod 777", "rm"]));
        assert!(outcome.invocation.is_none());
    });
}
