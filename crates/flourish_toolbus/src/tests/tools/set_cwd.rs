use crate::tools::{SetCwd, Tool};
use crate::{ToolContext, WorkingDir};
use flourish_core::ToolCall;
use serde_json::json;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Runtime::new().unwrap()
}

#[test]
fn test_set_cwd_absolute() {
    let rt = runtime();
    rt.block_on(async {
        let start = tempfile::tempdir().unwrap();
        let target = tempfile::tempdir().unwrap();
        let ctx = ToolContext::new(WorkingDir::new(start.path()));

        let outcome = SetCwd
            .handle(
                &ToolCall::new("c1", "set_cwd", json!({ "path": target.path() })),
                &ctx,
            )
            .await;

        assert_eq!(outcome.result.exit_code, 0);
        assert_eq!(
            ctx.working_dir.get(),
            std::fs::canonicalize(target.path()).unwrap()
        );
    });
}

#[test]
fn test_set_cwd_relative() {
    let rt = runtime();
    rt.block_on(async {
        let start = tempfile::tempdir().unwrap();
        std::fs::create_dir(start.path().join("sub")).unwrap();
        let ctx = ToolContext::new(WorkingDir::new(start.path()));

        SetCwd
            .handle(&ToolCall::new("c1", "set_cwd", json!({ "path": "sub" })), &ctx)
            .await;

        assert!(ctx.working_dir.get().ends_with("sub"));
    });
}

#[test]
fn test_set_cwd_rejects_missing_dir() {
    let rt = runtime();
    rt.block_on(async {
        let start = tempfile::tempdir().unwrap();
        let ctx = ToolContext::new(WorkingDir::new(start.path()));

        let outcome = SetCwd
            .handle(
                &ToolCall::new("c1", "set_cwd", json!({ "path": "nope" })),
                &ctx,
            )
            .await;

        assert_ne!(outcome.result.exit_code, 0);
        assert!(outcome.result.stderr.contains("not a directory"));
        assert_eq!(ctx.working_dir.get(), start.path());
    });
}

#[test]
fn test_working_dir_is_shared_between_clones() {
    let dir = WorkingDir::new("/tmp");
    let clone = dir.clone();
    clone.set("/var");
    assert_eq!(dir.get(), std::path::PathBuf::from("/var"));
}
