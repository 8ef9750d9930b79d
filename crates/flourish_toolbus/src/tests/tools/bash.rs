use crate::dispatcher::ProcessRunner;
use crate::tools::{BashError, BashExecutor, ExecuteBash, ExecuteBashArgs, Tool};
use crate::{Dispatcher, PolicyStore, ToolContext, WorkingDir, EXIT_TIMEOUT, EXIT_USAGE};
use flourish_core::{SecurityPolicy, ToolCall};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Runtime::new().unwrap()
}

fn tool() -> ExecuteBash {
    let store = Arc::new(PolicyStore::in_memory(SecurityPolicy::new()));
    ExecuteBash::new(Dispatcher::new(store, Arc::new(BashExecutor::new())))
}

fn ctx(dir: &Path) -> ToolContext {
    ToolContext::new(WorkingDir::new(dir)).with_timeout(Duration::from_secs(10))
}

#[test]
fn test_execute_bash_tool_name() {
    assert_eq!(tool().name(), "execute_bash");
    assert!(tool().description().contains("shell command"));
}

#[test]
fn test_bash_args_parsing() {
    let args: ExecuteBashArgs = serde_json::from_value(json!({ "cmd": "echo hello" })).unwrap();
    assert_eq!(args.cmd, "echo hello");

    let aliased: ExecuteBashArgs =
        serde_json::from_value(json!({ "command": "echo hello" })).unwrap();
    assert_eq!(aliased.cmd, "echo hello");
}

#[test]
fn test_execute_echo_command() {
    let rt = runtime();
    rt.block_on(async {
        let dir = tempfile::tempdir().unwrap();
        let outcome = tool()
            .handle(
                &ToolCall::new("c1", "execute_bash", json!({ "cmd": "echo hello" })),
                &ctx(dir.path()),
            )
            .await;

        assert_eq!(outcome.result.exit_code, 0);
        assert_eq!(outcome.result.stdout.trim(), "hello");
        assert_eq!(outcome.result.call_id, "c1");
    });
}

#[test]
fn test_execute_failing_command() {
    let rt = runtime();
    rt.block_on(async {
        let dir = tempfile::tempdir().unwrap();
        let outcome = tool()
            .handle(
                &ToolCall::new("c1", "execute_bash", json!({ "cmd": "echo oops >&2; exit 3" })),
                &ctx(dir.path()),
            )
            .await;

        assert_eq!(outcome.result.exit_code, 3);
        assert!(outcome.result.stderr.contains("oops"));
        assert!(outcome.invocation.unwrap().was_executed());
    });
}

#[test]
fn test_execute_runs_in_working_dir() {
    let rt = runtime();
    rt.block_on(async {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "x").unwrap();
        let outcome = tool()
            .handle(
                &ToolCall::new("c1", "execute_bash", json!({ "cmd": "ls" })),
                &ctx(dir.path()),
            )
            .await;

        assert!(outcome.result.stdout.contains("marker.txt"));
    });
}

#[test]
fn test_execute_missing_cmd_argument() {
    let rt = runtime();
    rt.block_on(async {
        let dir = tempfile::tempdir().unwrap();
        let outcome = tool()
            .handle(
                &ToolCall::new("c1", "execute_bash", json!({})),
                &ctx(dir.path()),
            )
            .await;

        assert_eq!(outcome.result.exit_code, EXIT_USAGE);
        assert!(outcome.invocation.is_none());
    });
}

#[test]
fn test_executor_timeout() {
    let rt = runtime();
    rt.block_on(async {
        let dir = tempfile::tempdir().unwrap();
        let err = BashExecutor::new()
            .run("sleep 5", dir.path(), Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, BashError::Timeout(_)));
    });
}

#[test]
fn test_timeout_is_reported_as_result() {
    let rt = runtime();
    rt.block_on(async {
        let dir = tempfile::tempdir().unwrap();
        let outcome = tool()
            .handle(
                &ToolCall::new("c1", "execute_bash", json!({ "cmd": "sleep 5" })),
                &ToolContext::new(WorkingDir::new(dir.path()))
                    .with_timeout(Duration::from_millis(100)),
            )
            .await;
        assert_eq!(outcome.result.exit_code, EXIT_TIMEOUT);
        assert!(outcome.result.stderr.contains("timed out"));
    });
}

#[test]
fn test_executor_missing_working_dir() {
    let rt = runtime();
    rt.block_on(async {
        let err = BashExecutor::new()
            .run("true", Path::new("/definitely/not/here"), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, BashError::MissingWorkingDir(_)));
    });
}

#[test]
fn test_dropping_run_kills_the_process() {
    let rt = runtime();
    rt.block_on(async {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("done");
        let command = format!("sleep 1; touch {}", marker.display());

        let executor = BashExecutor::new();
        let run = executor.run(&command, dir.path(), Duration::from_secs(10));
        let _ = tokio::time::timeout(Duration::from_millis(200), run).await;

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!marker.exists());
    });
}

#[cfg(unix)]
#[test]
fn test_timeout_kills_background_subshell() {
    let rt = runtime();
    rt.block_on(async {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("leaked");
        let command = format!("true; (sleep 1; touch {}) & wait", marker.display());

        let err = BashExecutor::new()
            .run(&command, dir.path(), Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(matches!(err, BashError::Timeout(_)));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!marker.exists());
    });
}
