//! Gated command execution.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use flourish_core::{BlockReason, Decision, ToolInvocation, ToolResult};
use tracing::{info, warn};

use crate::gate::SecurityGate;
use crate::policy_store::PolicyStore;
use crate::tools::BashError;

/// Exit code reported for a command the gate refused.
pub const EXIT_BLOCKED: i32 = 126;
/// Exit code reported when the process could not be started, or the tool does not exist.
pub const EXIT_NOT_FOUND: i32 = 127;
/// Exit code reported when the process exceeded its timeout.
pub const EXIT_TIMEOUT: i32 = 124;
/// Exit code reported for malformed tool arguments.
pub const EXIT_USAGE: i32 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub duration_ms: u64,
}

/// Spawns a command and waits for it. Implementations must stop the child
/// when the returned future is dropped.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(
        &self,
        command: &str,
        cwd: &Path,
        timeout: Duration,
    ) -> Result<ProcessOutput, BashError>;
}

#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<PolicyStore>,
    runner: Arc<dyn ProcessRunner>,
}

impl Dispatcher {
    pub fn new(store: Arc<PolicyStore>, runner: Arc<dyn ProcessRunner>) -> Self {
        Self { store, runner }
    }

    pub fn store(&self) -> &Arc<PolicyStore> {
        &self.store
    }

    /// Gate `command` and run it if allowed. Refusals and failures come back
    /// inside the invocation's result; this never errors.
    pub async fn dispatch(
        &self,
        call_id: &str,
        command: &str,
        cwd: &Path,
        timeout: Duration,
    ) -> ToolInvocation {
        let started_at = Utc::now();

        let decision = match SecurityGate::authorize(command, &self.store) {
            Ok(decision) => decision,
            Err(e) => {
                warn!(error = %e, "policy store update failed, refusing command");
                Decision::blocked(BlockReason::PolicyUnavailable {
                    detail: e.to_string(),
                })
            }
        };

        if let Decision::Blocked { reason } = &decision {
            let result = ToolResult::failure(call_id, reason.to_string(), EXIT_BLOCKED, 0);
            return ToolInvocation::new(call_id, command, decision, started_at).with_result(result);
        }

        info!(command = %command, cwd = %cwd.display(), "running command");
        let result = match self.runner.run(command, cwd, timeout).await {
            Ok(output) => ToolResult {
                call_id: call_id.to_string(),
                stdout: output.stdout,
                stderr: output.stderr,
                exit_code: output.exit_code,
                duration_ms: output.duration_ms,
            },
            Err(e) => {
                let elapsed = (Utc::now() - started_at).num_milliseconds().max(0) as u64;
                let exit_code = match e {
                    BashError::Timeout(_) => EXIT_TIMEOUT,
                    _ => EXIT_NOT_FOUND,
                };
                warn!(command = %command, error = %e, "command did not complete");
                ToolResult::failure(call_id, e.to_string(), exit_code, elapsed)
            }
        };

        ToolInvocation::new(call_id, command, decision, started_at).with_result(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flourish_core::{MutationPolicy, SecurityPolicy};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingRunner {
        commands: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ProcessRunner for RecordingRunner {
        async fn run(
            &self,
            command: &str,
            _cwd: &Path,
            _timeout: Duration,
        ) -> Result<ProcessOutput, BashError> {
            self.commands.lock().unwrap().push(command.to_string());
            if command.starts_with("missing") {
                return Err(BashError::SpawnFailed("No such file or directory".into()));
            }
            Ok(ProcessOutput {
                stdout: format!("ran {}", command),
                stderr: String::new(),
                exit_code: 0,
                duration_ms: 3,
            })
        }
    }

    fn dispatcher(policy: SecurityPolicy) -> (Dispatcher, Arc<RecordingRunner>) {
        let runner = Arc::new(RecordingRunner::default());
        let store = Arc::new(PolicyStore::in_memory(policy));
        (Dispatcher::new(store, runner.clone()), runner)
    }

    #[tokio::test]
    async fn test_blocked_command_is_not_run() {
        let (dispatcher, runner) = dispatcher(SecurityPolicy::new().with_blacklist(["rm"]));
        let inv = dispatcher
            .dispatch("c1", "rm -rf /", Path::new("."), Duration::from_secs(1))
            .await;

        assert!(inv.decision.is_blocked());
        assert!(!inv.was_executed());
        let result = inv.result.unwrap();
        assert_eq!(result.exit_code, EXIT_BLOCKED);
        assert!(result.stderr.contains("blacklisted"));
        assert!(runner.commands.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_allowed_command_runs() {
        let (dispatcher, runner) = dispatcher(SecurityPolicy::new().with_allowlist(["ls"]));
        let inv = dispatcher
            .dispatch("c1", "ls -la", Path::new("."), Duration::from_secs(1))
            .await;

        assert_eq!(inv.decision, Decision::Allowed);
        assert!(inv.was_executed());
        assert_eq!(inv.duration_ms, 3);
        assert_eq!(inv.result.unwrap().stdout, "ran ls -la");
        assert_eq!(runner.commands.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_auto_add_mutates_store_once() {
        let (dispatcher, _) = dispatcher(
            SecurityPolicy::new()
                .with_allowlist(["ls"])
                .with_mutation(MutationPolicy::AutoAdd),
        );

        let first = dispatcher
            .dispatch("c1", "curl http://x", Path::new("."), Duration::from_secs(1))
            .await;
        assert!(matches!(first.decision, Decision::AllowedWithMutation { .. }));
        assert!(dispatcher.store().read().is_allowlisted("curl"));

        let second = dispatcher
            .dispatch("c2", "curl http://x", Path::new("."), Duration::from_secs(1))
            .await;
        assert_eq!(second.decision, Decision::Allowed);
    }

    #[tokio::test]
    async fn test_spawn_failure_is_data() {
        let (dispatcher, _) = dispatcher(SecurityPolicy::new());
        let inv = dispatcher
            .dispatch("c1", "missing-binary", Path::new("."), Duration::from_secs(1))
            .await;

        let result = inv.result.unwrap();
        assert_eq!(result.exit_code, EXIT_NOT_FOUND);
        assert!(result.stderr.contains("Failed to spawn"));
    }
}
