#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use flourish_core::{SessionId, ToolInvocation, Turn, TurnId};
use flourish_llms::ScriptedProvider;
use flourish_runtime::{AuditSink, Runtime, RuntimeConfig};
use flourish_toolbus::{BashError, ProcessOutput, ProcessRunner};

/// Process runner that records what it was asked to run. Commands starting
/// with `hang` never finish; dropping them sets `killed`.
#[derive(Default)]
pub struct FakeRunner {
    pub calls: Mutex<Vec<(String, PathBuf)>>,
    pub killed: Arc<AtomicBool>,
}

impl FakeRunner {
    pub fn commands(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(c, _)| c.clone()).collect()
    }

    pub fn cwds(&self) -> Vec<PathBuf> {
        self.calls.lock().unwrap().iter().map(|(_, d)| d.clone()).collect()
    }

    pub fn was_killed(&self) -> bool {
        self.killed.load(Ordering::SeqCst)
    }
}

struct KillFlag(Arc<AtomicBool>);

impl Drop for KillFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ProcessRunner for FakeRunner {
    async fn run(
        &self,
        command: &str,
        cwd: &Path,
        _timeout: Duration,
    ) -> Result<ProcessOutput, BashError> {
        self.calls
            .lock()
            .unwrap()
            .push((command.to_string(), cwd.to_path_buf()));

        if command.starts_with("hang") {
            let _flag = KillFlag(Arc::clone(&self.killed));
            futures::future::pending::<()>().await;
        }

        Ok(ProcessOutput {
            stdout: format!("ran {}\n", command),
            stderr: String::new(),
            exit_code: 0,
            duration_ms: 1,
        })
    }
}

/// Audit sink that keeps everything it receives.
#[derive(Default)]
pub struct RecordingAudit {
    pub started: Mutex<Vec<TurnId>>,
    pub invocations: Mutex<Vec<ToolInvocation>>,
    pub finished: Mutex<Vec<Turn>>,
    pub closed: Mutex<Vec<SessionId>>,
}

impl AuditSink for RecordingAudit {
    fn turn_started(&self, _session: &SessionId, turn: &Turn) {
        self.started.lock().unwrap().push(turn.id.clone());
    }

    fn tool_invocation(&self, _session: &SessionId, _turn: &TurnId, invocation: &ToolInvocation) {
        self.invocations.lock().unwrap().push(invocation.clone());
    }

    fn turn_finished(&self, _session: &SessionId, turn: &Turn) {
        self.finished.lock().unwrap().push(turn.clone());
    }

    fn session_closed(&self, session: &SessionId) {
        self.closed.lock().unwrap().push(session.clone());
    }
}

pub fn config() -> RuntimeConfig {
    RuntimeConfig::new(std::env::temp_dir())
        .with_model("test-model")
        .with_default_blacklist(["rm", "chmod 777"])
}

pub fn runtime(
    provider: &Arc<ScriptedProvider>,
    runner: &Arc<FakeRunner>,
    config: RuntimeConfig,
) -> Runtime {
    Runtime::with_components(config, provider.clone(), runner.clone()).unwrap()
}
