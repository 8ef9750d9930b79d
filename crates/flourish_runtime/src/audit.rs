//! Audit trail of sessions, turns and executed commands.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use flourish_core::{SessionId, ToolInvocation, Turn, TurnId};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::assembler::truncate_chars;

const RESULT_LIMIT: usize = 1000;
const CONTENT_LIMIT: usize = 2000;

/// Receives every command invocation and the terminal state of every turn.
///
/// Sinks must not fail the turn: write errors are logged and dropped.
pub trait AuditSink: Send + Sync {
    fn session_started(&self, _session: &SessionId) {}

    fn turn_started(&self, session: &SessionId, turn: &Turn);

    fn tool_invocation(&self, session: &SessionId, turn: &TurnId, invocation: &ToolInvocation);

    fn turn_finished(&self, session: &SessionId, turn: &Turn);

    fn session_closed(&self, _session: &SessionId) {}
}

/// Emits audit records as `tracing` events under the `flourish::audit` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn session_started(&self, session_id: &SessionId) {
        info!(target: "flourish::audit", { session.id = %session_id }, "session started");
    }

    fn turn_started(&self, session_id: &SessionId, record: &Turn) {
        info!(
            target: "flourish::audit",
            {
                session.id = %session_id,
                turn.id = %record.id,
                input_chars = record.input.chars().count(),
            },
            "turn started"
        );
    }

    fn tool_invocation(&self, session_id: &SessionId, turn_id: &TurnId, invocation: &ToolInvocation) {
        info!(
            target: "flourish::audit",
            {
                session.id = %session_id,
                turn.id = %turn_id,
                call_id = %invocation.call_id,
                command = %invocation.command,
                blocked = invocation.decision.is_blocked(),
                exit_code = invocation.result.as_ref().map(|r| r.exit_code),
                duration_ms = invocation.duration_ms,
            },
            "tool invocation"
        );
    }

    fn turn_finished(&self, session_id: &SessionId, record: &Turn) {
        match &record.error {
            Some(error) => warn!(
                target: "flourish::audit",
                {
                    session.id = %session_id,
                    turn.id = %record.id,
                    state = %record.state,
                    error = %error,
                },
                "turn finished"
            ),
            None => info!(
                target: "flourish::audit",
                {
                    session.id = %session_id,
                    turn.id = %record.id,
                    state = %record.state,
                },
                "turn finished"
            ),
        }
    }

    fn session_closed(&self, session_id: &SessionId) {
        info!(target: "flourish::audit", { session.id = %session_id }, "session closed");
    }
}

/// Appends one JSON object per line to `session_<timestamp>.log`.
pub struct JsonlAuditSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonlAuditSink {
    /// Create `dir` if needed and open a new log file in it.
    pub fn create(dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let name = format!("session_{}.log", Utc::now().format("%Y%m%d_%H%M%S_%3f"));
        Self::open(dir.join(name))
    }

    /// Append to an explicit file.
    pub fn open(path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let path = path.into();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, mut entry: Value) {
        if let Value::Object(map) = &mut entry {
            map.insert("timestamp".to_string(), json!(Utc::now().to_rfc3339()));
        }
        let mut file = self.file.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = writeln!(file, "{}", entry).and_then(|_| file.flush()) {
            warn!(path = %self.path.display(), error = %e, "failed to write audit entry");
        }
    }
}

impl AuditSink for JsonlAuditSink {
    fn session_started(&self, session: &SessionId) {
        self.write(json!({
            "event": "session_start",
            "session_id": session.as_str(),
        }));
    }

    fn turn_started(&self, session: &SessionId, turn: &Turn) {
        self.write(json!({
            "event": "turn_start",
            "session_id": session.as_str(),
            "turn_id": turn.id.as_str(),
            "role": "user",
            "content": truncate_chars(&turn.input, CONTENT_LIMIT),
        }));
    }

    fn tool_invocation(&self, session: &SessionId, turn: &TurnId, invocation: &ToolInvocation) {
        let (result, exit_code, success) = match &invocation.result {
            Some(r) => {
                let text = if r.stderr.is_empty() {
                    r.stdout.clone()
                } else {
                    format!("{}{}", r.stdout, r.stderr)
                };
                (
                    truncate_chars(&text, RESULT_LIMIT),
                    Some(r.exit_code),
                    r.is_success(),
                )
            }
            None => (String::new(), None, false),
        };
        self.write(json!({
            "event": "tool_call",
            "session_id": session.as_str(),
            "turn_id": turn.as_str(),
            "call_id": invocation.call_id,
            "command": invocation.command,
            "decision": invocation.decision,
            "exit_code": exit_code,
            "duration_ms": invocation.duration_ms,
            "result": result,
            "success": success,
        }));
    }

    fn turn_finished(&self, session: &SessionId, turn: &Turn) {
        let content = turn
            .final_text()
            .map(|text| truncate_chars(text, CONTENT_LIMIT));
        self.write(json!({
            "event": "turn_end",
            "session_id": session.as_str(),
            "turn_id": turn.id.as_str(),
            "role": "agent",
            "state": turn.state.as_str(),
            "content": content,
            "error": turn.error.as_ref().map(|e| e.to_string()),
        }));
    }

    fn session_closed(&self, session: &SessionId) {
        self.write(json!({
            "event": "session_end",
            "session_id": session.as_str(),
        }));
    }
}

/// Forwards every record to each inner sink in order.
#[derive(Default, Clone)]
pub struct FanoutAuditSink {
    sinks: Vec<Arc<dyn AuditSink>>,
}

impl FanoutAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl AuditSink for FanoutAuditSink {
    fn session_started(&self, session: &SessionId) {
        self.sinks.iter().for_each(|s| s.session_started(session));
    }

    fn turn_started(&self, session: &SessionId, turn: &Turn) {
        self.sinks.iter().for_each(|s| s.turn_started(session, turn));
    }

    fn tool_invocation(&self, session: &SessionId, turn: &TurnId, invocation: &ToolInvocation) {
        self.sinks
            .iter()
            .for_each(|s| s.tool_invocation(session, turn, invocation));
    }

    fn turn_finished(&self, session: &SessionId, turn: &Turn) {
        self.sinks.iter().for_each(|s| s.turn_finished(session, turn));
    }

    fn session_closed(&self, session: &SessionId) {
        self.sinks.iter().for_each(|s| s.session_closed(session));
    }
}
