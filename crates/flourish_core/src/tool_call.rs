use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::policy::Decision;

/// A tool call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub call_id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

impl ToolCall {
    pub fn new(
        call_id: impl Into<String>,
        name: impl Into<String>,
        arguments: serde_json::Value,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// String argument lookup, `None` when missing or not a string.
    pub fn str_arg(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).and_then(|v| v.as_str())
    }
}

/// Outcome of one tool call, fed back to the model and the assembler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub call_id: String,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub duration_ms: u64,
}

impl ToolResult {
    pub fn success(call_id: impl Into<String>, stdout: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            call_id: call_id.into(),
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: 0,
            duration_ms,
        }
    }

    pub fn failure(
        call_id: impl Into<String>,
        stderr: impl Into<String>,
        exit_code: i32,
        duration_ms: u64,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            stdout: String::new(),
            stderr: stderr.into(),
            exit_code,
            duration_ms,
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }

    /// The payload handed back to the model as the tool message content.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "status": if self.is_success() { "success" } else { "error" },
            "stdout": self.stdout,
            "stderr": self.stderr,
            "exit_code": self.exit_code,
            "duration_ms": self.duration_ms,
        })
    }
}

/// Audit record for one attempted command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub call_id: String,
    pub command: String,
    pub decision: Decision,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ToolResult>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl ToolInvocation {
    pub fn new(
        call_id: impl Into<String>,
        command: impl Into<String>,
        decision: Decision,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            command: command.into(),
            decision,
            result: None,
            started_at,
            duration_ms: 0,
        }
    }

    pub fn with_result(mut self, result: ToolResult) -> Self {
        self.duration_ms = result.duration_ms;
        self.result = Some(result);
        self
    }

    pub fn was_executed(&self) -> bool {
        !self.decision.is_blocked() && self.result.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::BlockReason;

    #[test]
    fn test_tool_call_str_arg() {
        let call = ToolCall::new("c1", "execute_bash", serde_json::json!({"cmd": "ls"}));
        assert_eq!(call.str_arg("cmd"), Some("ls"));
        assert_eq!(call.str_arg("missing"), None);
    }

    #[test]
    fn test_tool_result_success() {
        let result = ToolResult::success("c1", "hello\n", 12);
        assert!(result.is_success());
        assert_eq!(result.to_json()["status"], "success");
        assert_eq!(result.to_json()["exit_code"], 0);
    }

    #[test]
    fn test_tool_result_failure() {
        let result = ToolResult::failure("c1", "no such file", 2, 3);
        assert!(!result.is_success());
        assert_eq!(result.to_json()["status"], "error");
        assert_eq!(result.to_json()["stderr"], "no such file");
    }

    #[test]
    fn test_invocation_blocked_is_not_executed() {
        let inv = ToolInvocation::new(
            "c1",
            "rm -rf /",
            Decision::blocked(BlockReason::EmptyCommand),
            Utc::now(),
        )
        .with_result(ToolResult::failure("c1", "blocked", 126, 0));
        assert!(!inv.was_executed());
    }

    #[test]
    fn test_invocation_with_result_copies_duration() {
        let inv = ToolInvocation::new("c1", "ls", Decision::Allowed, Utc::now())
            .with_result(ToolResult::success("c1", "a\nb\n", 40));
        assert!(inv.was_executed());
        assert_eq!(inv.duration_ms, 40);
    }

    #[test]
    fn test_invocation_serialization() {
        let inv = ToolInvocation::new("c1", "ls", Decision::Allowed, Utc::now());
        let json = serde_json::to_string(&inv).unwrap();
        assert!(json.contains(r#""command":"ls"#));
        assert!(!json.contains("result"));

        let decoded: ToolInvocation = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, inv);
    }
}
