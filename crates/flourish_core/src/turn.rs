use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{FlourishError, Result, TurnError};
use crate::event::Event;
use crate::tool_call::ToolInvocation;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TurnId(pub String);

impl TurnId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TurnId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TurnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnState {
    #[default]
    Pending,
    Streaming,
    ToolPending,
    Completed,
    Failed,
}

impl TurnState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnState::Pending => "pending",
            TurnState::Streaming => "streaming",
            TurnState::ToolPending => "tool_pending",
            TurnState::Completed => "completed",
            TurnState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TurnState::Completed | TurnState::Failed)
    }

    /// Forward-only transitions. `ToolPending` is a sub-state of `Streaming`
    /// and is the only state allowed to go back to it.
    pub fn can_transition_to(&self, next: TurnState) -> bool {
        use TurnState::*;
        matches!(
            (self, next),
            (Pending, Streaming)
                | (Pending, Failed)
                | (Streaming, ToolPending)
                | (Streaming, Completed)
                | (Streaming, Failed)
                | (ToolPending, Streaming)
                | (ToolPending, Failed)
        )
    }
}

impl std::fmt::Display for TurnState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolPart {
    pub call_id: String,
    pub name: String,
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl ToolPart {
    pub fn is_finished(&self) -> bool {
        self.exit_code.is_some()
    }
}

/// One entry of the ordered output a Turn presents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputPart {
    Text { content: String },
    Thought { content: String },
    Tool(ToolPart),
}

impl OutputPart {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            OutputPart::Text { content } => Some(content),
            _ => None,
        }
    }
}

/// The assembled outcome of a Completed Turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TurnResult {
    pub final_text: String,
    pub parts: Vec<OutputPart>,
    pub invocations: Vec<ToolInvocation>,
}

impl TurnResult {
    pub fn tool_parts(&self) -> impl Iterator<Item = &ToolPart> {
        self.parts.iter().filter_map(|p| match p {
            OutputPart::Tool(tool) => Some(tool),
            _ => None,
        })
    }
}

/// A Turn record. Only the runner that owns it mutates it, and it is frozen
/// once it reaches `Completed` or `Failed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub id: TurnId,
    pub input: String,
    pub events: Vec<Event>,
    pub state: TurnState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<TurnResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<TurnError>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Turn {
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            id: TurnId::new(),
            input: input.into(),
            events: Vec::new(),
            state: TurnState::Pending,
            result: None,
            error: None,
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn advance(&mut self, next: TurnState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(FlourishError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }

    pub fn record_event(&mut self, event: Event) -> Result<()> {
        if self.state.is_terminal() {
            return Err(FlourishError::InvalidTransition {
                from: self.state,
                to: self.state,
            });
        }
        self.events.push(event);
        Ok(())
    }

    pub fn complete(&mut self, result: TurnResult) -> Result<()> {
        self.advance(TurnState::Completed)?;
        self.result = Some(result);
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    /// Fails the turn. Any partial result is dropped.
    pub fn fail(&mut self, error: TurnError) -> Result<()> {
        self.advance(TurnState::Failed)?;
        self.result = None;
        self.error = Some(error);
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn final_text(&self) -> Option<&str> {
        self.result.as_ref().map(|r| r.final_text.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_state_display() {
        assert_eq!(TurnState::ToolPending.to_string(), "tool_pending");
        assert_eq!(TurnState::Completed.to_string(), "completed");
    }

    #[test]
    fn test_turn_happy_path() {
        let mut turn = Turn::new("list files");
        assert_eq!(turn.state, TurnState::Pending);

        turn.advance(TurnState::Streaming).unwrap();
        turn.record_event(Event::text("hi")).unwrap();
        turn.advance(TurnState::ToolPending).unwrap();
        turn.advance(TurnState::Streaming).unwrap();
        turn.complete(TurnResult {
            final_text: "hi".to_string(),
            ..Default::default()
        })
        .unwrap();

        assert!(turn.is_finished());
        assert_eq!(turn.final_text(), Some("hi"));
        assert!(turn.finished_at.is_some());
    }

    #[test]
    fn test_turn_rejects_backwards_transition() {
        let mut turn = Turn::new("x");
        turn.advance(TurnState::Streaming).unwrap();
        turn.complete(TurnResult::default()).unwrap();

        let err = turn.advance(TurnState::Streaming).unwrap_err();
        assert!(matches!(err, FlourishError::InvalidTransition { .. }));
        assert!(turn.record_event(Event::text("late")).is_err());
    }

    #[test]
    fn test_turn_cannot_complete_from_pending() {
        let mut turn = Turn::new("x");
        assert!(turn.complete(TurnResult::default()).is_err());
        assert_eq!(turn.state, TurnState::Pending);
    }

    #[test]
    fn test_turn_fail_discards_partial_result() {
        let mut turn = Turn::new("x");
        turn.advance(TurnState::Streaming).unwrap();
        turn.result = Some(TurnResult {
            final_text: "partial".to_string(),
            ..Default::default()
        });
        turn.advance(TurnState::ToolPending).unwrap();
        turn.fail(TurnError::Cancelled).unwrap();

        assert_eq!(turn.state, TurnState::Failed);
        assert!(turn.result.is_none());
        assert_eq!(turn.error, Some(TurnError::Cancelled));
    }

    #[test]
    fn test_pending_turn_can_fail() {
        let mut turn = Turn::new("x");
        turn.fail(TurnError::SessionClosed).unwrap();
        assert!(turn.is_finished());
    }

    #[test]
    fn test_output_part_serialization() {
        let part = OutputPart::Tool(ToolPart {
            call_id: "c1".to_string(),
            name: "execute_bash".to_string(),
            command: "ls".to_string(),
            exit_code: Some(0),
            output: Some("a\n".to_string()),
        });
        let json = serde_json::to_string(&part).unwrap();
        assert!(json.contains(r#""type":"tool""#));
        assert!(json.contains(r#""command":"ls""#));
        assert_eq!(OutputPart::Text { content: "x".into() }.as_text(), Some("x"));
    }
}
