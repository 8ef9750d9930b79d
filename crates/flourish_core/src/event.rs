use serde::{Deserialize, Serialize};

use crate::error::{ProviderCause, TurnError};
use crate::tool_call::{ToolCall, ToolResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    ToolCalls,
    Length,
    Other,
}

impl FinishReason {
    pub fn from_raw(raw: &str) -> Self {
        match raw {
            "stop" | "end_turn" | "stop_sequence" => FinishReason::Stop,
            "tool_calls" | "tool_use" => FinishReason::ToolCalls,
            "length" | "max_tokens" => FinishReason::Length,
            _ => FinishReason::Other,
        }
    }
}

/// Marker ending a provider stream, successfully or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TerminalMarker {
    Finished { reason: FinishReason },
    ProviderFailure { cause: ProviderCause, message: String },
    Malformed { detail: String },
}

impl TerminalMarker {
    pub fn is_error(&self) -> bool {
        !matches!(self, TerminalMarker::Finished { .. })
    }

    /// The Turn failure this marker stands for, if any.
    pub fn to_error(&self) -> Option<TurnError> {
        match self {
            TerminalMarker::Finished { .. } => None,
            TerminalMarker::ProviderFailure { cause, message } => {
                Some(TurnError::provider(*cause, message.clone()))
            }
            TerminalMarker::Malformed { detail } => Some(TurnError::protocol(detail.clone())),
        }
    }
}

/// Canonical event, after normalization of whatever the provider sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    Text { content: String },

    Thought { content: String },

    ToolCall { call: ToolCall },

    ToolResult { result: ToolResult },

    Terminal { marker: TerminalMarker },
}

impl Event {
    pub fn text(content: impl Into<String>) -> Self {
        Event::Text {
            content: content.into(),
        }
    }

    pub fn thought(content: impl Into<String>) -> Self {
        Event::Thought {
            content: content.into(),
        }
    }

    pub fn tool_call(call: ToolCall) -> Self {
        Event::ToolCall { call }
    }

    pub fn tool_result(result: ToolResult) -> Self {
        Event::ToolResult { result }
    }

    pub fn finished(reason: FinishReason) -> Self {
        Event::Terminal {
            marker: TerminalMarker::Finished { reason },
        }
    }

    pub fn provider_failure(cause: ProviderCause, message: impl Into<String>) -> Self {
        Event::Terminal {
            marker: TerminalMarker::ProviderFailure {
                cause,
                message: message.into(),
            },
        }
    }

    pub fn malformed(detail: impl Into<String>) -> Self {
        Event::Terminal {
            marker: TerminalMarker::Malformed {
                detail: detail.into(),
            },
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Event::Terminal { .. })
    }
}
