use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::turn::TurnState;

#[derive(Error, Debug)]
pub enum FlourishError {
    #[error("policy error: {0}")]
    Policy(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("invalid turn transition: {from} -> {to}")]
    InvalidTransition { from: TurnState, to: TurnState },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, FlourishError>;

/// Why a model provider failed. Kept distinct all the way to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderCause {
    Network,
    Auth,
    RateLimit,
    Timeout,
    Server,
    InvalidRequest,
    Unknown,
}

impl ProviderCause {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderCause::Network => "network",
            ProviderCause::Auth => "auth",
            ProviderCause::RateLimit => "rate_limit",
            ProviderCause::Timeout => "timeout",
            ProviderCause::Server => "server",
            ProviderCause::InvalidRequest => "invalid_request",
            ProviderCause::Unknown => "unknown",
        }
    }

    /// Map a provider-reported error code onto a cause. Unrecognized codes are `Unknown`.
    pub fn from_code(code: &str) -> Self {
        match code.to_lowercase().as_str() {
            "network" | "connection" | "connection_error" => ProviderCause::Network,
            "auth" | "authentication" | "authentication_error" | "permission_denied"
            | "invalid_api_key" => ProviderCause::Auth,
            "rate_limit" | "rate_limit_exceeded" | "rate_limit_error" | "429" => {
                ProviderCause::RateLimit
            }
            "timeout" | "deadline_exceeded" => ProviderCause::Timeout,
            "server" | "server_error" | "overloaded" | "overloaded_error" | "internal_error" => {
                ProviderCause::Server
            }
            "invalid_request" | "invalid_request_error" | "bad_request" => {
                ProviderCause::InvalidRequest
            }
            _ => ProviderCause::Unknown,
        }
    }

    /// Map an HTTP status code returned by a provider endpoint onto a cause.
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => ProviderCause::Auth,
            408 => ProviderCause::Timeout,
            429 => ProviderCause::RateLimit,
            400..=499 => ProviderCause::InvalidRequest,
            500..=599 => ProviderCause::Server,
            _ => ProviderCause::Unknown,
        }
    }
}

impl std::fmt::Display for ProviderCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that end a Turn in `Failed`.
///
/// Security refusals and failed commands are not here: they travel inside
/// the turn result as data so the model can react to them.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TurnError {
    #[error("provider error ({cause}): {message}")]
    Provider {
        cause: ProviderCause,
        message: String,
    },

    #[error("protocol error: {detail}")]
    Protocol { detail: String },

    #[error("turn cancelled")]
    Cancelled,

    #[error("session is closed")]
    SessionClosed,
}

impl TurnError {
    pub fn provider(cause: ProviderCause, message: impl Into<String>) -> Self {
        TurnError::Provider {
            cause,
            message: message.into(),
        }
    }

    pub fn protocol(detail: impl Into<String>) -> Self {
        TurnError::Protocol {
            detail: detail.into(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, TurnError::Cancelled)
    }

    pub fn provider_cause(&self) -> Option<ProviderCause> {
        match self {
            TurnError::Provider { cause, .. } => Some(*cause),
            _ => None,
        }
    }
}
