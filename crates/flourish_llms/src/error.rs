//! Error types for provider construction and streaming.

use flourish_core::ProviderCause;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Missing API key for provider: {0}")]
    MissingApiKey(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Provider error ({cause}): {message}")]
    Provider { cause: ProviderCause, message: String },

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn stream_error(message: impl Into<String>) -> Self {
        Error::Stream(message.into())
    }

    pub fn provider_error(cause: ProviderCause, message: impl Into<String>) -> Self {
        Error::Provider {
            cause,
            message: message.into(),
        }
    }

    /// The distinguishable cause carried up to the turn.
    pub fn cause(&self) -> ProviderCause {
        match self {
            Error::MissingApiKey(_) => ProviderCause::Auth,
            Error::Http(e) => {
                if e.is_timeout() {
                    ProviderCause::Timeout
                } else if let Some(status) = e.status() {
                    ProviderCause::from_status(status.as_u16())
                } else if e.is_connect() || e.is_request() {
                    ProviderCause::Network
                } else {
                    ProviderCause::Unknown
                }
            }
            Error::Status { status, .. } => ProviderCause::from_status(*status),
            Error::Provider { cause, .. } => *cause,
            Error::Stream(_) => ProviderCause::Network,
            Error::InvalidResponse(_) | Error::Json(_) => ProviderCause::Unknown,
        }
    }
}
