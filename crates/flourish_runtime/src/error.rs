//! Runtime error types

use thiserror::Error;

/// Errors raised while building a runtime. Failures of an individual turn
/// are reported as `flourish_core::TurnError` instead.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(#[from] flourish_llms::Error),

    #[error("Policy error: {0}")]
    Policy(#[from] flourish_core::FlourishError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RuntimeError>;
