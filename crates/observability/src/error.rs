use thiserror::Error;

#[derive(Error, Debug)]
pub enum ObservabilityError {
    #[error("invalid log filter {filter:?}: {reason}")]
    InvalidFilter { filter: String, reason: String },

    #[error("span exporter: {0}")]
    Exporter(String),

    /// Another global subscriber won the race.
    #[error("subscriber already installed: {0}")]
    AlreadyInstalled(String),
}
