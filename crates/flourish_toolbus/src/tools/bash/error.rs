use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BashError {
    #[error("Command timed out after {0:?}")]
    Timeout(Duration),

    #[error("Working directory does not exist: {0}")]
    MissingWorkingDir(String),

    #[error("Failed to spawn command: {0}")]
    SpawnFailed(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
