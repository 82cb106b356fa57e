//! Error types for agora-stage

use agora_core::Error as CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<StageError> for CoreError {
    fn from(err: StageError) -> Self {
        match err {
            StageError::Io(e) => CoreError::Io(e),
            other => CoreError::Configuration(other.to_string()),
        }
    }
}
