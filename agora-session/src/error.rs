//! Error types for agora-session

use agora_core::Error as CoreError;
use thiserror::Error;

/// Session errors
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Gave up reconnecting after {attempts} attempts")]
    Terminal { attempts: u32 },

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),
}

impl From<SessionError> for CoreError {
    fn from(err: SessionError) -> Self {
        CoreError::Session(err.to_string())
    }
}
