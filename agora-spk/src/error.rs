//! Error types for agora-spk

use agora_core::Error as CoreError;
use thiserror::Error;

/// Speech resolution and playback errors
#[derive(Error, Debug)]
pub enum SpeechError {
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Synthesis error: {0}")]
    Synthesis(String),

    #[error("Playback error: {0}")]
    Playback(String),

    #[error("No speech tier produced audio: {0}")]
    Unavailable(String),

    #[error("Utterance has neither text nor audio")]
    EmptyUtterance,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<SpeechError> for CoreError {
    fn from(err: SpeechError) -> Self {
        CoreError::Speech(err.to_string())
    }
}
