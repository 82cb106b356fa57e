//! Text to speak, optionally with audio already rendered by the backend

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::Bytes;
use std::time::Duration;
use tracing::warn;

/// Speaking rate assumed when no real timing is available
const WORDS_PER_SECOND: f64 = 2.0;

#[derive(Debug, Clone, Default)]
pub struct Utterance {
    pub text: String,
    pub precomputed_audio: Option<Bytes>,
}

impl Utterance {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            precomputed_audio: None,
        }
    }

    pub fn with_audio(mut self, audio: impl Into<Bytes>) -> Self {
        self.precomputed_audio = Some(audio.into());
        self
    }

    /// Build from a wire message. Undecodable base64 is logged and treated as
    /// absent so resolution falls through to synthesis.
    pub fn from_base64(text: impl Into<String>, audio_b64: Option<&str>) -> Self {
        let utterance = Self::new(text);
        match audio_b64.map(str::trim).filter(|s| !s.is_empty()) {
            Some(encoded) => match STANDARD.decode(encoded) {
                Ok(bytes) => utterance.with_audio(bytes),
                Err(e) => {
                    warn!(error = %e, "discarding undecodable audio_b64");
                    utterance
                }
            },
            None => utterance,
        }
    }

    pub fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }

    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }

    /// Duration estimate at two words per second
    pub fn estimated_duration(&self) -> Duration {
        Duration::from_secs_f64(self.word_count() as f64 / WORDS_PER_SECOND)
    }
}
