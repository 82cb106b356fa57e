//! Resolved speech audio and the handles used to play it

use crate::decoder::DecodedClip;
use crate::error::SpeechError;
use crate::output::{ActivePlayback, AudioOutput};
use agora_core::AmplitudeEnvelope;
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Tier that produced a [`ResolvedAudio`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioSource {
    Backend,
    RemoteSynthesis,
    LocalSynthesis,
}

impl fmt::Display for AudioSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioSource::Backend => write!(f, "backend"),
            AudioSource::RemoteSynthesis => write!(f, "remote_synthesis"),
            AudioSource::LocalSynthesis => write!(f, "local_synthesis"),
        }
    }
}

/// Control over one playable piece of speech.
///
/// `stop` is idempotent and may be called on a handle that never started.
/// A stopped handle cannot be started again.
pub trait PlaybackHandle: Send + Sync {
    fn play(&self) -> Result<(), SpeechError>;

    fn stop(&self);

    fn is_playing(&self) -> bool;
}

/// Result of resolving an utterance
#[derive(Clone)]
pub struct ResolvedAudio {
    pub handle: Arc<dyn PlaybackHandle>,
    pub duration: Duration,
    pub source: AudioSource,
    /// Loudness over time, when the audio was decoded up front
    pub envelope: Option<Arc<AmplitudeEnvelope>>,
}

impl ResolvedAudio {
    pub fn duration_secs(&self) -> f64 {
        self.duration.as_secs_f64()
    }
}

impl fmt::Debug for ResolvedAudio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedAudio")
            .field("duration", &self.duration)
            .field("source", &self.source)
            .field("envelope", &self.envelope.as_ref().map(|e| e.len()))
            .finish()
    }
}

enum ClipState {
    Ready,
    Playing(Box<dyn ActivePlayback>),
    Stopped,
}

/// Handle for a decoded clip played through an [`AudioOutput`]
pub struct ClipHandle {
    clip: Arc<DecodedClip>,
    output: Arc<dyn AudioOutput>,
    state: Mutex<ClipState>,
}

impl ClipHandle {
    pub fn new(clip: Arc<DecodedClip>, output: Arc<dyn AudioOutput>) -> Self {
        Self {
            clip,
            output,
            state: Mutex::new(ClipState::Ready),
        }
    }
}

impl PlaybackHandle for ClipHandle {
    fn play(&self) -> Result<(), SpeechError> {
        let mut state = self.state.lock();
        match *state {
            ClipState::Ready => {
                let playback = self.output.start(self.clip.clone())?;
                debug!(output = self.output.name(), "clip playback started");
                *state = ClipState::Playing(playback);
                Ok(())
            }
            ClipState::Playing(_) => Ok(()),
            ClipState::Stopped => Err(SpeechError::Playback("handle was stopped".to_string())),
        }
    }

    fn stop(&self) {
        let mut state = self.state.lock();
        if let ClipState::Playing(ref playback) = *state {
            playback.stop();
        }
        *state = ClipState::Stopped;
    }

    fn is_playing(&self) -> bool {
        match *self.state.lock() {
            ClipState::Playing(ref playback) => !playback.is_finished(),
            _ => false,
        }
    }
}
