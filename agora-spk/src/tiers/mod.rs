//! Ranked strategies of the speech fallback chain

pub mod backend;
pub mod remote;
pub mod local;

pub use backend::BackendAudioTier;
pub use remote::RemoteSynthesisTier;
pub use local::LocalSynthesisTier;

use crate::audio::{AudioSource, ClipHandle, ResolvedAudio};
use crate::decoder::{decode_clip, DecodedClip};
use crate::error::SpeechError;
use crate::output::AudioOutput;
use crate::utterance::Utterance;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;

/// What one tier made of an utterance
#[derive(Debug)]
pub enum TierOutcome {
    Resolved(ResolvedAudio),
    /// The tier does not apply (no input for it, not configured)
    Skipped(String),
    /// The tier applied and failed; the next tier gets a chance
    Failed(SpeechError),
}

#[async_trait]
pub trait SpeechTier: Send + Sync {
    fn name(&self) -> &str;

    fn source(&self) -> AudioSource;

    async fn resolve(&self, utterance: &Utterance) -> TierOutcome;
}

/// Decode on the blocking pool; symphonia is synchronous
pub(crate) async fn decode_off_thread(
    bytes: Bytes,
    envelope_window: Duration,
) -> Result<DecodedClip, SpeechError> {
    tokio::task::spawn_blocking(move || decode_clip(bytes, envelope_window))
        .await
        .map_err(|e| SpeechError::Decode(format!("decoder task failed: {}", e)))?
}

/// Wrap a decoded clip. A clip reporting no length is scheduled with the
/// word-count estimate instead.
pub(crate) fn clip_audio(
    clip: DecodedClip,
    output: &Arc<dyn AudioOutput>,
    source: AudioSource,
    utterance: &Utterance,
) -> ResolvedAudio {
    let duration = if clip.duration.is_zero() {
        utterance.estimated_duration()
    } else {
        clip.duration
    };
    let envelope = if clip.envelope.is_silent() {
        None
    } else {
        Some(Arc::new(clip.envelope.clone()))
    };
    ResolvedAudio {
        handle: Arc::new(ClipHandle::new(Arc::new(clip), output.clone())),
        duration,
        source,
        envelope,
    }
}
