//! Audio rendered by the conversation backend

use super::{clip_audio, decode_off_thread, SpeechTier, TierOutcome};
use crate::audio::AudioSource;
use crate::output::AudioOutput;
use crate::utterance::Utterance;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub struct BackendAudioTier {
    output: Arc<dyn AudioOutput>,
    envelope_window: Duration,
}

impl BackendAudioTier {
    pub fn new(output: Arc<dyn AudioOutput>, envelope_window: Duration) -> Self {
        Self {
            output,
            envelope_window,
        }
    }
}

#[async_trait]
impl SpeechTier for BackendAudioTier {
    fn name(&self) -> &str {
        "backend"
    }

    fn source(&self) -> AudioSource {
        AudioSource::Backend
    }

    async fn resolve(&self, utterance: &Utterance) -> TierOutcome {
        let bytes = match utterance.precomputed_audio {
            Some(ref bytes) => bytes.clone(),
            None => return TierOutcome::Skipped("no precomputed audio".to_string()),
        };

        debug!(bytes = bytes.len(), "decoding backend audio");
        match decode_off_thread(bytes, self.envelope_window).await {
            Ok(clip) => TierOutcome::Resolved(clip_audio(clip, &self.output, self.source(), utterance)),
            Err(e) => TierOutcome::Failed(e),
        }
    }
}
