//! Local speech engine; scheduled from a word-count estimate

use super::{SpeechTier, TierOutcome};
use crate::audio::{AudioSource, ResolvedAudio};
use crate::config::LocalVoiceConfig;
use crate::error::SpeechError;
use crate::local::{select_voice, LocalSpeechHandle, LocalVoiceEngine, SpeakRequest};
use crate::utterance::Utterance;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub struct LocalSynthesisTier {
    engine: Arc<dyn LocalVoiceEngine>,
    config: LocalVoiceConfig,
}

impl LocalSynthesisTier {
    pub fn new(engine: Arc<dyn LocalVoiceEngine>, config: LocalVoiceConfig) -> Self {
        Self { engine, config }
    }
}

#[async_trait]
impl SpeechTier for LocalSynthesisTier {
    fn name(&self) -> &str {
        "local"
    }

    fn source(&self) -> AudioSource {
        AudioSource::LocalSynthesis
    }

    async fn resolve(&self, utterance: &Utterance) -> TierOutcome {
        if !utterance.has_text() {
            return TierOutcome::Skipped("no text".to_string());
        }

        let mut voices = self.engine.voices();
        if voices.is_empty() && self.engine.is_available() {
            let wait = Duration::from_millis(self.config.voices_ready_timeout_ms);
            if tokio::time::timeout(wait, self.engine.wait_voices_ready()).await.is_err() {
                warn!(engine = self.engine.name(), "voice list not ready, using engine default");
            }
            voices = self.engine.voices();
        }

        if !self.engine.is_available() {
            return TierOutcome::Failed(SpeechError::Unavailable(format!(
                "local engine {} is not available",
                self.engine.name()
            )));
        }

        let voice = select_voice(&voices, &self.config.preferred_voices);
        debug!(voice = ?voice.map(|v| v.name.as_str()), "selected local voice");

        let request = SpeakRequest {
            text: utterance.text.clone(),
            voice: voice.map(|v| v.id.clone()),
            rate: self.config.rate,
            pitch: self.config.pitch,
            volume: self.config.volume,
        };

        TierOutcome::Resolved(ResolvedAudio {
            handle: Arc::new(LocalSpeechHandle::new(self.engine.clone(), request)),
            duration: utterance.estimated_duration(),
            source: self.source(),
            envelope: None,
        })
    }
}
