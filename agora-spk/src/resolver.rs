//! Speech audio resolution through the ordered tier chain

use crate::audio::ResolvedAudio;
use crate::config::SpeechConfig;
use crate::error::SpeechError;
use crate::local::LocalVoiceEngine;
use crate::output::AudioOutput;
use crate::tiers::{BackendAudioTier, LocalSynthesisTier, RemoteSynthesisTier, SpeechTier, TierOutcome};
use crate::utterance::Utterance;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Resolves utterances to playable audio. Tiers are tried in order and the
/// first one that produces audio wins.
pub struct SpeechAudioResolver {
    tiers: Vec<Box<dyn SpeechTier>>,
}

impl SpeechAudioResolver {
    pub fn new(tiers: Vec<Box<dyn SpeechTier>>) -> Self {
        Self { tiers }
    }

    /// The standard chain: backend audio, remote synthesis, local engine
    pub fn from_config(
        config: &SpeechConfig,
        output: Arc<dyn AudioOutput>,
        engine: Arc<dyn LocalVoiceEngine>,
    ) -> Result<Self, SpeechError> {
        config.validate().map_err(SpeechError::Config)?;
        let window = Duration::from_millis(config.envelope_window_ms);

        let remote = RemoteSynthesisTier::new(config.remote.clone(), output.clone(), window)?;
        if !remote.is_configured() {
            info!("remote synthesis not configured; tier will be skipped");
        }

        Ok(Self::new(vec![
            Box::new(BackendAudioTier::new(output, window)),
            Box::new(remote),
            Box::new(LocalSynthesisTier::new(engine, config.local.clone())),
        ]))
    }

    pub fn tier_names(&self) -> Vec<&str> {
        self.tiers.iter().map(|t| t.name()).collect()
    }

    pub async fn resolve(&self, utterance: &Utterance) -> Result<ResolvedAudio, SpeechError> {
        if !utterance.has_text() && utterance.precomputed_audio.is_none() {
            return Err(SpeechError::EmptyUtterance);
        }

        let mut failures = Vec::new();
        for tier in &self.tiers {
            match tier.resolve(utterance).await {
                TierOutcome::Resolved(audio) => {
                    info!(
                        tier = tier.name(),
                        source = %audio.source,
                        duration_ms = audio.duration.as_millis() as u64,
                        "speech resolved"
                    );
                    return Ok(audio);
                }
                TierOutcome::Skipped(reason) => {
                    debug!(tier = tier.name(), reason = %reason, "tier skipped");
                }
                TierOutcome::Failed(e) => {
                    warn!(tier = tier.name(), error = %e, "tier failed, falling through");
                    failures.push(format!("{}: {}", tier.name(), e));
                }
            }
        }

        if !utterance.has_text() {
            // Only undecodable audio was supplied and nothing can speak it
            return Err(SpeechError::EmptyUtterance);
        }
        if failures.is_empty() {
            return Err(SpeechError::Unavailable("no tier applies".to_string()));
        }
        Err(SpeechError::Unavailable(failures.join("; ")))
    }
}
