//! Remote text-to-speech over HTTP (ElevenLabs-compatible)

use super::{clip_audio, decode_off_thread, SpeechTier, TierOutcome};
use crate::audio::AudioSource;
use crate::config::{RemoteSynthesisConfig, VoiceSettings};
use crate::error::SpeechError;
use crate::output::AudioOutput;
use crate::utterance::Utterance;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Serialize)]
struct SynthesisRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: &'a VoiceSettings,
}

pub struct RemoteSynthesisTier {
    client: Client,
    config: RemoteSynthesisConfig,
    output: Arc<dyn AudioOutput>,
    envelope_window: Duration,
}

impl RemoteSynthesisTier {
    pub fn new(
        config: RemoteSynthesisConfig,
        output: Arc<dyn AudioOutput>,
        envelope_window: Duration,
    ) -> Result<Self, SpeechError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SpeechError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            output,
            envelope_window,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.config.credentials().is_some()
    }

    async fn synthesize(&self, text: &str, api_key: &str, voice_id: &str) -> Result<Bytes, SpeechError> {
        let url = self.config.request_url(voice_id);
        let body = SynthesisRequest {
            text,
            model_id: &self.config.model_id,
            voice_settings: &self.config.voice_settings,
        };

        debug!(url = %url, chars = text.len(), "requesting remote synthesis");
        let response = self
            .client
            .post(&url)
            .header("xi-api-key", api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| SpeechError::Synthesis(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(SpeechError::Synthesis(format!(
                "remote synthesis returned {}: {}",
                status,
                detail.trim()
            )));
        }

        response
            .bytes()
            .await
            .map_err(|e| SpeechError::Synthesis(format!("failed to read audio body: {}", e)))
    }
}

#[async_trait]
impl SpeechTier for RemoteSynthesisTier {
    fn name(&self) -> &str {
        "remote"
    }

    fn source(&self) -> AudioSource {
        AudioSource::RemoteSynthesis
    }

    async fn resolve(&self, utterance: &Utterance) -> TierOutcome {
        if !utterance.has_text() {
            return TierOutcome::Skipped("no text".to_string());
        }
        let (api_key, voice_id) = match self.config.credentials() {
            Some(credentials) => credentials,
            None => return TierOutcome::Skipped("no credentials configured".to_string()),
        };

        let bytes = match self.synthesize(&utterance.text, api_key, voice_id).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "remote synthesis failed");
                return TierOutcome::Failed(e);
            }
        };

        match decode_off_thread(bytes, self.envelope_window).await {
            Ok(clip) => TierOutcome::Resolved(clip_audio(clip, &self.output, self.source(), utterance)),
            Err(e) => TierOutcome::Failed(e),
        }
    }
}
