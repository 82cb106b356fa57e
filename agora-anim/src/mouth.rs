//! Lip sync source for a speaking character

use crate::oscillator::oscillate;
use agora_core::AmplitudeEnvelope;
use std::sync::Arc;
use std::time::Duration;

const SYLLABLE_CYCLE_MS: f64 = 220.0;
const PHRASE_CYCLE_MS: f64 = 1300.0;

/// Where mouth openness comes from while speaking
#[derive(Debug, Clone, Default)]
pub enum MouthSource {
    /// Loudness of the clip being played
    Envelope(Arc<AmplitudeEnvelope>),
    /// Speech-like flap for audio without timing data
    #[default]
    Synthetic,
}

impl MouthSource {
    pub fn from_envelope(envelope: Option<Arc<AmplitudeEnvelope>>) -> Self {
        match envelope {
            Some(env) if !env.is_silent() => MouthSource::Envelope(env),
            _ => MouthSource::Synthetic,
        }
    }

    /// Mouth openness (0..1) at `elapsed` into the utterance
    pub fn level_at(&self, elapsed: Duration) -> f64 {
        match self {
            MouthSource::Envelope(env) => f64::from(env.level_at(elapsed)),
            MouthSource::Synthetic => synthetic_level(elapsed.as_secs_f64() * 1000.0),
        }
    }
}

/// Syllable-rate flap shaped by a slower phrase contour
pub fn synthetic_level(elapsed_ms: f64) -> f64 {
    let syllable = 0.5 * (1.0 + oscillate(1.0, SYLLABLE_CYCLE_MS, elapsed_ms));
    let phrase = 0.65 + 0.35 * oscillate(1.0, PHRASE_CYCLE_MS, elapsed_ms).abs();
    (syllable * phrase).clamp(0.0, 1.0)
}
