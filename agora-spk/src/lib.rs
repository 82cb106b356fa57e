//! agora-spk: speech audio for stage characters
//!
//! Turns an utterance (text plus optional pre-rendered audio) into something
//! playable through an ordered fallback chain:
//! - Audio shipped by the conversation backend
//! - Remote speech synthesis (ElevenLabs-compatible HTTP API)
//! - The local speech engine (espeak-ng by default)

pub mod error;
pub mod config;
pub mod utterance;
pub mod audio;
pub mod decoder;
pub mod output;
pub mod local;
pub mod tiers;
pub mod resolver;

pub use error::SpeechError;
pub use config::{LocalVoiceConfig, RemoteSynthesisConfig, SpeechConfig, VoiceSettings};
pub use utterance::Utterance;
pub use audio::{AudioSource, PlaybackHandle, ResolvedAudio};
pub use decoder::{decode_clip, DecodedClip};
pub use output::{ActivePlayback, AudioOutput, SilentOutput};
pub use local::{EspeakEngine, LocalVoiceEngine, SpeakRequest, VoiceInfo};
pub use tiers::{SpeechTier, TierOutcome};
pub use resolver::SpeechAudioResolver;
