//! Configuration for speech resolution

use serde::{Deserialize, Serialize};

/// Speech configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Remote synthesis tier; skipped unless both key and voice id are set
    pub remote: RemoteSynthesisConfig,

    /// Local synthesis tier
    pub local: LocalVoiceConfig,

    /// Window used to sample the lip-sync envelope of decoded clips (ms)
    pub envelope_window_ms: u64,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            remote: RemoteSynthesisConfig::default(),
            local: LocalVoiceConfig::default(),
            envelope_window_ms: 20,
        }
    }
}

impl SpeechConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.envelope_window_ms == 0 || self.envelope_window_ms > 1000 {
            return Err("Envelope window must be between 1 and 1000 ms".to_string());
        }
        self.remote.validate()?;
        self.local.validate()?;
        Ok(())
    }
}

/// Remote text-to-speech API (ElevenLabs-compatible)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteSynthesisConfig {
    /// Base endpoint; the voice id is appended as the last path segment
    pub endpoint: String,

    /// Sent as the `xi-api-key` header
    pub api_key: Option<String>,

    pub voice_id: Option<String>,

    pub model_id: String,

    pub voice_settings: VoiceSettings,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for RemoteSynthesisConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.elevenlabs.io/v1/text-to-speech".to_string(),
            api_key: None,
            voice_id: None,
            model_id: "eleven_monolingual_v1".to_string(),
            voice_settings: VoiceSettings::default(),
            timeout_secs: 30,
        }
    }
}

impl RemoteSynthesisConfig {
    /// API key and voice id, when both are present and non-empty
    pub fn credentials(&self) -> Option<(&str, &str)> {
        let key = self.api_key.as_deref().filter(|k| !k.trim().is_empty())?;
        let voice = self.voice_id.as_deref().filter(|v| !v.trim().is_empty())?;
        Some((key, voice))
    }

    /// Full request URL for the configured voice
    pub fn request_url(&self, voice_id: &str) -> String {
        format!("{}/{}", self.endpoint.trim_end_matches('/'), voice_id)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.endpoint.is_empty() {
            return Err("Remote synthesis endpoint cannot be empty".to_string());
        }
        if !self.endpoint.starts_with("http://") && !self.endpoint.starts_with("https://") {
            return Err(format!(
                "Remote synthesis endpoint must be http(s): {}",
                self.endpoint
            ));
        }
        if self.model_id.is_empty() {
            return Err("Remote synthesis model id cannot be empty".to_string());
        }
        if self.timeout_secs == 0 || self.timeout_secs > 300 {
            return Err("Remote synthesis timeout must be between 1 and 300 seconds".to_string());
        }
        if let Some(ref voice) = self.voice_id {
            if voice.chars().any(|c| c == '/' || c == '?' || c == '#' || c.is_control()) {
                return Err("Voice id contains invalid characters".to_string());
            }
        }
        self.voice_settings.validate()
    }
}

/// Voice settings sent with every remote synthesis request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceSettings {
    pub stability: f32,
    pub similarity_boost: f32,
    pub style: f32,
    pub use_speaker_boost: bool,
    pub speed: f32,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            stability: 0.3,
            similarity_boost: 0.8,
            style: 0.6,
            use_speaker_boost: true,
            speed: 1.0,
        }
    }
}

impl VoiceSettings {
    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("stability", self.stability),
            ("similarity_boost", self.similarity_boost),
            ("style", self.style),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(format!("Voice setting {} must be between 0.0 and 1.0", name));
            }
        }
        if !(0.25..=4.0).contains(&self.speed) {
            return Err("Voice speed must be between 0.25 and 4.0".to_string());
        }
        Ok(())
    }
}

/// Local speech engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalVoiceConfig {
    /// Engine executable
    pub program: String,

    /// Name fragments tried in order when no female voice is found
    pub preferred_voices: Vec<String>,

    /// Speaking rate multiplier (1.0 = engine default)
    pub rate: f32,

    /// Pitch multiplier (1.0 = engine default)
    pub pitch: f32,

    /// Volume (0.0-2.0, 1.0 = engine default)
    pub volume: f32,

    /// How long to wait once for the voice list before speaking anyway (ms)
    pub voices_ready_timeout_ms: u64,
}

impl Default for LocalVoiceConfig {
    fn default() -> Self {
        Self {
            program: "espeak-ng".to_string(),
            preferred_voices: vec!["aria".to_string(), "susan".to_string()],
            rate: 1.0,
            pitch: 1.05,
            volume: 1.0,
            voices_ready_timeout_ms: 2000,
        }
    }
}

impl LocalVoiceConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.program.trim().is_empty() {
            return Err("Local voice program cannot be empty".to_string());
        }
        if self.program.chars().any(|c| c == '\0' || c == '\n' || c == '\r') {
            return Err("Local voice program contains invalid characters".to_string());
        }
        if !(0.1..=10.0).contains(&self.rate) {
            return Err("Local voice rate must be between 0.1 and 10.0".to_string());
        }
        if !(0.0..=2.0).contains(&self.pitch) {
            return Err("Local voice pitch must be between 0.0 and 2.0".to_string());
        }
        if !(0.0..=2.0).contains(&self.volume) {
            return Err("Local voice volume must be between 0.0 and 2.0".to_string());
        }
        if self.voices_ready_timeout_ms > 60_000 {
            return Err("Voice list timeout too large (max 60000 ms)".to_string());
        }
        Ok(())
    }
}
