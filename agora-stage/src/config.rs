//! Stage configuration: session, speech, frame rate and the character cast

use crate::error::StageError;
use agora_core::{Character, Roster};
use agora_session::SessionConfig;
use agora_spk::SpeechConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Top-level configuration of the `agora` stage
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StageConfig {
    pub session: SessionConfig,

    pub speech: SpeechConfig,

    /// Frames per second pushed to the renderer
    pub frame_rate: u32,

    /// Character that performs replies from the interaction endpoint
    pub default_character: String,

    /// Added to the built-in cast; an entry with a built-in id replaces it
    pub characters: Vec<Character>,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            speech: SpeechConfig::default(),
            frame_rate: 60,
            default_character: "aria".to_string(),
            characters: Vec::new(),
        }
    }
}

impl StageConfig {
    /// Load configuration from a file. The extension picks the format;
    /// anything else is sniffed like [`from_str`](Self::from_str).
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, StageError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        let config = match extension.as_deref() {
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| StageError::Parse(format!("{}: {}", path.display(), e)))?,
            Some("toml") => toml::from_str(&content)
                .map_err(|e| StageError::Parse(format!("{}: {}", path.display(), e)))?,
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)
                .map_err(|e| StageError::Parse(format!("{}: {}", path.display(), e)))?,
            _ => Self::from_str(&content)?,
        };
        info!(path = %path.display(), "loaded stage configuration");
        Ok(config)
    }

    /// Parse configuration text, trying JSON, then TOML, then YAML
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, StageError> {
        if let Ok(config) = serde_json::from_str::<StageConfig>(content) {
            return Ok(config);
        }
        if let Ok(config) = toml::from_str::<StageConfig>(content) {
            return Ok(config);
        }
        if let Ok(config) = serde_yaml::from_str::<StageConfig>(content) {
            return Ok(config);
        }
        Err(StageError::Parse("Unknown configuration format".to_string()))
    }

    /// Overlay values from the process environment
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Overlay values from `lookup`. Empty values are ignored.
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(endpoint) = get("AGORA_ENDPOINT") {
            debug!("session endpoint from environment");
            self.session.endpoint = endpoint;
        }
        if let Some(url) = get("AGORA_INTERACT_URL") {
            self.session.interact_base_url = url;
        }
        if let Some(key) = get("ELEVENLABS_API_KEY") {
            debug!("remote synthesis key from environment");
            self.speech.remote.api_key = Some(key);
        }
        if let Some(voice) = get("ELEVENLABS_VOICE_ID") {
            self.speech.remote.voice_id = Some(voice);
        }
    }

    /// The cast this configuration describes
    pub fn roster(&self) -> Roster {
        let mut roster = Roster::builtin();
        for character in &self.characters {
            roster.insert(character.clone());
        }
        roster
    }

    pub fn frame_interval(&self) -> Duration {
        frame_interval(self.frame_rate)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), StageError> {
        if self.frame_rate == 0 || self.frame_rate > 240 {
            return Err(StageError::Validation(
                "Frame rate must be between 1 and 240".to_string(),
            ));
        }
        self.session.validate().map_err(StageError::Validation)?;
        self.speech.validate().map_err(StageError::Validation)?;

        let roster = self.roster();
        roster.validate().map_err(StageError::Validation)?;
        if !roster.contains(&self.default_character) {
            return Err(StageError::Validation(format!(
                "Default character '{}' is not in the roster",
                self.default_character
            )));
        }
        Ok(())
    }
}

/// Time between frames at `frame_rate` per second
pub(crate) fn frame_interval(frame_rate: u32) -> Duration {
    Duration::from_secs_f64(1.0 / f64::from(frame_rate.max(1)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config_is_valid() {
        let config = StageConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.frame_rate, 60);
        assert_eq!(config.roster().len(), 3);
    }

    #[test]
    fn test_parse_json() {
        let config = StageConfig::from_str(
            r#"{"frame_rate": 30, "session": {"endpoint": "ws://stage.local/ws/debate"}}"#,
        )
        .unwrap();
        assert_eq!(config.frame_rate, 30);
        assert_eq!(config.session.endpoint, "ws://stage.local/ws/debate");
        assert_eq!(config.session.max_reconnect_attempts, 5);
    }

    #[test]
    fn test_parse_toml() {
        let content = r#"
frame_rate = 24
default_character = "sera"

[speech.remote]
voice_id = "voice-123"

[[characters]]
id = "guest"
"#;
        let config = StageConfig::from_str(content).unwrap();
        assert_eq!(config.frame_rate, 24);
        assert_eq!(config.speech.remote.voice_id.as_deref(), Some("voice-123"));
        assert_eq!(config.speech.remote.model_id, "eleven_monolingual_v1");

        let roster = config.roster();
        assert_eq!(roster.len(), 4);
        assert!(roster.get("guest").unwrap().animation.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_yaml() {
        let content = "
frame_rate: 50
session:
  reconnect_delay_ms: 1500
characters:
  - id: aria
    render:
      anchor: { x: 0.5, y: 0.5 }
      position: { x: 0.1, y: 0.9 }
      scale: { x: 0.2, y: 0.2 }
      mouth_param: ParamMouthCustom
";
        let config = StageConfig::from_str(content).unwrap();
        assert_eq!(config.frame_rate, 50);
        assert_eq!(config.session.reconnect_delay(), Duration::from_millis(1500));

        // replaces the built-in aria, personal motion profile dropped
        let roster = config.roster();
        assert_eq!(roster.len(), 3);
        let aria = roster.get("aria").unwrap();
        assert_eq!(aria.render.mouth_param, "ParamMouthCustom");
        assert!(aria.animation.is_none());
    }

    #[test]
    fn test_unknown_format() {
        assert!(matches!(
            StageConfig::from_str("frame_rate = [unterminated"),
            Err(StageError::Parse(_))
        ));
    }

    #[test]
    fn test_env_overlay() {
        let env: HashMap<&str, &str> = [
            ("AGORA_ENDPOINT", "wss://debates.example/ws"),
            ("ELEVENLABS_API_KEY", "secret"),
            ("ELEVENLABS_VOICE_ID", ""),
        ]
        .into_iter()
        .collect();

        let mut config = StageConfig::default();
        config.apply_env_with(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.session.endpoint, "wss://debates.example/ws");
        assert_eq!(config.speech.remote.api_key.as_deref(), Some("secret"));
        assert!(config.speech.remote.voice_id.is_none());
        assert_eq!(config.session.interact_base_url, "http://127.0.0.1:8000");
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = StageConfig::default();
        config.frame_rate = 0;
        assert!(config.validate().is_err());

        let mut config = StageConfig::default();
        config.default_character = "nobody".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_frame_interval() {
        let mut config = StageConfig::default();
        config.frame_rate = 50;
        assert_eq!(config.frame_interval(), Duration::from_millis(20));
    }
}
