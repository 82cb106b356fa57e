//! Local speech engines

pub mod espeak;

pub use espeak::EspeakEngine;

use crate::audio::PlaybackHandle;
use crate::error::SpeechError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// A voice offered by a local engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceInfo {
    /// Identifier passed back to the engine when speaking
    pub id: String,
    /// Human readable name used for matching
    pub name: String,
    pub language: Option<String>,
    pub female: bool,
}

/// One request to speak text aloud
#[derive(Debug, Clone, PartialEq)]
pub struct SpeakRequest {
    pub text: String,
    pub voice: Option<String>,
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
}

/// Text-to-speech engine running on this host.
///
/// The engine speaks directly; it does not hand back audio or timing.
#[async_trait]
pub trait LocalVoiceEngine: Send + Sync {
    fn name(&self) -> &str;

    fn is_available(&self) -> bool;

    /// Voices enumerated so far; may be empty until discovery completes
    fn voices(&self) -> Vec<VoiceInfo>;

    /// Resolves once the voice list has been loaded (or loading gave up)
    async fn wait_voices_ready(&self);

    /// Speak until done. Dropping the future must silence the speech.
    async fn speak(&self, request: SpeakRequest) -> Result<(), SpeechError>;
}

/// Pick a voice: female first, then preferred name fragments in order, then
/// whatever comes first.
pub fn select_voice<'a>(voices: &'a [VoiceInfo], preferred: &[String]) -> Option<&'a VoiceInfo> {
    let female = voices.iter().find(|v| {
        let name = v.name.to_lowercase();
        v.female || name.contains("female") || name.contains("woman") || name.contains("girl")
    });
    if female.is_some() {
        return female;
    }

    for fragment in preferred {
        let fragment = fragment.to_lowercase();
        if fragment.is_empty() {
            continue;
        }
        if let Some(voice) = voices.iter().find(|v| v.name.to_lowercase().contains(&fragment)) {
            return Some(voice);
        }
    }

    voices.first()
}

/// Handle that speaks through a local engine when played
pub struct LocalSpeechHandle {
    engine: Arc<dyn LocalVoiceEngine>,
    request: SpeakRequest,
    task: Mutex<Option<JoinHandle<()>>>,
    stopped: AtomicBool,
    speaking: Arc<AtomicBool>,
}

impl LocalSpeechHandle {
    pub fn new(engine: Arc<dyn LocalVoiceEngine>, request: SpeakRequest) -> Self {
        Self {
            engine,
            request,
            task: Mutex::new(None),
            stopped: AtomicBool::new(false),
            speaking: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn request(&self) -> &SpeakRequest {
        &self.request
    }
}

impl PlaybackHandle for LocalSpeechHandle {
    fn play(&self) -> Result<(), SpeechError> {
        let mut task = self.task.lock();
        if self.stopped.load(Ordering::SeqCst) {
            return Err(SpeechError::Playback("handle was stopped".to_string()));
        }
        if task.is_some() {
            return Ok(());
        }

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| SpeechError::Playback(format!("no async runtime: {}", e)))?;

        let engine = self.engine.clone();
        let request = self.request.clone();
        let speaking = self.speaking.clone();
        speaking.store(true, Ordering::SeqCst);
        *task = Some(runtime.spawn(async move {
            debug!(engine = engine.name(), voice = ?request.voice, "local speech started");
            if let Err(e) = engine.speak(request).await {
                warn!(error = %e, "local speech failed");
            }
            speaking.store(false, Ordering::SeqCst);
        }));
        Ok(())
    }

    fn stop(&self) {
        let mut task = self.task.lock();
        self.stopped.store(true, Ordering::SeqCst);
        if let Some(handle) = task.take() {
            handle.abort();
        }
        self.speaking.store(false, Ordering::SeqCst);
    }

    fn is_playing(&self) -> bool {
        self.speaking.load(Ordering::SeqCst)
    }
}
