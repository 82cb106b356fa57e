//! espeak-ng driven through its command line

use super::{LocalVoiceEngine, SpeakRequest, VoiceInfo};
use crate::config::LocalVoiceConfig;
use crate::error::SpeechError;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::process::Command;
use tokio::sync::watch;
use tracing::{debug, info, warn};

const DEFAULT_WPM: f32 = 175.0;
const MAX_TEXT_CHARS: usize = 100_000;
const MAX_VOICES: usize = 1000;

pub struct EspeakEngine {
    program: String,
    available: AtomicBool,
    voices: RwLock<Vec<VoiceInfo>>,
    ready_tx: watch::Sender<bool>,
}

impl EspeakEngine {
    /// Create the engine without touching the system; call
    /// [`discover_voices`](Self::discover_voices) to load the voice list.
    pub fn new(config: &LocalVoiceConfig) -> Self {
        let (ready_tx, _) = watch::channel(false);
        Self {
            program: config.program.clone(),
            available: AtomicBool::new(true),
            voices: RwLock::new(Vec::new()),
            ready_tx,
        }
    }

    /// Create the engine and load voices in the background
    pub fn spawn(config: &LocalVoiceConfig) -> Arc<Self> {
        let engine = Arc::new(Self::new(config));
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let background = engine.clone();
                runtime.spawn(async move {
                    if let Err(e) = background.discover_voices().await {
                        warn!(error = %e, "espeak-ng voice discovery failed");
                    }
                });
            }
            Err(_) => warn!("no async runtime; espeak-ng voices will not be discovered"),
        }
        engine
    }

    /// Run `espeak-ng --voices` and publish the result. A missing program
    /// marks the engine unavailable; either way waiters are released.
    pub async fn discover_voices(&self) -> Result<usize, SpeechError> {
        let output = Command::new(&self.program)
            .arg("--voices")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await;

        let result = match output {
            Ok(output) if output.status.success() => {
                let voices = parse_voice_list(&String::from_utf8_lossy(&output.stdout));
                let count = voices.len();
                *self.voices.write() = voices;
                info!(program = %self.program, voices = count, "espeak-ng voices loaded");
                Ok(count)
            }
            Ok(output) => {
                self.available.store(false, Ordering::SeqCst);
                Err(SpeechError::Synthesis(format!(
                    "{} --voices failed: {}",
                    self.program,
                    String::from_utf8_lossy(&output.stderr).trim()
                )))
            }
            Err(e) => {
                self.available.store(false, Ordering::SeqCst);
                Err(SpeechError::Io(e))
            }
        };

        self.ready_tx.send_replace(true);
        result
    }
}

#[async_trait]
impl LocalVoiceEngine for EspeakEngine {
    fn name(&self) -> &str {
        "espeak-ng"
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn voices(&self) -> Vec<VoiceInfo> {
        self.voices.read().clone()
    }

    async fn wait_voices_ready(&self) {
        let mut rx = self.ready_tx.subscribe();
        // Sender lives in self, so this only ends once ready is set
        let _ = rx.wait_for(|ready| *ready).await;
    }

    async fn speak(&self, request: SpeakRequest) -> Result<(), SpeechError> {
        let text = sanitize(&request.text);
        if text.is_empty() {
            return Err(SpeechError::Synthesis("text is empty after sanitization".to_string()));
        }

        let mut cmd = Command::new(&self.program);
        cmd.args(speak_args(&request))
            .arg("--")
            .arg(&text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(program = %self.program, chars = text.len(), "spawning espeak-ng");
        let output = cmd
            .output()
            .await
            .map_err(|e| SpeechError::Synthesis(format!("failed to run {}: {}", self.program, e)))?;

        if !output.status.success() {
            return Err(SpeechError::Synthesis(format!(
                "espeak-ng failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }
}

/// Command line options for rate, pitch, volume and voice
fn speak_args(request: &SpeakRequest) -> Vec<String> {
    // espeak-ng ranges: -s words per minute, -p 0-99 (50 normal), -a 0-200 (100 normal)
    let wpm = (DEFAULT_WPM * request.rate).round().clamp(80.0, 450.0) as u32;
    let pitch = (50.0 * request.pitch).round().clamp(0.0, 99.0) as u32;
    let amplitude = (100.0 * request.volume).round().clamp(0.0, 200.0) as u32;

    let mut args = vec![
        "-s".to_string(),
        wpm.to_string(),
        "-p".to_string(),
        pitch.to_string(),
        "-a".to_string(),
        amplitude.to_string(),
    ];
    if let Some(ref voice) = request.voice {
        args.push("-v".to_string());
        args.push(voice.clone());
    }
    args
}

fn sanitize(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .take(MAX_TEXT_CHARS)
        .collect::<String>()
        .trim()
        .to_string()
}

/// Parse `espeak-ng --voices` output:
/// `Pty Language Age/Gender VoiceName File Other Languages`
fn parse_voice_list(stdout: &str) -> Vec<VoiceInfo> {
    stdout
        .lines()
        .skip(1)
        .filter_map(|line| {
            let cols: Vec<&str> = line.split_whitespace().collect();
            if cols.len() < 4 {
                return None;
            }
            let language = cols[1];
            let gender = cols[2];
            let name = cols[3].replace('_', " ");
            if name.chars().any(|c| c == '\0' || c.is_control()) {
                return None;
            }
            let id = cols.get(4).copied().unwrap_or(language).to_string();
            Some(VoiceInfo {
                id,
                name,
                language: Some(language.to_string()),
                female: gender.ends_with('F'),
            })
        })
        .take(MAX_VOICES)
        .collect()
}
