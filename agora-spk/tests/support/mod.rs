//! Shared fixtures for the speech tests

#![allow(dead_code)]

use agora_spk::{LocalVoiceEngine, SpeakRequest, SpeechError, VoiceInfo};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Mono 16-bit WAV holding `millis` of a 440 Hz tone
pub fn wav_bytes(millis: u32) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let frames = 16_000 * millis / 1000;
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for i in 0..frames {
            let t = i as f32 / 16_000.0;
            let sample = (t * 440.0 * std::f32::consts::TAU).sin() * 0.5;
            writer.write_sample((sample * i16::MAX as f32) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

/// Scripted local engine that records what it was asked to say
pub struct FakeVoices {
    voices: Mutex<Vec<VoiceInfo>>,
    available: AtomicBool,
    ready: Notify,
    pub spoken: Mutex<Vec<SpeakRequest>>,
}

impl FakeVoices {
    pub fn with_voices(names: &[(&str, bool)]) -> Arc<Self> {
        Arc::new(Self {
            voices: Mutex::new(names.iter().map(|(n, f)| voice(n, *f)).collect()),
            available: AtomicBool::new(true),
            ready: Notify::new(),
            spoken: Mutex::new(Vec::new()),
        })
    }

    pub fn unavailable() -> Arc<Self> {
        let engine = Self::with_voices(&[]);
        engine.available.store(false, Ordering::SeqCst);
        engine
    }

    /// Publish voices and wake anyone waiting for them
    pub fn load(&self, names: &[(&str, bool)]) {
        *self.voices.lock() = names.iter().map(|(n, f)| voice(n, *f)).collect();
        self.ready.notify_waiters();
    }
}

fn voice(name: &str, female: bool) -> VoiceInfo {
    VoiceInfo {
        id: name.to_lowercase(),
        name: name.to_string(),
        language: Some("en".to_string()),
        female,
    }
}

#[async_trait]
impl LocalVoiceEngine for FakeVoices {
    fn name(&self) -> &str {
        "fake"
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn voices(&self) -> Vec<VoiceInfo> {
        self.voices.lock().clone()
    }

    async fn wait_voices_ready(&self) {
        if !self.voices.lock().is_empty() {
            return;
        }
        self.ready.notified().await;
    }

    async fn speak(&self, request: SpeakRequest) -> Result<(), SpeechError> {
        self.spoken.lock().push(request);
        Ok(())
    }
}
