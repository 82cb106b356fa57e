//! Fallback chain behaviour of SpeechAudioResolver

mod support;

use agora_spk::{
    AudioSource, RemoteSynthesisConfig, SilentOutput, SpeechAudioResolver, SpeechConfig,
    SpeechError, Utterance,
};
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use support::{wav_bytes, FakeVoices};

fn resolver(config: SpeechConfig, engine: Arc<FakeVoices>) -> SpeechAudioResolver {
    SpeechAudioResolver::from_config(&config, Arc::new(SilentOutput), engine).unwrap()
}

#[test]
fn test_standard_tier_order() {
    let r = resolver(SpeechConfig::default(), FakeVoices::with_voices(&[]));
    assert_eq!(r.tier_names(), vec!["backend", "remote", "local"]);
}

#[test]
fn test_invalid_config_rejected() {
    let mut config = SpeechConfig::default();
    config.envelope_window_ms = 0;
    let result = SpeechAudioResolver::from_config(
        &config,
        Arc::new(SilentOutput),
        FakeVoices::with_voices(&[]),
    );
    assert!(matches!(result, Err(SpeechError::Config(_))));
}

#[tokio::test]
async fn test_valid_backend_audio_is_used() {
    let engine = FakeVoices::with_voices(&[("Daniel", false)]);
    let r = resolver(SpeechConfig::default(), engine.clone());

    let utterance = Utterance::new("hi").with_audio(wav_bytes(750));
    let audio = r.resolve(&utterance).await.unwrap();

    assert_eq!(audio.source, AudioSource::Backend);
    assert!((audio.duration_secs() - 0.75).abs() < 0.01);
    assert!(audio.envelope.is_some());
    assert!(!audio.handle.is_playing());
}

#[tokio::test]
async fn test_corrupt_backend_audio_falls_to_local() {
    let engine = FakeVoices::with_voices(&[("Daniel", false)]);
    let r = resolver(SpeechConfig::default(), engine.clone());

    let utterance = Utterance::new("hi there").with_audio(Bytes::from_static(b"RIFF....garbage"));
    let audio = r.resolve(&utterance).await.unwrap();

    assert_eq!(audio.source, AudioSource::LocalSynthesis);
    assert!((audio.duration_secs() - 1.0).abs() < 1e-9);
    assert!(audio.envelope.is_none());
}

#[tokio::test]
async fn test_local_handle_speaks_with_selected_voice() {
    let engine = FakeVoices::with_voices(&[("Daniel", false), ("Susan", false)]);
    let r = resolver(SpeechConfig::default(), engine.clone());

    let audio = r.resolve(&Utterance::new("good evening")).await.unwrap();
    audio.handle.play().unwrap();
    tokio::task::yield_now().await;
    for _ in 0..10 {
        if !engine.spoken.lock().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let spoken = engine.spoken.lock();
    assert_eq!(spoken.len(), 1);
    assert_eq!(spoken[0].text, "good evening");
    assert_eq!(spoken[0].voice.as_deref(), Some("susan"));
    assert!((spoken[0].pitch - 1.05).abs() < 1e-6);
}

#[tokio::test]
async fn test_local_waits_once_for_voices() {
    let engine = FakeVoices::with_voices(&[]);
    let r = resolver(SpeechConfig::default(), engine.clone());

    let loader = engine.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        loader.load(&[("Fred", false), ("Victoria Female", false)]);
    });

    let audio = r.resolve(&Utterance::new("hello")).await.unwrap();
    assert_eq!(audio.source, AudioSource::LocalSynthesis);
    audio.handle.play().unwrap();
    audio.handle.stop();
    audio.handle.stop();
}

#[tokio::test(start_paused = true)]
async fn test_local_voice_wait_is_bounded() {
    let engine = FakeVoices::with_voices(&[]);
    let r = resolver(SpeechConfig::default(), engine);

    // never loads; the timeout elapses on the paused clock
    let audio = r.resolve(&Utterance::new("still speaks")).await.unwrap();
    assert_eq!(audio.source, AudioSource::LocalSynthesis);
}

#[tokio::test]
async fn test_empty_utterance() {
    let r = resolver(SpeechConfig::default(), FakeVoices::with_voices(&[("A", true)]));
    assert!(matches!(
        r.resolve(&Utterance::new("   ")).await,
        Err(SpeechError::EmptyUtterance)
    ));

    // undecodable audio and nothing to synthesize
    let utterance = Utterance::new("").with_audio(Bytes::from_static(b"junk"));
    assert!(matches!(r.resolve(&utterance).await, Err(SpeechError::EmptyUtterance)));
}

#[tokio::test]
async fn test_all_tiers_exhausted() {
    let r = resolver(SpeechConfig::default(), FakeVoices::unavailable());
    match r.resolve(&Utterance::new("nobody can say this")).await {
        Err(SpeechError::Unavailable(detail)) => assert!(detail.contains("local")),
        other => panic!("Expected Unavailable, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unreachable_remote_falls_through() {
    let config = SpeechConfig {
        remote: RemoteSynthesisConfig {
            // nothing listens on the discard port
            endpoint: "http://127.0.0.1:9/v1/text-to-speech".to_string(),
            api_key: Some("key".to_string()),
            voice_id: Some("voice".to_string()),
            timeout_secs: 2,
            ..Default::default()
        },
        ..Default::default()
    };
    let r = resolver(config, FakeVoices::with_voices(&[("Daniel", false)]));

    let audio = r.resolve(&Utterance::new("hi there")).await.unwrap();
    assert_eq!(audio.source, AudioSource::LocalSynthesis);
}
