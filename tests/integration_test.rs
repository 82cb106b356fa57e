//! End to end: session commands through the orchestrator to speech and motion

use agora_anim::AnimationMode;
use agora_core::Roster;
use agora_session::{
    ChannelState, Connection, Connector, OutgoingFrame, SessionChannel, SessionConfig,
    SessionError, TransportEvent,
};
use agora_spk::{
    AudioSource, LocalVoiceEngine, SilentOutput, SpeakRequest, SpeechAudioResolver, SpeechConfig,
    SpeechError, VoiceInfo,
};
use agora_stage::{AgentOrchestrator, StageEvent};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

/// Hands out one scripted connection per connect call; fails once exhausted
struct LoopbackConnector {
    opens: Mutex<usize>,
    servers: mpsc::UnboundedSender<Server>,
}

struct Server {
    events: mpsc::UnboundedSender<TransportEvent>,
    _frames: mpsc::UnboundedReceiver<OutgoingFrame>,
}

impl Server {
    fn push(&self, message: Value) {
        self.events.send(TransportEvent::Text(message.to_string())).unwrap();
    }

    fn close(&self, code: u16) {
        self.events
            .send(TransportEvent::Closed {
                code,
                reason: String::new(),
            })
            .unwrap();
    }
}

#[async_trait]
impl Connector for LoopbackConnector {
    async fn connect(&self, _endpoint: &str) -> Result<Connection, SessionError> {
        let mut opens = self.opens.lock();
        if *opens == 0 {
            return Err(SessionError::Connection("refused".to_string()));
        }
        *opens -= 1;
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let _ = self.servers.send(Server {
            events: in_tx,
            _frames: out_rx,
        });
        Ok(Connection {
            outgoing: out_tx,
            incoming: in_rx,
        })
    }
}

fn loopback(opens: usize) -> (Arc<LoopbackConnector>, mpsc::UnboundedReceiver<Server>) {
    let (servers, rx) = mpsc::unbounded_channel();
    (
        Arc::new(LoopbackConnector {
            opens: Mutex::new(opens),
            servers,
        }),
        rx,
    )
}

/// Local engine with one female voice that records what it says
#[derive(Default)]
struct RecordingVoice {
    spoken: Mutex<Vec<SpeakRequest>>,
}

#[async_trait]
impl LocalVoiceEngine for RecordingVoice {
    fn name(&self) -> &str {
        "recording"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn voices(&self) -> Vec<VoiceInfo> {
        vec![VoiceInfo {
            id: "en+f3".to_string(),
            name: "English Female".to_string(),
            language: Some("en".to_string()),
            female: true,
        }]
    }

    async fn wait_voices_ready(&self) {}

    async fn speak(&self, request: SpeakRequest) -> Result<(), SpeechError> {
        self.spoken.lock().push(request);
        Ok(())
    }
}

fn wav_b64(millis: u32) -> String {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 8_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for i in 0..(8 * millis) {
            let t = i as f32 / 8_000.0;
            let sample = (t * 220.0 * std::f32::consts::TAU).sin() * 0.6;
            writer.write_sample((sample * i16::MAX as f32) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }
    STANDARD.encode(cursor.into_inner())
}

fn stage() -> (AgentOrchestrator, Arc<RecordingVoice>) {
    let voice = Arc::new(RecordingVoice::default());
    let resolver =
        SpeechAudioResolver::from_config(&SpeechConfig::default(), Arc::new(SilentOutput), voice.clone())
            .unwrap();
    (AgentOrchestrator::new(Roster::builtin(), resolver), voice)
}

fn fast_session() -> SessionConfig {
    SessionConfig {
        reconnect_delay_ms: 50,
        ..SessionConfig::default()
    }
}

async fn next_event<F>(events: &mut broadcast::Receiver<StageEvent>, wanted: F) -> StageEvent
where
    F: Fn(&StageEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let event = events.recv().await.unwrap();
            if wanted(&event) {
                return event;
            }
        }
    })
    .await
    .expect("stage event did not arrive")
}

async fn wait_until<F: Fn() -> bool>(condition: F) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached");
}

#[tokio::test]
async fn test_buffered_turn_with_backend_audio_is_performed() {
    let (stage, voice) = stage();
    let mut events = stage.subscribe();
    let (connector, mut servers) = loopback(1);
    let channel = SessionChannel::new(fast_session(), connector);

    channel.connect().await.unwrap();
    let server = servers.recv().await.unwrap();

    // arrives before the stage subscribes and must not be lost
    server.push(json!({
        "type": "turn_start",
        "data": {"character_id": "aria", "text": "Good evening", "audio_b64": wav_b64(400)}
    }));
    wait_until(|| channel.pending_messages() == 1).await;
    stage.attach(&channel);

    match next_event(&mut events, |e| matches!(e, StageEvent::SpeakingStarted { .. })).await {
        StageEvent::SpeakingStarted {
            character_id,
            source,
            duration,
        } => {
            assert_eq!(character_id, "aria");
            assert_eq!(source, AudioSource::Backend);
            assert!((duration.as_secs_f64() - 0.4).abs() < 0.01);
        }
        other => panic!("unexpected event {:?}", other),
    }
    assert!(voice.spoken.lock().is_empty());

    next_event(&mut events, |e| matches!(e, StageEvent::SpeakingFinished { .. })).await;
    assert_eq!(stage.mode("aria"), Some(AnimationMode::Idle));
    let aria = stage.snapshot("aria").unwrap();
    assert!(aria.contains("ParamMouthOpenY"));
}

#[tokio::test]
async fn test_corrupt_audio_falls_back_to_local_voice() {
    let (stage, voice) = stage();
    let mut events = stage.subscribe();
    let (connector, mut servers) = loopback(1);
    let channel = SessionChannel::new(fast_session(), connector);
    stage.attach(&channel);

    channel.connect().await.unwrap();
    let server = servers.recv().await.unwrap();
    server.push(json!({
        "type": "turn_start",
        "data": {"character_id": "eidon", "text": "hi there", "audio_b64": STANDARD.encode(b"not audio at all")}
    }));

    match next_event(&mut events, |e| matches!(e, StageEvent::SpeakingStarted { .. })).await {
        StageEvent::SpeakingStarted { source, duration, .. } => {
            assert_eq!(source, AudioSource::LocalSynthesis);
            assert_eq!(duration, Duration::from_secs(1));
        }
        other => panic!("unexpected event {:?}", other),
    }

    wait_until(|| !voice.spoken.lock().is_empty()).await;
    let spoken = voice.spoken.lock();
    assert_eq!(spoken[0].text, "hi there");
    assert_eq!(spoken[0].voice.as_deref(), Some("en+f3"));
}

#[tokio::test]
async fn test_handler_survives_reconnect() {
    let (stage, _voice) = stage();
    let mut events = stage.subscribe();
    let (connector, mut servers) = loopback(2);
    let channel = SessionChannel::new(fast_session(), connector);
    stage.attach(&channel);

    channel.connect().await.unwrap();
    let first = servers.recv().await.unwrap();
    first.close(1006);

    let second = tokio::time::timeout(Duration::from_secs(5), servers.recv())
        .await
        .unwrap()
        .unwrap();
    channel.wait_open().await.unwrap();

    second.push(json!({"type": "turn_start", "data": {"character_id": "sera", "text": "still here"}}));
    let event = next_event(&mut events, |e| matches!(e, StageEvent::SpeakingStarted { .. })).await;
    assert!(matches!(event, StageEvent::SpeakingStarted { ref character_id, .. } if character_id == "sera"));

    second.push(json!({"type": "session_closed", "data": {"reason": "debate finished"}}));
    wait_until(|| stage.mode("sera") == Some(AnimationMode::Idle)).await;

    second.close(1000);
    wait_until(|| channel.state() == ChannelState::Disconnected).await;
}

#[tokio::test]
async fn test_service_errors_and_unknown_characters_surface_as_events() {
    let (stage, _voice) = stage();
    let mut events = stage.subscribe();
    let (connector, mut servers) = loopback(1);
    let channel = SessionChannel::new(fast_session(), connector);
    stage.attach(&channel);

    channel.connect().await.unwrap();
    let server = servers.recv().await.unwrap();
    server.push(json!({"type": "turn_start", "data": {"character_id": "zed", "text": "who am I"}}));
    server.push(json!({"type": "error", "data": {"message": "topic rejected"}}));
    server.push(json!({"type": "debate_started", "data": {"debate_id": "d-42", "topic": "tea"}}));

    assert_eq!(
        next_event(&mut events, |_| true).await,
        StageEvent::UnknownCharacter {
            character_id: "zed".to_string()
        }
    );
    assert_eq!(
        next_event(&mut events, |_| true).await,
        StageEvent::ServiceError {
            message: "topic rejected".to_string()
        }
    );
    assert_eq!(
        next_event(&mut events, |_| true).await,
        StageEvent::DebateStarted {
            debate_id: Some("d-42".to_string())
        }
    );
    channel.disconnect();
}
