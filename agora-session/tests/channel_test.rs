//! Reconnect policy and message delivery of SessionChannel, on a paused clock

use agora_session::{
    ChannelState, Command, Connection, Connector, OutgoingFrame, SessionChannel, SessionConfig,
    SessionError, TransportEvent,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_test::{assert_err, assert_ok};

#[derive(Debug, Clone, Copy)]
enum Script {
    Open,
    /// Open after a slow handshake
    Slow(Duration),
    Fail,
}

/// Server end of one mock connection
struct ServerSide {
    events: mpsc::UnboundedSender<TransportEvent>,
    frames: mpsc::UnboundedReceiver<OutgoingFrame>,
}

impl ServerSide {
    fn push(&self, message: Value) {
        self.events.send(TransportEvent::Text(message.to_string())).unwrap();
    }

    fn push_raw(&self, text: &str) {
        self.events.send(TransportEvent::Text(text.to_string())).unwrap();
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

struct MockConnector {
    script: Mutex<VecDeque<Script>>,
    attempts: Mutex<Vec<Instant>>,
    servers: mpsc::UnboundedSender<ServerSide>,
}

impl MockConnector {
    /// Connects follow `script`, then fail forever
    fn new(script: Vec<Script>) -> (Arc<Self>, mpsc::UnboundedReceiver<ServerSide>) {
        let (servers, rx) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            script: Mutex::new(script.into()),
            attempts: Mutex::new(Vec::new()),
            servers,
        });
        (connector, rx)
    }

    fn attempts(&self) -> Vec<Instant> {
        self.attempts.lock().clone()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, _endpoint: &str) -> Result<Connection, SessionError> {
        self.attempts.lock().push(Instant::now());
        let step = self.script.lock().pop_front().unwrap_or(Script::Fail);
        if let Script::Slow(delay) = step {
            tokio::time::sleep(delay).await;
        }
        match step {
            Script::Fail => Err(SessionError::Connection("connection refused".to_string())),
            Script::Open | Script::Slow(_) => {
                let (out_tx, out_rx) = mpsc::unbounded_channel();
                let (in_tx, in_rx) = mpsc::unbounded_channel();
                let _ = self.servers.send(ServerSide {
                    events: in_tx,
                    frames: out_rx,
                });
                Ok(Connection {
                    outgoing: out_tx,
                    incoming: in_rx,
                })
            }
        }
    }
}

fn turn(character: &str, text: &str) -> Value {
    json!({"type": "turn_start", "data": {"character_id": character, "text": text}})
}

async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn test_abnormal_close_retries_five_times_then_fails() {
    let (connector, mut servers) = MockConnector::new(vec![Script::Open]);
    let channel = SessionChannel::new(SessionConfig::default(), connector.clone());

    assert_ok!(channel.connect().await);
    assert_eq!(channel.state(), ChannelState::Open);
    let server = servers.recv().await.unwrap();

    let closed_at = Instant::now();
    server.close(1006);
    tokio::time::sleep(Duration::from_secs(60)).await;

    let attempts = connector.attempts();
    assert_eq!(attempts.len(), 6, "initial connect plus five retries");
    for (i, at) in attempts[1..].iter().enumerate() {
        assert_eq!(*at - closed_at, Duration::from_secs(3 * (i as u64 + 1)));
    }
    assert_eq!(channel.state(), ChannelState::Failed);
    assert!(matches!(
        channel.wait_open().await,
        Err(SessionError::Terminal { attempts: 5 })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_mid_backoff_stops_retries() {
    let (connector, mut servers) = MockConnector::new(vec![Script::Open]);
    let channel = SessionChannel::new(SessionConfig::default(), connector.clone());

    channel.connect().await.unwrap();
    let server = servers.recv().await.unwrap();
    server.close(1006);

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(channel.state(), ChannelState::Reconnecting { attempt: 1 });

    channel.disconnect();
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert_eq!(connector.attempts().len(), 1);
    assert_eq!(channel.state(), ChannelState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_normal_close_does_not_reconnect() {
    let (connector, mut servers) = MockConnector::new(vec![Script::Open, Script::Open]);
    let channel = SessionChannel::new(SessionConfig::default(), connector.clone());

    channel.connect().await.unwrap();
    let server = servers.recv().await.unwrap();
    server.close(1000);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(connector.attempts().len(), 1);
    assert_eq!(channel.state(), ChannelState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_initial_failure_rejects_and_recovers() {
    let (connector, mut servers) =
        MockConnector::new(vec![Script::Fail, Script::Fail, Script::Open]);
    let channel = SessionChannel::new(SessionConfig::default(), connector.clone());

    let err = assert_err!(channel.connect().await);
    assert!(matches!(err, SessionError::Connection(_)));
    settle().await;
    assert_eq!(channel.state(), ChannelState::Reconnecting { attempt: 1 });

    assert_ok!(channel.wait_open().await);
    assert_eq!(connector.attempts().len(), 3);

    // a successful open resets the budget: five fresh retries follow
    let server = servers.recv().await.unwrap();
    server.close(1011);
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(connector.attempts().len(), 8);
    assert_eq!(channel.state(), ChannelState::Failed);
}

#[tokio::test(start_paused = true)]
async fn test_backlog_flushed_in_order_before_new_messages() {
    let (connector, mut servers) = MockConnector::new(vec![Script::Open]);
    let channel = SessionChannel::new(SessionConfig::default(), connector);
    channel.connect().await.unwrap();
    let server = servers.recv().await.unwrap();

    server.push(turn("aria", "one"));
    server.push(turn("sera", "two"));
    server.push(turn("eidon", "three"));
    settle().await;
    assert_eq!(channel.pending_messages(), 3);

    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = received.clone();
    channel.attach_handler(move |command| {
        if let Command::TurnStart(turn) = command {
            sink.lock().push(turn.text);
        }
    });
    assert_eq!(channel.pending_messages(), 0);

    server.push(turn("aria", "four"));
    settle().await;

    assert_eq!(*received.lock(), vec!["one", "two", "three", "four"]);
}

#[tokio::test(start_paused = true)]
async fn test_detached_handler_buffers_again() {
    let (connector, mut servers) = MockConnector::new(vec![Script::Open]);
    let channel = SessionChannel::new(SessionConfig::default(), connector);
    channel.connect().await.unwrap();
    let server = servers.recv().await.unwrap();

    channel.attach_handler(|_| {});
    channel.detach_handler();
    server.push(turn("aria", "later"));
    settle().await;
    assert_eq!(channel.pending_messages(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_malformed_message_dropped_channel_stays_open() {
    let (connector, mut servers) = MockConnector::new(vec![Script::Open]);
    let channel = SessionChannel::new(SessionConfig::default(), connector);
    channel.connect().await.unwrap();
    let server = servers.recv().await.unwrap();

    server.push_raw("{definitely not json");
    server.push(json!({"type": "turn_start", "data": {"text": "no character"}}));
    server.push(json!({"type": "session_closed"}));
    settle().await;

    assert_eq!(channel.state(), ChannelState::Open);
    assert_eq!(channel.pending_messages(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_send_requires_open_session() {
    let (connector, mut servers) = MockConnector::new(vec![Script::Open]);
    let channel = SessionChannel::new(SessionConfig::default(), connector);

    // not open yet: logged no-op
    channel.start_debate("ignored", &["aria".to_string()]);

    channel.connect().await.unwrap();
    let mut server = servers.recv().await.unwrap();

    channel.start_debate("Is AI conscious?", &["aria".to_string(), "eidon".to_string()]);
    channel.stop_debate("d-1");

    match server.frames.recv().await.unwrap() {
        OutgoingFrame::Text(text) => {
            let value: Value = serde_json::from_str(&text).unwrap();
            assert_eq!(
                value,
                json!({"type": "start_debate", "data": {"topic": "Is AI conscious?", "characters": ["aria", "eidon"]}})
            );
        }
        other => panic!("Expected text frame, got {:?}", other),
    }
    match server.frames.recv().await.unwrap() {
        OutgoingFrame::Text(text) => assert!(text.contains("\"stop_debate\"")),
        other => panic!("Expected text frame, got {:?}", other),
    }

    channel.disconnect();
    assert_eq!(
        server.frames.recv().await.unwrap(),
        OutgoingFrame::Close {
            code: 1000,
            reason: "Client disconnecting".to_string()
        }
    );

    // closed again: nothing is queued for later
    channel.stop_debate("d-1");
    assert!(server.frames.recv().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_during_handshake_closes_new_connection() {
    let (connector, mut servers) = MockConnector::new(vec![Script::Slow(Duration::from_millis(500))]);
    let channel = SessionChannel::new(SessionConfig::default(), connector.clone());

    let connecting = tokio::spawn({
        let channel = channel.clone();
        async move { channel.connect().await }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(channel.state(), ChannelState::Connecting);
    channel.disconnect();

    let err = assert_err!(assert_ok!(connecting.await));
    assert!(matches!(err, SessionError::Connection(_)));
    assert_eq!(channel.state(), ChannelState::Disconnected);

    // the late connection is closed normally, never left to drop
    let mut server = servers.recv().await.unwrap();
    assert_eq!(
        server.frames.recv().await.unwrap(),
        OutgoingFrame::Close {
            code: 1000,
            reason: "Client disconnecting".to_string()
        }
    );
    assert!(server.frames.recv().await.is_none());

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(connector.attempts().len(), 1);
    assert_eq!(channel.state(), ChannelState::Disconnected);
}
