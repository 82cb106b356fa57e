//! Long-lived session with the conversation service
//!
//! The channel owns one supervisor task per `connect()`. The supervisor pumps
//! inbound frames into the mailbox and, after an abnormal closure, retries on a
//! fixed delay until the attempt cap is reached.

use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::protocol::{Command, OutboundMessage};
use crate::transport::{Connection, Connector, OutgoingFrame, TransportEvent, ABNORMAL_CLOSURE, NORMAL_CLOSURE};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Open,
    Reconnecting { attempt: u32 },
    /// Reconnect attempts exhausted
    Failed,
}

/// Consumer of inbound commands. Runs under the mailbox lock, so it must not
/// call back into `attach_handler`/`detach_handler`.
pub type MessageHandler = Box<dyn Fn(Command) + Send + Sync>;

#[derive(Default)]
struct Mailbox {
    pending: VecDeque<Command>,
    handler: Option<MessageHandler>,
}

impl Mailbox {
    fn deliver(&mut self, command: Command) {
        match self.handler {
            Some(ref handler) => handler(command),
            None => self.pending.push_back(command),
        }
    }
}

struct Inner {
    config: SessionConfig,
    connector: Arc<dyn Connector>,
    mailbox: Mutex<Mailbox>,
    state_tx: watch::Sender<ChannelState>,
    outgoing: Mutex<Option<mpsc::UnboundedSender<OutgoingFrame>>>,
    shutdown: Mutex<Option<watch::Sender<bool>>>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
    /// Bumped by every connect/disconnect; stale supervisors stop writing state
    session: AtomicU64,
}

impl Inner {
    fn set_state(&self, session: u64, state: ChannelState) {
        if self.session.load(Ordering::SeqCst) == session {
            self.state_tx.send_replace(state);
        }
    }

    fn dispatch(&self, text: &str) {
        match Command::parse(text) {
            Ok(command) => {
                debug!(kind = command.kind(), "received command");
                self.mailbox.lock().deliver(command);
            }
            Err(e) => warn!(error = %e, "dropping malformed message"),
        }
    }

    async fn connect_once(&self) -> Result<Connection, SessionError> {
        tokio::time::timeout(
            self.config.connect_timeout(),
            self.connector.connect(&self.config.endpoint),
        )
        .await
        .map_err(|_| SessionError::Connection("connection attempt timed out".to_string()))?
    }
}

/// Handle to the session. Cloning shares the same connection.
#[derive(Clone)]
pub struct SessionChannel {
    inner: Arc<Inner>,
}

impl SessionChannel {
    pub fn new(config: SessionConfig, connector: Arc<dyn Connector>) -> Self {
        let (state_tx, _) = watch::channel(ChannelState::Disconnected);
        Self {
            inner: Arc::new(Inner {
                config,
                connector,
                mailbox: Mutex::new(Mailbox::default()),
                state_tx,
                outgoing: Mutex::new(None),
                shutdown: Mutex::new(None),
                supervisor: Mutex::new(None),
                session: AtomicU64::new(0),
            }),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub fn state(&self) -> ChannelState {
        *self.inner.state_tx.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ChannelState> {
        self.inner.state_tx.subscribe()
    }

    pub fn is_open(&self) -> bool {
        self.state() == ChannelState::Open
    }

    /// Commands buffered while no handler is attached
    pub fn pending_messages(&self) -> usize {
        self.inner.mailbox.lock().pending.len()
    }

    /// Open the session. Resolves once the first connection is open; an
    /// establishment failure is returned and also starts the reconnect policy.
    /// A `disconnect()` racing the handshake closes the new connection and
    /// fails the call.
    pub async fn connect(&self) -> Result<(), SessionError> {
        if self.is_open() {
            return Ok(());
        }

        self.stop_supervisor();
        let session = self.inner.session.fetch_add(1, Ordering::SeqCst) + 1;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        *self.inner.shutdown.lock() = Some(shutdown_tx);

        self.inner.set_state(session, ChannelState::Connecting);
        info!(endpoint = %self.inner.config.endpoint, "connecting session");

        let (initial, result) = match self.inner.connect_once().await {
            Ok(connection) => {
                // disconnect() bumps the session before taking the sender
                let current = {
                    let mut outgoing = self.inner.outgoing.lock();
                    let current = self.inner.session.load(Ordering::SeqCst) == session;
                    if current {
                        *outgoing = Some(connection.outgoing.clone());
                    }
                    current
                };
                if !current {
                    let _ = connection.outgoing.send(OutgoingFrame::Close {
                        code: NORMAL_CLOSURE,
                        reason: "Client disconnecting".to_string(),
                    });
                    info!("session closed while connecting");
                    return Err(SessionError::Connection(
                        "disconnected while connecting".to_string(),
                    ));
                }
                self.inner.set_state(session, ChannelState::Open);
                info!("session open");
                (Some(connection), Ok(()))
            }
            Err(e) => {
                error!(error = %e, "session connection failed");
                (None, Err(e))
            }
        };

        if self.inner.session.load(Ordering::SeqCst) != session {
            // disconnected while connecting
            return result;
        }

        let inner = self.inner.clone();
        let handle = tokio::spawn(supervise(inner, session, initial, shutdown_rx));
        *self.inner.supervisor.lock() = Some(handle);
        result
    }

    /// Close with the normal closure code and stop reconnecting
    pub fn disconnect(&self) {
        self.inner.session.fetch_add(1, Ordering::SeqCst);
        if let Some(tx) = self.inner.outgoing.lock().take() {
            let _ = tx.send(OutgoingFrame::Close {
                code: NORMAL_CLOSURE,
                reason: "Client disconnecting".to_string(),
            });
        }
        if let Some(shutdown) = self.inner.shutdown.lock().take() {
            shutdown.send_replace(true);
        }
        self.inner.state_tx.send_replace(ChannelState::Disconnected);
        info!("session disconnected");
    }

    /// Install the command consumer. Buffered commands are handed over first,
    /// in arrival order, before any command that arrives afterwards.
    pub fn attach_handler<F>(&self, handler: F)
    where
        F: Fn(Command) + Send + Sync + 'static,
    {
        let mut mailbox = self.inner.mailbox.lock();
        let backlog = mailbox.pending.len();
        while let Some(command) = mailbox.pending.pop_front() {
            handler(command);
        }
        mailbox.handler = Some(Box::new(handler));
        debug!(backlog, "message handler attached");
    }

    /// Remove the consumer; later commands are buffered again
    pub fn detach_handler(&self) {
        self.inner.mailbox.lock().handler = None;
    }

    /// Serialize and send. Logged and dropped when the session is not open.
    pub fn send<M: Serialize + ?Sized>(&self, message: &M) {
        if !self.is_open() {
            warn!(state = ?self.state(), "session not open, cannot send message");
            return;
        }
        let json = match serde_json::to_string(message) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "failed to serialize outbound message");
                return;
            }
        };
        match self.inner.outgoing.lock().as_ref() {
            Some(tx) => {
                if tx.send(OutgoingFrame::Text(json)).is_err() {
                    warn!("session transport closed, message dropped");
                } else {
                    debug!("sent message");
                }
            }
            None => warn!("session has no transport, message dropped"),
        }
    }

    pub fn start_debate(&self, topic: &str, characters: &[String]) {
        self.send(&OutboundMessage::start_debate(topic, characters.to_vec()));
    }

    pub fn stop_debate(&self, debate_id: &str) {
        self.send(&OutboundMessage::stop_debate(debate_id));
    }

    /// Wait until the session is open. Fails with `Terminal` once the
    /// reconnect policy gives up, and with `Connection` after an explicit close.
    pub async fn wait_open(&self) -> Result<(), SessionError> {
        let mut rx = self.watch_state();
        loop {
            let state = *rx.borrow_and_update();
            match state {
                ChannelState::Open => return Ok(()),
                ChannelState::Failed => {
                    return Err(SessionError::Terminal {
                        attempts: self.inner.config.max_reconnect_attempts,
                    })
                }
                ChannelState::Disconnected => {
                    return Err(SessionError::Connection("session is disconnected".to_string()))
                }
                ChannelState::Connecting | ChannelState::Reconnecting { .. } => {}
            }
            if rx.changed().await.is_err() {
                return Err(SessionError::Connection("session dropped".to_string()));
            }
        }
    }

    fn stop_supervisor(&self) {
        if let Some(handle) = self.inner.supervisor.lock().take() {
            handle.abort();
        }
    }
}

async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    // A dropped sender also means this session is over
    let _ = rx.wait_for(|stop| *stop).await;
}

/// Pump inbound frames until the connection closes. `None` means shutdown.
async fn pump(
    inner: &Inner,
    connection: &mut Connection,
    shutdown: &mut watch::Receiver<bool>,
) -> Option<(u16, String)> {
    loop {
        tokio::select! {
            event = connection.incoming.recv() => match event {
                Some(TransportEvent::Text(text)) => inner.dispatch(&text),
                Some(TransportEvent::Closed { code, reason }) => return Some((code, reason)),
                None => return Some((ABNORMAL_CLOSURE, "transport ended".to_string())),
            },
            _ = shutdown_requested(shutdown) => return None,
        }
    }
}

async fn supervise(
    inner: Arc<Inner>,
    session: u64,
    mut connection: Option<Connection>,
    mut shutdown: watch::Receiver<bool>,
) {
    let max_attempts = inner.config.max_reconnect_attempts;
    let mut attempts: u32 = 0;

    loop {
        if let Some(mut open) = connection.take() {
            let closed = pump(&inner, &mut open, &mut shutdown).await;
            if inner.session.load(Ordering::SeqCst) == session {
                *inner.outgoing.lock() = None;
            }
            match closed {
                None => return,
                Some((code, reason)) if code == NORMAL_CLOSURE => {
                    info!(code, reason = %reason, "session closed normally");
                    inner.set_state(session, ChannelState::Disconnected);
                    return;
                }
                Some((code, reason)) => {
                    warn!(code, reason = %reason, "session closed abnormally");
                }
            }
        }

        if attempts >= max_attempts {
            error!(attempts, "max reconnection attempts reached");
            inner.set_state(session, ChannelState::Failed);
            return;
        }
        attempts += 1;
        inner.set_state(session, ChannelState::Reconnecting { attempt: attempts });
        info!(attempt = attempts, max = max_attempts, "reconnecting");

        tokio::select! {
            _ = tokio::time::sleep(inner.config.reconnect_delay()) => {}
            _ = shutdown_requested(&mut shutdown) => return,
        }

        inner.set_state(session, ChannelState::Connecting);
        let result = tokio::select! {
            result = inner.connect_once() => result,
            _ = shutdown_requested(&mut shutdown) => return,
        };
        match result {
            Ok(open) => {
                if inner.session.load(Ordering::SeqCst) != session {
                    return;
                }
                *inner.outgoing.lock() = Some(open.outgoing.clone());
                inner.set_state(session, ChannelState::Open);
                info!(attempt = attempts, "session reopened");
                attempts = 0;
                connection = Some(open);
            }
            Err(e) => warn!(attempt = attempts, error = %e, "reconnect failed"),
        }
    }
}
