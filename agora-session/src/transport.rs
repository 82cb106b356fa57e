//! Duplex transport under the session channel

use crate::error::SessionError;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};
use url::Url;

/// Normal, expected closure
pub const NORMAL_CLOSURE: u16 = 1000;

/// Connection dropped without a close frame
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// Close frame received without a status code
const NO_STATUS: u16 = 1005;

/// Frame the client sends
#[derive(Debug, Clone, PartialEq)]
pub enum OutgoingFrame {
    Text(String),
    Close { code: u16, reason: String },
}

/// Event coming up from the transport. A connection reports exactly one
/// `Closed`; a receiver that ends without one means an abnormal closure.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Text(String),
    Closed { code: u16, reason: String },
}

/// An open connection as a pair of queues
#[derive(Debug)]
pub struct Connection {
    pub outgoing: mpsc::UnboundedSender<OutgoingFrame>,
    pub incoming: mpsc::UnboundedReceiver<TransportEvent>,
}

/// Opens connections to the conversation service
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, endpoint: &str) -> Result<Connection, SessionError>;
}

/// WebSocket transport
#[derive(Debug, Clone)]
pub struct WsConnector {
    connect_timeout: Duration,
}

impl WsConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for WsConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, endpoint: &str) -> Result<Connection, SessionError> {
        let url = Url::parse(endpoint)?;
        if url.scheme() != "ws" && url.scheme() != "wss" {
            return Err(SessionError::Config(format!(
                "Unsupported endpoint scheme: {}",
                url.scheme()
            )));
        }

        let (ws_stream, _) = tokio::time::timeout(self.connect_timeout, connect_async(url.as_str()))
            .await
            .map_err(|_| SessionError::Connection("WebSocket connection timed out".to_string()))?
            .map_err(|e| SessionError::Connection(format!("Failed to connect WebSocket: {}", e)))?;

        let (mut sink, mut stream) = ws_stream.split();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<OutgoingFrame>();
        let (in_tx, in_rx) = mpsc::unbounded_channel::<TransportEvent>();

        tokio::spawn(async move {
            while let Some(frame) = out_rx.recv().await {
                let (message, closing) = match frame {
                    OutgoingFrame::Text(text) => (Message::Text(text), false),
                    OutgoingFrame::Close { code, reason } => (
                        Message::Close(Some(CloseFrame {
                            code: CloseCode::from(code),
                            reason: reason.into(),
                        })),
                        true,
                    ),
                };
                if let Err(e) = sink.send(message).await {
                    warn!(error = %e, "WebSocket send failed");
                    break;
                }
                if closing {
                    break;
                }
            }
        });

        tokio::spawn(async move {
            let closed = loop {
                match stream.next().await {
                    Some(Ok(Message::Text(text))) => {
                        if in_tx.send(TransportEvent::Text(text)).is_err() {
                            return;
                        }
                    }
                    Some(Ok(Message::Binary(data))) => match String::from_utf8(data) {
                        Ok(text) => {
                            if in_tx.send(TransportEvent::Text(text)).is_err() {
                                return;
                            }
                        }
                        Err(_) => warn!("dropping non UTF-8 binary frame"),
                    },
                    Some(Ok(Message::Close(frame))) => {
                        break match frame {
                            Some(frame) => TransportEvent::Closed {
                                code: u16::from(frame.code),
                                reason: frame.reason.into_owned(),
                            },
                            None => TransportEvent::Closed {
                                code: NO_STATUS,
                                reason: String::new(),
                            },
                        };
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(error = %e, "WebSocket read failed");
                        break TransportEvent::Closed {
                            code: ABNORMAL_CLOSURE,
                            reason: e.to_string(),
                        };
                    }
                    None => {
                        break TransportEvent::Closed {
                            code: ABNORMAL_CLOSURE,
                            reason: "stream ended".to_string(),
                        };
                    }
                }
            };
            let _ = in_tx.send(closed);
        });

        Ok(Connection {
            outgoing: out_tx,
            incoming: in_rx,
        })
    }
}
