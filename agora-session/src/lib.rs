//! agora-session: connection to the remote conversation service
//!
//! - A long-lived WebSocket session that survives abnormal closures
//!   with bounded reconnects and buffers commands until a consumer attaches
//! - The JSON wire protocol (turn commands in, debate control out)
//! - The HTTP interaction endpoint used for single questions

pub mod error;
pub mod config;
pub mod protocol;
pub mod transport;
pub mod channel;
pub mod interact;

pub use error::SessionError;
pub use config::SessionConfig;
pub use protocol::{Command, DebateInfo, OutboundMessage, StartDebate, TurnStart};
pub use transport::{Connection, Connector, OutgoingFrame, TransportEvent, WsConnector};
pub use channel::{ChannelState, MessageHandler, SessionChannel};
pub use interact::{InteractClient, InteractResponse};
