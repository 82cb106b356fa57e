//! Wire messages exchanged with the conversation service

use crate::error::SessionError;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Envelope every inbound message shares
#[derive(Debug, Clone, Deserialize)]
struct RawMessage {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

/// A character's turn: text to perform and, optionally, pre-rendered audio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnStart {
    pub character_id: String,

    #[serde(default)]
    pub text: String,

    /// Standard base64 of one audio container
    #[serde(default)]
    pub audio_b64: Option<String>,

    #[serde(default, deserialize_with = "lenient_id")]
    pub debate_id: Option<String>,

    #[serde(default, deserialize_with = "lenient_turn")]
    pub turn: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebateInfo {
    #[serde(deserialize_with = "lenient_id")]
    pub debate_id: Option<String>,
    #[serde(deserialize_with = "lenient_id")]
    pub topic: Option<String>,
    #[serde(deserialize_with = "lenient_names")]
    pub characters: Vec<String>,
}

// Metadata fields are informational: odd shapes degrade to None instead of
// rejecting the whole message.

fn lenient_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn lenient_turn<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_names<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    })
}

/// Inbound command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    TurnStart(TurnStart),
    DebateStarted(DebateInfo),
    SessionClosed { reason: Option<String> },
    Error { message: String },
    /// Well-formed but not acted upon
    Other { kind: String, data: Value },
}

impl Command {
    /// Parse one text frame
    pub fn parse(text: &str) -> Result<Self, SessionError> {
        let raw: RawMessage = serde_json::from_str(text)
            .map_err(|e| SessionError::Protocol(format!("invalid message: {}", e)))?;

        let RawMessage { kind, data } = raw;
        match kind.as_str() {
            "turn_start" => serde_json::from_value(data)
                .map(Command::TurnStart)
                .map_err(|e| SessionError::Protocol(format!("invalid turn_start: {}", e))),
            "debate_started" => {
                let info = if data.is_null() {
                    DebateInfo::default()
                } else {
                    serde_json::from_value(data).map_err(|e| {
                        SessionError::Protocol(format!("invalid debate_started: {}", e))
                    })?
                };
                Ok(Command::DebateStarted(info))
            }
            "session_closed" => Ok(Command::SessionClosed {
                reason: text_field(&data, "reason"),
            }),
            "error" => Ok(Command::Error {
                message: text_field(&data, "message").unwrap_or_else(|| data.to_string()),
            }),
            _ => Ok(Command::Other {
                kind: kind.clone(),
                data,
            }),
        }
    }

    /// Wire name of the command
    pub fn kind(&self) -> &str {
        match self {
            Command::TurnStart(_) => "turn_start",
            Command::DebateStarted(_) => "debate_started",
            Command::SessionClosed { .. } => "session_closed",
            Command::Error { .. } => "error",
            Command::Other { kind, .. } => kind.as_str(),
        }
    }
}

fn text_field(data: &Value, field: &str) -> Option<String> {
    match data {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map.get(field).and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartDebate {
    pub topic: String,
    pub characters: Vec<String>,
}

/// Messages the client initiates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    StartDebate { data: StartDebate },
    StopDebate { debate_id: String },
}

impl OutboundMessage {
    pub fn start_debate(topic: impl Into<String>, characters: Vec<String>) -> Self {
        OutboundMessage::StartDebate {
            data: StartDebate {
                topic: topic.into(),
                characters,
            },
        }
    }

    pub fn stop_debate(debate_id: impl Into<String>) -> Self {
        OutboundMessage::StopDebate {
            debate_id: debate_id.into(),
        }
    }
}
