//! SignalR JSON hub protocol messages
//!
//! Every record on the wire is a JSON object followed by the `0x1E` record
//! separator. A single WebSocket frame may carry several records.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::HubError;

/// Terminates every record on the wire
pub const RECORD_SEPARATOR: char = '\u{1e}';

/// Hub Message Type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Invocation = 1,
    StreamItem = 2,
    Completion = 3,
    StreamInvocation = 4,
    CancelInvocation = 5,
    Ping = 6,
    Close = 7,
}

impl MessageType {
    fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Invocation),
            2 => Some(Self::StreamItem),
            3 => Some(Self::Completion),
            4 => Some(Self::StreamInvocation),
            5 => Some(Self::CancelInvocation),
            6 => Some(Self::Ping),
            7 => Some(Self::Close),
            _ => None,
        }
    }
}

/// Handshake request sent right after the socket opens
#[derive(Debug, Clone, Serialize)]
pub struct HandshakeRequest {
    pub protocol: &'static str,
    pub version: u32,
}

impl Default for HandshakeRequest {
    fn default() -> Self {
        Self {
            protocol: "json",
            version: 1,
        }
    }
}

/// Handshake response; an empty object means accepted
#[derive(Debug, Clone, Deserialize)]
pub struct HandshakeResponse {
    #[serde(default)]
    pub error: Option<String>,
}

/// Outgoing invocation
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationMessage {
    #[serde(rename = "type")]
    pub message_type: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invocation_id: Option<String>,
    pub target: String,
    pub arguments: Vec<Value>,
}

impl InvocationMessage {
    pub fn new(invocation_id: Option<String>, target: &str, arguments: Vec<Value>) -> Self {
        Self {
            message_type: MessageType::Invocation as u8,
            invocation_id,
            target: target.to_string(),
            arguments,
        }
    }
}

/// Keep-alive record
#[derive(Debug, Clone, Serialize)]
pub struct PingMessage {
    #[serde(rename = "type")]
    pub message_type: u8,
}

impl Default for PingMessage {
    fn default() -> Self {
        Self {
            message_type: MessageType::Ping as u8,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMessage {
    #[serde(rename = "type")]
    message_type: u8,
    #[serde(default)]
    invocation_id: Option<String>,
    #[serde(default)]
    target: Option<String>,
    #[serde(default)]
    arguments: Vec<Value>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    allow_reconnect: bool,
}

/// Decoded incoming message
#[derive(Debug, Clone, PartialEq)]
pub enum HubMessage {
    Invocation {
        invocation_id: Option<String>,
        target: String,
        arguments: Vec<Value>,
    },
    Completion {
        invocation_id: String,
        result: Option<Value>,
        error: Option<String>,
    },
    Ping,
    Close {
        error: Option<String>,
        allow_reconnect: bool,
    },
    /// Stream messages; the load simulator never opens streams
    Other(MessageType),
}

impl HubMessage {
    pub fn parse(record: &str) -> Result<Self, HubError> {
        let raw: RawMessage = serde_json::from_str(record)?;
        let kind = MessageType::from_code(raw.message_type).ok_or_else(|| {
            HubError::Protocol(format!("unknown message type {}", raw.message_type))
        })?;

        let message = match kind {
            MessageType::Invocation => HubMessage::Invocation {
                invocation_id: raw.invocation_id,
                target: raw
                    .target
                    .ok_or_else(|| HubError::Protocol("invocation without target".into()))?,
                arguments: raw.arguments,
            },
            MessageType::Completion => HubMessage::Completion {
                invocation_id: raw
                    .invocation_id
                    .ok_or_else(|| HubError::Protocol("completion without invocationId".into()))?,
                result: raw.result,
                error: raw.error,
            },
            MessageType::Ping => HubMessage::Ping,
            MessageType::Close => HubMessage::Close {
                error: raw.error,
                allow_reconnect: raw.allow_reconnect,
            },
            other => HubMessage::Other(other),
        };
        Ok(message)
    }
}

/// Serialize a message as one terminated record
pub fn encode<T: Serialize>(message: &T) -> Result<String, HubError> {
    let mut frame = serde_json::to_string(message)?;
    frame.push(RECORD_SEPARATOR);
    Ok(frame)
}

/// Split a frame into its records, dropping the empty tail
pub fn records(frame: &str) -> impl Iterator<Item = &str> {
    frame.split(RECORD_SEPARATOR).filter(|r| !r.trim().is_empty())
}
