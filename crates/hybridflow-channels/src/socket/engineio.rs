//! Engine.IO v4 / Socket.IO v5 text framing.
//!
//! Only what a receiving client needs: handshake, heartbeat, namespace
//! connect/disconnect, and events. Binary attachments are not supported.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("empty frame")]
    Empty,
    #[error("unknown engine.io packet type: {0}")]
    UnknownEngineType(char),
    #[error("unknown socket.io packet type: {0}")]
    UnknownSocketType(char),
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}

/// Handshake data sent by the server in the `open` packet.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub sid: String,
    #[serde(default = "default_ping_interval")]
    pub ping_interval: u64,
    #[serde(default = "default_ping_timeout")]
    pub ping_timeout: u64,
}

fn default_ping_interval() -> u64 {
    25_000
}

fn default_ping_timeout() -> u64 {
    20_000
}

/// Engine.IO packet.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Open(Handshake),
    Close,
    Ping,
    Pong,
    Message(SocketPacket),
    Upgrade,
    Noop,
}

/// Socket.IO packet carried inside an Engine.IO message.
#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect { namespace: String, data: Value },
    Disconnect { namespace: String },
    Event {
        namespace: String,
        ack_id: Option<u64>,
        name: String,
        data: Value,
    },
    Ack { namespace: String, ack_id: u64 },
    ConnectError { namespace: String, data: Value },
}

impl Packet {
    pub fn decode(frame: &str) -> Result<Self, DecodeError> {
        let mut chars = frame.chars();
        let kind = chars.next().ok_or(DecodeError::Empty)?;
        let rest = chars.as_str();
        match kind {
            '0' => serde_json::from_str(rest)
                .map(Packet::Open)
                .map_err(|e| DecodeError::InvalidPayload(format!("handshake: {e}"))),
            '1' => Ok(Packet::Close),
            '2' => Ok(Packet::Ping),
            '3' => Ok(Packet::Pong),
            '4' => SocketPacket::decode(rest).map(Packet::Message),
            '5' => Ok(Packet::Upgrade),
            '6' => Ok(Packet::Noop),
            other => Err(DecodeError::UnknownEngineType(other)),
        }
    }
}

impl SocketPacket {
    fn decode(body: &str) -> Result<Self, DecodeError> {
        let mut chars = body.chars();
        let kind = chars.next().ok_or(DecodeError::Empty)?;
        let (namespace, rest) = split_namespace(chars.as_str());

        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        let ack_id = rest[..digits].parse::<u64>().ok();
        let payload = &rest[digits..];

        let json = || -> Result<Value, DecodeError> {
            if payload.is_empty() {
                Ok(Value::Null)
            } else {
                serde_json::from_str(payload).map_err(|e| DecodeError::InvalidPayload(e.to_string()))
            }
        };

        match kind {
            '0' => Ok(Self::Connect {
                namespace,
                data: json()?,
            }),
            '1' => Ok(Self::Disconnect { namespace }),
            '2' => {
                let mut args = match json()? {
                    Value::Array(args) => args.into_iter(),
                    other => {
                        return Err(DecodeError::InvalidPayload(format!(
                            "event payload is not an array: {other}"
                        )))
                    }
                };
                let name = match args.next() {
                    Some(Value::String(name)) => name,
                    _ => return Err(DecodeError::InvalidPayload("missing event name".into())),
                };
                Ok(Self::Event {
                    namespace,
                    ack_id,
                    name,
                    data: args.next().unwrap_or(Value::Null),
                })
            }
            '3' => Ok(Self::Ack {
                namespace,
                ack_id: ack_id.unwrap_or_default(),
            }),
            '4' => Ok(Self::ConnectError {
                namespace,
                data: json()?,
            }),
            other => Err(DecodeError::UnknownSocketType(other)),
        }
    }
}

/// `/ns,rest` → (`/ns`, `rest`); anything else is the root namespace.
fn split_namespace(s: &str) -> (String, &str) {
    if s.starts_with('/') {
        match s.split_once(',') {
            Some((ns, rest)) => (ns.to_string(), rest),
            None => (s.to_string(), ""),
        }
    } else {
        ("/".to_string(), s)
    }
}

fn namespace_prefix(namespace: &str) -> String {
    if namespace == "/" || namespace.is_empty() {
        String::new()
    } else {
        format!("{namespace},")
    }
}

/// Engine.IO pong.
pub fn encode_pong() -> String {
    "3".to_string()
}

/// Socket.IO namespace connect.
pub fn encode_connect(namespace: &str, auth: Option<&Value>) -> String {
    let mut frame = format!("40{}", namespace_prefix(namespace));
    if let Some(auth) = auth {
        frame.push_str(&auth.to_string());
    }
    frame
}

/// Socket.IO namespace disconnect.
pub fn encode_disconnect(namespace: &str) -> String {
    format!("41{}", namespace_prefix(namespace))
}

/// Socket.IO event acknowledgement with no arguments.
pub fn encode_ack(namespace: &str, ack_id: u64) -> String {
    format!("43{}{ack_id}[]", namespace_prefix(namespace))
}

/// WebSocket endpoint for a Socket.IO server URL.
pub fn websocket_url(server_url: &str) -> String {
    let base = server_url.trim_end_matches('/');
    let base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else if base.starts_with("ws://") || base.starts_with("wss://") {
        base.to_string()
    } else {
        format!("ws://{base}")
    };
    format!("{base}/socket.io/?EIO=4&transport=websocket")
}
