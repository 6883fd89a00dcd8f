//! Inbound gateway events and the pure payload extractor.
//!
//! Nothing in here fails on malformed input: absent or mistyped fields read
//! as absent.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// The kind of an inbound gateway event.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    MessagesUpsert,
    MessagesUpdate,
    ConnectionUpdate,
    /// Socket-native equivalent of `messages.upsert`.
    Message,
    Other(String),
}

impl EventKind {
    /// Parse an event name. `MESSAGES_UPSERT` and `messages.upsert` are the same kind.
    pub fn parse(name: &str) -> Self {
        let normalized = name.trim().to_ascii_lowercase().replace('_', ".");
        match normalized.as_str() {
            "messages.upsert" => Self::MessagesUpsert,
            "messages.update" => Self::MessagesUpdate,
            "connection.update" => Self::ConnectionUpdate,
            "message" => Self::Message,
            _ => Self::Other(name.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::MessagesUpsert => "messages.upsert",
            Self::MessagesUpdate => "messages.update",
            Self::ConnectionUpdate => "connection.update",
            Self::Message => "message",
            Self::Other(name) => name,
        }
    }

    /// New-message kinds on either channel.
    pub fn is_upsert(&self) -> bool {
        matches!(self, Self::MessagesUpsert | Self::Message)
    }

    /// Kinds the pipeline looks at beyond the event filter.
    pub fn is_handled(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sender flag of a message key. Missing is not the same as `false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FromMe {
    Yes,
    No,
    Unknown,
}

impl FromMe {
    fn from_value(value: Option<&Value>) -> Self {
        match value {
            Some(Value::Bool(true)) => Self::Yes,
            Some(Value::Bool(false)) => Self::No,
            Some(Value::String(s)) if s.eq_ignore_ascii_case("true") => Self::Yes,
            Some(Value::String(s)) if s.eq_ignore_ascii_case("false") => Self::No,
            _ => Self::Unknown,
        }
    }

    /// Storage form. `Unknown` maps to `None`.
    pub fn as_option(self) -> Option<bool> {
        match self {
            Self::Yes => Some(true),
            Self::No => Some(false),
            Self::Unknown => None,
        }
    }
}

/// Which transport delivered an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestChannel {
    Webhook,
    Socket,
}

impl IngestChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Webhook => "webhook",
            Self::Socket => "socket",
        }
    }

    /// Pause reason written when a human takeover is seen on this channel.
    pub fn pause_reason(&self) -> &'static str {
        match self {
            Self::Webhook => "human_takeover",
            Self::Socket => "human_intervention",
        }
    }
}

/// A normalized delivery: `{event, instance, data}`.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub kind: EventKind,
    pub instance: String,
    /// The `data` object, kept verbatim for storage.
    pub data: Value,
}

impl Envelope {
    pub fn new(event: &str, instance: impl Into<String>, data: Value) -> Self {
        Self {
            kind: EventKind::parse(event),
            instance: instance.into(),
            data,
        }
    }

    pub fn fields(&self) -> MessageFields {
        MessageFields::extract(&self.data)
    }
}

/// Fields pulled out of a message payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageFields {
    pub chat_id: Option<String>,
    pub message_id: Option<String>,
    pub from_me: FromMe,
    pub text: Option<String>,
    pub message_type: Option<String>,
    pub push_name: Option<String>,
    /// Seconds since epoch as sent by the gateway.
    pub timestamp: Option<i64>,
}

impl MessageFields {
    /// Extract from a `data` payload. A `data` array is read as its first element.
    pub fn extract(data: &Value) -> Self {
        let data = match data {
            Value::Array(items) => items.first().unwrap_or(&Value::Null),
            other => other,
        };
        let key = data.get("key");

        Self {
            chat_id: non_empty_str(key.and_then(|k| k.get("remoteJid"))),
            message_id: non_empty_str(key.and_then(|k| k.get("id"))),
            from_me: FromMe::from_value(key.and_then(|k| k.get("fromMe"))),
            text: extract_text(data.get("message")),
            message_type: non_empty_str(data.get("messageType")),
            push_name: non_empty_str(data.get("pushName")),
            timestamp: data.get("messageTimestamp").and_then(as_i64),
        }
    }

    /// Text with surrounding whitespace removed, `None` when blank.
    pub fn trimmed_text(&self) -> Option<&str> {
        self.text.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }
}

fn extract_text(message: Option<&Value>) -> Option<String> {
    let message = message?;
    let candidates = [
        message.get("conversation"),
        message
            .get("extendedTextMessage")
            .and_then(|m| m.get("text")),
    ];
    candidates.into_iter().find_map(non_empty_str)
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        // Protobuf Long shape: {"low": .., "high": .., "unsigned": ..}
        Value::Object(obj) => {
            let low = obj.get("low")?.as_i64()?;
            let high = obj.get("high").and_then(Value::as_i64).unwrap_or(0);
            Some((high << 32) | (low & 0xffff_ffff))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_kind_parse() {
        assert_eq!(EventKind::parse("messages.upsert"), EventKind::MessagesUpsert);
        assert_eq!(EventKind::parse("MESSAGES_UPSERT"), EventKind::MessagesUpsert);
        assert_eq!(EventKind::parse("connection.update"), EventKind::ConnectionUpdate);
        assert_eq!(EventKind::parse("message"), EventKind::Message);
        assert_eq!(
            EventKind::parse("presence.update"),
            EventKind::Other("presence.update".into())
        );
        assert!(EventKind::Message.is_upsert());
        assert!(!EventKind::MessagesUpdate.is_upsert());
        assert!(!EventKind::Other("x".into()).is_handled());
    }

    #[test]
    fn test_extract_conversation_text() {
        let data = json!({
            "key": {"remoteJid": "5511999999999@s.whatsapp.net", "id": "M1", "fromMe": false},
            "message": {"conversation": "Hi"},
            "messageType": "conversation",
            "pushName": "Ana",
            "messageTimestamp": 1717000000
        });
        let f = MessageFields::extract(&data);
        assert_eq!(f.chat_id.as_deref(), Some("5511999999999@s.whatsapp.net"));
        assert_eq!(f.message_id.as_deref(), Some("M1"));
        assert_eq!(f.from_me, FromMe::No);
        assert_eq!(f.text.as_deref(), Some("Hi"));
        assert_eq!(f.message_type.as_deref(), Some("conversation"));
        assert_eq!(f.push_name.as_deref(), Some("Ana"));
        assert_eq!(f.timestamp, Some(1717000000));
    }

    #[test]
    fn test_extract_extended_text_when_conversation_empty() {
        let data = json!({
            "key": {"remoteJid": "c", "id": "m"},
            "message": {"conversation": "", "extendedTextMessage": {"text": "quoted reply"}}
        });
        let f = MessageFields::extract(&data);
        assert_eq!(f.text.as_deref(), Some("quoted reply"));
    }

    #[test]
    fn test_missing_from_me_is_unknown() {
        let f = MessageFields::extract(&json!({"key": {"remoteJid": "c", "id": "m"}}));
        assert_eq!(f.from_me, FromMe::Unknown);
        assert_eq!(f.from_me.as_option(), None);

        let f = MessageFields::extract(&json!({"key": {"fromMe": "maybe"}}));
        assert_eq!(f.from_me, FromMe::Unknown);

        let f = MessageFields::extract(&json!({"key": {"fromMe": true}}));
        assert_eq!(f.from_me, FromMe::Yes);
    }

    #[test]
    fn test_unknown_shapes_yield_no_text() {
        let data = json!({
            "key": {"remoteJid": "c", "id": "m", "fromMe": false},
            "message": {"imageMessage": {"url": "https://x"}}
        });
        let f = MessageFields::extract(&data);
        assert!(f.text.is_none());
        assert!(f.trimmed_text().is_none());
    }

    #[test]
    fn test_malformed_payloads_never_panic() {
        for data in [
            json!(null),
            json!("string"),
            json!(42),
            json!([]),
            json!({"key": "not-an-object"}),
            json!({"key": {"remoteJid": 12, "id": null}, "message": []}),
        ] {
            let f = MessageFields::extract(&data);
            assert!(f.chat_id.is_none());
            assert!(f.message_id.is_none());
            assert!(f.text.is_none());
        }
    }

    #[test]
    fn test_data_array_uses_first_element() {
        let data = json!([
            {"key": {"remoteJid": "first", "id": "1"}},
            {"key": {"remoteJid": "second", "id": "2"}}
        ]);
        let f = MessageFields::extract(&data);
        assert_eq!(f.chat_id.as_deref(), Some("first"));
    }

    #[test]
    fn test_timestamp_shapes() {
        let ts = |v: Value| MessageFields::extract(&json!({ "messageTimestamp": v })).timestamp;
        assert_eq!(ts(json!("1717000000")), Some(1717000000));
        assert_eq!(ts(json!({"low": 1717000000, "high": 0, "unsigned": true})), Some(1717000000));
        assert_eq!(ts(json!(true)), None);
    }

    #[test]
    fn test_trimmed_text_blank() {
        let f = MessageFields::extract(&json!({"message": {"conversation": "   "}}));
        assert_eq!(f.text.as_deref(), Some("   "));
        assert!(f.trimmed_text().is_none());
    }

    #[test]
    fn test_pause_reason_per_channel() {
        assert_eq!(IngestChannel::Webhook.pause_reason(), "human_takeover");
        assert_eq!(IngestChannel::Socket.pause_reason(), "human_intervention");
    }
}
