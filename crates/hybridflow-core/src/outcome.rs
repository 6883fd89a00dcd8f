//! Terminal states of one pass through the reply pipeline.

use serde_json::{json, Value};

/// Action stored in the idempotency ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessedAction {
    Paused,
    IgnoredPaused,
    AiReplied,
    AiFailed,
    SendFailed,
    /// Delegated to the named workflow hook.
    WorkflowTriggered(String),
    WorkflowFailed(String),
}

impl ProcessedAction {
    pub fn tag(&self) -> String {
        match self {
            Self::Paused => "paused".into(),
            Self::IgnoredPaused => "ignored_paused".into(),
            Self::AiReplied => "ai_replied".into(),
            Self::AiFailed => "ai_failed".into(),
            Self::SendFailed => "evolution_send_failed".into(),
            Self::WorkflowTriggered(hook) => format!("{hook}_triggered"),
            Self::WorkflowFailed(hook) => format!("{hook}_failed"),
        }
    }
}

/// Result of handling one inbound delivery. Every variant is a success
/// acknowledgement from the transport's point of view.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Event kind outside the pipeline's interest.
    Ignored { event: String },
    /// Handled kind with nothing to do (connection updates, non-inbound messages).
    Acknowledged,
    MissingIds,
    DuplicateIgnored,
    Paused,
    IgnoredPaused,
    NoText,
    WorkflowTriggered { hook: String, response: Value },
    WorkflowFailed { hook: String, error: String },
    AiReplied { reply_preview: String },
    AiFailed { error: String },
    SendFailed { error: String },
}

impl Outcome {
    pub fn action(&self) -> String {
        match self {
            Self::Ignored { .. } => "ignored".into(),
            Self::Acknowledged => "acknowledged".into(),
            Self::MissingIds => "missing_ids".into(),
            Self::DuplicateIgnored => "duplicate_ignored".into(),
            Self::Paused => ProcessedAction::Paused.tag(),
            Self::IgnoredPaused => ProcessedAction::IgnoredPaused.tag(),
            Self::NoText => "no_text".into(),
            Self::WorkflowTriggered { hook, .. } => {
                ProcessedAction::WorkflowTriggered(hook.clone()).tag()
            }
            Self::WorkflowFailed { hook, .. } => ProcessedAction::WorkflowFailed(hook.clone()).tag(),
            Self::AiReplied { .. } => ProcessedAction::AiReplied.tag(),
            Self::AiFailed { .. } => ProcessedAction::AiFailed.tag(),
            Self::SendFailed { .. } => ProcessedAction::SendFailed.tag(),
        }
    }

    /// Acknowledgement body returned to the delivering transport.
    pub fn to_json(&self) -> Value {
        let mut body = json!({ "ok": true, "action": self.action() });
        let extra = match self {
            Self::Ignored { event } => json!({ "ignored": event }),
            Self::MissingIds => json!({ "note": "No chat_id or message_id" }),
            Self::WorkflowTriggered { response, .. } => json!({ "response": response }),
            Self::WorkflowFailed { error, .. }
            | Self::AiFailed { error }
            | Self::SendFailed { error } => json!({ "error": error }),
            Self::AiReplied { reply_preview } => json!({ "reply_preview": reply_preview }),
            _ => Value::Null,
        };
        if let (Some(body), Value::Object(extra)) = (body.as_object_mut(), extra) {
            body.extend(extra);
        }
        body
    }
}

/// First `max_chars` characters of `text`, with `...` appended when cut.
pub fn preview(text: &str, max_chars: usize) -> String {
    let mut chars = text.char_indices();
    match chars.nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_tags() {
        assert_eq!(ProcessedAction::SendFailed.tag(), "evolution_send_failed");
        assert_eq!(
            ProcessedAction::WorkflowTriggered("n8n".into()).tag(),
            "n8n_triggered"
        );
        assert_eq!(ProcessedAction::WorkflowFailed("n8n".into()).tag(), "n8n_failed");
        assert_eq!(Outcome::DuplicateIgnored.action(), "duplicate_ignored");
        assert_eq!(Outcome::IgnoredPaused.action(), "ignored_paused");
    }

    #[test]
    fn test_to_json_is_always_ok() {
        let outcomes = [
            Outcome::Ignored { event: "presence.update".into() },
            Outcome::Acknowledged,
            Outcome::MissingIds,
            Outcome::AiFailed { error: "boom".into() },
            Outcome::SendFailed { error: "502".into() },
        ];
        for o in outcomes {
            assert_eq!(o.to_json()["ok"], true, "{o:?}");
        }
    }

    #[test]
    fn test_to_json_details() {
        let body = Outcome::Ignored { event: "presence.update".into() }.to_json();
        assert_eq!(body["ignored"], "presence.update");

        let body = Outcome::AiReplied { reply_preview: "hey".into() }.to_json();
        assert_eq!(body["action"], "ai_replied");
        assert_eq!(body["reply_preview"], "hey");

        let body = Outcome::MissingIds.to_json();
        assert_eq!(body["note"], "No chat_id or message_id");
    }

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        assert_eq!(preview("short", 100), "short");
        let long = "a".repeat(150);
        let p = preview(&long, 100);
        assert_eq!(p.len(), 103);
        assert!(p.ends_with("..."));
        assert_eq!(preview("olá mundo", 3), "olá...");
        assert_eq!(preview(&"x".repeat(100), 100), "x".repeat(100));
    }
}
