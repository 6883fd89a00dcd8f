use serde::{Deserialize, Serialize};

/// A single prior turn in a chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextEntry {
    /// "user" or "assistant".
    pub role: String,
    pub content: String,
}

impl ContextEntry {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Everything a provider needs to produce one reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyContext {
    pub system_prompt: String,
    /// Prior turns, oldest first.
    #[serde(default)]
    pub history: Vec<ContextEntry>,
    /// The inbound text being answered.
    pub current_message: String,
}

/// A structured message for chat-style APIs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiMessage {
    pub role: String,
    pub content: String,
}

impl ReplyContext {
    pub fn new(system_prompt: &str, message: &str) -> Self {
        Self {
            system_prompt: system_prompt.to_string(),
            history: Vec::new(),
            current_message: message.to_string(),
        }
    }

    pub fn with_history(mut self, history: Vec<ContextEntry>) -> Self {
        self.history = history;
        self
    }

    /// Convert to `(system_prompt, messages)`.
    ///
    /// Leading assistant turns are dropped and consecutive turns of the same
    /// role are merged, so the sequence always starts with `user` and
    /// alternates.
    pub fn to_api_messages(&self) -> (String, Vec<ApiMessage>) {
        let mut messages: Vec<ApiMessage> = Vec::with_capacity(self.history.len() + 1);
        let turns = self
            .history
            .iter()
            .map(|e| (e.role.as_str(), e.content.as_str()))
            .chain(std::iter::once(("user", self.current_message.as_str())));

        for (role, content) in turns {
            if content.trim().is_empty() {
                continue;
            }
            if messages.is_empty() && role != "user" {
                continue;
            }
            match messages.last_mut() {
                Some(last) if last.role == role => {
                    last.content.push('\n');
                    last.content.push_str(content);
                }
                _ => messages.push(ApiMessage {
                    role: role.to_string(),
                    content: content.to_string(),
                }),
            }
        }

        (self.system_prompt.clone(), messages)
    }
}
