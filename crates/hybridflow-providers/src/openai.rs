//! OpenAI-compatible chat completions provider.

use async_trait::async_trait;
use hybridflow_core::{
    config::{OpenAiConfig, ProviderConfig},
    context::{ApiMessage, ReplyContext},
    error::HybridflowError,
    traits::Provider,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub struct OpenAiProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAiProvider {
    pub fn from_config(
        config: &OpenAiConfig,
        shared: &ProviderConfig,
    ) -> Result<Self, HybridflowError> {
        Ok(Self {
            client: crate::http_client(shared.timeout_secs)?,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_tokens: shared.max_tokens,
            temperature: shared.temperature,
        })
    }
}

/// System prompt goes in as the first message.
fn build_messages(system: &str, api_messages: Vec<ApiMessage>) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(api_messages.len() + 1);
    if !system.is_empty() {
        messages.push(ChatMessage {
            role: "system".to_string(),
            content: system.to_string(),
        });
    }
    messages.extend(api_messages.into_iter().map(|m| ChatMessage {
        role: m.role,
        content: m.content,
    }));
    messages
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Option<Vec<ChatChoice>>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: Option<ChoiceMessage>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

fn first_text(resp: &ChatCompletionResponse) -> Option<String> {
    resp.choices
        .as_ref()?
        .first()?
        .message
        .as_ref()?
        .content
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate_reply(&self, context: &ReplyContext) -> Result<String, HybridflowError> {
        let (system, api_messages) = context.to_api_messages();
        let body = ChatCompletionRequest {
            model: self.model.clone(),
            messages: build_messages(&system, api_messages),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        debug!("openai: POST {url} model={}", self.model);

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| HybridflowError::Generation(format!("openai request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(HybridflowError::Generation(format!(
                "openai returned {status}: {text}"
            )));
        }

        let parsed: ChatCompletionResponse = resp.json().await.map_err(|e| {
            HybridflowError::Generation(format!("openai: failed to parse response: {e}"))
        })?;

        first_text(&parsed)
            .ok_or_else(|| HybridflowError::Generation("openai returned no text".into()))
    }

    async fn is_available(&self) -> bool {
        if self.api_key.is_empty() {
            warn!("openai: no API key configured");
            return false;
        }
        true
    }
}
