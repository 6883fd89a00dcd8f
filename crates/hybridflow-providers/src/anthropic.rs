//! Anthropic Messages API provider.

use async_trait::async_trait;
use hybridflow_core::{
    config::{AnthropicConfig, ProviderConfig},
    context::ReplyContext,
    error::HybridflowError,
    traits::Provider,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl AnthropicProvider {
    pub fn from_config(
        config: &AnthropicConfig,
        shared: &ProviderConfig,
    ) -> Result<Self, HybridflowError> {
        Ok(Self {
            client: crate::http_client(shared.timeout_secs)?,
            api_url: ANTHROPIC_API_URL.to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_tokens: shared.max_tokens,
            temperature: shared.temperature,
        })
    }

    /// Point at a different Messages endpoint.
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }
}

#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "String::is_empty")]
    system: String,
    messages: Vec<AnthropicMessage>,
}

#[derive(Serialize, Deserialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Option<Vec<AnthropicContentBlock>>,
}

#[derive(Deserialize)]
struct AnthropicContentBlock {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    text: String,
}

fn first_text(resp: &AnthropicResponse) -> Option<String> {
    resp.content
        .as_ref()?
        .iter()
        .filter(|b| b.kind.is_empty() || b.kind == "text")
        .map(|b| b.text.trim())
        .find(|t| !t.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate_reply(&self, context: &ReplyContext) -> Result<String, HybridflowError> {
        let (system, api_messages) = context.to_api_messages();

        let body = AnthropicRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            system,
            messages: api_messages
                .into_iter()
                .map(|m| AnthropicMessage {
                    role: m.role,
                    content: m.content,
                })
                .collect(),
        };

        debug!("anthropic: POST {} model={}", self.api_url, self.model);

        let resp = self
            .client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| HybridflowError::Generation(format!("anthropic request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(HybridflowError::Generation(format!(
                "anthropic returned {status}: {text}"
            )));
        }

        let parsed: AnthropicResponse = resp.json().await.map_err(|e| {
            HybridflowError::Generation(format!("anthropic: failed to parse response: {e}"))
        })?;

        first_text(&parsed)
            .ok_or_else(|| HybridflowError::Generation("anthropic returned no text".into()))
    }

    async fn is_available(&self) -> bool {
        if self.api_key.is_empty() {
            warn!("anthropic: no API key configured");
            return false;
        }
        true
    }
}
