//! External workflow delegation: hands an inbound event to an n8n-style
//! webhook that generates and sends the reply itself.

use async_trait::async_trait;
use hybridflow_core::{config::WorkflowConfig, error::HybridflowError, traits::ReplyHook};
use serde_json::Value;
use tracing::debug;

pub struct WorkflowHook {
    client: reqwest::Client,
    url: String,
    api_key: String,
    name: String,
}

impl WorkflowHook {
    pub fn from_config(config: &WorkflowConfig) -> Result<Self, HybridflowError> {
        Ok(Self {
            client: crate::http_client(config.timeout_secs)?,
            url: hook_url(&config.webhook_url, &config.path),
            api_key: config.api_key.clone(),
            name: config.name.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

fn hook_url(base: &str, path: &str) -> String {
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        return base.to_string();
    }
    format!("{}/{path}", base.trim_end_matches('/'))
}

#[async_trait]
impl ReplyHook for WorkflowHook {
    fn name(&self) -> &str {
        &self.name
    }

    async fn trigger(&self, payload: &Value) -> Result<Value, HybridflowError> {
        debug!("{}: POST {}", self.name, self.url);

        let mut req = self.client.post(&self.url).json(payload);
        if !self.api_key.is_empty() {
            req = req.bearer_auth(&self.api_key);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| HybridflowError::Workflow(format!("{} request failed: {e}", self.name)))?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(HybridflowError::Workflow(format!(
                "{} returned {status}: {body}",
                self.name
            )));
        }

        // Workflows may answer with an empty or non-JSON body.
        Ok(serde_json::from_str(&body).unwrap_or(Value::String(body)))
    }
}
