//! Evolution API client.
//!
//! Every request carries the `apikey` header. Chat operations use the
//! tenant's gateway URL and credential when set, otherwise the process-wide
//! defaults. Instance lifecycle calls always use the defaults.

mod instance;
mod send;


use async_trait::async_trait;
use hybridflow_core::{
    config::EvolutionConfig,
    error::HybridflowError,
    tenant::Tenant,
    traits::{DeliveryStatus, Presence, WhatsAppGateway},
};
use serde_json::Value;
use std::time::Duration;

/// Evolution API client.
#[derive(Clone)]
pub struct EvolutionClient {
    client: reqwest::Client,
    server_url: String,
    api_key: String,
    send_timeout: Duration,
    lifecycle_timeout: Duration,
    /// Chat-id suffixes addressed by their full id rather than the bare number.
    full_id_suffixes: Vec<String>,
}

impl EvolutionClient {
    pub fn from_config(config: &EvolutionConfig, full_id_suffixes: Vec<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            server_url: config.server_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            send_timeout: Duration::from_secs(config.send_timeout_secs),
            lifecycle_timeout: Duration::from_secs(config.lifecycle_timeout_secs),
            full_id_suffixes,
        }
    }

    /// Resolve `(base_url, api_key)` for a tenant.
    fn endpoint_for<'a>(&'a self, tenant: &'a Tenant) -> (&'a str, &'a str) {
        let url = tenant
            .server_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .map(|u| u.trim_end_matches('/'))
            .unwrap_or(&self.server_url);
        let key = tenant
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .unwrap_or(&self.api_key);
        (url, key)
    }

    /// Gateway `number` field for a chat id.
    pub fn format_number(&self, chat_id: &str) -> String {
        format_number(chat_id, &self.full_id_suffixes)
    }

    /// Send a request and decode the JSON body.
    ///
    /// Timeouts map to `GatewayTimeout`; transport failures, non-2xx
    /// statuses, and bodies carrying an `error` field map to `Gateway`.
    async fn execute(
        &self,
        req: reqwest::RequestBuilder,
        api_key: &str,
        timeout: Duration,
        op: &str,
    ) -> Result<Value, HybridflowError> {
        let resp = req
            .header("apikey", api_key)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| map_transport_error(op, e))?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| map_transport_error(op, e))?;

        if !status.is_success() {
            return Err(HybridflowError::Gateway(format!(
                "{op} returned {status}: {text}"
            )));
        }

        let body: Value = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };

        if let Some(err) = body.get("error").filter(|e| !e.is_null() && **e != Value::Bool(false))
        {
            return Err(HybridflowError::Gateway(format!("{op} failed: {err}")));
        }

        Ok(body)
    }
}

fn map_transport_error(op: &str, e: reqwest::Error) -> HybridflowError {
    if e.is_timeout() {
        HybridflowError::GatewayTimeout(format!("{op}: {e}"))
    } else {
        HybridflowError::Gateway(format!("{op} request failed: {e}"))
    }
}

/// Alternate-addressing ids keep their full form; other JIDs are reduced to
/// the part before `@`.
pub fn format_number(chat_id: &str, full_id_suffixes: &[String]) -> String {
    if full_id_suffixes.iter().any(|s| chat_id.ends_with(s.as_str())) {
        return chat_id.to_string();
    }
    match chat_id.split_once('@') {
        Some((number, _)) => number.to_string(),
        None => chat_id.to_string(),
    }
}

#[async_trait]
impl WhatsAppGateway for EvolutionClient {
    async fn send_text(
        &self,
        tenant: &Tenant,
        chat_id: &str,
        text: &str,
        quoted_message_id: Option<&str>,
    ) -> Result<Value, HybridflowError> {
        self.send_text_message(tenant, chat_id, text, quoted_message_id)
            .await
    }

    async fn mark_as_read(
        &self,
        tenant: &Tenant,
        chat_id: &str,
        message_id: &str,
    ) -> DeliveryStatus {
        self.mark_message_read(tenant, chat_id, message_id).await
    }

    async fn send_presence(
        &self,
        tenant: &Tenant,
        chat_id: &str,
        presence: Presence,
        delay_ms: u64,
    ) -> DeliveryStatus {
        self.send_chat_presence(tenant, chat_id, presence, delay_ms)
            .await
    }

    async fn create_instance(
        &self,
        instance_name: &str,
        webhook_url: Option<&str>,
    ) -> Result<Value, HybridflowError> {
        self.create(instance_name, webhook_url).await
    }

    async fn delete_instance(&self, instance_name: &str) -> Result<Value, HybridflowError> {
        self.delete(instance_name).await
    }

    async fn get_qr(&self, instance_name: &str) -> Result<Value, HybridflowError> {
        self.qr(instance_name).await
    }

    async fn connection_state(&self, instance_name: &str) -> Result<Value, HybridflowError> {
        self.state(instance_name).await
    }
}
