use crate::{context::ReplyContext, error::HybridflowError, tenant::Tenant};
use async_trait::async_trait;
use serde_json::Value;

/// Text-generation backend.
///
/// Every error (rate limit, timeout, bad response) collapses into
/// `HybridflowError::Generation`.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Selector name, e.g. `anthropic`.
    fn name(&self) -> &str;

    /// Model identifier stored alongside generated messages.
    fn model(&self) -> &str;

    async fn generate_reply(&self, context: &ReplyContext) -> Result<String, HybridflowError>;

    /// Check if the provider is configured and ready.
    async fn is_available(&self) -> bool;
}

/// Outcome of a best-effort gateway call. Never an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryStatus {
    Ok,
    Failed(String),
}

/// Chat presence states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Composing,
    Paused,
}

impl Presence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Composing => "composing",
            Self::Paused => "paused",
        }
    }
}

/// Outbound operations against the WhatsApp gateway.
///
/// `send_text` distinguishes `GatewayTimeout` from `Gateway` so callers can
/// treat an unconfirmed send as delivered.
#[async_trait]
pub trait WhatsAppGateway: Send + Sync {
    async fn send_text(
        &self,
        tenant: &Tenant,
        chat_id: &str,
        text: &str,
        quoted_message_id: Option<&str>,
    ) -> Result<Value, HybridflowError>;

    async fn mark_as_read(&self, tenant: &Tenant, chat_id: &str, message_id: &str)
        -> DeliveryStatus;

    async fn send_presence(
        &self,
        tenant: &Tenant,
        chat_id: &str,
        presence: Presence,
        delay_ms: u64,
    ) -> DeliveryStatus;

    async fn create_instance(
        &self,
        _instance_name: &str,
        _webhook_url: Option<&str>,
    ) -> Result<Value, HybridflowError> {
        Err(HybridflowError::Gateway("instance lifecycle not supported".into()))
    }

    async fn delete_instance(&self, _instance_name: &str) -> Result<Value, HybridflowError> {
        Err(HybridflowError::Gateway("instance lifecycle not supported".into()))
    }

    async fn get_qr(&self, _instance_name: &str) -> Result<Value, HybridflowError> {
        Err(HybridflowError::Gateway("instance lifecycle not supported".into()))
    }

    async fn connection_state(&self, _instance_name: &str) -> Result<Value, HybridflowError> {
        Err(HybridflowError::Gateway("instance lifecycle not supported".into()))
    }
}

/// External workflow that takes over reply generation and sending.
#[async_trait]
pub trait ReplyHook: Send + Sync {
    /// Hook name; prefixes the ledger tags `<name>_triggered` / `<name>_failed`.
    fn name(&self) -> &str;

    async fn trigger(&self, payload: &Value) -> Result<Value, HybridflowError>;
}
