//! Gateway: the reply pipeline shared by every ingestion channel.
//!
//! One inbound delivery runs `handle_inbound_event` to a terminal
//! [`Outcome`]. Deliveries are independent; the only shared mutable state is
//! the session table and the idempotency ledger, both keyed upserts.

mod dispatch;
pub mod humanize;
mod pipeline;
pub mod resume;


use hybridflow_core::{
    config::ReplyConfig,
    event::{EventKind, IngestChannel, MessageFields},
    outcome::ProcessedAction,
    tenant::Tenant,
    traits::{ReplyHook, WhatsAppGateway},
};
use hybridflow_providers::ProviderRegistry;
use hybridflow_store::Store;
use std::sync::Arc;
use tracing::warn;

/// The reply pipeline and its collaborators.
pub struct Gateway {
    pub(super) store: Store,
    pub(super) providers: ProviderRegistry,
    pub(super) whatsapp: Arc<dyn WhatsAppGateway>,
    /// External workflow. When set, it replaces direct-mode replies.
    pub(super) hook: Option<Arc<dyn ReplyHook>>,
    pub(super) reply: ReplyConfig,
}

/// One admitted delivery, after tenant resolution and the id guard.
pub(super) struct Delivery<'a> {
    pub tenant: &'a Tenant,
    pub kind: &'a EventKind,
    pub channel: IngestChannel,
    pub chat_id: &'a str,
    pub message_id: &'a str,
    pub fields: &'a MessageFields,
    pub data: &'a serde_json::Value,
    /// Correlates the log lines of one delivery.
    pub delivery_id: String,
}

impl Gateway {
    pub fn new(
        store: Store,
        providers: ProviderRegistry,
        whatsapp: Arc<dyn WhatsAppGateway>,
        hook: Option<Arc<dyn ReplyHook>>,
        reply: ReplyConfig,
    ) -> Self {
        Self {
            store,
            providers,
            whatsapp,
            hook,
            reply,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    pub fn whatsapp(&self) -> &Arc<dyn WhatsAppGateway> {
        &self.whatsapp
    }

    /// Name of the active workflow hook, if workflow mode is on.
    pub fn hook_name(&self) -> Option<&str> {
        self.hook.as_deref().map(|h| h.name())
    }

    /// Whether `chat_id` uses the alternate (linked-id) addressing scheme.
    pub(super) fn is_alternate_contact(&self, chat_id: &str) -> bool {
        self.reply
            .alternate_suffixes
            .iter()
            .any(|suffix| !suffix.is_empty() && chat_id.ends_with(suffix.as_str()))
    }

    /// Best-effort ledger write. A lost race or a store failure is logged only.
    pub(super) async fn record(&self, d: &Delivery<'_>, action: &ProcessedAction) {
        let tag = action.tag();
        match self
            .store
            .record_processed(d.tenant.id, d.message_id, d.kind.as_str(), &tag)
            .await
        {
            Ok(true) => {}
            Ok(false) => warn!(
                "[{}] ledger already held {}/{} before '{tag}' (concurrent delivery)",
                d.delivery_id, d.message_id, d.kind
            ),
            Err(e) => warn!("[{}] ledger record '{tag}' failed: {e}", d.delivery_id),
        }
    }
}
