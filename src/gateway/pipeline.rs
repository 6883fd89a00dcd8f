//! Inbound event pipeline: tenant, filter, dedup, session, collision, gate,
//! then workflow delegation or a direct reply.

use super::{Delivery, Gateway};
use chrono::Utc;
use hybridflow_core::{
    collision::should_pause,
    error::HybridflowError,
    event::{Envelope, EventKind, FromMe, IngestChannel},
    outcome::{Outcome, ProcessedAction},
};
use hybridflow_store::NewMessage;
use serde_json::json;
use tracing::{debug, error, info, warn};

impl Gateway {
    /// Run one delivery to its terminal outcome.
    ///
    /// Only tenant resolution can fail. Once a tenant is known every
    /// downstream failure is folded into a recorded outcome, so the
    /// delivering transport always acknowledges.
    pub async fn handle_inbound_event(
        &self,
        envelope: Envelope,
        channel: IngestChannel,
    ) -> Result<Outcome, HybridflowError> {
        // --- 1. TENANT ---
        let tenant = self
            .store
            .find_tenant_by_instance(&envelope.instance)
            .await?
            .ok_or_else(|| HybridflowError::UnknownInstance(envelope.instance.clone()))?;

        // --- 2. EVENT FILTER ---
        if !envelope.kind.is_handled() {
            debug!(
                "[{}] ignoring event '{}' from {}",
                channel.as_str(),
                envelope.kind,
                tenant.instance_name
            );
            return Ok(Outcome::Ignored {
                event: envelope.kind.to_string(),
            });
        }

        // --- 3. CONNECTION UPDATES ---
        if envelope.kind == EventKind::ConnectionUpdate {
            let state = envelope
                .data
                .get("state")
                .and_then(|s| s.as_str())
                .unwrap_or("unknown");
            info!("{}: connection state {state}", tenant.instance_name);
            return Ok(Outcome::Acknowledged);
        }

        // --- 4. REQUIRED IDS ---
        let fields = envelope.fields();
        let (Some(chat_id), Some(message_id)) = (fields.chat_id.as_deref(), fields.message_id.as_deref())
        else {
            debug!(
                "[{}] {} event without chat or message id",
                channel.as_str(),
                envelope.kind
            );
            return Ok(Outcome::MissingIds);
        };

        let delivery = Delivery {
            tenant: &tenant,
            kind: &envelope.kind,
            channel,
            chat_id,
            message_id,
            fields: &fields,
            data: &envelope.data,
            delivery_id: uuid::Uuid::new_v4().to_string(),
        };

        let outcome = match self.process(&delivery).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("[{}] pipeline error: {e}", delivery.delivery_id);
                self.record(&delivery, &ProcessedAction::AiFailed).await;
                Outcome::AiFailed {
                    error: e.to_string(),
                }
            }
        };

        info!(
            "[{}] {} {}/{} via {}: {}",
            delivery.delivery_id,
            tenant.instance_name,
            chat_id,
            message_id,
            channel.as_str(),
            outcome.action()
        );
        Ok(outcome)
    }

    /// Steps 5 onward. Errors here are store failures and become `ai_failed`.
    async fn process(&self, d: &Delivery<'_>) -> Result<Outcome, HybridflowError> {
        // --- 5. IDEMPOTENCY (fails open) ---
        match self
            .store
            .has_processed(d.tenant.id, d.message_id, d.kind.as_str())
            .await
        {
            Ok(true) => return Ok(Outcome::DuplicateIgnored),
            Ok(false) => {}
            Err(e) => warn!("[{}] ledger check failed, continuing: {e}", d.delivery_id),
        }

        // --- 6. SESSION + MESSAGE ---
        let now = Utc::now();
        self.store
            .upsert_session_activity(d.tenant.id, d.chat_id, now)
            .await?;
        self.store
            .upsert_message(&NewMessage {
                tenant_id: d.tenant.id,
                chat_id: d.chat_id,
                message_id: d.message_id,
                from_me: d.fields.from_me.as_option(),
                message_type: d.fields.message_type.as_deref(),
                text: d.fields.text.as_deref(),
                raw: d.data,
            })
            .await?;

        // --- 7. COLLISION ---
        if should_pause(d.kind, d.fields.from_me) {
            self.store
                .set_paused(d.tenant.id, d.chat_id, d.channel.pause_reason(), now)
                .await?;
            info!(
                "[{}] human takeover on {}, chat paused",
                d.delivery_id, d.chat_id
            );
            self.record(d, &ProcessedAction::Paused).await;
            return Ok(Outcome::Paused);
        }

        // --- 8. PAUSED GATE ---
        let paused = self
            .store
            .get_session(d.tenant.id, d.chat_id)
            .await?
            .is_some_and(|s| s.is_paused);
        if paused {
            self.record(d, &ProcessedAction::IgnoredPaused).await;
            return Ok(Outcome::IgnoredPaused);
        }

        // --- 9. INBOUND ONLY ---
        if d.fields.from_me != FromMe::No || !d.kind.is_upsert() {
            return Ok(Outcome::Acknowledged);
        }

        // --- 10. TEXT ---
        let Some(text) = d.fields.trimmed_text() else {
            return Ok(Outcome::NoText);
        };

        // --- 11. WORKFLOW DELEGATION ---
        if let Some(hook) = &self.hook {
            let payload = json!({
                "instance": d.tenant.instance_name,
                "tenant_id": d.tenant.id,
                "chat_id": d.chat_id,
                "message_id": d.message_id,
                "message": text,
                "push_name": d.fields.push_name,
                "channel": d.channel.as_str(),
                "data": d.data,
            });
            let hook_name = hook.name().to_string();
            return Ok(match hook.trigger(&payload).await {
                Ok(response) => {
                    self.record(d, &ProcessedAction::WorkflowTriggered(hook_name.clone()))
                        .await;
                    Outcome::WorkflowTriggered {
                        hook: hook_name,
                        response,
                    }
                }
                Err(e) => {
                    warn!("[{}] {hook_name} hook failed: {e}", d.delivery_id);
                    self.record(d, &ProcessedAction::WorkflowFailed(hook_name.clone()))
                        .await;
                    Outcome::WorkflowFailed {
                        hook: hook_name,
                        error: e.to_string(),
                    }
                }
            });
        }

        // --- 12. DIRECT REPLY ---
        Ok(self.reply_direct(d, text).await)
    }
}
