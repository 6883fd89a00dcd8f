//! Direct-mode reply: read receipt, typing, generation, humanized delay,
//! send, persistence.

use super::{humanize::choose_delay, Delivery, Gateway};
use hybridflow_core::{
    context::{ContextEntry, ReplyContext},
    error::HybridflowError,
    outcome::{preview, Outcome, ProcessedAction},
    traits::{DeliveryStatus, Presence},
};
use hybridflow_store::NewMessage;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info, warn};

impl Gateway {
    /// Generate and send a reply. Every failure becomes a recorded outcome.
    pub(super) async fn reply_direct(&self, d: &Delivery<'_>, text: &str) -> Outcome {
        let alternate = self.is_alternate_contact(d.chat_id);
        let typing = self.reply.typing_enabled && !alternate;

        // --- a/b. READ RECEIPT + TYPING ---
        if !alternate {
            let status = self
                .whatsapp
                .mark_as_read(d.tenant, d.chat_id, d.message_id)
                .await;
            log_best_effort(&d.delivery_id, "mark as read", &status);
        }
        if typing {
            self.presence(d, Presence::Composing, self.reply.typing_initial_ms)
                .await;
        }

        // --- c. PROMPT + PROVIDER ---
        let system_prompt = d.tenant.prompt_or(&self.reply.default_system_prompt);
        let selector = d.tenant.provider_or(self.providers.default_name());
        let provider = match self.providers.resolve(selector) {
            Ok(p) => p,
            Err(e) => return self.ai_failed(d, e, typing).await,
        };

        // --- d. GENERATE ---
        let context =
            ReplyContext::new(system_prompt, text).with_history(self.history(d).await);
        let reply = match provider.generate_reply(&context).await {
            Ok(reply) => reply,
            Err(e) => return self.ai_failed(d, e, typing).await,
        };

        // --- e. HUMANIZED DELAY ---
        if self.reply.delay_enabled {
            let delay = choose_delay(self.reply.delay_min_ms, self.reply.delay_max_ms);
            debug!("[{}] waiting {delay}ms before send", d.delivery_id);
            if typing {
                self.presence(d, Presence::Composing, delay).await;
            }
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        // --- f. SEND ---
        let quoted = alternate.then_some(d.message_id);
        match self
            .whatsapp
            .send_text(d.tenant, d.chat_id, &reply, quoted)
            .await
        {
            Ok(_) => {}
            Err(HybridflowError::GatewayTimeout(e)) => {
                warn!(
                    "[{}] send not confirmed, assuming delivered: {e}",
                    d.delivery_id
                );
            }
            Err(e) => {
                warn!("[{}] send failed: {e}", d.delivery_id);
                self.stop_typing(d, typing).await;
                self.record(d, &ProcessedAction::SendFailed).await;
                return Outcome::SendFailed {
                    error: e.to_string(),
                };
            }
        }

        // --- g. STOP TYPING ---
        self.stop_typing(d, typing).await;

        // --- h. PERSIST OUTBOUND ---
        let outbound_id = format!("out-{}", d.message_id);
        let raw = json!({
            "generated": true,
            "in_reply_to": d.message_id,
            "provider": provider.name(),
            "model": provider.model(),
            "source": d.channel.as_str(),
        });
        let stored = self
            .store
            .insert_message(&NewMessage {
                tenant_id: d.tenant.id,
                chat_id: d.chat_id,
                message_id: &outbound_id,
                from_me: Some(true),
                message_type: Some("conversation"),
                text: Some(&reply),
                raw: &raw,
            })
            .await;
        match stored {
            Ok(true) => {}
            Ok(false) => debug!("[{}] {outbound_id} already stored", d.delivery_id),
            Err(e) => warn!("[{}] storing {outbound_id} failed: {e}", d.delivery_id),
        }

        // --- i. DONE ---
        self.record(d, &ProcessedAction::AiReplied).await;
        info!(
            "[{}] replied with {} ({} chars)",
            d.delivery_id,
            provider.model(),
            reply.chars().count()
        );
        Outcome::AiReplied {
            reply_preview: preview(&reply, self.reply.preview_chars),
        }
    }

    async fn ai_failed(&self, d: &Delivery<'_>, e: HybridflowError, typing: bool) -> Outcome {
        warn!("[{}] generation failed: {e}", d.delivery_id);
        self.stop_typing(d, typing).await;
        self.record(d, &ProcessedAction::AiFailed).await;
        Outcome::AiFailed {
            error: e.to_string(),
        }
    }

    async fn stop_typing(&self, d: &Delivery<'_>, typing: bool) {
        if typing {
            self.presence(d, Presence::Paused, 0).await;
        }
    }

    async fn presence(&self, d: &Delivery<'_>, presence: Presence, delay_ms: u64) {
        let status = self
            .whatsapp
            .send_presence(d.tenant, d.chat_id, presence, delay_ms)
            .await;
        log_best_effort(&d.delivery_id, presence.as_str(), &status);
    }

    /// Prior turns of the chat, oldest first. Empty when disabled or unreadable.
    async fn history(&self, d: &Delivery<'_>) -> Vec<ContextEntry> {
        if self.reply.history_messages == 0 {
            return Vec::new();
        }
        let rows = match self
            .store
            .recent_messages(
                d.tenant.id,
                d.chat_id,
                self.reply.history_messages,
                d.message_id,
            )
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                warn!("[{}] history unavailable: {e}", d.delivery_id);
                return Vec::new();
            }
        };

        rows.into_iter()
            .filter_map(|m| {
                let text = m.text.filter(|t| !t.trim().is_empty())?;
                Some(if m.from_me == Some(true) {
                    ContextEntry::assistant(text)
                } else {
                    ContextEntry::user(text)
                })
            })
            .collect()
    }
}

fn log_best_effort(delivery_id: &str, op: &str, status: &DeliveryStatus) {
    if let DeliveryStatus::Failed(e) = status {
        warn!("[{delivery_id}] {op} failed: {e}");
    }
}
