//! Chat operations: send text, read receipts, presence.

use super::EvolutionClient;
use hybridflow_core::{
    error::HybridflowError,
    tenant::Tenant,
    traits::{DeliveryStatus, Presence},
};
use serde_json::{json, Value};
use tracing::{debug, warn};

pub(super) fn send_text_body(number: &str, text: &str, chat_id: &str, quoted: Option<&str>) -> Value {
    let mut body = json!({ "number": number, "text": text });
    if let Some(id) = quoted {
        body["quoted"] = json!({
            "key": { "remoteJid": chat_id, "fromMe": false, "id": id }
        });
    }
    body
}

pub(super) fn read_receipt_body(chat_id: &str, message_id: &str) -> Value {
    json!({
        "readMessages": [{ "remoteJid": chat_id, "fromMe": false, "id": message_id }]
    })
}

pub(super) fn presence_body(number: &str, presence: Presence, delay_ms: u64) -> Value {
    json!({ "number": number, "delay": delay_ms, "presence": presence.as_str() })
}

impl EvolutionClient {
    pub(super) async fn send_text_message(
        &self,
        tenant: &Tenant,
        chat_id: &str,
        text: &str,
        quoted: Option<&str>,
    ) -> Result<Value, HybridflowError> {
        let (base, key) = self.endpoint_for(tenant);
        let url = format!("{base}/message/sendText/{}", tenant.instance_name);
        let body = send_text_body(&self.format_number(chat_id), text, chat_id, quoted);

        debug!("evolution: sendText {} -> {chat_id}", tenant.instance_name);
        self.execute(
            self.client.post(&url).json(&body),
            key,
            self.send_timeout,
            "sendText",
        )
        .await
    }

    pub(super) async fn mark_message_read(
        &self,
        tenant: &Tenant,
        chat_id: &str,
        message_id: &str,
    ) -> DeliveryStatus {
        let (base, key) = self.endpoint_for(tenant);
        let url = format!("{base}/chat/markMessageAsRead/{}", tenant.instance_name);
        let body = read_receipt_body(chat_id, message_id);

        match self
            .execute(
                self.client.post(&url).json(&body),
                key,
                self.send_timeout,
                "markMessageAsRead",
            )
            .await
        {
            Ok(_) => DeliveryStatus::Ok,
            Err(e) => {
                warn!("evolution: mark read failed for {chat_id}: {e}");
                DeliveryStatus::Failed(e.to_string())
            }
        }
    }

    pub(super) async fn send_chat_presence(
        &self,
        tenant: &Tenant,
        chat_id: &str,
        presence: Presence,
        delay_ms: u64,
    ) -> DeliveryStatus {
        let (base, key) = self.endpoint_for(tenant);
        let url = format!("{base}/chat/sendPresence/{}", tenant.instance_name);
        let body = presence_body(&self.format_number(chat_id), presence, delay_ms);

        match self
            .execute(
                self.client.post(&url).json(&body),
                key,
                self.send_timeout,
                "sendPresence",
            )
            .await
        {
            Ok(_) => DeliveryStatus::Ok,
            Err(e) => {
                warn!(
                    "evolution: presence {} failed for {chat_id}: {e}",
                    presence.as_str()
                );
                DeliveryStatus::Failed(e.to_string())
            }
        }
    }
}
