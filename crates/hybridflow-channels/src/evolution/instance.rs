//! Instance lifecycle: create, QR, connection state, delete.

use super::EvolutionClient;
use hybridflow_core::error::HybridflowError;
use serde_json::{json, Value};
use tracing::info;

const WEBHOOK_EVENTS: [&str; 3] = ["MESSAGES_UPSERT", "CONNECTION_UPDATE", "MESSAGES_UPDATE"];

pub(super) fn create_body(instance_name: &str, webhook_url: Option<&str>) -> Value {
    let mut body = json!({
        "instanceName": instance_name,
        "integration": "WHATSAPP-BAILEYS",
        "qrcode": true,
    });
    if let Some(url) = webhook_url.filter(|u| !u.is_empty()) {
        body["webhook"] = json!({
            "url": url,
            "byEvents": false,
            "base64": false,
            "events": WEBHOOK_EVENTS,
        });
    }
    body
}

impl EvolutionClient {
    pub(super) async fn create(
        &self,
        instance_name: &str,
        webhook_url: Option<&str>,
    ) -> Result<Value, HybridflowError> {
        let url = format!("{}/instance/create", self.server_url);
        let resp = self
            .execute(
                self.client
                    .post(&url)
                    .json(&create_body(instance_name, webhook_url)),
                &self.api_key,
                self.lifecycle_timeout,
                "instance/create",
            )
            .await?;
        info!("evolution: created instance {instance_name}");
        Ok(resp)
    }

    pub(super) async fn qr(&self, instance_name: &str) -> Result<Value, HybridflowError> {
        let url = format!("{}/instance/connect/{instance_name}", self.server_url);
        self.execute(
            self.client.get(&url),
            &self.api_key,
            self.lifecycle_timeout,
            "instance/connect",
        )
        .await
    }

    pub(super) async fn state(&self, instance_name: &str) -> Result<Value, HybridflowError> {
        let url = format!(
            "{}/instance/connectionState/{instance_name}",
            self.server_url
        );
        self.execute(
            self.client.get(&url),
            &self.api_key,
            self.lifecycle_timeout,
            "instance/connectionState",
        )
        .await
    }

    pub(super) async fn delete(&self, instance_name: &str) -> Result<Value, HybridflowError> {
        let url = format!("{}/instance/delete/{instance_name}", self.server_url);
        let resp = self
            .execute(
                self.client.delete(&url),
                &self.api_key,
                self.lifecycle_timeout,
                "instance/delete",
            )
            .await?;
        info!("evolution: deleted instance {instance_name}");
        Ok(resp)
    }
}
