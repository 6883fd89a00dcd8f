//! `POST /webhooks/evolution` (also mounted at `/webhook/evolution`).

use super::{api_error, error_response, ApiState};
use crate::ingest::{webhook::admit, IngestError};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use hybridflow_core::event::IngestChannel;
use serde_json::Value;
use tracing::warn;

/// Any recognized, well-formed event is acknowledged with 200 whatever
/// happened downstream. Only framing errors and unknown instances are rejected.
pub(super) async fn evolution_webhook(
    State(state): State<ApiState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let envelope = match admit(&state.config.evolution, &headers, &body) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!("webhook rejected: {e}");
            let status = match e {
                IngestError::InvalidSignature => StatusCode::UNAUTHORIZED,
                _ => StatusCode::BAD_REQUEST,
            };
            return api_error(status, e.to_string());
        }
    };

    match state
        .gateway
        .handle_inbound_event(envelope, IngestChannel::Webhook)
        .await
    {
        Ok(outcome) => (StatusCode::OK, Json(outcome.to_json())),
        Err(e) => error_response(&e),
    }
}
