//! `POST /api/evolution/send-message`: operator-initiated send.

use super::{api_error, check_auth, error_response, ApiResult, ApiState};
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use hybridflow_core::error::HybridflowError;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
pub(super) struct SendRequest {
    instance: String,
    chat_id: String,
    text: String,
}

pub(super) async fn send_message(
    State(state): State<ApiState>,
    headers: HeaderMap,
    body: Result<Json<SendRequest>, axum::extract::rejection::JsonRejection>,
) -> ApiResult {
    check_auth(&headers, &state.api_key)?;

    let Json(request) = body.map_err(|e| {
        api_error(StatusCode::BAD_REQUEST, format!("invalid request: {e}"))
    })?;
    if request.chat_id.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "chat_id must not be empty"));
    }
    if request.text.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "text must not be empty"));
    }

    let tenant = state.tenant(&request.instance).await?;
    match state
        .gateway
        .whatsapp()
        .send_text(&tenant, &request.chat_id, &request.text, None)
        .await
    {
        Ok(response) => {
            info!("{}: manual send to {}", tenant.instance_name, request.chat_id);
            Ok((
                StatusCode::OK,
                Json(json!({"ok": true, "confirmed": true, "response": response})),
            ))
        }
        Err(HybridflowError::GatewayTimeout(e)) => {
            warn!("{}: manual send unconfirmed: {e}", tenant.instance_name);
            Ok((
                StatusCode::OK,
                Json(json!({"ok": true, "confirmed": false})),
            ))
        }
        Err(e) => Err(error_response(&e)),
    }
}
