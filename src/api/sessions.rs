//! Manual pause control: `/api/sessions/{instance}/{chat_id}[/pause|/resume]`.

use super::{api_error, check_auth, error_response, optional_json, ApiResult, ApiState};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

#[derive(Debug, Default, Deserialize)]
pub(super) struct PauseRequest {
    #[serde(default)]
    reason: Option<String>,
}

pub(super) async fn get_session(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path((instance, chat_id)): Path<(String, String)>,
) -> ApiResult {
    check_auth(&headers, &state.api_key)?;
    let tenant = state.tenant(&instance).await?;

    let session = state
        .gateway
        .store()
        .get_session(tenant.id, &chat_id)
        .await
        .map_err(|e| error_response(&e))?
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("no session for {chat_id}")))?;

    Ok((StatusCode::OK, Json(json!({"ok": true, "session": session}))))
}

/// Pause a chat by hand. Creates the session if the chat was never seen.
pub(super) async fn pause(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path((instance, chat_id)): Path<(String, String)>,
    body: Bytes,
) -> ApiResult {
    check_auth(&headers, &state.api_key)?;
    let request: PauseRequest = optional_json(&body)?;
    let tenant = state.tenant(&instance).await?;

    let reason = request
        .reason
        .filter(|r| !r.trim().is_empty())
        .unwrap_or_else(|| "manual".to_string());
    let store = state.gateway.store();
    store
        .set_paused(tenant.id, &chat_id, &reason, Utc::now())
        .await
        .map_err(|e| error_response(&e))?;
    let session = store
        .get_session(tenant.id, &chat_id)
        .await
        .map_err(|e| error_response(&e))?;

    info!("{instance}: chat {chat_id} paused by API ({reason})");
    Ok((StatusCode::OK, Json(json!({"ok": true, "session": session}))))
}

pub(super) async fn resume(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path((instance, chat_id)): Path<(String, String)>,
) -> ApiResult {
    check_auth(&headers, &state.api_key)?;
    let tenant = state.tenant(&instance).await?;

    let store = state.gateway.store();
    let resumed = store
        .clear_pause(tenant.id, &chat_id)
        .await
        .map_err(|e| error_response(&e))?;
    if !resumed {
        return Err(api_error(
            StatusCode::NOT_FOUND,
            format!("no session for {chat_id}"),
        ));
    }
    let session = store
        .get_session(tenant.id, &chat_id)
        .await
        .map_err(|e| error_response(&e))?;

    info!("{instance}: chat {chat_id} resumed by API");
    Ok((StatusCode::OK, Json(json!({"ok": true, "session": session}))))
}
