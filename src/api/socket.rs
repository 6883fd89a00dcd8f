//! Socket channel management: `/api/websocket/{status,connect,disconnect}`.

use super::{api_error, check_auth, error_response, optional_json, ApiResult, ApiState};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Default, Deserialize)]
pub(super) struct ConnectRequest {
    /// `global` or `instance`. Defaults to the configured mode.
    mode: Option<String>,
    instance_name: Option<String>,
    server_url: Option<String>,
    api_key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct DisconnectRequest {
    instance_name: Option<String>,
}

/// First non-blank candidate.
fn first_set<'a>(candidates: &[Option<&'a str>]) -> &'a str {
    candidates
        .iter()
        .flatten()
        .copied()
        .find(|s| !s.trim().is_empty())
        .unwrap_or_default()
}

pub(super) async fn status(State(state): State<ApiState>, headers: HeaderMap) -> ApiResult {
    check_auth(&headers, &state.api_key)?;
    let connections = state.sockets.status().await;
    Ok((
        StatusCode::OK,
        Json(json!({
            "ok": true,
            "enabled": state.config.socket.enabled,
            "mode": state.config.socket.mode,
            "connections": connections,
        })),
    ))
}

pub(super) async fn connect(
    State(state): State<ApiState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult {
    check_auth(&headers, &state.api_key)?;
    let request: ConnectRequest = optional_json(&body)?;

    let socket = &state.config.socket;
    let evolution = &state.config.evolution;
    if !socket.enabled {
        return Err(api_error(StatusCode::BAD_REQUEST, "socket mode is disabled"));
    }

    let mode = request.mode.as_deref().unwrap_or(&socket.mode);
    let result = match mode {
        "global" => {
            let url = first_set(&[
                request.server_url.as_deref(),
                Some(socket.server_url.as_str()),
                Some(evolution.server_url.as_str()),
            ]);
            let key = first_set(&[
                request.api_key.as_deref(),
                Some(socket.api_key.as_str()),
                Some(evolution.api_key.as_str()),
            ]);
            state.sockets.connect_global(url, key).await
        }
        "instance" => {
            let Some(instance) = request
                .instance_name
                .as_deref()
                .filter(|i| !i.trim().is_empty())
            else {
                return Err(api_error(
                    StatusCode::BAD_REQUEST,
                    "instance_name is required in instance mode",
                ));
            };
            let tenant = state.tenant(instance).await?;
            let url = first_set(&[
                request.server_url.as_deref(),
                tenant.server_url.as_deref(),
                Some(socket.server_url.as_str()),
                Some(evolution.server_url.as_str()),
            ]);
            let key = first_set(&[
                request.api_key.as_deref(),
                tenant.api_key.as_deref(),
                Some(socket.api_key.as_str()),
                Some(evolution.api_key.as_str()),
            ]);
            state.sockets.connect_instance(instance, url, key).await
        }
        other => {
            return Err(api_error(
                StatusCode::BAD_REQUEST,
                format!("invalid mode '{other}', expected 'global' or 'instance'"),
            ))
        }
    };

    let connection = result.map_err(|e| error_response(&e))?;
    Ok((
        StatusCode::OK,
        Json(json!({"ok": true, "connection": connection})),
    ))
}

/// Disconnect one connection by name, or all of them when none is given.
pub(super) async fn disconnect(
    State(state): State<ApiState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult {
    check_auth(&headers, &state.api_key)?;
    let request: DisconnectRequest = optional_json(&body)?;

    match request.instance_name.as_deref().filter(|n| !n.trim().is_empty()) {
        Some(name) => {
            if !state.sockets.disconnect(name).await {
                return Err(api_error(
                    StatusCode::NOT_FOUND,
                    format!("no socket connection named {name}"),
                ));
            }
            Ok((
                StatusCode::OK,
                Json(json!({"ok": true, "disconnected": [name]})),
            ))
        }
        None => {
            let count = state.sockets.disconnect_all().await;
            Ok((
                StatusCode::OK,
                Json(json!({"ok": true, "disconnected_count": count})),
            ))
        }
    }
}
