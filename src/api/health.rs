//! `GET /health`.

use super::ApiState;
use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

pub(super) async fn health(State(state): State<ApiState>) -> (StatusCode, Json<Value>) {
    let store = state.gateway.store();
    let database = match store.ping().await {
        Ok(()) => Ok(store.session_counts().await.unwrap_or((0, 0))),
        Err(e) => Err(e.to_string()),
    };
    let ok = database.is_ok();

    let providers = state.gateway.providers();
    let connections = state.sockets.status().await;
    let connected = connections.iter().filter(|c| c.connected).count();

    let (database_status, sessions) = match &database {
        Ok((total, paused)) => ("ok".to_string(), json!({"total": total, "paused": paused})),
        Err(e) => (format!("error: {e}"), Value::Null),
    };

    let body = json!({
        "ok": ok,
        "database": database_status,
        "sessions": sessions,
        "providers": {
            "default": providers.default_name(),
            "available": providers.names(),
        },
        "workflow": {
            "enabled": state.gateway.hook_name().is_some(),
            "hook": state.gateway.hook_name(),
        },
        "socket": {
            "enabled": state.config.socket.enabled,
            "mode": state.config.socket.mode,
            "connections": connections.len(),
            "connected": connected,
        },
    });

    let status = if ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}
