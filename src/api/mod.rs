//! HTTP API: gateway webhook, health, cron trigger and the `/api/*`
//! management surface.
//!
//! `/api/*` routes take a bearer token when `server.api_key` is set.
//! The webhook relies on its HMAC signature instead, and the cron route on
//! its shared secret header.

mod cron;
mod events;
mod health;
mod instances;
mod messages;
mod sessions;
mod socket;
mod webhook;

#[cfg(test)]
mod tests;

use crate::gateway::Gateway;
use axum::{
    http::{HeaderMap, StatusCode},
    routing::{delete, get, post},
    Json, Router,
};
use hybridflow_channels::SocketRegistry;
use hybridflow_core::{config::Config, error::HybridflowError, tenant::Tenant};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info};

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub gateway: Arc<Gateway>,
    pub sockets: Arc<SocketRegistry>,
    pub config: Arc<Config>,
    /// Bearer token for `/api/*`. `None` = no auth.
    pub api_key: Option<String>,
}

impl ApiState {
    pub fn new(gateway: Arc<Gateway>, sockets: Arc<SocketRegistry>, config: Arc<Config>) -> Self {
        let api_key = if config.server.api_key.is_empty() {
            None
        } else {
            Some(config.server.api_key.clone())
        };
        Self {
            gateway,
            sockets,
            config,
            api_key,
        }
    }

    /// Resolve a tenant or answer 404.
    pub(super) async fn tenant(&self, instance: &str) -> Result<Tenant, ApiError> {
        self.gateway
            .store()
            .find_tenant_by_instance(instance)
            .await
            .map_err(|e| error_response(&e))?
            .ok_or_else(|| {
                api_error(
                    StatusCode::NOT_FOUND,
                    format!("unknown instance: {instance}"),
                )
            })
    }
}

pub(super) type ApiError = (StatusCode, Json<Value>);
pub(super) type ApiResult = Result<(StatusCode, Json<Value>), ApiError>;

pub(super) fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(json!({"ok": false, "error": message.into()})))
}

/// Map a core error onto an HTTP status.
pub(super) fn error_response(e: &HybridflowError) -> ApiError {
    let status = match e {
        HybridflowError::UnknownInstance(_) => StatusCode::NOT_FOUND,
        HybridflowError::Config(_) => StatusCode::BAD_REQUEST,
        HybridflowError::Gateway(_) | HybridflowError::Workflow(_) => StatusCode::BAD_GATEWAY,
        HybridflowError::GatewayTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        _ => {
            error!("API internal error: {e}");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    api_error(status, e.to_string())
}

/// Constant-time string comparison to prevent timing attacks on tokens.
pub(super) fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

/// Validate bearer token auth. Returns `Err` with 401 if auth fails.
pub(super) fn check_auth(headers: &HeaderMap, api_key: &Option<String>) -> Result<(), ApiError> {
    let Some(expected) = api_key else {
        return Ok(());
    };

    let header = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            api_error(StatusCode::UNAUTHORIZED, "missing Authorization header")
        })?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| api_error(StatusCode::UNAUTHORIZED, "invalid Authorization header"))?;

    if !constant_time_eq(token, expected) {
        return Err(api_error(StatusCode::UNAUTHORIZED, "invalid token"));
    }
    Ok(())
}

/// Parse an optional JSON body. An empty body reads as `T::default()`.
pub(super) fn optional_json<T: serde::de::DeserializeOwned + Default>(
    body: &[u8],
) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, format!("invalid request: {e}")))
}

/// Build the axum router with shared state.
pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/webhooks/evolution", post(webhook::evolution_webhook))
        .route("/webhook/evolution", post(webhook::evolution_webhook))
        .route("/cron/auto-resume", post(cron::auto_resume))
        .route("/api/sessions/{instance}/{chat_id}", get(sessions::get_session))
        .route("/api/sessions/{instance}/{chat_id}/pause", post(sessions::pause))
        .route("/api/sessions/{instance}/{chat_id}/resume", post(sessions::resume))
        .route("/api/events", get(events::list_events))
        .route("/api/evolution/send-message", post(messages::send_message))
        .route("/api/websocket/status", get(socket::status))
        .route("/api/websocket/connect", post(socket::connect))
        .route("/api/websocket/disconnect", post(socket::disconnect))
        .route("/api/instances", post(instances::create))
        .route("/api/instances/{name}", delete(instances::delete))
        .route("/api/instances/{name}/qr", get(instances::qr))
        .route("/api/instances/{name}/state", get(instances::state))
        .layer(axum::extract::DefaultBodyLimit::max(1024 * 1024)) // 1 MB max request body
        .with_state(state)
}

/// Bind and serve until the listener fails.
pub async fn serve(state: ApiState) -> anyhow::Result<()> {
    let addr = format!(
        "{}:{}",
        state.config.server.host, state.config.server.port
    );
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("API server failed to bind to {addr}: {e}"))?;

    info!("API server listening on {addr}");
    axum::serve(listener, app).await?;
    Ok(())
}
