//! Instance lifecycle, proxied to the gateway: `/api/instances[/{name}[/qr|/state]]`.

use super::{api_error, check_auth, error_response, ApiResult, ApiState};
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use hybridflow_core::config::TenantSeed;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

#[derive(Debug, Deserialize)]
pub(super) struct CreateRequest {
    instance_name: String,
    #[serde(default)]
    webhook_url: Option<String>,
    #[serde(default)]
    system_prompt: Option<String>,
    #[serde(default)]
    llm_provider: Option<String>,
}

/// Create the instance on the gateway and register it as a tenant.
pub(super) async fn create(
    State(state): State<ApiState>,
    headers: HeaderMap,
    body: Result<Json<CreateRequest>, axum::extract::rejection::JsonRejection>,
) -> ApiResult {
    check_auth(&headers, &state.api_key)?;
    let Json(request) = body.map_err(|e| {
        api_error(StatusCode::BAD_REQUEST, format!("invalid request: {e}"))
    })?;
    let name = request.instance_name.trim();
    if name.is_empty() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "instance_name must not be empty",
        ));
    }

    let webhook_url = request.webhook_url.as_deref().filter(|u| !u.is_empty());
    let response = state
        .gateway
        .whatsapp()
        .create_instance(name, webhook_url)
        .await
        .map_err(|e| error_response(&e))?;

    let tenant = state
        .gateway
        .store()
        .upsert_tenant(&TenantSeed {
            instance_name: name.to_string(),
            server_url: None,
            api_key: None,
            system_prompt: request.system_prompt,
            llm_provider: request.llm_provider,
        })
        .await
        .map_err(|e| error_response(&e))?;

    info!("instance {name} created (tenant {})", tenant.id);
    Ok((
        StatusCode::CREATED,
        Json(json!({"ok": true, "instance": response, "tenant_id": tenant.id})),
    ))
}

pub(super) async fn qr(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(name): Path<String>,
) -> ApiResult {
    check_auth(&headers, &state.api_key)?;
    let response = state
        .gateway
        .whatsapp()
        .get_qr(&name)
        .await
        .map_err(|e| error_response(&e))?;
    Ok((StatusCode::OK, Json(json!({"ok": true, "qr": response}))))
}

pub(super) async fn state(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(name): Path<String>,
) -> ApiResult {
    check_auth(&headers, &state.api_key)?;
    let response = state
        .gateway
        .whatsapp()
        .connection_state(&name)
        .await
        .map_err(|e| error_response(&e))?;
    Ok((StatusCode::OK, Json(json!({"ok": true, "state": response}))))
}

pub(super) async fn delete(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(name): Path<String>,
) -> ApiResult {
    check_auth(&headers, &state.api_key)?;
    let response = state
        .gateway
        .whatsapp()
        .delete_instance(&name)
        .await
        .map_err(|e| error_response(&e))?;
    info!("instance {name} deleted");
    Ok((StatusCode::OK, Json(json!({"ok": true, "response": response}))))
}
