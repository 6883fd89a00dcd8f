//! `GET /api/events`: recent idempotency-ledger rows.

use super::{check_auth, error_response, ApiResult, ApiState};
use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Deserialize;
use serde_json::json;

const DEFAULT_LIMIT: usize = 50;
const MAX_LIMIT: usize = 500;

#[derive(Debug, Deserialize)]
pub(super) struct EventsQuery {
    instance: Option<String>,
    limit: Option<usize>,
}

pub(super) async fn list_events(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Query(query): Query<EventsQuery>,
) -> ApiResult {
    check_auth(&headers, &state.api_key)?;

    let tenant_id = match query.instance.as_deref().filter(|i| !i.is_empty()) {
        Some(instance) => Some(state.tenant(instance).await?.id),
        None => None,
    };
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    let events = state
        .gateway
        .store()
        .recent_processed(tenant_id, limit)
        .await
        .map_err(|e| error_response(&e))?;

    Ok((
        StatusCode::OK,
        Json(json!({"ok": true, "count": events.len(), "events": events})),
    ))
}
