//! `POST /cron/auto-resume`, for external schedulers.

use super::{api_error, constant_time_eq, error_response, ApiResult, ApiState};
use crate::gateway::resume;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use serde_json::json;

const SECRET_HEADERS: [&str; 2] = ["x-cron-secret", "x-cloudscheduler-token"];

pub(super) async fn auto_resume(State(state): State<ApiState>, headers: HeaderMap) -> ApiResult {
    let expected = &state.config.resume.cron_secret;
    let authorized = SECRET_HEADERS
        .iter()
        .filter_map(|name| headers.get(*name))
        .filter_map(|v| v.to_str().ok())
        .any(|v| constant_time_eq(v, expected));
    if expected.is_empty() || !authorized {
        return Err(api_error(StatusCode::FORBIDDEN, "forbidden"));
    }

    let report = resume::run_once(state.gateway.store(), &state.config.resume)
        .await
        .map_err(|e| error_response(&e))?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "ok": true,
            "resumed_count": report.resumed_count,
            "cleaned_up_events": report.cleaned_up_events,
            "cutoff_time": report.cutoff_time,
        })),
    ))
}
