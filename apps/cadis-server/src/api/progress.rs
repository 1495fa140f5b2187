use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::extract::ApiJson;
use crate::responses::ApiError;
use crate::{admin_ok, AppState};

#[derive(Debug, Default, Deserialize, ToSchema)]
pub(crate) struct RecomputeReq {
    /// Override the configured aggregation window.
    #[serde(default)]
    pub window_days: Option<u32>,
}

/// Latest stored progress snapshot.
#[utoipa::path(
    get,
    path = "/coding/progress",
    tag = "Coding",
    responses(
        (status = 200, description = "Progress snapshot", body = serde_json::Value),
        (status = 404, description = "Never recomputed", body = serde_json::Value)
    )
)]
pub async fn progress_get(State(state): State<AppState>) -> Result<Response, ApiError> {
    match state.kernel().latest_progress_async().await? {
        Some(progress) => Ok(Json(progress).into_response()),
        None => Err(ApiError::NotFound("progress has not been computed yet".into())),
    }
}

/// Recompute the progress snapshot from stored attempts.
#[utoipa::path(
    post,
    path = "/coding/progress/recompute",
    tag = "Coding",
    request_body = RecomputeReq,
    responses(
        (status = 200, description = "Fresh snapshot", body = serde_json::Value),
        (status = 400, description = "Invalid window", body = serde_json::Value),
        (status = 401, description = "Unauthorized", body = serde_json::Value)
    )
)]
pub async fn progress_recompute(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<RecomputeReq>,
) -> Result<Response, ApiError> {
    if !admin_ok(&headers) {
        return Err(ApiError::Unauthorized);
    }
    let mut cfg = state.config().aggregator;
    if let Some(days) = req.window_days {
        if days == 0 {
            return Err(ApiError::BadRequest("window_days must be at least 1".into()));
        }
        cfg.window_days = days;
    }
    let progress = state
        .kernel()
        .recompute_progress_async(cfg, Utc::now())
        .await?;
    Ok(Json(progress).into_response())
}
