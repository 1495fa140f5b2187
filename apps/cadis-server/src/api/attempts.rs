use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Deserialize;
use serde_json::json;
use utoipa::IntoParams;

use crate::extract::ApiQuery;
use crate::responses::ApiError;
use crate::{admin_ok, AppState};

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 500;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub(crate) struct SimulateParams {
    /// Fixed RNG seed for a reproducible attempt.
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Simulate and store one attempt for a scenario.
#[utoipa::path(
    post,
    path = "/coding/scenarios/{id}/attempts",
    tag = "Coding",
    params(("id" = String, Path, description = "Scenario id"), SimulateParams),
    responses(
        (status = 201, description = "Attempt recorded", body = serde_json::Value),
        (status = 401, description = "Unauthorized", body = serde_json::Value),
        (status = 404, description = "Unknown scenario", body = serde_json::Value)
    )
)]
pub async fn attempts_create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    ApiQuery(params): ApiQuery<SimulateParams>,
) -> Result<Response, ApiError> {
    if !admin_ok(&headers) {
        return Err(ApiError::Unauthorized);
    }
    let Some(scenario) = state.kernel().get_scenario_async(&id).await? else {
        return Err(ApiError::NotFound(format!("unknown scenario: {id}")));
    };
    let attempt = {
        let mut rng = match params.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        state.simulator().simulate(&scenario, &mut rng, Utc::now())
    };
    state.kernel().insert_attempt_async(attempt.clone()).await?;
    tracing::info!(
        scenario = %scenario.id,
        score = attempt.score,
        "attempt recorded"
    );
    Ok((StatusCode::CREATED, Json(attempt)).into_response())
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub(crate) struct ListParams {
    /// Maximum number of attempts (1..=500, default 50).
    #[serde(default)]
    pub limit: Option<i64>,
}

/// Most recent attempts, newest first.
#[utoipa::path(
    get,
    path = "/coding/attempts",
    tag = "Coding",
    params(ListParams),
    responses((status = 200, description = "Attempt list", body = serde_json::Value))
)]
pub async fn attempts_list(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<ListParams>,
) -> Result<Response, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let items = state.kernel().list_attempts_async(limit).await?;
    Ok(Json(json!({"count": items.len(), "items": items})).into_response())
}
