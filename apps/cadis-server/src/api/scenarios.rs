use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use cadis_core::{Category, Difficulty};
use serde::Deserialize;
use serde_json::json;
use utoipa::IntoParams;

use crate::extract::ApiQuery;
use crate::responses::ApiError;
use crate::AppState;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub(crate) struct ScenarioFilter {
    /// Restrict to one category (e.g. `testing`).
    #[serde(default)]
    pub category: Option<String>,
    /// Restrict to one difficulty tier (e.g. `expert`).
    #[serde(default)]
    pub difficulty: Option<String>,
}

/// List stored scenarios, optionally filtered.
#[utoipa::path(
    get,
    path = "/coding/scenarios",
    tag = "Coding",
    params(ScenarioFilter),
    responses(
        (status = 200, description = "Scenario list", body = serde_json::Value),
        (status = 400, description = "Unknown filter value", body = serde_json::Value)
    )
)]
pub async fn scenarios_list(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<ScenarioFilter>,
) -> Result<Response, ApiError> {
    let category = filter
        .category
        .as_deref()
        .map(str::parse::<Category>)
        .transpose()?;
    let difficulty = filter
        .difficulty
        .as_deref()
        .map(str::parse::<Difficulty>)
        .transpose()?;
    let items: Vec<_> = state
        .kernel()
        .list_scenarios_async()
        .await?
        .into_iter()
        .filter(|s| category.is_none_or(|c| s.category == c))
        .filter(|s| difficulty.is_none_or(|d| s.difficulty == d))
        .collect();
    Ok(Json(json!({"count": items.len(), "items": items})).into_response())
}

/// Fetch a single scenario.
#[utoipa::path(
    get,
    path = "/coding/scenarios/{id}",
    tag = "Coding",
    params(("id" = String, Path, description = "Scenario id")),
    responses(
        (status = 200, description = "Scenario", body = serde_json::Value),
        (status = 404, description = "Unknown scenario", body = serde_json::Value)
    )
)]
pub async fn scenario_get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    match state.kernel().get_scenario_async(&id).await? {
        Some(scenario) => Ok(Json(scenario).into_response()),
        None => Err(ApiError::NotFound(format!("unknown scenario: {id}"))),
    }
}
