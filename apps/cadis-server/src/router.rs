use axum::routing::{get, post};
use axum::Router;

use crate::{api, AppState};

pub(crate) mod paths {
    pub const HEALTHZ: &str = "/healthz";
    pub const OPENAPI: &str = "/spec/openapi.json";
    pub const SCENARIOS: &str = "/coding/scenarios";
    pub const SCENARIO_ID: &str = "/coding/scenarios/{id}";
    pub const SCENARIO_ATTEMPTS: &str = "/coding/scenarios/{id}/attempts";
    pub const ATTEMPTS: &str = "/coding/attempts";
    pub const PROGRESS: &str = "/coding/progress";
    pub const PROGRESS_RECOMPUTE: &str = "/coding/progress/recompute";
    pub const CYCLES: &str = "/coding/cycles";
}

pub(crate) fn build_router(state: AppState) -> Router {
    Router::new()
        .route(paths::HEALTHZ, get(api::meta::healthz))
        .route(paths::OPENAPI, get(api::meta::openapi_json))
        .route(paths::SCENARIOS, get(api::scenarios::scenarios_list))
        .route(paths::SCENARIO_ID, get(api::scenarios::scenario_get))
        .route(
            paths::SCENARIO_ATTEMPTS,
            post(api::attempts::attempts_create),
        )
        .route(paths::ATTEMPTS, get(api::attempts::attempts_list))
        .route(paths::PROGRESS, get(api::progress::progress_get))
        .route(
            paths::PROGRESS_RECOMPUTE,
            post(api::progress::progress_recompute),
        )
        .route(paths::CYCLES, post(api::cycles::cycles_run))
        .with_state(state)
}
