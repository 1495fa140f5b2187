use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use cadis_core::{Catalog, CyclePlan, CycleRunner, MAX_ATTEMPTS_PER_CYCLE};
use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;

use crate::extract::ApiJson;
use crate::responses::ApiError;
use crate::{admin_ok, AppState};

const MAX_CYCLES: u32 = 100;

#[derive(Debug, Default, Deserialize, ToSchema)]
pub(crate) struct CyclesReq {
    #[serde(default)]
    pub cycles: Option<u32>,
    #[serde(default)]
    pub attempts_per_cycle: Option<u32>,
    #[serde(default)]
    pub target: Option<f64>,
    /// Aggregation window used for the per-cycle recompute.
    #[serde(default)]
    pub window_days: Option<u32>,
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Run improvement cycles: simulate, store and recompute once per cycle.
#[utoipa::path(
    post,
    path = "/coding/cycles",
    tag = "Coding",
    request_body = CyclesReq,
    responses(
        (status = 200, description = "Per-cycle summary", body = serde_json::Value),
        (status = 400, description = "Invalid plan", body = serde_json::Value),
        (status = 401, description = "Unauthorized", body = serde_json::Value)
    )
)]
pub async fn cycles_run(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<CyclesReq>,
) -> Result<Response, ApiError> {
    if !admin_ok(&headers) {
        return Err(ApiError::Unauthorized);
    }
    let defaults = state.config().cycles;
    let cycles = req.cycles.unwrap_or(1);
    if cycles > MAX_CYCLES {
        return Err(ApiError::BadRequest(format!(
            "cycles must not exceed {MAX_CYCLES}"
        )));
    }
    let mut plan = CyclePlan::from_config(&defaults, cycles);
    if let Some(n) = req.attempts_per_cycle {
        if n > MAX_ATTEMPTS_PER_CYCLE {
            return Err(ApiError::BadRequest(format!(
                "attempts_per_cycle must not exceed {MAX_ATTEMPTS_PER_CYCLE}"
            )));
        }
        plan.attempts_per_cycle = n;
    }
    if let Some(target) = req.target {
        plan.target = target;
    }
    let mut agg = state.config().aggregator;
    agg.window_days = req.window_days.unwrap_or(defaults.window_days);
    if agg.window_days == 0 {
        return Err(ApiError::BadRequest("window_days must be at least 1".into()));
    }

    let catalog = Catalog::new(state.kernel().list_scenarios_async().await?);
    let mut runner = CycleRunner::new(plan, state.simulator(), &catalog)?;
    let mut rng = match req.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let mut summary = Vec::with_capacity(cycles as usize);
    while let Some(report) = runner.step(&mut rng, Utc::now()) {
        let stored = state
            .kernel()
            .insert_attempts_async(report.attempts)
            .await?;
        let progress = state
            .kernel()
            .recompute_progress_async(agg, Utc::now())
            .await?;
        summary.push(json!({
            "cycle": report.cycle,
            "attempts": stored,
            "mean_attempt_score": report.mean_attempt_score,
            "trend_score": report.trend_score,
            "overall_score": progress.overall_score,
        }));
    }
    tracing::info!(
        cycles,
        trend = runner.trend(),
        target = plan.target,
        "improvement cycles complete"
    );
    Ok(Json(json!({
        "plan": plan,
        "cycles": summary,
        "final_trend_score": runner.trend(),
    }))
    .into_response())
}
