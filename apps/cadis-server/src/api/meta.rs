use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;
use utoipa::OpenApi;

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/healthz",
    tag = "Meta",
    responses((status = 200, description = "Service is up", body = serde_json::Value))
)]
pub async fn healthz() -> impl IntoResponse {
    Json(json!({"ok": true, "service": "cadis-server", "version": env!("CARGO_PKG_VERSION")}))
}

/// Generated OpenAPI document.
#[utoipa::path(
    get,
    path = "/spec/openapi.json",
    tag = "Meta",
    responses((status = 200, description = "OpenAPI document", body = serde_json::Value))
)]
pub async fn openapi_json() -> impl IntoResponse {
    Json(crate::openapi::ApiDoc::openapi())
}
