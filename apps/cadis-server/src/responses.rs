use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use cadis_core::CoreError;
use serde_json::json;

pub fn problem(status: StatusCode, title: &str, detail: Option<&str>) -> Response {
    let mut body = json!({"type":"about:blank","title": title,"status": status.as_u16()});
    if let Some(d) = detail {
        body["detail"] = json!(d);
    }
    (status, Json(body)).into_response()
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("admin token required")]
    Unauthorized,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::UnknownScenario(_) => ApiError::NotFound(err.to_string()),
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::BadRequest(msg) => {
                tracing::warn!(error = %msg, "bad request");
                problem(StatusCode::BAD_REQUEST, "Bad Request", Some(msg))
            }
            ApiError::NotFound(msg) => {
                tracing::debug!(error = %msg, "not found");
                problem(StatusCode::NOT_FOUND, "Not Found", Some(msg))
            }
            ApiError::Unauthorized => {
                tracing::warn!(error = %self, "unauthorized");
                problem(StatusCode::UNAUTHORIZED, "Unauthorized", None)
            }
            ApiError::Internal(err) => {
                tracing::error!(error = %err, "request failed");
                problem(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Error",
                    Some(&err.to_string()),
                )
            }
        }
    }
}
