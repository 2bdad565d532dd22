use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

/// Error taxonomy at the operation boundary. Raw storage errors never
/// cross this layer untyped.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("store unavailable")]
    StoreUnavailable(#[source] anyhow::Error),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation",
            ApiError::NotFound(_) => "not_found",
            ApiError::StoreUnavailable(_) => "store_unavailable",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::StoreUnavailable(source) = &self {
            error!("store unavailable: {:#}", source);
        }
        let body = Json(serde_json::json!({
            "error": self.kind(),
            "message": self.to_string(),
        }));
        (self.status(), body).into_response()
    }
}

/// Wrap a failed `spawn_blocking` join; the task panicked or was cancelled.
pub fn join_err(e: tokio::task::JoinError) -> ApiError {
    ApiError::StoreUnavailable(anyhow::anyhow!("blocking task failed: {}", e))
}

pub fn store_err(e: anyhow::Error) -> ApiError {
    ApiError::StoreUnavailable(e)
}
