use axum::{
    Extension, Json,
    extract::{Path, State},
};

use parley_types::api::{ReactRequest, ReactResponse};

use crate::AppState;
use crate::error::{ApiError, join_err, store_err};
use crate::middleware::Claims;

/// Monotonic counter per label — the same caller reacting twice counts
/// twice. There is no per-user reaction ledger in this subsystem.
pub async fn react(
    State(state): State<AppState>,
    Path(message_id): Path<i64>,
    Extension(_claims): Extension<Claims>,
    Json(req): Json<ReactRequest>,
) -> Result<Json<ReactResponse>, ApiError> {
    if req.label.trim().is_empty() {
        return Err(ApiError::Validation("reaction label is empty".into()));
    }

    let db = state.clone();
    let reactions = tokio::task::spawn_blocking(move || db.db.increment_reaction(message_id, &req.label))
        .await
        .map_err(join_err)?
        .map_err(store_err)?
        .ok_or(ApiError::NotFound("message"))?;

    Ok(Json(ReactResponse { reactions }))
}
