//! The caller's running session.

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};
use tracing::info;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

pub(super) async fn current(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Value>, ApiError> {
    let snapshot = state.tracker.snapshot(user).await?;
    Ok(Json(json!({ "success": true, "session": snapshot })))
}

/// Drop the running session, if any.
pub(super) async fn abandon(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> Json<Value> {
    state.tracker.clear(user).await;
    info!(user = %user, "Session abandoned");
    Json(json!({ "success": true }))
}
