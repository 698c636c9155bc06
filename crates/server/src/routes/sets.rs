//! Catalog browsing, starting and finishing sets.

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};
use snaphunt_core::{CatalogEntry, SetId, TrackerError};
use snaphunt_progress::{FinishOutcome, ProgressSnapshot};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Serialize)]
pub(super) struct FinishResponse {
    success: bool,
    #[serde(flatten)]
    outcome: FinishOutcome,
}

pub(super) async fn list_sets(
    _user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Value>, ApiError> {
    let sets = state.storage.list_sets().await?;
    Ok(Json(json!({ "success": true, "sets": sets })))
}

pub(super) async fn get_set(
    _user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<SetId>,
) -> Result<Json<Value>, ApiError> {
    let set = state
        .storage
        .load_set(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Set {id} not found")))?;
    let images = state.storage.list_set_images(id).await?;
    Ok(Json(json!({
        "success": true,
        "set": set,
        "imageCount": images.len(),
    })))
}

/// Start a session. The catalog is read before the tracker is touched.
pub(super) async fn start_set(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<SetId>,
) -> Result<Json<Value>, ApiError> {
    // Early out before reading the catalog; `start` checks again atomically.
    if state.tracker.has(user).await {
        return Err(TrackerError::AlreadyActive(format!("user {user} already started a set")).into());
    }

    let set = state
        .storage
        .load_set(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Set {id} not found")))?;
    let images = state.storage.list_set_images(id).await?;

    let instance = state
        .tracker
        .start(user, &CatalogEntry::new(set, images))
        .await?;
    let snapshot = ProgressSnapshot::capture(&instance, state.tracker.now());
    Ok(Json(json!({ "success": true, "session": snapshot })))
}

pub(super) async fn finish_set(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<SetId>,
) -> Result<Json<FinishResponse>, ApiError> {
    let outcome = state.tracker.finish(user, id).await?;
    Ok(Json(FinishResponse {
        success: true,
        outcome,
    }))
}
