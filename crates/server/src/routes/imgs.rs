//! Image access, hints, evidence submission and outcomes.
//!
//! Handlers never hold a session lock across I/O: they check under the lock,
//! release it, do the I/O, then apply the transition through the registry,
//! which checks again before mutating.

use axum::extract::{Multipart, Path, State};
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use snaphunt_core::{
    distance_meters, within_geofence, Coordinate, EvidenceId, ImageId, ItemProgress,
    NewEvidence, SetImage, Time, UserId, GEOFENCE_RADIUS_METERS,
};
use snaphunt_storage::file_store::content_type;
use tracing::{debug, info, warn};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

/// Body of an outcome report.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct OutcomeRequest {
    #[serde(default)]
    skipped: bool,
    #[serde(default)]
    completed: bool,
    #[serde(default)]
    evidence_id: Option<EvidenceId>,
}

/// Check that `image` is reachable in the caller's session and return its
/// progress. The session lock is released on return.
async fn accessible(
    state: &AppState,
    user: UserId,
    image: ImageId,
) -> Result<ItemProgress, ApiError> {
    let session = state.tracker.session(user).await?;
    session.require_access(image)?;
    Ok(session.instance().item(image)?.clone())
}

/// Like [`accessible`] but also requires the item to still be pending.
/// Returns when the session started.
async fn pending(state: &AppState, user: UserId, image: ImageId) -> Result<Time, ApiError> {
    let session = state.tracker.session(user).await?;
    session.require_pending(image)?;
    Ok(session.instance().started_at())
}

async fn load_image(state: &AppState, image: ImageId) -> Result<SetImage, ApiError> {
    state
        .storage
        .load_image(image)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Image {image} not found")))
}

pub(super) async fn image_file(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<ImageId>,
) -> Result<impl IntoResponse, ApiError> {
    accessible(&state, user, id).await?;
    let image = load_image(&state, id).await?;
    let bytes = state.files.read_image(&image.path).await?;
    Ok(([(CONTENT_TYPE, content_type(&image.path))], bytes))
}

pub(super) async fn image_meta(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<ImageId>,
) -> Result<Json<Value>, ApiError> {
    let progress = accessible(&state, user, id).await?;
    let image = load_image(&state, id).await?;
    Ok(Json(json!({
        "success": true,
        "id": image.id,
        "setId": image.set_id,
        "title": image.title,
        "seqNo": image.seq_no,
        "hinted": progress.hinted(),
        "skipped": progress.skipped(),
        "completed": progress.completed(),
    })))
}

/// Reveal the hint. Marks the item hinted once the hint has been read.
pub(super) async fn image_hint(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<ImageId>,
) -> Result<Json<Value>, ApiError> {
    accessible(&state, user, id).await?;
    let image = load_image(&state, id).await?;
    state.tracker.mark_hinted(user, id).await?;
    Ok(Json(json!({ "success": true, "hint": image.hint })))
}

/// Store an evidence photo with the location it was taken at.
///
/// Expects multipart fields `image`, `lat` and `lng`. The item must be
/// reachable and still pending; the tracker itself is not changed.
pub(super) async fn submit_evidence(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<ImageId>,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    pending(&state, user, id).await?;

    let mut upload: Option<(Vec<u8>, String)> = None;
    let mut lat: Option<f64> = None;
    let mut lng: Option<f64> = None;

    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" => {
                let extension = field
                    .file_name()
                    .and_then(|name| std::path::Path::new(name).extension())
                    .and_then(|ext| ext.to_str())
                    .unwrap_or("bin")
                    .to_string();
                let bytes = field.bytes().await.map_err(bad_multipart)?;
                upload = Some((bytes.to_vec(), extension));
            }
            "lat" | "lng" => {
                let raw = field.text().await.map_err(bad_multipart)?;
                let value = parse_degrees(&name, &raw)?;
                if name == "lat" {
                    lat = Some(value);
                } else {
                    lng = Some(value);
                }
            }
            other => debug!(field = other, "Ignoring multipart field"),
        }
    }

    let (bytes, extension) = upload
        .filter(|(bytes, _)| !bytes.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Evidence image is required".to_string()))?;
    let location = match (lat, lng) {
        (Some(lat), Some(lng)) => Coordinate::new(lat, lng),
        _ => return Err(ApiError::BadRequest("lat and lng are required".to_string())),
    };
    if !location.is_valid() {
        return Err(ApiError::BadRequest("Coordinates are out of range".to_string()));
    }

    let path = state.files.write_evidence(&bytes, &extension).await?;
    let created = state
        .storage
        .create_evidence(&NewEvidence {
            image_id: id,
            user_id: user,
            path: path.clone(),
            location,
        })
        .await;
    let evidence = match created {
        Ok(evidence) => evidence,
        Err(e) => {
            if let Err(cleanup) = state.files.remove_evidence(&path).await {
                warn!(file = %path, error = %cleanup, "Failed to remove unrecorded evidence file");
            }
            return Err(e.into());
        }
    };

    info!(user = %user, image = %id, evidence = %evidence.id, "Evidence submitted");
    Ok(Json(json!({ "success": true, "evidenceId": evidence.id })))
}

/// Report an item as skipped or as completed with evidence.
pub(super) async fn record_outcome(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<ImageId>,
    Json(body): Json<OutcomeRequest>,
) -> Result<Json<Value>, ApiError> {
    match (body.skipped, body.completed) {
        (true, false) => {
            state.tracker.mark_skipped(user, id).await?;
        }
        (false, true) => {
            let evidence_id = body.evidence_id.ok_or_else(|| {
                ApiError::BadRequest("evidenceId is required to complete an image".to_string())
            })?;
            let started_at = pending(&state, user, id).await?;

            let evidence = state
                .storage
                .load_evidence(evidence_id)
                .await?
                .ok_or_else(|| ApiError::NotFound(format!("Evidence {evidence_id} not found")))?;
            if !evidence.belongs_to(user, id) {
                return Err(ApiError::Forbidden(format!(
                    "Evidence {evidence_id} was not submitted by you for image {id}"
                )));
            }
            if evidence.created_at < started_at {
                return Err(ApiError::Forbidden(format!(
                    "Evidence {evidence_id} was submitted before the current session started"
                )));
            }

            let image = load_image(&state, id).await?;
            if !within_geofence(image.location, evidence.location) {
                return Err(ApiError::OutsideGeofence {
                    distance: distance_meters(image.location, evidence.location),
                    limit: GEOFENCE_RADIUS_METERS,
                });
            }

            state.tracker.mark_completed(user, id, evidence.id).await?;
        }
        _ => {
            return Err(ApiError::BadRequest(
                "Exactly one of skipped or completed must be true".to_string(),
            ))
        }
    }

    let snapshot = state.tracker.snapshot(user).await?;
    Ok(Json(json!({ "success": true, "session": snapshot })))
}

fn parse_degrees(name: &str, raw: &str) -> Result<f64, ApiError> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ApiError::BadRequest(format!("{name} must be a number")))
}

fn bad_multipart(err: impl std::fmt::Display) -> ApiError {
    ApiError::BadRequest(format!("Invalid multipart body: {err}"))
}
