//! Registration and login.

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use snaphunt_storage::StorageError;
use tracing::info;

use crate::error::ApiError;
use crate::state::AppState;

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Deserialize)]
pub(super) struct Credentials {
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

impl Credentials {
    fn require(self) -> Result<(String, String), ApiError> {
        let username = self.username.map(|u| u.trim().to_string()).unwrap_or_default();
        let password = self.password.unwrap_or_default();
        if username.is_empty() || password.is_empty() {
            return Err(ApiError::BadRequest(
                "Username and password are required".to_string(),
            ));
        }
        Ok((username, password))
    }
}

pub(super) async fn register(
    State(state): State<AppState>,
    Json(body): Json<Credentials>,
) -> Result<Json<Value>, ApiError> {
    let (username, password) = body.require()?;
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::BadRequest(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let hash = state.auth.hash_password(&password).await?;
    let user = state
        .storage
        .create_user(&username, &hash)
        .await
        .map_err(|e| match e {
            StorageError::Conflict(_) => ApiError::Conflict("Username already exists".to_string()),
            other => other.into(),
        })?;

    info!(user = %user.id, "Registered user");
    Ok(Json(json!({ "success": true })))
}

pub(super) async fn login(
    State(state): State<AppState>,
    Json(body): Json<Credentials>,
) -> Result<Json<Value>, ApiError> {
    let (username, password) = body.require()?;
    let invalid = || ApiError::Unauthorized("Invalid credentials".to_string());

    let user = state
        .storage
        .find_user_by_username(&username)
        .await?
        .ok_or_else(invalid)?;
    if !state.auth.verify_password(&password, &user.password_hash).await? {
        return Err(invalid());
    }

    let token = state.auth.issue_token(user.id)?;
    Ok(Json(json!({
        "success": true,
        "token": token,
        "expiresIn": state.auth.expires_in_secs(),
    })))
}
