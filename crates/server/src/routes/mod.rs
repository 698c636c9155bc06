//! HTTP routes.

mod auth;
mod health;
mod imgs;
mod session;
mod sets;

use axum::extract::DefaultBodyLimit;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::state::AppState;

/// Build the router with every route and layer.
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.settings.cors_origins);
    let body_limit = DefaultBodyLimit::max(state.settings.max_upload_bytes);

    let api = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/sets", get(sets::list_sets))
        .route("/sets/{id}", get(sets::get_set))
        .route("/sets/{id}/start", post(sets::start_set))
        .route("/sets/{id}/finish", post(sets::finish_set))
        .route("/session", get(session::current).delete(session::abandon))
        .route("/imgs/{id}", get(imgs::image_file))
        .route("/imgs/{id}/meta", get(imgs::image_meta))
        .route("/imgs/{id}/hint", get(imgs::image_hint))
        .route("/imgs/{id}/submit", post(imgs::submit_evidence))
        .route("/imgs/{id}/outcome", post(imgs::record_outcome));

    Router::new()
        .route("/", get(health::health))
        .nest("/api", api)
        .with_state(state)
        .layer(body_limit)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .allow_credentials(true)
}
