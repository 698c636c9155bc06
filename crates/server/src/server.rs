//! Server startup and shutdown.

use std::sync::Arc;

use anyhow::{Context, Result};
use snaphunt_progress::SessionRegistry;
use snaphunt_storage::{FileStore, Storage};
use tracing::info;

use crate::auth::AuthService;
use crate::config::ServerConfig;
use crate::routes::build_router;
use crate::state::{AppState, HttpSettings};

/// Run the HTTP server until SIGINT or SIGTERM.
///
/// Running sessions live in memory only and are lost on shutdown.
pub async fn serve(config: ServerConfig, storage: Arc<dyn Storage>) -> Result<()> {
    config.validate()?;

    let files = FileStore::new(&config.storage_dir);
    files
        .init()
        .await
        .with_context(|| format!("failed to prepare {}", config.storage_dir.display()))?;

    let tracker = Arc::new(SessionRegistry::new().with_finish_policy(config.finish_policy));
    let auth = AuthService::new(
        &config.jwt_secret,
        config.jwt_expire_secs,
        config.password_cost,
    );
    let settings = HttpSettings {
        cors_origins: config.cors_origin_list(),
        max_upload_bytes: config.max_upload_bytes,
        environment: config.environment.clone(),
    };
    let state = AppState::new(storage, files, tracker.clone(), auth, settings);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(
        addr = %listener.local_addr()?,
        environment = %config.environment,
        finish_policy = %config.finish_policy,
        "snaphunt server started"
    );

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!(abandoned = tracker.len().await, "snaphunt server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("Shutdown signal received");
}
