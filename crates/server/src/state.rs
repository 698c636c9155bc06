//! Shared application state.

use std::sync::Arc;

use snaphunt_progress::SessionRegistry;
use snaphunt_storage::{FileStore, Storage};

use crate::auth::AuthService;

/// HTTP-level settings.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    /// Allowed browser origins
    pub cors_origins: Vec<String>,
    /// Largest accepted request body
    pub max_upload_bytes: usize,
    /// Environment name reported by the health check
    pub environment: String,
}

/// State passed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// Catalog, users and evidence
    pub storage: Arc<dyn Storage>,
    /// Image and evidence bytes
    pub files: FileStore,
    /// Running sessions
    pub tracker: Arc<SessionRegistry>,
    /// Tokens and passwords
    pub auth: Arc<AuthService>,
    /// HTTP settings
    pub settings: Arc<HttpSettings>,
}

impl AppState {
    /// Bundle the parts of the state.
    pub fn new(
        storage: Arc<dyn Storage>,
        files: FileStore,
        tracker: Arc<SessionRegistry>,
        auth: AuthService,
        settings: HttpSettings,
    ) -> Self {
        Self {
            storage,
            files,
            tracker,
            auth: Arc::new(auth),
            settings: Arc::new(settings),
        }
    }
}
