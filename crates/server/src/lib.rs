//! snaphunt HTTP server
//!
//! REST surface over the session progress tracker: authentication, catalog
//! browsing, gated image access, evidence submission and finishing.

#![warn(missing_docs)]

pub mod auth;
pub mod config;
pub mod error;
pub mod logging;
pub mod routes;
pub mod seed;
pub mod server;
pub mod state;

pub use auth::{AuthService, AuthUser, Claims};
pub use config::{ConfigError, ServerConfig};
pub use error::ApiError;
pub use routes::build_router;
pub use server::serve;
pub use state::{AppState, HttpSettings};
