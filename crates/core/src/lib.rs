//! snaphunt core data models.
//!
//! This crate defines the records shared by the catalog, the evidence store
//! and the in-memory session progress tracker, together with the pure
//! policies (sequential access, deadlines, geofencing) evaluated against them.

#![warn(missing_docs)]

// Core identities
mod id;

// Catalog and submitted evidence
mod catalog;
mod evidence;
mod user;
mod geo;

// Session progress
mod progress;
mod session;
mod access;
mod deadline;
mod error;

// Re-exports
pub use id::*;

// Catalog & Evidence
pub use catalog::{CatalogEntry, ImageSet, SetImage};
pub use evidence::{Evidence, NewEvidence};
pub use user::User;
pub use geo::{distance_meters, within_geofence, Coordinate, GEOFENCE_RADIUS_METERS};

// Session progress
pub use progress::ItemProgress;
pub use session::SessionInstance;
pub use access::can_access;
pub use deadline::{timed_out, Clock, ManualClock, SystemClock};
pub use error::{TrackerError, Result};

/// Timestamp type
pub type Time = chrono::DateTime<chrono::Utc>;
