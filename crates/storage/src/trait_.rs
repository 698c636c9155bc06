//! Storage trait abstraction.

use async_trait::async_trait;
use serde::Deserialize;
use snaphunt_core::{
    Evidence, EvidenceId, ImageId, ImageSet, NewEvidence, SetId, SetImage, User,
};

/// Error type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Item not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Uniqueness violation
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A stored path tried to leave its storage root
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// A set to import, with its images.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSet {
    /// Display name
    pub name: String,
    /// Time limit in seconds
    pub time_limit: i64,
    /// Images in the set
    pub imgs: Vec<NewSetImage>,
}

/// An image to import.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSetImage {
    /// Path relative to the image store
    pub path: String,
    /// Display title
    pub title: String,
    /// Position in the set
    pub seq_no: u32,
    /// Latitude of the target location
    pub lat: f64,
    /// Longitude of the target location
    pub lng: f64,
    /// Optional hint
    #[serde(default)]
    pub hint: Option<String>,
}

/// Storage abstraction for snaphunt data.
///
/// This trait allows different storage backends to be plugged in.
#[async_trait]
pub trait Storage: Send + Sync {
    // === User operations ===

    /// Register a user. Fails with `Conflict` if the name is taken.
    async fn create_user(&self, username: &str, password_hash: &str) -> Result<User>;

    /// Look a user up by login name.
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>>;

    // === Catalog operations ===

    /// Import a set and its images atomically.
    async fn create_set(&self, set: &NewSet) -> Result<ImageSet>;

    /// List all sets.
    async fn list_sets(&self) -> Result<Vec<ImageSet>>;

    /// Load a set by ID.
    async fn load_set(&self, id: SetId) -> Result<Option<ImageSet>>;

    /// Images of a set, ordered by sequence number.
    async fn list_set_images(&self, id: SetId) -> Result<Vec<SetImage>>;

    /// Load an image by ID.
    async fn load_image(&self, id: ImageId) -> Result<Option<SetImage>>;

    // === Evidence operations ===

    /// Persist evidence and return its record.
    async fn create_evidence(&self, evidence: &NewEvidence) -> Result<Evidence>;

    /// Load evidence by ID.
    async fn load_evidence(&self, id: EvidenceId) -> Result<Option<Evidence>>;
}
