//! Evidence model - a photo submitted to prove an image was found.

use serde::{Deserialize, Serialize};
use crate::geo::Coordinate;
use crate::id::{EvidenceId, ImageId, UserId};
use crate::Time;

/// Persisted evidence record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evidence {
    /// Unique identifier
    pub id: EvidenceId,

    /// Image the evidence was submitted for
    pub image_id: ImageId,

    /// Submitting user
    pub user_id: UserId,

    /// Path of the stored file, relative to the evidence store
    pub path: String,

    /// Where the submitter says the photo was taken
    pub location: Coordinate,

    /// When it was submitted
    pub created_at: Time,
}

/// Evidence that has not been persisted yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvidence {
    /// Image the evidence was submitted for
    pub image_id: ImageId,

    /// Submitting user
    pub user_id: UserId,

    /// Path of the stored file
    pub path: String,

    /// Submitted location
    pub location: Coordinate,
}

impl Evidence {
    /// Whether this evidence was submitted by `user` for `image`.
    pub fn belongs_to(&self, user: UserId, image: ImageId) -> bool {
        self.user_id == user && self.image_id == image
    }
}
