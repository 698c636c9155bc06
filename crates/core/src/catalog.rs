//! Catalog model - image sets and the ordered images they contain.

use serde::{Deserialize, Serialize};
use crate::geo::Coordinate;
use crate::id::{ImageId, SetId};

/// An image set: an ordered hunt with a time limit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageSet {
    /// Unique identifier
    pub id: SetId,

    /// Display name
    pub name: String,

    /// Time allowed to finish the set, in seconds
    pub time_limit_secs: i64,
}

/// A single located image within a set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetImage {
    /// Unique identifier
    pub id: ImageId,

    /// Owning set
    pub set_id: SetId,

    /// Path of the image file, relative to the image store
    pub path: String,

    /// Display title
    pub title: String,

    /// Position within the set, starting at 1
    pub seq_no: u32,

    /// Authoritative location the evidence must be taken at
    pub location: Coordinate,

    /// Optional hint text
    pub hint: Option<String>,
}

/// Snapshot of a set and its images, read once when a session starts.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    /// The set itself
    pub set: ImageSet,

    /// Images in the set, in any order
    pub images: Vec<SetImage>,
}

impl CatalogEntry {
    /// Create a catalog entry.
    pub fn new(set: ImageSet, images: Vec<SetImage>) -> Self {
        Self { set, images }
    }
}
