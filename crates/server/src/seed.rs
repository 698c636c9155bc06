//! Catalog import.
//!
//! Reads a JSON array of sets, each with its images, and stores them:
//!
//! ```json
//! [{"name": "Harbour walk", "timeLimit": 1800,
//!   "imgs": [{"path": "sails.jpg", "title": "Sails", "seqNo": 1,
//!             "lat": -33.8568, "lng": 151.2153, "hint": "White roof"}]}]
//! ```

use std::collections::HashSet;
use std::path::Path;

use anyhow::{bail, Context, Result};
use snaphunt_core::{Coordinate, ImageSet};
use snaphunt_storage::{NewSet, Storage};
use tracing::info;

/// Import every set in the file at `path`.
pub async fn seed_catalog(storage: &dyn Storage, path: &Path) -> Result<Vec<ImageSet>> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let sets: Vec<NewSet> = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse {}", path.display()))?;

    for set in &sets {
        validate(set).with_context(|| format!("invalid set '{}'", set.name))?;
    }

    let mut created = Vec::with_capacity(sets.len());
    for set in &sets {
        let stored = storage.create_set(set).await?;
        info!(set = %stored.id, name = %stored.name, images = set.imgs.len(), "Imported set");
        created.push(stored);
    }
    Ok(created)
}

/// Reject sets the tracker could never start.
fn validate(set: &NewSet) -> Result<()> {
    if set.name.trim().is_empty() {
        bail!("name must not be empty");
    }
    if set.time_limit <= 0 {
        bail!("timeLimit must be positive, got {}", set.time_limit);
    }
    if set.imgs.is_empty() {
        bail!("set has no images");
    }

    let mut seen = HashSet::new();
    for img in &set.imgs {
        if img.seq_no == 0 {
            bail!("image '{}' has seqNo 0, numbering starts at 1", img.title);
        }
        if !seen.insert(img.seq_no) {
            bail!("seqNo {} is used twice", img.seq_no);
        }
        if !Coordinate::new(img.lat, img.lng).is_valid() {
            bail!("image '{}' has out of range coordinates", img.title);
        }
        if img.path.trim().is_empty() {
            bail!("image '{}' has no path", img.title);
        }
    }
    Ok(())
}
