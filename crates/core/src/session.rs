//! Session instance - one user's run through one image set.

use std::collections::{BTreeMap, HashSet};
use crate::access::can_access;
use crate::catalog::CatalogEntry;
use crate::deadline;
use crate::error::{Result, TrackerError};
use crate::id::{EvidenceId, ImageId, SetId, UserId};
use crate::progress::ItemProgress;
use crate::Time;

/// Progress of one owner through one image set.
///
/// The item keys are fixed at creation and sequence numbers are unique, so
/// they induce a total order over the set.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionInstance {
    owner: UserId,
    set_id: SetId,
    items: BTreeMap<ImageId, ItemProgress>,
    started_at: Time,
    deadline: Time,
}

impl SessionInstance {
    /// Start a session for `owner` over `entry` at `now`.
    ///
    /// Fails with `InvalidState` when the catalog entry is malformed: duplicate
    /// image ids, a sequence number that is zero or repeated, or an unusable
    /// time limit.
    pub fn start(owner: UserId, entry: &CatalogEntry, now: Time) -> Result<Self> {
        let mut items = BTreeMap::new();
        let mut seen_seq = HashSet::new();

        for image in &entry.images {
            if image.seq_no == 0 {
                return Err(TrackerError::InvalidState(format!(
                    "image {} of set {} has sequence number 0, numbering starts at 1",
                    image.id, entry.set.id
                )));
            }
            if !seen_seq.insert(image.seq_no) {
                return Err(TrackerError::InvalidState(format!(
                    "set {} has duplicate sequence number {}",
                    entry.set.id, image.seq_no
                )));
            }
            if items.insert(image.id, ItemProgress::new(image.seq_no)).is_some() {
                return Err(TrackerError::InvalidState(format!(
                    "set {} lists image {} twice",
                    entry.set.id, image.id
                )));
            }
        }

        let deadline = (entry.set.time_limit_secs >= 0)
            .then(|| chrono::Duration::try_seconds(entry.set.time_limit_secs))
            .flatten()
            .and_then(|limit| now.checked_add_signed(limit))
            .ok_or_else(|| {
                TrackerError::InvalidState(format!(
                    "set {} has an invalid time limit of {}s",
                    entry.set.id, entry.set.time_limit_secs
                ))
            })?;

        Ok(Self {
            owner,
            set_id: entry.set.id,
            items,
            started_at: now,
            deadline,
        })
    }

    /// Session owner.
    pub fn owner(&self) -> UserId {
        self.owner
    }

    /// Set being worked through.
    pub fn set_id(&self) -> SetId {
        self.set_id
    }

    /// When the session started.
    pub fn started_at(&self) -> Time {
        self.started_at
    }

    /// When the session runs out of time.
    pub fn deadline(&self) -> Time {
        self.deadline
    }

    /// Number of items in the session.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the session has no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Progress of `item`.
    pub fn item(&self, item: ImageId) -> Result<&ItemProgress> {
        self.items
            .get(&item)
            .ok_or_else(|| missing_item(item, self.set_id))
    }

    pub(crate) fn item_mut(&mut self, item: ImageId) -> Result<&mut ItemProgress> {
        let set_id = self.set_id;
        self.items
            .get_mut(&item)
            .ok_or_else(|| missing_item(item, set_id))
    }

    /// All items, keyed by id.
    pub fn items(&self) -> impl Iterator<Item = (ImageId, &ItemProgress)> {
        self.items.iter().map(|(id, progress)| (*id, progress))
    }

    /// All items in sequence order.
    pub fn ordered_items(&self) -> Vec<(ImageId, &ItemProgress)> {
        let mut items: Vec<_> = self.items().collect();
        items.sort_by_key(|(_, progress)| progress.seq_no());
        items
    }

    /// Whether `item` is currently reachable.
    pub fn can_access(&self, item: ImageId) -> Result<bool> {
        can_access(self, item)
    }

    /// Fail with `Forbidden` unless `item` is reachable.
    pub fn require_access(&self, item: ImageId) -> Result<()> {
        if can_access(self, item)? {
            Ok(())
        } else {
            Err(TrackerError::Forbidden(format!(
                "image {} is locked until earlier images are skipped or completed",
                item
            )))
        }
    }

    /// Record that the hint of `item` was revealed.
    pub fn mark_hinted(&mut self, item: ImageId) -> Result<()> {
        self.item_mut(item)?.mark_hinted();
        Ok(())
    }

    /// Skip `item`. The item must be reachable and not yet handled.
    pub fn mark_skipped(&mut self, item: ImageId) -> Result<()> {
        self.item(item)?.ensure_pending()?;
        self.require_access(item)?;
        self.item_mut(item)?.mark_skipped()
    }

    /// Complete `item` with `evidence`. The item must be reachable and not
    /// yet handled.
    pub fn mark_completed(&mut self, item: ImageId, evidence: EvidenceId) -> Result<()> {
        self.item(item)?.ensure_pending()?;
        self.require_access(item)?;
        self.item_mut(item)?.mark_completed(evidence)
    }

    /// Whether every item is skipped or completed.
    pub fn all_handled(&self) -> bool {
        self.items.values().all(ItemProgress::is_handled)
    }

    /// Items still pending, in sequence order.
    pub fn unhandled(&self) -> Vec<ImageId> {
        self.ordered_items()
            .into_iter()
            .filter(|(_, progress)| !progress.is_handled())
            .map(|(id, _)| id)
            .collect()
    }

    /// The lowest pending item, which is the only pending item reachable.
    pub fn next_item(&self) -> Option<ImageId> {
        self.items()
            .filter(|(_, progress)| !progress.is_handled())
            .min_by_key(|(_, progress)| progress.seq_no())
            .map(|(id, _)| id)
    }

    /// Whether the session has run out of time at `now`.
    pub fn timed_out(&self, now: Time) -> bool {
        deadline::timed_out(self, now)
    }

}

fn missing_item(item: ImageId, set_id: SetId) -> TrackerError {
    TrackerError::NotFound(format!("image {} is not part of set {}", item, set_id))
}
