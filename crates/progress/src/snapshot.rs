//! Progress snapshots for reporting.

use serde::Serialize;
use snaphunt_core::{EvidenceId, ImageId, SessionInstance, SetId, Time};

/// A snapshot of one session at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    /// When snapshot was taken
    pub timestamp: Time,

    /// Set being worked through
    pub set_id: SetId,

    /// When the session started
    pub started_at: Time,

    /// When the session runs out of time
    pub deadline: Time,

    /// Whether the deadline has passed
    pub timed_out: bool,

    /// Whole seconds left before the deadline, zero once passed
    pub remaining_secs: i64,

    /// Number of items
    pub total: usize,

    /// Completed items
    pub completed: usize,

    /// Skipped items
    pub skipped: usize,

    /// Items whose hint was revealed
    pub hinted: usize,

    /// The item to work on next, if any is pending
    pub next_item: Option<ImageId>,

    /// Per-item state in sequence order
    pub items: Vec<ItemSnapshot>,
}

/// Per-item part of a [`ProgressSnapshot`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemSnapshot {
    /// Image id
    pub id: ImageId,
    /// Position in the set
    pub seq_no: u32,
    /// Skipped
    pub skipped: bool,
    /// Completed
    pub completed: bool,
    /// Hint revealed
    pub hinted: bool,
    /// Currently reachable
    pub accessible: bool,
    /// Evidence recorded on completion
    pub evidence_id: Option<EvidenceId>,
}

impl ProgressSnapshot {
    /// Capture `instance` as seen at `now`.
    pub fn capture(instance: &SessionInstance, now: Time) -> Self {
        let mut items = Vec::with_capacity(instance.len());
        let mut all_before_handled = true;
        let (mut completed, mut skipped, mut hinted) = (0, 0, 0);

        // Walking in sequence order lets accessibility be computed in one pass
        for (id, progress) in instance.ordered_items() {
            items.push(ItemSnapshot {
                id,
                seq_no: progress.seq_no(),
                skipped: progress.skipped(),
                completed: progress.completed(),
                hinted: progress.hinted(),
                accessible: all_before_handled,
                evidence_id: progress.evidence(),
            });
            all_before_handled &= progress.is_handled();
            completed += usize::from(progress.completed());
            skipped += usize::from(progress.skipped());
            hinted += usize::from(progress.hinted());
        }

        Self {
            timestamp: now,
            set_id: instance.set_id(),
            started_at: instance.started_at(),
            deadline: instance.deadline(),
            timed_out: instance.timed_out(now),
            remaining_secs: (instance.deadline() - now).num_seconds().max(0),
            total: instance.len(),
            completed,
            skipped,
            hinted,
            next_item: instance.next_item(),
            items,
        }
    }
}
