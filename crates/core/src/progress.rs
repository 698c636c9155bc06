//! Per-item progress within a session.

use serde::Serialize;
use crate::error::{Result, TrackerError};
use crate::id::EvidenceId;

/// Mutable progress of one image in a running session.
///
/// `skipped` and `completed` are never both set: once either is set the item
/// is handled and further outcomes are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemProgress {
    seq_no: u32,
    skipped: bool,
    completed: bool,
    hinted: bool,
    evidence: Option<EvidenceId>,
}

impl ItemProgress {
    /// Fresh progress for the item at `seq_no`.
    pub fn new(seq_no: u32) -> Self {
        Self {
            seq_no,
            skipped: false,
            completed: false,
            hinted: false,
            evidence: None,
        }
    }

    /// Position within the set.
    pub fn seq_no(&self) -> u32 {
        self.seq_no
    }

    /// Whether the item was skipped.
    pub fn skipped(&self) -> bool {
        self.skipped
    }

    /// Whether the item was completed.
    pub fn completed(&self) -> bool {
        self.completed
    }

    /// Whether the hint was revealed.
    pub fn hinted(&self) -> bool {
        self.hinted
    }

    /// Evidence recorded on completion.
    pub fn evidence(&self) -> Option<EvidenceId> {
        self.evidence
    }

    /// Skipped or completed.
    pub fn is_handled(&self) -> bool {
        self.skipped || self.completed
    }

    /// Record that the hint was revealed. Idempotent.
    pub fn mark_hinted(&mut self) {
        self.hinted = true;
    }

    /// Record a skip.
    pub fn mark_skipped(&mut self) -> Result<()> {
        self.ensure_pending()?;
        self.skipped = true;
        Ok(())
    }

    /// Record a completion backed by `evidence`.
    pub fn mark_completed(&mut self, evidence: EvidenceId) -> Result<()> {
        self.ensure_pending()?;
        self.completed = true;
        self.evidence = Some(evidence);
        Ok(())
    }

    /// Fail with `InvalidState` if an outcome was already recorded.
    pub fn ensure_pending(&self) -> Result<()> {
        if self.completed {
            return Err(TrackerError::InvalidState(format!(
                "item #{} is already completed",
                self.seq_no
            )));
        }
        if self.skipped {
            return Err(TrackerError::InvalidState(format!(
                "item #{} is already skipped",
                self.seq_no
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_unhandled() {
        let item = ItemProgress::new(3);
        assert_eq!(item.seq_no(), 3);
        assert!(!item.is_handled());
        assert!(!item.hinted());
        assert!(item.evidence().is_none());
    }

    #[test]
    fn test_hint_is_idempotent() {
        let mut item = ItemProgress::new(1);
        item.mark_hinted();
        item.mark_hinted();
        assert!(item.hinted());
        assert!(!item.is_handled());
    }

    #[test]
    fn test_skip_then_complete_rejected() {
        let mut item = ItemProgress::new(1);
        item.mark_skipped().unwrap();
        let err = item.mark_completed(EvidenceId(9)).unwrap_err();
        assert!(matches!(err, TrackerError::InvalidState(_)));
        assert!(item.skipped());
        assert!(!item.completed());
        assert!(item.evidence().is_none());
    }

    #[test]
    fn test_complete_then_skip_rejected() {
        let mut item = ItemProgress::new(1);
        item.mark_completed(EvidenceId(9)).unwrap();
        assert!(matches!(item.mark_skipped(), Err(TrackerError::InvalidState(_))));
        assert!(item.completed());
        assert!(!item.skipped());
        assert_eq!(item.evidence(), Some(EvidenceId(9)));
    }

    #[test]
    fn test_repeated_outcome_rejected() {
        let mut item = ItemProgress::new(1);
        item.mark_completed(EvidenceId(1)).unwrap();
        assert!(item.mark_completed(EvidenceId(2)).is_err());
        assert_eq!(item.evidence(), Some(EvidenceId(1)));

        let mut item = ItemProgress::new(2);
        item.mark_skipped().unwrap();
        assert!(item.mark_skipped().is_err());
    }
}
