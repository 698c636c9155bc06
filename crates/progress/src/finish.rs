//! Finish workflow.

use serde::Serialize;
use snaphunt_core::{Result, SessionInstance, SetId, Time, TrackerError, UserId};

/// What happens to a session once it has been finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FinishPolicy {
    /// Remove the session so the owner can start another one
    #[default]
    ClearOnFinish,
    /// Keep the session; finishing again reports the same result and the
    /// owner must clear it explicitly before starting another one
    Retain,
}

impl std::fmt::Display for FinishPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FinishPolicy::ClearOnFinish => write!(f, "clear"),
            FinishPolicy::Retain => write!(f, "retain"),
        }
    }
}

/// Unknown finish policy name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown finish policy '{0}', expected 'clear' or 'retain'")]
pub struct ParseFinishPolicyError(pub String);

impl std::str::FromStr for FinishPolicy {
    type Err = ParseFinishPolicyError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "clear" | "clear-on-finish" => Ok(FinishPolicy::ClearOnFinish),
            "retain" | "keep" => Ok(FinishPolicy::Retain),
            other => Err(ParseFinishPolicyError(other.to_string())),
        }
    }
}

/// Result of a successful finish.
///
/// Running out of time is still a successful finish; `timed_out` tells the
/// two endings apart.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinishOutcome {
    /// Session owner
    pub owner: UserId,
    /// Finished set
    pub set_id: SetId,
    /// True when the deadline had passed at finish time
    pub timed_out: bool,
    /// Number of items in the set
    pub total: usize,
    /// Items completed with evidence
    pub completed: usize,
    /// Items skipped
    pub skipped: usize,
    /// Items whose hint was revealed
    pub hinted: usize,
    /// When the session started
    pub started_at: Time,
    /// When it was finished
    pub finished_at: Time,
    /// Whether the session was removed from the registry
    pub cleared: bool,
}

/// Validate that `instance` can be finished as `set_id` and build the outcome.
///
/// Fails with `InvalidState` when the set does not match or an item is
/// neither skipped nor completed, regardless of the deadline.
pub fn evaluate(instance: &SessionInstance, set_id: SetId, now: Time) -> Result<FinishOutcome> {
    if instance.set_id() != set_id {
        return Err(TrackerError::InvalidState(format!(
            "active session is for set {}, not set {}",
            instance.set_id(),
            set_id
        )));
    }

    let pending = instance.unhandled();
    if !pending.is_empty() {
        return Err(TrackerError::InvalidState(format!(
            "{} of {} images are neither skipped nor completed",
            pending.len(),
            instance.len()
        )));
    }

    let (mut completed, mut skipped, mut hinted) = (0, 0, 0);
    for (_, item) in instance.items() {
        completed += usize::from(item.completed());
        skipped += usize::from(item.skipped());
        hinted += usize::from(item.hinted());
    }

    Ok(FinishOutcome {
        owner: instance.owner(),
        set_id,
        timed_out: instance.timed_out(now),
        total: instance.len(),
        completed,
        skipped,
        hinted,
        started_at: instance.started_at(),
        finished_at: now,
        cleared: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use snaphunt_core::{CatalogEntry, Coordinate, EvidenceId, ImageId, ImageSet, SetImage};

    fn instance(start: Time) -> SessionInstance {
        let images = (1..=2)
            .map(|n| SetImage {
                id: ImageId(n),
                set_id: SetId(4),
                path: format!("{n}.png"),
                title: format!("#{n}"),
                seq_no: n as u32,
                location: Coordinate::new(10.0, 10.0),
                hint: None,
            })
            .collect();
        let entry = CatalogEntry::new(
            ImageSet { id: SetId(4), name: "park".into(), time_limit_secs: 300 },
            images,
        );
        SessionInstance::start(UserId(2), &entry, start).unwrap()
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("clear".parse::<FinishPolicy>().unwrap(), FinishPolicy::ClearOnFinish);
        assert_eq!(" Retain ".parse::<FinishPolicy>().unwrap(), FinishPolicy::Retain);
        assert!("sometimes".parse::<FinishPolicy>().is_err());
        assert_eq!(FinishPolicy::default().to_string(), "clear");
    }

    #[test]
    fn test_unhandled_items_block_finish_even_after_deadline() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        let mut s = instance(start);
        s.mark_skipped(ImageId(1)).unwrap();

        for now in [start, start + Duration::hours(1)] {
            let err = evaluate(&s, SetId(4), now).unwrap_err();
            assert!(matches!(err, TrackerError::InvalidState(_)));
        }
    }

    #[test]
    fn test_set_mismatch() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        let mut s = instance(start);
        s.mark_skipped(ImageId(1)).unwrap();
        s.mark_skipped(ImageId(2)).unwrap();
        assert!(matches!(evaluate(&s, SetId(5), start), Err(TrackerError::InvalidState(_))));
    }

    #[test]
    fn test_outcome_before_and_after_deadline() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        let mut s = instance(start);
        s.mark_hinted(ImageId(1)).unwrap();
        s.mark_completed(ImageId(1), EvidenceId(8)).unwrap();
        s.mark_skipped(ImageId(2)).unwrap();

        let early = evaluate(&s, SetId(4), start + Duration::seconds(299)).unwrap();
        assert!(!early.timed_out);
        assert_eq!((early.total, early.completed, early.skipped, early.hinted), (2, 1, 1, 1));

        let late = evaluate(&s, SetId(4), start + Duration::seconds(300)).unwrap();
        assert!(late.timed_out);
    }
}
