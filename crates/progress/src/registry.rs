//! Session registry.
//!
//! Holds at most one running session per owner. Each session sits behind its
//! own lock; the table lock is only held for lookups and inserts/removals and
//! never while waiting on a session lock, so owners never block each other.
//!
//! Lock order: session lock before table lock, never the reverse.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, info};

use snaphunt_core::{
    CatalogEntry, Clock, EvidenceId, ImageId, Result, SessionInstance, SetId, SystemClock,
    TrackerError, UserId,
};

use crate::finish::{self, FinishOutcome, FinishPolicy};
use crate::snapshot::ProgressSnapshot;

/// A session plus a tombstone flag. Once `retired` is set the slot has left
/// the table and must not be used, even by callers that looked it up earlier.
struct Slot {
    instance: SessionInstance,
    retired: bool,
}

type SharedSlot = Arc<Mutex<Slot>>;

/// Process-wide table of running sessions.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<UserId, SharedSlot>>,
    clock: Arc<dyn Clock>,
    finish_policy: FinishPolicy,
}

impl SessionRegistry {
    /// Create an empty registry on the wall clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty registry on a custom clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            clock,
            finish_policy: FinishPolicy::default(),
        }
    }

    /// Set what happens to sessions once finished.
    pub fn with_finish_policy(mut self, policy: FinishPolicy) -> Self {
        self.finish_policy = policy;
        self
    }

    /// Configured finish policy.
    pub fn finish_policy(&self) -> FinishPolicy {
        self.finish_policy
    }

    /// Current time on the registry's clock.
    pub fn now(&self) -> snaphunt_core::Time {
        self.clock.now()
    }

    /// Start a session for `owner` over `entry`.
    ///
    /// Fails with `AlreadyActive` if the owner already has one. The check and
    /// the insert happen under one table lock, so concurrent starts for the
    /// same owner yield exactly one success.
    pub async fn start(&self, owner: UserId, entry: &CatalogEntry) -> Result<SessionInstance> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&owner) {
            return Err(TrackerError::AlreadyActive(format!(
                "user {} already started a set",
                owner
            )));
        }

        let instance = SessionInstance::start(owner, entry, self.clock.now())?;
        sessions.insert(
            owner,
            Arc::new(Mutex::new(Slot {
                instance: instance.clone(),
                retired: false,
            })),
        );

        info!(
            owner = %owner,
            set = %instance.set_id(),
            items = instance.len(),
            deadline = %instance.deadline(),
            "Session started"
        );
        Ok(instance)
    }

    /// Whether `owner` has a running session.
    pub async fn has(&self, owner: UserId) -> bool {
        self.sessions.read().await.contains_key(&owner)
    }

    /// Copy of the owner's session.
    pub async fn get(&self, owner: UserId) -> Result<SessionInstance> {
        Ok(self.session(owner).await?.instance().clone())
    }

    /// Lock the owner's session.
    ///
    /// Everything done through the returned handle happens in one critical
    /// section; other calls for the same owner wait until it is dropped.
    /// Do not hold it across I/O.
    pub async fn session(&self, owner: UserId) -> Result<SessionHandle> {
        loop {
            let slot = self
                .sessions
                .read()
                .await
                .get(&owner)
                .cloned()
                .ok_or_else(|| no_session(owner))?;

            let guard = Arc::clone(&slot).lock_owned().await;
            if guard.retired {
                // Cleared while we waited; the table no longer holds this slot
                continue;
            }
            return Ok(SessionHandle {
                guard,
                slot,
                clock: Arc::clone(&self.clock),
            });
        }
    }

    /// Remove the owner's session. Does nothing if there is none.
    pub async fn clear(&self, owner: UserId) {
        let removed = self.sessions.write().await.remove(&owner);
        if let Some(slot) = removed {
            slot.lock().await.retired = true;
            info!(owner = %owner, "Session cleared");
        }
    }

    /// Whether `item` is reachable in the owner's session.
    pub async fn can_access(&self, owner: UserId, item: ImageId) -> Result<bool> {
        self.session(owner).await?.can_access(item)
    }

    /// Record that the owner revealed the hint of `item`.
    pub async fn mark_hinted(&self, owner: UserId, item: ImageId) -> Result<()> {
        self.session(owner).await?.mark_hinted(item)
    }

    /// Skip `item` in the owner's session.
    pub async fn mark_skipped(&self, owner: UserId, item: ImageId) -> Result<()> {
        self.session(owner).await?.mark_skipped(item)
    }

    /// Complete `item` in the owner's session with `evidence`.
    pub async fn mark_completed(
        &self,
        owner: UserId,
        item: ImageId,
        evidence: EvidenceId,
    ) -> Result<()> {
        self.session(owner).await?.mark_completed(item, evidence)
    }

    /// Whether the owner's session has run out of time.
    pub async fn timed_out(&self, owner: UserId) -> Result<bool> {
        Ok(self.session(owner).await?.timed_out())
    }

    /// Snapshot of the owner's session.
    pub async fn snapshot(&self, owner: UserId) -> Result<ProgressSnapshot> {
        Ok(self.session(owner).await?.snapshot())
    }

    /// Finish the owner's session of `set_id`.
    ///
    /// Fails with `InvalidState` if there is no session, it is for another
    /// set, or an item is still pending. Otherwise succeeds, reporting
    /// whether the deadline had passed. Under
    /// [`FinishPolicy::ClearOnFinish`] the session is removed.
    pub async fn finish(&self, owner: UserId, set_id: SetId) -> Result<FinishOutcome> {
        let mut handle = self.session(owner).await.map_err(|_| {
            TrackerError::InvalidState(format!("user {} has no active set to finish", owner))
        })?;

        let mut outcome = finish::evaluate(handle.instance(), set_id, self.clock.now())?;

        if self.finish_policy == FinishPolicy::ClearOnFinish {
            handle.guard.retired = true;
            let mut sessions = self.sessions.write().await;
            if sessions
                .get(&owner)
                .is_some_and(|current| Arc::ptr_eq(current, &handle.slot))
            {
                sessions.remove(&owner);
            }
            outcome.cleared = true;
        }

        info!(
            owner = %owner,
            set = %set_id,
            timed_out = outcome.timed_out,
            completed = outcome.completed,
            skipped = outcome.skipped,
            cleared = outcome.cleared,
            "Session finished"
        );
        Ok(outcome)
    }

    /// Number of running sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether no session is running.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Exclusive access to one owner's session.
pub struct SessionHandle {
    guard: OwnedMutexGuard<Slot>,
    slot: SharedSlot,
    clock: Arc<dyn Clock>,
}

impl SessionHandle {
    /// The session as it is now.
    pub fn instance(&self) -> &SessionInstance {
        &self.guard.instance
    }

    /// Session owner.
    pub fn owner(&self) -> UserId {
        self.guard.instance.owner()
    }

    /// Whether `item` is reachable.
    pub fn can_access(&self, item: ImageId) -> Result<bool> {
        self.guard.instance.can_access(item)
    }

    /// Fail with `Forbidden` unless `item` is reachable.
    pub fn require_access(&self, item: ImageId) -> Result<()> {
        self.guard.instance.require_access(item)
    }

    /// Fail unless `item` is reachable and has no outcome yet.
    pub fn require_pending(&self, item: ImageId) -> Result<()> {
        self.guard.instance.item(item)?.ensure_pending()?;
        self.guard.instance.require_access(item)
    }

    /// Record that the hint of `item` was revealed.
    pub fn mark_hinted(&mut self, item: ImageId) -> Result<()> {
        self.guard.instance.mark_hinted(item)?;
        debug!(owner = %self.owner(), image = %item, "Hint revealed");
        Ok(())
    }

    /// Skip `item`.
    pub fn mark_skipped(&mut self, item: ImageId) -> Result<()> {
        self.guard.instance.mark_skipped(item)?;
        debug!(owner = %self.owner(), image = %item, "Image skipped");
        Ok(())
    }

    /// Complete `item` with `evidence`.
    pub fn mark_completed(&mut self, item: ImageId, evidence: EvidenceId) -> Result<()> {
        self.guard.instance.mark_completed(item, evidence)?;
        debug!(owner = %self.owner(), image = %item, evidence = %evidence, "Image completed");
        Ok(())
    }

    /// Whether the session has run out of time.
    pub fn timed_out(&self) -> bool {
        self.guard.instance.timed_out(self.clock.now())
    }

    /// Snapshot of the session.
    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot::capture(&self.guard.instance, self.clock.now())
    }
}

fn no_session(owner: UserId) -> TrackerError {
    TrackerError::NotFound(format!("user {} has not started a set", owner))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use snaphunt_core::{Coordinate, ImageSet, ManualClock, SetImage};
    use std::time::Duration as StdDuration;

    fn catalog(set: i64, n: u32) -> CatalogEntry {
        let images = (1..=n)
            .map(|seq| SetImage {
                id: ImageId(set * 100 + seq as i64),
                set_id: SetId(set),
                path: format!("{set}/{seq}.jpg"),
                title: format!("stop {seq}"),
                seq_no: seq,
                location: Coordinate::new(48.85, 2.35),
                hint: Some(format!("hint {seq}")),
            })
            .collect();
        CatalogEntry::new(
            ImageSet { id: SetId(set), name: format!("set {set}"), time_limit_secs: 600 },
            images,
        )
    }

    fn img(set: i64, seq: u32) -> ImageId {
        ImageId(set * 100 + seq as i64)
    }

    fn manual_registry() -> (Arc<ManualClock>, SessionRegistry) {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap()));
        let registry = SessionRegistry::with_clock(clock.clone());
        (clock, registry)
    }

    #[tokio::test]
    async fn test_start_has_get_clear() {
        let registry = SessionRegistry::new();
        let owner = UserId(1);

        assert!(!registry.has(owner).await);
        assert!(matches!(registry.get(owner).await, Err(TrackerError::NotFound(_))));

        let started = registry.start(owner, &catalog(1, 3)).await.unwrap();
        assert!(registry.has(owner).await);
        assert_eq!(registry.get(owner).await.unwrap(), started);
        assert_eq!(registry.len().await, 1);

        registry.clear(owner).await;
        assert!(!registry.has(owner).await);
        // Clearing twice is fine
        registry.clear(owner).await;
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_second_start_is_already_active() {
        let registry = SessionRegistry::new();
        registry.start(UserId(1), &catalog(1, 2)).await.unwrap();
        let err = registry.start(UserId(1), &catalog(2, 2)).await.unwrap_err();
        assert!(matches!(err, TrackerError::AlreadyActive(_)));
        // The first session is untouched
        assert_eq!(registry.get(UserId(1)).await.unwrap().set_id(), SetId(1));

        registry.clear(UserId(1)).await;
        registry.start(UserId(1), &catalog(2, 2)).await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_start_single_winner() {
        let registry = Arc::new(SessionRegistry::new());
        let entry = Arc::new(catalog(1, 4));

        let tasks: Vec<_> = (0..32)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let entry = Arc::clone(&entry);
                tokio::spawn(async move { registry.start(UserId(9), &entry).await })
            })
            .collect();

        let mut ok = 0;
        let mut already = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => ok += 1,
                Err(TrackerError::AlreadyActive(_)) => already += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(ok, 1);
        assert_eq!(already, 31);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_sequential_unlock_through_registry() {
        let registry = SessionRegistry::new();
        let owner = UserId(5);
        registry.start(owner, &catalog(3, 3)).await.unwrap();

        assert!(registry.can_access(owner, img(3, 1)).await.unwrap());
        assert!(!registry.can_access(owner, img(3, 2)).await.unwrap());
        assert!(!registry.can_access(owner, img(3, 3)).await.unwrap());

        registry.mark_skipped(owner, img(3, 1)).await.unwrap();
        assert!(registry.can_access(owner, img(3, 2)).await.unwrap());
        assert!(!registry.can_access(owner, img(3, 3)).await.unwrap());

        registry.mark_completed(owner, img(3, 2), EvidenceId(77)).await.unwrap();
        assert!(registry.can_access(owner, img(3, 3)).await.unwrap());
        assert_eq!(
            registry.get(owner).await.unwrap().item(img(3, 2)).unwrap().evidence(),
            Some(EvidenceId(77))
        );
    }

    #[tokio::test]
    async fn test_transitions_without_session_or_item() {
        let registry = SessionRegistry::new();
        let owner = UserId(5);
        assert!(matches!(
            registry.mark_hinted(owner, img(1, 1)).await,
            Err(TrackerError::NotFound(_))
        ));

        registry.start(owner, &catalog(1, 1)).await.unwrap();
        assert!(matches!(
            registry.mark_skipped(owner, img(2, 1)).await,
            Err(TrackerError::NotFound(_))
        ));
        assert!(matches!(
            registry.can_access(owner, img(2, 1)).await,
            Err(TrackerError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_hint_is_idempotent_and_does_not_unlock() {
        let registry = SessionRegistry::new();
        let owner = UserId(5);
        registry.start(owner, &catalog(1, 2)).await.unwrap();
        registry.mark_hinted(owner, img(1, 1)).await.unwrap();
        registry.mark_hinted(owner, img(1, 1)).await.unwrap();
        assert!(registry.get(owner).await.unwrap().item(img(1, 1)).unwrap().hinted());
        assert!(!registry.can_access(owner, img(1, 2)).await.unwrap());
    }

    #[tokio::test]
    async fn test_outcome_on_handled_item_is_rejected() {
        let registry = SessionRegistry::new();
        let owner = UserId(5);
        registry.start(owner, &catalog(1, 2)).await.unwrap();

        registry.mark_skipped(owner, img(1, 1)).await.unwrap();
        assert!(matches!(
            registry.mark_completed(owner, img(1, 1), EvidenceId(1)).await,
            Err(TrackerError::InvalidState(_))
        ));
        assert!(matches!(
            registry.mark_skipped(owner, img(1, 1)).await,
            Err(TrackerError::InvalidState(_))
        ));

        registry.mark_completed(owner, img(1, 2), EvidenceId(2)).await.unwrap();
        assert!(matches!(
            registry.mark_skipped(owner, img(1, 2)).await,
            Err(TrackerError::InvalidState(_))
        ));

        let s = registry.get(owner).await.unwrap();
        assert!(s.item(img(1, 1)).unwrap().skipped());
        assert!(!s.item(img(1, 1)).unwrap().completed());
        assert!(s.item(img(1, 2)).unwrap().completed());
        assert!(!s.item(img(1, 2)).unwrap().skipped());
    }

    #[tokio::test]
    async fn test_mark_re_validates_access() {
        let registry = SessionRegistry::new();
        let owner = UserId(5);
        registry.start(owner, &catalog(1, 3)).await.unwrap();
        assert!(matches!(
            registry.mark_completed(owner, img(1, 3), EvidenceId(1)).await,
            Err(TrackerError::Forbidden(_))
        ));
        assert!(!registry.get(owner).await.unwrap().item(img(1, 3)).unwrap().is_handled());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_check_then_act_is_serialized() {
        // Every worker repeatedly locks the session, picks the next pending
        // item, checks it is reachable and skips it. With per-owner
        // serialization no check may go stale before its act.
        let registry = Arc::new(SessionRegistry::new());
        let owner = UserId(3);
        registry.start(owner, &catalog(1, 40)).await.unwrap();

        let workers: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                tokio::spawn(async move {
                    let mut handled = 0usize;
                    loop {
                        let mut session = registry.session(owner).await.unwrap();
                        let Some(next) = session.instance().next_item() else {
                            return handled;
                        };
                        assert!(session.can_access(next).unwrap());
                        tokio::task::yield_now().await;
                        session.mark_skipped(next).unwrap();
                        handled += 1;
                    }
                })
            })
            .collect();

        let mut total = 0;
        for worker in workers {
            total += worker.await.unwrap();
        }
        assert_eq!(total, 40);
        assert!(registry.get(owner).await.unwrap().all_handled());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_owners_do_not_block_each_other() {
        let registry = Arc::new(SessionRegistry::new());
        registry.start(UserId(1), &catalog(1, 2)).await.unwrap();
        registry.start(UserId(2), &catalog(2, 2)).await.unwrap();

        // Hold owner 1's session for the whole test
        let held = registry.session(UserId(1)).await.unwrap();

        let other = Arc::clone(&registry);
        let result = tokio::time::timeout(StdDuration::from_secs(2), async move {
            other.mark_skipped(UserId(2), img(2, 1)).await?;
            other.snapshot(UserId(2)).await
        })
        .await
        .expect("owner 2 was blocked by owner 1");
        assert_eq!(result.unwrap().skipped, 1);

        drop(held);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_clear_waits_for_holder_and_retires_slot() {
        let registry = Arc::new(SessionRegistry::new());
        let owner = UserId(4);
        registry.start(owner, &catalog(1, 2)).await.unwrap();

        let mut held = registry.session(owner).await.unwrap();
        let clearing = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move { registry.clear(owner).await })
        };
        tokio::time::sleep(StdDuration::from_millis(50)).await;
        held.mark_skipped(img(1, 1)).unwrap();
        drop(held);

        clearing.await.unwrap();
        assert!(!registry.has(owner).await);
        assert!(matches!(registry.session(owner).await, Err(TrackerError::NotFound(_))));

        // A fresh session starts clean
        registry.start(owner, &catalog(1, 2)).await.unwrap();
        assert!(!registry.get(owner).await.unwrap().item(img(1, 1)).unwrap().is_handled());
    }

    #[tokio::test]
    async fn test_timed_out_follows_clock() {
        let (clock, registry) = manual_registry();
        let owner = UserId(1);
        registry.start(owner, &catalog(1, 1)).await.unwrap();

        assert!(!registry.timed_out(owner).await.unwrap());
        clock.advance(Duration::seconds(599));
        assert!(!registry.timed_out(owner).await.unwrap());
        clock.advance(Duration::seconds(1));
        assert!(registry.timed_out(owner).await.unwrap());

        // Deadlines do not lock anything
        registry.mark_hinted(owner, img(1, 1)).await.unwrap();
        registry.mark_skipped(owner, img(1, 1)).await.unwrap();
    }

    #[tokio::test]
    async fn test_finish_without_session_is_invalid_state() {
        let registry = SessionRegistry::new();
        assert!(matches!(
            registry.finish(UserId(1), SetId(1)).await,
            Err(TrackerError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_finish_requires_every_item_handled() {
        let (clock, registry) = manual_registry();
        let owner = UserId(1);
        registry.start(owner, &catalog(1, 2)).await.unwrap();
        registry.mark_skipped(owner, img(1, 1)).await.unwrap();

        assert!(matches!(
            registry.finish(owner, SetId(1)).await,
            Err(TrackerError::InvalidState(_))
        ));
        clock.advance(Duration::hours(2));
        assert!(matches!(
            registry.finish(owner, SetId(1)).await,
            Err(TrackerError::InvalidState(_))
        ));
        // A failed finish leaves the session in place
        assert!(registry.has(owner).await);
    }

    #[tokio::test]
    async fn test_finish_before_deadline_clears_by_default() {
        let (_clock, registry) = manual_registry();
        let owner = UserId(1);
        registry.start(owner, &catalog(1, 2)).await.unwrap();
        registry.mark_skipped(owner, img(1, 1)).await.unwrap();
        registry.mark_completed(owner, img(1, 2), EvidenceId(3)).await.unwrap();

        assert!(matches!(
            registry.finish(owner, SetId(2)).await,
            Err(TrackerError::InvalidState(_))
        ));

        let outcome = registry.finish(owner, SetId(1)).await.unwrap();
        assert!(!outcome.timed_out);
        assert!(outcome.cleared);
        assert_eq!((outcome.completed, outcome.skipped), (1, 1));
        assert!(!registry.has(owner).await);

        // Cleared, so the owner may start again
        registry.start(owner, &catalog(1, 2)).await.unwrap();
    }

    #[tokio::test]
    async fn test_finish_after_deadline_reports_timeout() {
        let (clock, registry) = manual_registry();
        let owner = UserId(1);
        registry.start(owner, &catalog(1, 1)).await.unwrap();
        registry.mark_skipped(owner, img(1, 1)).await.unwrap();
        clock.advance(Duration::seconds(600));

        let outcome = registry.finish(owner, SetId(1)).await.unwrap();
        assert!(outcome.timed_out);
    }

    #[tokio::test]
    async fn test_retain_policy_keeps_session_after_finish() {
        let (_clock, registry) = manual_registry();
        let registry = registry.with_finish_policy(FinishPolicy::Retain);
        let owner = UserId(1);
        registry.start(owner, &catalog(1, 1)).await.unwrap();
        registry.mark_skipped(owner, img(1, 1)).await.unwrap();

        let first = registry.finish(owner, SetId(1)).await.unwrap();
        assert!(!first.cleared);
        assert!(registry.has(owner).await);

        // Finishing again reports the same thing
        let second = registry.finish(owner, SetId(1)).await.unwrap();
        assert_eq!(first, second);

        // and the owner stays blocked until an explicit clear
        assert!(matches!(
            registry.start(owner, &catalog(2, 1)).await,
            Err(TrackerError::AlreadyActive(_))
        ));
        registry.clear(owner).await;
        registry.start(owner, &catalog(2, 1)).await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_catalog_leaves_registry_empty() {
        let registry = SessionRegistry::new();
        let mut entry = catalog(1, 2);
        entry.images[1].seq_no = 1;
        assert!(matches!(
            registry.start(UserId(1), &entry).await,
            Err(TrackerError::InvalidState(_))
        ));
        assert!(!registry.has(UserId(1)).await);
    }
}
