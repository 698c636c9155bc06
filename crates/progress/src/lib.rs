//! Session Progress Tracking
//!
//! Process-wide registry of running sessions, the finish workflow, and
//! progress snapshots for reporting.

#![warn(missing_docs)]

pub mod registry;
pub mod finish;
pub mod snapshot;

pub use registry::{SessionRegistry, SessionHandle};
pub use finish::{FinishOutcome, FinishPolicy, ParseFinishPolicyError};
pub use snapshot::{ProgressSnapshot, ItemSnapshot};
