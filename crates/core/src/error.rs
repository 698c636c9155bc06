//! Tracker error taxonomy.
//!
//! Every variant is an expected, caller-facing condition. The request layer
//! maps them onto responses; nothing here is a fault.

/// Result type for tracker operations.
pub type Result<T> = std::result::Result<T, TrackerError>;

/// Errors raised by the session progress tracker.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrackerError {
    /// A session is already running for the owner
    #[error("Already active: {0}")]
    AlreadyActive(String),

    /// No session for the owner, or no such item in the session
    #[error("Not found: {0}")]
    NotFound(String),

    /// The item's predecessors are not handled yet
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The session is not in a state that allows the operation
    #[error("Invalid state: {0}")]
    InvalidState(String),
}
