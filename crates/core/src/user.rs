//! User account model.

use serde::{Deserialize, Serialize};
use crate::id::UserId;

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier
    pub id: UserId,

    /// Login name, unique
    pub username: String,

    /// bcrypt hash of the password
    #[serde(skip_serializing)]
    pub password_hash: String,
}
