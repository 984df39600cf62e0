//! User identity as seen by the core.
//!
//! Users are owned by the authentication layer. The core only keeps the
//! identity and display name so it can list and look them up.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier of a platform user.
pub type UserId = Uuid;

/// Platform user reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct User {
    pub uuid: UserId,
    pub username: String,
}

impl User {
    /// Creates a user with a generated stable ID.
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            username: username.into(),
        }
    }
}
