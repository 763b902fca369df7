//! Identity of the user and editing session that own a draft.
//!
//! Authentication happens elsewhere; these values are handed to the
//! controller and the stores explicitly instead of being read from ambient
//! state.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;

/// Identifier of the authenticated user that owns drafts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// A user id must be non-empty and free of surrounding whitespace.
    pub fn is_valid(&self) -> bool {
        !self.0.is_empty() && self.0.trim() == self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The editing session: which user is typing, and which tab/device
/// instance is doing it.
///
/// Two sessions of the same user share drafts; the `session_id` only
/// distinguishes them in logs and telemetry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionIdentity {
    pub user_id: UserId,
    pub session_id: Uuid,
}

impl SessionIdentity {
    /// Create a session for `user_id` with a fresh UUID v7 session id.
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            session_id: Uuid::now_v7(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_validation() {
        assert!(UserId::new("42").is_valid());
        assert!(!UserId::new("").is_valid());
        assert!(!UserId::new(" 42").is_valid());
    }

    #[test]
    fn sessions_of_same_user_are_distinct() {
        let a = SessionIdentity::new(UserId::new("7"));
        let b = SessionIdentity::new(UserId::new("7"));
        assert_eq!(a.user_id, b.user_id);
        assert_ne!(a.session_id, b.session_id);
    }
}
