use std::time::Duration;

use thiserror::Error;

use crate::draft::ConflictSeverity;

/// Failures of the draft persistence contract (load / save / delete).
///
/// A version conflict is not an error here: it is a regular
/// [`SaveOutcome::Conflict`](crate::draft::SaveOutcome) answer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PersistenceError {
    #[error("rate limited by draft store (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    #[error("draft not found")]
    NotFound,

    #[error("unauthorized")]
    Unauthorized,

    #[error("request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("decode error: {0}")]
    Decode(String),
}

impl PersistenceError {
    /// HTTP status equivalent, reported in save-failure telemetry.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            PersistenceError::RateLimited { .. } => Some(429),
            PersistenceError::NotFound => Some(404),
            PersistenceError::Unauthorized => Some(401),
            PersistenceError::Timeout => Some(408),
            PersistenceError::Server { status, .. } => Some(*status),
            PersistenceError::Transport(_)
            | PersistenceError::Storage(_)
            | PersistenceError::Decode(_) => None,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, PersistenceError::RateLimited { .. })
    }
}

/// Errors returned by draft controller operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DraftSyncError {
    #[error("draft has an unresolved conflict")]
    ConflictUnresolved,

    #[error("no conflict to resolve")]
    NoConflict,

    #[error("a conflict resolution is already in progress")]
    ResolutionInProgress,

    #[error("nothing to save")]
    NothingToSave,

    #[error("draft controller stopped")]
    ControllerStopped,

    #[error("{severity} conflict with a newer remote draft")]
    Conflict { severity: ConflictSeverity },

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Errors from the publish flow.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("could not save draft before publishing: {0}")]
    Flush(#[source] DraftSyncError),

    #[error("publish failed: {0}")]
    Publish(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persistence_error_http_status() {
        assert_eq!(
            PersistenceError::RateLimited { retry_after: None }.http_status(),
            Some(429)
        );
        assert_eq!(
            PersistenceError::Server {
                status: 503,
                message: "unavailable".to_string()
            }
            .http_status(),
            Some(503)
        );
        assert_eq!(PersistenceError::Transport("reset".to_string()).http_status(), None);
    }

    #[test]
    fn draft_sync_error_wraps_persistence() {
        let err: DraftSyncError = PersistenceError::NotFound.into();
        assert_eq!(err.to_string(), "draft not found");
    }

    #[test]
    fn conflict_error_names_severity() {
        let err = DraftSyncError::Conflict {
            severity: ConflictSeverity::Hard,
        };
        assert_eq!(err.to_string(), "hard conflict with a newer remote draft");
    }

    #[test]
    fn publish_error_display() {
        let err = PublishError::Flush(DraftSyncError::ConflictUnresolved);
        assert!(err.to_string().contains("unresolved conflict"));
        let err = PublishError::Publish("422".to_string());
        assert_eq!(err.to_string(), "publish failed: 422");
    }
}
