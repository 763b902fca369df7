//! Controller status model.
//!
//! `DraftStatus` is the single active status of one controller. Error kinds
//! ride inside the `Error` variant so that a status and its kind can never
//! disagree.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;

use crate::draft::{ConflictSeverity, Draft, DraftId, DraftPayload, VersionToken};

/// Why the controller is in an error (or conflict) state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftErrorKind {
    /// Initial restore failed, or the remote draft vanished. Non-fatal.
    LoadFailed,
    /// The store throttled us; a delayed retry is armed.
    RateLimited,
    /// Transient save failure; retried on the next edit, tick, or flush.
    SaveFailed,
    /// A user decision is required.
    Conflict,
}

impl DraftErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DraftErrorKind::LoadFailed => "load_failed",
            DraftErrorKind::RateLimited => "rate_limited",
            DraftErrorKind::SaveFailed => "save_failed",
            DraftErrorKind::Conflict => "conflict",
        }
    }
}

impl fmt::Display for DraftErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a draft controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(tag = "status", content = "kind", rename_all = "snake_case")]
pub enum DraftStatus {
    #[default]
    Idle,
    Loading,
    Saving,
    Saved,
    Conflict,
    Error(DraftErrorKind),
}

impl DraftStatus {
    /// The error kind implied by this status, if any.
    pub fn error_kind(&self) -> Option<DraftErrorKind> {
        match self {
            DraftStatus::Error(kind) => Some(*kind),
            DraftStatus::Conflict => Some(DraftErrorKind::Conflict),
            _ => None,
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, DraftStatus::Conflict)
    }

    /// Short label used in logs and JSON output.
    pub fn label(&self) -> &'static str {
        match self {
            DraftStatus::Idle => "idle",
            DraftStatus::Loading => "loading",
            DraftStatus::Saving => "saving",
            DraftStatus::Saved => "saved",
            DraftStatus::Conflict => "conflict",
            DraftStatus::Error(_) => "error",
        }
    }

    /// Plain-language status line for the editor.
    pub fn describe(&self) -> &'static str {
        match self {
            DraftStatus::Idle => "Draft not saved yet",
            DraftStatus::Loading => "Restoring draft...",
            DraftStatus::Saving => "Saving draft...",
            DraftStatus::Saved => "Draft saved",
            DraftStatus::Conflict => "This draft was changed in another tab or device",
            DraftStatus::Error(DraftErrorKind::LoadFailed) => {
                "Could not restore your draft; changes will be saved as a new draft"
            }
            DraftStatus::Error(DraftErrorKind::RateLimited) => {
                "Saving too often; retrying shortly"
            }
            DraftStatus::Error(DraftErrorKind::SaveFailed) => {
                "Draft could not be saved; will retry"
            }
            DraftStatus::Error(DraftErrorKind::Conflict) => {
                "This draft was changed in another tab or device"
            }
        }
    }
}

impl fmt::Display for DraftStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DraftStatus::Error(kind) => write!(f, "error({kind})"),
            other => f.write_str(other.label()),
        }
    }
}

/// The user's choice for leaving a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResolutionMode {
    /// Force-save the local payload over the remote one.
    KeepLocal,
    /// Discard local edits and adopt the remote snapshot.
    ReloadRemote,
}

impl fmt::Display for ResolutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionMode::KeepLocal => write!(f, "keepLocal"),
            ResolutionMode::ReloadRemote => write!(f, "reloadRemote"),
        }
    }
}

/// A pending conflict: the local payload against the remote snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictRecord {
    pub local: DraftPayload,
    /// Absent when the store's conflict answer carried no body.
    pub remote: Option<Draft>,
    pub severity: ConflictSeverity,
    /// Increments every time the controller enters `conflict`.
    pub occurrence: u64,
    pub detected_at: DateTime<Utc>,
}

/// Inspectable snapshot published by a controller on every transition.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ControllerState {
    pub status: DraftStatus,
    pub draft_id: Option<DraftId>,
    pub version: VersionToken,
    pub last_saved_at: Option<DateTime<Utc>>,
    pub conflict: Option<ConflictRecord>,
    pub last_resolution: Option<ResolutionMode>,
}

impl ControllerState {
    pub fn error(&self) -> Option<DraftErrorKind> {
        self.status.error_kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_status_reports_conflict_kind() {
        assert_eq!(DraftStatus::Conflict.error_kind(), Some(DraftErrorKind::Conflict));
        assert_eq!(DraftStatus::Saved.error_kind(), None);
        assert_eq!(
            DraftStatus::Error(DraftErrorKind::RateLimited).error_kind(),
            Some(DraftErrorKind::RateLimited)
        );
    }

    #[test]
    fn status_display() {
        assert_eq!(DraftStatus::Saving.to_string(), "saving");
        assert_eq!(
            DraftStatus::Error(DraftErrorKind::SaveFailed).to_string(),
            "error(save_failed)"
        );
    }

    #[test]
    fn status_serializes_with_kind() {
        let json = serde_json::to_value(DraftStatus::Error(DraftErrorKind::LoadFailed)).unwrap();
        assert_eq!(json, serde_json::json!({"status": "error", "kind": "load_failed"}));
        let json = serde_json::to_value(DraftStatus::Idle).unwrap();
        assert_eq!(json, serde_json::json!({"status": "idle"}));
    }

    #[test]
    fn resolution_mode_uses_camel_case() {
        assert_eq!(
            serde_json::to_string(&ResolutionMode::KeepLocal).unwrap(),
            "\"keepLocal\""
        );
        let parsed: ResolutionMode = serde_json::from_str("\"reloadRemote\"").unwrap();
        assert_eq!(parsed, ResolutionMode::ReloadRemote);
    }

    #[test]
    fn default_state_is_idle_at_initial_version() {
        let state = ControllerState::default();
        assert_eq!(state.status, DraftStatus::Idle);
        assert!(state.version.is_initial());
        assert!(state.error().is_none());
    }
}
