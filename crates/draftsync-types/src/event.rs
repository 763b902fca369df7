//! Telemetry events emitted by draft controllers.
//!
//! `DraftTelemetry` is broadcast on the telemetry bus. All variants are
//! Clone + Send + Sync for use with tokio broadcast channels.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::draft::{BoardId, ConflictSeverity, DraftId};
use crate::status::{DraftErrorKind, DraftStatus, ResolutionMode};

/// What caused a save to be dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveOrigin {
    Manual,
    Debounce,
    Interval,
}

impl SaveOrigin {
    /// Manual saves are never deduplicated against the last acknowledged payload.
    pub fn is_manual(&self) -> bool {
        matches!(self, SaveOrigin::Manual)
    }
}

/// Classification of a failed save for telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Store reported a non-destructive (soft) conflict.
    ConflictWarning,
    /// Store reported an overlapping (hard) conflict.
    HttpConflict,
    RateLimited,
    SaveFailed,
    LoadFailed,
}

impl FailureReason {
    pub fn for_conflict(severity: ConflictSeverity) -> Self {
        match severity {
            ConflictSeverity::Soft => FailureReason::ConflictWarning,
            ConflictSeverity::Hard => FailureReason::HttpConflict,
        }
    }

    pub fn for_error(kind: DraftErrorKind) -> Self {
        match kind {
            DraftErrorKind::LoadFailed => FailureReason::LoadFailed,
            DraftErrorKind::RateLimited => FailureReason::RateLimited,
            DraftErrorKind::SaveFailed => FailureReason::SaveFailed,
            DraftErrorKind::Conflict => FailureReason::HttpConflict,
        }
    }
}

/// Events published by draft controllers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DraftTelemetry {
    /// A save did not produce an accepted draft.
    SaveFailure {
        reason: FailureReason,
        origin: SaveOrigin,
        /// Controller status after the failure was applied.
        status: DraftStatus,
        error: Option<DraftErrorKind>,
        board_id: BoardId,
        draft_id: Option<DraftId>,
        http_status: Option<u16>,
        timestamp: DateTime<Utc>,
    },

    /// The controller entered `conflict`.
    ConflictDetected {
        board_id: BoardId,
        draft_id: Option<DraftId>,
        severity: ConflictSeverity,
        occurrence: u64,
        timestamp: DateTime<Utc>,
    },

    /// A resolution completed and the controller left `conflict`.
    ConflictResolved {
        board_id: BoardId,
        draft_id: Option<DraftId>,
        strategy: ResolutionMode,
        timestamp: DateTime<Utc>,
    },
}

impl DraftTelemetry {
    /// Metric-style name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            DraftTelemetry::SaveFailure { .. } => "drafts.save.failure",
            DraftTelemetry::ConflictDetected { .. } => "drafts.conflict.detected",
            DraftTelemetry::ConflictResolved { .. } => "drafts.conflict.resolved",
        }
    }
}
