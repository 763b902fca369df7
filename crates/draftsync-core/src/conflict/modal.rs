//! Blocking conflict modal with edge-triggered open/close.

use draftsync_types::draft::ConflictSeverity;
use draftsync_types::status::{ControllerState, DraftStatus, ResolutionMode};

use super::{Notification, explanation, headline};

/// What the modal shows while open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModalView {
    pub title: &'static str,
    pub message: &'static str,
    pub severity: ConflictSeverity,
    /// A resolution is running; choices should be disabled.
    pub resolving: bool,
    /// Whether the remote snapshot is already known (otherwise reloading fetches it).
    pub has_remote: bool,
    /// Failure of the last choice, if it failed.
    pub error: Option<String>,
}

/// An edge the modal reacted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModalChange {
    Opened(ModalView),
    Closed(Notification),
}

/// Opens on the transition into `conflict` and closes on the transition out
/// of it. Edges are found by comparing each observed status with `previous`.
#[derive(Debug, Clone, Default)]
pub struct ConflictModal {
    previous: DraftStatus,
    open: bool,
    error: Option<String>,
}

impl ConflictModal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Feed the latest controller state; returns the edge, if one occurred.
    pub fn observe(&mut self, state: &ControllerState) -> Option<ModalChange> {
        let previous = std::mem::replace(&mut self.previous, state.status);
        if previous == state.status {
            return None;
        }

        if state.status == DraftStatus::Conflict {
            if self.open {
                // Back from a failed resolution attempt.
                return None;
            }
            self.open = true;
            self.error = None;
            return self.view(state).map(ModalChange::Opened);
        }

        // A keep-local save keeps the record while it runs.
        if self.open && state.conflict.is_none() {
            self.open = false;
            self.error = None;
            return Some(ModalChange::Closed(Notification::resolved(
                state.last_resolution,
            )));
        }
        None
    }

    pub fn view(&self, state: &ControllerState) -> Option<ModalView> {
        if !self.open {
            return None;
        }
        let record = state.conflict.as_ref()?;
        Some(ModalView {
            title: headline(record.severity),
            message: explanation(record.severity),
            severity: record.severity,
            resolving: state.status != DraftStatus::Conflict,
            has_remote: record.remote.is_some(),
            error: self.error.clone(),
        })
    }

    /// Show a failed choice inside the modal and return the notification for it.
    pub fn record_failure(
        &mut self,
        mode: ResolutionMode,
        error: &impl std::fmt::Display,
    ) -> Notification {
        let notification = Notification::failed(mode, error);
        self.error = Some(notification.message.clone());
        notification
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use draftsync_types::draft::DraftPayload;
    use draftsync_types::status::ConflictRecord;

    use crate::conflict::NotificationLevel;

    fn state(status: DraftStatus, in_conflict: bool) -> ControllerState {
        ControllerState {
            status,
            conflict: in_conflict.then(|| ConflictRecord {
                local: DraftPayload::default(),
                remote: None,
                severity: ConflictSeverity::Hard,
                occurrence: 1,
                detected_at: Utc::now(),
            }),
            ..ControllerState::default()
        }
    }

    #[test]
    fn opens_on_entry_and_closes_on_exit() {
        let mut modal = ConflictModal::new();
        assert_eq!(modal.observe(&state(DraftStatus::Saving, false)), None);

        let opened = modal.observe(&state(DraftStatus::Conflict, true));
        assert!(matches!(opened, Some(ModalChange::Opened(ModalView { resolving: false, .. }))));

        // Same status again is not an edge.
        assert_eq!(modal.observe(&state(DraftStatus::Conflict, true)), None);

        // Keep-local save in flight: record still present, stays open.
        assert_eq!(modal.observe(&state(DraftStatus::Saving, true)), None);
        assert!(modal.view(&state(DraftStatus::Saving, true)).unwrap().resolving);

        let mut done = state(DraftStatus::Saved, false);
        done.last_resolution = Some(ResolutionMode::KeepLocal);
        match modal.observe(&done) {
            Some(ModalChange::Closed(notification)) => {
                assert_eq!(notification.level, NotificationLevel::Success)
            }
            other => panic!("expected close, got {other:?}"),
        }
        assert!(!modal.is_open());
    }

    #[test]
    fn failed_resolution_keeps_modal_open_with_error() {
        let mut modal = ConflictModal::new();
        modal.observe(&state(DraftStatus::Conflict, true));
        modal.observe(&state(DraftStatus::Saving, true));
        modal.record_failure(ResolutionMode::KeepLocal, &"request timed out");
        assert_eq!(modal.observe(&state(DraftStatus::Conflict, true)), None);

        let view = modal.view(&state(DraftStatus::Conflict, true)).unwrap();
        assert_eq!(
            view.error.as_deref(),
            Some("Could not keep your version: request timed out")
        );
    }

    #[test]
    fn reopens_for_a_new_conflict() {
        let mut modal = ConflictModal::new();
        modal.observe(&state(DraftStatus::Conflict, true));
        modal.observe(&state(DraftStatus::Saved, false));
        modal.observe(&state(DraftStatus::Saving, false));
        assert!(matches!(
            modal.observe(&state(DraftStatus::Conflict, true)),
            Some(ModalChange::Opened(_))
        ));
    }
}
