//! Non-blocking conflict banner.

use draftsync_types::draft::ConflictSeverity;
use draftsync_types::status::{ControllerState, DraftStatus};

use super::{explanation, headline};

/// What the banner shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BannerView {
    pub title: &'static str,
    pub message: &'static str,
    pub severity: ConflictSeverity,
    pub occurrence: u64,
}

/// Shown whenever the controller is in `conflict`, unless the user dismissed
/// this particular occurrence. Dismissing never touches the conflict itself.
#[derive(Debug, Clone, Default)]
pub struct ConflictBanner {
    dismissed: Option<u64>,
}

impl ConflictBanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self, state: &ControllerState) -> Option<BannerView> {
        if state.status != DraftStatus::Conflict {
            return None;
        }
        let record = state.conflict.as_ref()?;
        if self.dismissed == Some(record.occurrence) {
            return None;
        }
        Some(BannerView {
            title: headline(record.severity),
            message: explanation(record.severity),
            severity: record.severity,
            occurrence: record.occurrence,
        })
    }

    pub fn is_visible(&self, state: &ControllerState) -> bool {
        self.view(state).is_some()
    }

    /// Hide the banner for the current conflict occurrence.
    pub fn dismiss(&mut self, state: &ControllerState) {
        if let Some(record) = &state.conflict {
            self.dismissed = Some(record.occurrence);
        }
    }
}
