//! Conflict presentation: a dismissible banner and a blocking modal, both
//! driven purely by the controller's published state.

pub mod banner;
pub mod modal;
pub mod presenter;

pub use banner::{BannerView, ConflictBanner};
pub use modal::{ConflictModal, ModalChange, ModalView};
pub use presenter::{ConflictPresenter, PresenterEvent};

use draftsync_types::draft::ConflictSeverity;
use draftsync_types::status::ResolutionMode;

/// Severity of a user-facing notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Success,
    Info,
    Error,
}

/// A transient message shown after a conflict closes or a choice fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

impl Notification {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            message: message.into(),
        }
    }

    /// Message for a completed resolution, or a neutral one when the
    /// conflict went away without a choice (e.g. the draft was cleared).
    pub fn resolved(mode: Option<ResolutionMode>) -> Self {
        match mode {
            Some(ResolutionMode::KeepLocal) => Self {
                level: NotificationLevel::Success,
                message: "Your version was saved and replaced the other copy.".to_string(),
            },
            Some(ResolutionMode::ReloadRemote) => Self {
                level: NotificationLevel::Info,
                message: "Loaded the latest saved version of this draft.".to_string(),
            },
            None => Self {
                level: NotificationLevel::Info,
                message: "The draft conflict is no longer active.".to_string(),
            },
        }
    }

    pub fn failed(action: ResolutionMode, error: &impl std::fmt::Display) -> Self {
        let what = match action {
            ResolutionMode::KeepLocal => "keep your version",
            ResolutionMode::ReloadRemote => "load the latest version",
        };
        Self {
            level: NotificationLevel::Error,
            message: format!("Could not {what}: {error}"),
        }
    }
}

/// Headline for a conflict of the given severity.
pub fn headline(severity: ConflictSeverity) -> &'static str {
    match severity {
        ConflictSeverity::Soft => "Draft updated elsewhere",
        ConflictSeverity::Hard => "Conflicting edits",
    }
}

/// Explanation for a conflict of the given severity.
pub fn explanation(severity: ConflictSeverity) -> &'static str {
    match severity {
        ConflictSeverity::Soft => {
            "This draft was saved from another tab or device with the same text; only its details differ."
        }
        ConflictSeverity::Hard => {
            "This draft was changed in another tab or device. Choose which version to keep."
        }
    }
}
