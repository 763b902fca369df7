//! Draft persistence port.
//!
//! `DraftPersistenceClient` is the boundary the autosave controller talks to.
//! Implementations live in draftsync-infra (SQLite store, HTTP client); the
//! in-memory reference implementation lives here for tests and demos.

pub mod memory;

pub use memory::InMemoryDraftClient;

use draftsync_types::draft::{
    ConflictSeverity, Draft, DraftId, DraftKey, DraftPayload, SaveMode, SaveOutcome, SaveRequest,
};
use draftsync_types::error::PersistenceError;
use draftsync_types::identity::UserId;

/// Version-checked draft storage scoped to an owning user.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait DraftPersistenceClient: Send + Sync {
    /// Load the live draft stored under `key`, or `None` if there is none.
    fn load_draft(
        &self,
        owner: &UserId,
        key: &DraftKey,
    ) -> impl std::future::Future<Output = Result<Option<Draft>, PersistenceError>> + Send;

    /// Save a payload, compare-and-swap on `request.expected_version`.
    ///
    /// A version mismatch yields `SaveOutcome::Conflict` and leaves the stored
    /// draft untouched. Retrying with the same token is safe.
    fn save_draft(
        &self,
        owner: &UserId,
        request: &SaveRequest,
    ) -> impl std::future::Future<Output = Result<SaveOutcome, PersistenceError>> + Send;

    /// Delete a draft by id. Fails with `NotFound` if it does not exist.
    fn delete_draft(
        &self,
        owner: &UserId,
        id: &DraftId,
    ) -> impl std::future::Future<Output = Result<(), PersistenceError>> + Send;
}

/// Judge a conflict between the stored draft and an incoming payload.
///
/// Soft when the stored title and content equal the incoming ones (only
/// metadata diverged), hard otherwise.
pub fn classify_conflict(stored: &Draft, incoming: &DraftPayload) -> ConflictSeverity {
    let same_title = stored.title.as_deref().unwrap_or_default() == incoming.title;
    let same_content = stored.content.as_deref().unwrap_or_default() == incoming.content;
    if same_title && same_content {
        ConflictSeverity::Soft
    } else {
        ConflictSeverity::Hard
    }
}

/// Outcome of the compare-and-swap check shared by every store.
#[derive(Debug, Clone, PartialEq)]
pub enum SaveDecision {
    /// Write a new record at `VersionToken::INITIAL.next()`.
    Create,
    /// Replace the stored record, advancing its version by one.
    Update,
    /// Reject with a conflict.
    Conflict(ConflictSeverity),
    /// The caller held a token for a draft that no longer exists.
    Missing,
    /// The stored record is exactly this request applied once already (a
    /// retry whose first answer was lost). Answer with the stored record.
    AlreadyApplied,
}

fn holds_payload(stored: &Draft, payload: &DraftPayload) -> bool {
    stored.title.as_deref() == Some(payload.title.as_str())
        && stored.content.as_deref() == Some(payload.content.as_str())
        && stored.metadata == payload.metadata
}

/// Decide what a store does with `request` given what it currently holds.
pub fn decide_save(stored: Option<&Draft>, request: &SaveRequest) -> SaveDecision {
    match (stored, request.mode) {
        (None, SaveMode::Overwrite) => SaveDecision::Create,
        (None, SaveMode::Checked) if request.expected_version.is_initial() => SaveDecision::Create,
        (None, SaveMode::Checked) => SaveDecision::Missing,
        (Some(_), SaveMode::Overwrite) => SaveDecision::Update,
        (Some(current), SaveMode::Checked) if current.version == request.expected_version => {
            SaveDecision::Update
        }
        (Some(current), SaveMode::Checked)
            if current.version == request.expected_version.next()
                && holds_payload(current, &request.payload) =>
        {
            SaveDecision::AlreadyApplied
        }
        (Some(current), SaveMode::Checked) => {
            SaveDecision::Conflict(classify_conflict(current, &request.payload))
        }
    }
}
