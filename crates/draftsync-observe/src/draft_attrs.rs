//! Span and event field names for draft operations.
//!
//! Usable as constant field names in tracing macros:
//! `tracing::info_span!("draft.save", { BOARD_ID } = %board)`.

// --- Identity ---

/// The acting user (`X-User-Id`).
pub const USER_ID: &str = "draftsync.user_id";

/// Board the draft belongs to.
pub const BOARD_ID: &str = "draftsync.board_id";

/// Post the draft edits; absent for new posts.
pub const POST_ID: &str = "draftsync.post_id";

/// Stored draft record id.
pub const DRAFT_ID: &str = "draftsync.draft_id";

// --- Save ---

/// Version token the client expected.
pub const EXPECTED_VERSION: &str = "draftsync.save.expected_version";

/// `checked` or `overwrite`.
pub const SAVE_MODE: &str = "draftsync.save.mode";

/// `saved` or `conflict`.
pub const SAVE_RESULT: &str = "draftsync.save.result";

/// `soft` or `hard` when the save conflicted.
pub const CONFLICT_SEVERITY: &str = "draftsync.conflict.severity";

// --- Span names ---

pub const SPAN_LOAD: &str = "draft.load";
pub const SPAN_SAVE: &str = "draft.save";
pub const SPAN_DELETE: &str = "draft.delete";
pub const SPAN_LIST: &str = "draft.list";
