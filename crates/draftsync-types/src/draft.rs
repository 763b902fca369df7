//! Draft record, identifiers, and the version-checked save contract types.
//!
//! A draft is the persisted, unpublished edit of a post. It is identified by
//! its owner plus a [`DraftKey`] (board and optional post id), so at most one
//! live draft exists per key per user: saving under an existing key updates
//! that draft instead of creating a second one.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

use crate::identity::UserId;

/// Days a draft lives after its last accepted save.
pub const DEFAULT_DRAFT_TTL_DAYS: i64 = 30;

/// Metadata key carrying the board id inside a payload.
pub const METADATA_BOARD_ID: &str = "boardId";

/// Metadata key carrying the post category inside a payload.
pub const METADATA_CATEGORY: &str = "category";

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Unique identifier for a draft record, wrapping a UUID v7 (time-sortable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DraftId(pub Uuid);

impl DraftId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for DraftId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DraftId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DraftId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Identifier of a board (the forum section a post belongs to).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BoardId(pub String);

impl BoardId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BoardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a published post.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostId(pub String);

impl PostId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Logical key of a draft: the board, and the post when editing an existing one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DraftKey {
    pub board_id: BoardId,
    #[serde(default)]
    pub post_id: Option<PostId>,
}

impl DraftKey {
    /// Key for a brand-new post on `board_id`.
    pub fn new_post(board_id: BoardId) -> Self {
        Self {
            board_id,
            post_id: None,
        }
    }

    /// Key for an edit of an existing post.
    pub fn existing_post(board_id: BoardId, post_id: PostId) -> Self {
        Self {
            board_id,
            post_id: Some(post_id),
        }
    }

    /// Stable string form: `draft:post:{post}` or `draft:new:{board}`.
    pub fn storage_key(&self) -> String {
        match &self.post_id {
            Some(post_id) => format!("draft:post:{post_id}"),
            None => format!("draft:new:{}", self.board_id),
        }
    }
}

impl fmt::Display for DraftKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.storage_key())
    }
}

// ---------------------------------------------------------------------------
// Versioning
// ---------------------------------------------------------------------------

/// Opaque revision marker assigned by the persistence layer.
///
/// Advanced by exactly one on every accepted save. `INITIAL` means no save
/// has been accepted under this key yet.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct VersionToken(pub u64);

impl VersionToken {
    pub const INITIAL: VersionToken = VersionToken(0);

    pub fn is_initial(&self) -> bool {
        *self == Self::INITIAL
    }

    /// The token a store assigns to the save accepted after this one.
    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// How the store judged a concurrent write that caused a conflict.
///
/// - Soft: the stored text matches the incoming text; only metadata diverged.
/// - Hard: the stored title or content differs from the incoming one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictSeverity {
    Soft,
    Hard,
}

impl fmt::Display for ConflictSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictSeverity::Soft => write!(f, "soft"),
            ConflictSeverity::Hard => write!(f, "hard"),
        }
    }
}

impl FromStr for ConflictSeverity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "soft" => Ok(ConflictSeverity::Soft),
            "hard" => Ok(ConflictSeverity::Hard),
            other => Err(format!("invalid conflict severity: '{other}'")),
        }
    }
}

/// Whether a save is checked against the expected version or forced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveMode {
    /// Compare-and-swap: rejected when the stored version moved past the expected one.
    #[default]
    Checked,
    /// The payload is authoritative and replaces whatever is stored.
    Overwrite,
}

// ---------------------------------------------------------------------------
// Payload and record
// ---------------------------------------------------------------------------

/// What the editor form projects into. Always total.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DraftPayload {
    pub title: String,
    pub content: String,
    /// Board-specific fields (`boardId`, `category`, ...).
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub post_id: Option<PostId>,
}

impl DraftPayload {
    /// Whether the payload carries any non-whitespace title or content.
    pub fn has_substantive_content(&self) -> bool {
        !self.title.trim().is_empty() || !self.content.trim().is_empty()
    }

    pub fn category(&self) -> Option<&str> {
        self.metadata.get(METADATA_CATEGORY).and_then(Value::as_str)
    }
}

/// A persisted draft as returned by a store.
///
/// `title` and `content` are optional so that a remote snapshot can leave a
/// field unspecified; stores always fill them on records they write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    pub id: DraftId,
    pub owner: UserId,
    pub board_id: BoardId,
    #[serde(default)]
    pub post_id: Option<PostId>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub version: VersionToken,
    /// Set on snapshots returned inside a conflict.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflict: Option<ConflictSeverity>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Draft {
    pub fn key(&self) -> DraftKey {
        DraftKey {
            board_id: self.board_id.clone(),
            post_id: self.post_id.clone(),
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Expiry for a draft saved at `saved_at`.
    pub fn expiry_from(saved_at: DateTime<Utc>, ttl_days: i64) -> DateTime<Utc> {
        saved_at + Duration::days(ttl_days)
    }

    /// Total payload view of this record; absent text fields become empty.
    pub fn to_payload(&self) -> DraftPayload {
        DraftPayload {
            title: self.title.clone().unwrap_or_default(),
            content: self.content.clone().unwrap_or_default(),
            metadata: self.metadata.clone(),
            post_id: self.post_id.clone(),
        }
    }
}

/// A payload to persist under `key`, tagged with the last version the caller observed.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveRequest {
    pub key: DraftKey,
    pub payload: DraftPayload,
    pub expected_version: VersionToken,
    pub mode: SaveMode,
}

/// Result of a save that reached the store.
#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    /// Accepted; the record carries the newly assigned version.
    Saved(Draft),
    /// Rejected because the stored version moved past `expected_version`.
    Conflict {
        remote: Option<Draft>,
        severity: ConflictSeverity,
    },
}
