//! SQLite implementation of `DraftPersistenceClient`.
//!
//! One row per (owner, draft key). Saves run the shared compare-and-swap
//! decision inside a writer transaction, so concurrent sessions of the same
//! user cannot both advance the same version. Expired rows are invisible to
//! loads and listings and are removed by [`SqliteDraftStore::purge_expired`].

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use tracing::{debug, info};

use draftsync_core::persistence::{DraftPersistenceClient, SaveDecision, decide_save};
use draftsync_types::draft::{
    BoardId, DEFAULT_DRAFT_TTL_DAYS, Draft, DraftId, DraftKey, PostId, SaveOutcome, SaveRequest,
    VersionToken,
};
use draftsync_types::error::PersistenceError;
use draftsync_types::identity::UserId;

use super::pool::DatabasePool;

const DRAFT_COLUMNS: &str = "id, owner, board_id, post_id, title, content, metadata, version, created_at, updated_at, expires_at";

/// SQLite-backed draft store.
pub struct SqliteDraftStore {
    pool: DatabasePool,
    ttl_days: i64,
}

impl SqliteDraftStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self::with_ttl_days(pool, DEFAULT_DRAFT_TTL_DAYS)
    }

    pub fn with_ttl_days(pool: DatabasePool, ttl_days: i64) -> Self {
        Self { pool, ttl_days }
    }

    /// Live drafts of `owner`, most recently saved first.
    pub async fn list_for_owner(
        &self,
        owner: &UserId,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Draft>, PersistenceError> {
        let rows = sqlx::query(&format!(
            "SELECT {DRAFT_COLUMNS} FROM drafts WHERE owner = ? AND expires_at > ? \
             ORDER BY updated_at DESC LIMIT ? OFFSET ?"
        ))
        .bind(owner.as_str())
        .bind(format_datetime(&Utc::now()))
        .bind(i64::from(limit))
        .bind(i64::from(offset))
        .fetch_all(&self.pool.reader)
        .await
        .map_err(storage_error)?;

        rows.iter().map(row_to_draft).collect()
    }

    /// Delete every expired draft. Returns how many rows were removed.
    pub async fn purge_expired(&self) -> Result<u64, PersistenceError> {
        let result = sqlx::query("DELETE FROM drafts WHERE expires_at <= ?")
            .bind(format_datetime(&Utc::now()))
            .execute(&self.pool.writer)
            .await
            .map_err(storage_error)?;
        let purged = result.rows_affected();
        if purged > 0 {
            info!(purged, "purged expired drafts");
        }
        Ok(purged)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn storage_error(e: sqlx::Error) -> PersistenceError {
    PersistenceError::Storage(e.to_string())
}

/// Fixed-width UTC timestamps so text comparison orders them correctly.
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, PersistenceError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| PersistenceError::Decode(format!("invalid datetime: {e}")))
}

fn row_to_draft(row: &SqliteRow) -> Result<Draft, PersistenceError> {
    let id: String = row.try_get("id").map_err(storage_error)?;
    let owner: String = row.try_get("owner").map_err(storage_error)?;
    let board_id: String = row.try_get("board_id").map_err(storage_error)?;
    let post_id: Option<String> = row.try_get("post_id").map_err(storage_error)?;
    let title: Option<String> = row.try_get("title").map_err(storage_error)?;
    let content: Option<String> = row.try_get("content").map_err(storage_error)?;
    let metadata: String = row.try_get("metadata").map_err(storage_error)?;
    let version: i64 = row.try_get("version").map_err(storage_error)?;
    let created_at: String = row.try_get("created_at").map_err(storage_error)?;
    let updated_at: String = row.try_get("updated_at").map_err(storage_error)?;
    let expires_at: String = row.try_get("expires_at").map_err(storage_error)?;

    let metadata: Map<String, Value> = serde_json::from_str(&metadata)
        .map_err(|e| PersistenceError::Decode(format!("invalid metadata: {e}")))?;

    Ok(Draft {
        id: id
            .parse::<DraftId>()
            .map_err(|e| PersistenceError::Decode(format!("invalid draft id: {e}")))?,
        owner: UserId::new(owner),
        board_id: BoardId::new(board_id),
        post_id: post_id.map(PostId::new),
        title,
        content,
        metadata,
        version: VersionToken(u64::try_from(version).unwrap_or_default()),
        conflict: None,
        created_at: parse_datetime(&created_at)?,
        updated_at: parse_datetime(&updated_at)?,
        expires_at: parse_datetime(&expires_at)?,
    })
}

fn metadata_json(metadata: &Map<String, Value>) -> Result<String, PersistenceError> {
    serde_json::to_string(metadata)
        .map_err(|e| PersistenceError::Decode(format!("unencodable metadata: {e}")))
}

fn version_param(version: VersionToken) -> i64 {
    i64::try_from(version.0).unwrap_or(i64::MAX)
}

// ---------------------------------------------------------------------------
// DraftPersistenceClient implementation
// ---------------------------------------------------------------------------

impl DraftPersistenceClient for SqliteDraftStore {
    async fn load_draft(
        &self,
        owner: &UserId,
        key: &DraftKey,
    ) -> Result<Option<Draft>, PersistenceError> {
        let row = sqlx::query(&format!(
            "SELECT {DRAFT_COLUMNS} FROM drafts WHERE owner = ? AND draft_key = ?"
        ))
        .bind(owner.as_str())
        .bind(key.storage_key())
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(storage_error)?;

        match row {
            Some(row) => {
                let draft = row_to_draft(&row)?;
                if draft.is_expired_at(Utc::now()) {
                    debug!(key = %key, "stored draft expired");
                    return Ok(None);
                }
                Ok(Some(draft))
            }
            None => Ok(None),
        }
    }

    async fn save_draft(
        &self,
        owner: &UserId,
        request: &SaveRequest,
    ) -> Result<SaveOutcome, PersistenceError> {
        let now = Utc::now();
        let storage_key = request.key.storage_key();
        let mut tx = self.pool.writer.begin().await.map_err(storage_error)?;

        let row = sqlx::query(&format!(
            "SELECT {DRAFT_COLUMNS} FROM drafts WHERE owner = ? AND draft_key = ?"
        ))
        .bind(owner.as_str())
        .bind(&storage_key)
        .fetch_optional(&mut *tx)
        .await
        .map_err(storage_error)?;
        let existing = row.as_ref().map(row_to_draft).transpose()?;
        let live = existing.as_ref().filter(|d| !d.is_expired_at(now));

        let outcome = match decide_save(live, request) {
            SaveDecision::Conflict(severity) => {
                let mut remote = live.cloned();
                if let Some(remote) = remote.as_mut() {
                    remote.conflict = Some(severity);
                }
                debug!(key = %request.key, %severity, "save rejected by version check");
                SaveOutcome::Conflict { remote, severity }
            }
            SaveDecision::AlreadyApplied => {
                let Some(current) = live else {
                    return Err(PersistenceError::Storage(
                        "retry matched without a stored draft".to_string(),
                    ));
                };
                debug!(key = %request.key, version = %current.version, "save already applied");
                SaveOutcome::Saved(current.clone())
            }
            SaveDecision::Missing => {
                if existing.is_some() {
                    sqlx::query("DELETE FROM drafts WHERE owner = ? AND draft_key = ?")
                        .bind(owner.as_str())
                        .bind(&storage_key)
                        .execute(&mut *tx)
                        .await
                        .map_err(storage_error)?;
                    tx.commit().await.map_err(storage_error)?;
                }
                return Err(PersistenceError::NotFound);
            }
            SaveDecision::Update => {
                let Some(current) = live else {
                    return Err(PersistenceError::Storage(
                        "update decided without a stored draft".to_string(),
                    ));
                };
                let draft = Draft {
                    title: Some(request.payload.title.clone()),
                    content: Some(request.payload.content.clone()),
                    metadata: request.payload.metadata.clone(),
                    version: current.version.next(),
                    conflict: None,
                    updated_at: now,
                    expires_at: Draft::expiry_from(now, self.ttl_days),
                    ..current.clone()
                };
                sqlx::query(
                    "UPDATE drafts SET title = ?, content = ?, metadata = ?, version = ?, \
                     updated_at = ?, expires_at = ? WHERE id = ?",
                )
                .bind(&draft.title)
                .bind(&draft.content)
                .bind(metadata_json(&draft.metadata)?)
                .bind(version_param(draft.version))
                .bind(format_datetime(&draft.updated_at))
                .bind(format_datetime(&draft.expires_at))
                .bind(draft.id.to_string())
                .execute(&mut *tx)
                .await
                .map_err(storage_error)?;
                SaveOutcome::Saved(draft)
            }
            SaveDecision::Create => {
                // An expired row still holds the unique slot.
                if existing.is_some() {
                    sqlx::query("DELETE FROM drafts WHERE owner = ? AND draft_key = ?")
                        .bind(owner.as_str())
                        .bind(&storage_key)
                        .execute(&mut *tx)
                        .await
                        .map_err(storage_error)?;
                }
                let draft = Draft {
                    id: DraftId::new(),
                    owner: owner.clone(),
                    board_id: request.key.board_id.clone(),
                    post_id: request.key.post_id.clone(),
                    title: Some(request.payload.title.clone()),
                    content: Some(request.payload.content.clone()),
                    metadata: request.payload.metadata.clone(),
                    version: VersionToken::INITIAL.next(),
                    conflict: None,
                    created_at: now,
                    updated_at: now,
                    expires_at: Draft::expiry_from(now, self.ttl_days),
                };
                sqlx::query(&format!(
                    "INSERT INTO drafts ({DRAFT_COLUMNS}, draft_key) \
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
                ))
                .bind(draft.id.to_string())
                .bind(owner.as_str())
                .bind(draft.board_id.as_str())
                .bind(draft.post_id.as_ref().map(PostId::as_str))
                .bind(&draft.title)
                .bind(&draft.content)
                .bind(metadata_json(&draft.metadata)?)
                .bind(version_param(draft.version))
                .bind(format_datetime(&draft.created_at))
                .bind(format_datetime(&draft.updated_at))
                .bind(format_datetime(&draft.expires_at))
                .bind(&storage_key)
                .execute(&mut *tx)
                .await
                .map_err(storage_error)?;
                SaveOutcome::Saved(draft)
            }
        };

        tx.commit().await.map_err(storage_error)?;
        if let SaveOutcome::Saved(draft) = &outcome {
            debug!(key = %request.key, version = %draft.version, "draft stored");
        }
        Ok(outcome)
    }

    async fn delete_draft(&self, owner: &UserId, id: &DraftId) -> Result<(), PersistenceError> {
        let result = sqlx::query("DELETE FROM drafts WHERE id = ? AND owner = ?")
            .bind(id.to_string())
            .bind(owner.as_str())
            .execute(&self.pool.writer)
            .await
            .map_err(storage_error)?;

        if result.rows_affected() == 0 {
            return Err(PersistenceError::NotFound);
        }
        Ok(())
    }
}
