//! In-memory draft store.
//!
//! Reference implementation of `DraftPersistenceClient` used by tests and
//! the CLI demo mode. Supports failure injection, artificial latency, and
//! tracks how many requests were in flight at once so tests can assert the
//! one-save-at-a-time rule.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use draftsync_types::draft::{
    DEFAULT_DRAFT_TTL_DAYS, Draft, DraftId, DraftKey, SaveOutcome, SaveRequest, VersionToken,
};
use draftsync_types::error::PersistenceError;
use draftsync_types::identity::UserId;

use super::{DraftPersistenceClient, SaveDecision, decide_save};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Thread-safe in-memory draft store keyed by (owner, storage key).
pub struct InMemoryDraftClient {
    drafts: DashMap<(UserId, String), Draft>,
    ttl_days: i64,
    latency: Mutex<Option<Duration>>,
    load_failures: Mutex<VecDeque<PersistenceError>>,
    save_failures: Mutex<VecDeque<PersistenceError>>,
    omit_conflict_snapshot: AtomicBool,
    save_log: Mutex<Vec<SaveRequest>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl InMemoryDraftClient {
    pub fn new() -> Self {
        Self::with_ttl_days(DEFAULT_DRAFT_TTL_DAYS)
    }

    pub fn with_ttl_days(ttl_days: i64) -> Self {
        Self {
            drafts: DashMap::new(),
            ttl_days,
            latency: Mutex::new(None),
            load_failures: Mutex::new(VecDeque::new()),
            save_failures: Mutex::new(VecDeque::new()),
            omit_conflict_snapshot: AtomicBool::new(false),
            save_log: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Delay every request by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *lock(&self.latency) = latency;
    }

    /// Queue an error returned by the next `load_draft` call.
    pub fn fail_next_load(&self, error: PersistenceError) {
        lock(&self.load_failures).push_back(error);
    }

    /// Queue an error returned by the next `save_draft` call. Queued errors are
    /// consumed one per save, in order.
    pub fn fail_next_save(&self, error: PersistenceError) {
        lock(&self.save_failures).push_back(error);
    }

    /// Answer conflicts without the remote snapshot.
    pub fn omit_conflict_snapshot(&self, omit: bool) {
        self.omit_conflict_snapshot.store(omit, Ordering::SeqCst);
    }

    /// Every save request received, in arrival order.
    pub fn save_log(&self) -> Vec<SaveRequest> {
        lock(&self.save_log).clone()
    }

    /// Highest number of requests observed in flight at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Current stored draft for `owner` under `key`, bypassing injection.
    pub fn stored(&self, owner: &UserId, key: &DraftKey) -> Option<Draft> {
        self.drafts
            .get(&(owner.clone(), key.storage_key()))
            .map(|entry| entry.value().clone())
    }

    /// Insert or replace a draft directly, bypassing the version check.
    pub fn seed(&self, draft: Draft) {
        let slot = (draft.owner.clone(), draft.key().storage_key());
        self.drafts.insert(slot, draft);
    }

    pub fn len(&self) -> usize {
        self.drafts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drafts.is_empty()
    }

    async fn enter(&self) -> InFlightGuard<'_> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        let latency = *lock(&self.latency);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        InFlightGuard(&self.in_flight)
    }
}

impl Default for InMemoryDraftClient {
    fn default() -> Self {
        Self::new()
    }
}

impl DraftPersistenceClient for InMemoryDraftClient {
    async fn load_draft(
        &self,
        owner: &UserId,
        key: &DraftKey,
    ) -> Result<Option<Draft>, PersistenceError> {
        let _guard = self.enter().await;
        if let Some(error) = lock(&self.load_failures).pop_front() {
            return Err(error);
        }

        let slot = (owner.clone(), key.storage_key());
        let now = Utc::now();
        let expired = self
            .drafts
            .get(&slot)
            .is_some_and(|entry| entry.is_expired_at(now));
        if expired {
            self.drafts.remove(&slot);
            return Ok(None);
        }
        Ok(self.drafts.get(&slot).map(|entry| entry.value().clone()))
    }

    async fn save_draft(
        &self,
        owner: &UserId,
        request: &SaveRequest,
    ) -> Result<SaveOutcome, PersistenceError> {
        let _guard = self.enter().await;
        lock(&self.save_log).push(request.clone());
        if let Some(error) = lock(&self.save_failures).pop_front() {
            return Err(error);
        }

        let now = Utc::now();
        let slot = (owner.clone(), request.key.storage_key());
        match self.drafts.entry(slot) {
            Entry::Occupied(mut occupied) => {
                let live = !occupied.get().is_expired_at(now);
                let stored = live.then(|| occupied.get());
                match decide_save(stored, request) {
                    SaveDecision::Conflict(severity) => {
                        let remote = if self.omit_conflict_snapshot.load(Ordering::SeqCst) {
                            None
                        } else {
                            let mut snapshot = occupied.get().clone();
                            snapshot.conflict = Some(severity);
                            Some(snapshot)
                        };
                        Ok(SaveOutcome::Conflict { remote, severity })
                    }
                    SaveDecision::AlreadyApplied => Ok(SaveOutcome::Saved(occupied.get().clone())),
                    SaveDecision::Missing => {
                        occupied.remove();
                        Err(PersistenceError::NotFound)
                    }
                    SaveDecision::Update => {
                        let draft = occupied.get_mut();
                        draft.title = Some(request.payload.title.clone());
                        draft.content = Some(request.payload.content.clone());
                        draft.metadata = request.payload.metadata.clone();
                        draft.version = draft.version.next();
                        draft.conflict = None;
                        draft.updated_at = now;
                        draft.expires_at = Draft::expiry_from(now, self.ttl_days);
                        Ok(SaveOutcome::Saved(draft.clone()))
                    }
                    SaveDecision::Create => {
                        let draft = new_draft(owner, request, now, self.ttl_days);
                        occupied.insert(draft.clone());
                        Ok(SaveOutcome::Saved(draft))
                    }
                }
            }
            Entry::Vacant(vacant) => match decide_save(None, request) {
                SaveDecision::Missing => Err(PersistenceError::NotFound),
                _ => {
                    let draft = new_draft(owner, request, now, self.ttl_days);
                    vacant.insert(draft.clone());
                    Ok(SaveOutcome::Saved(draft))
                }
            },
        }
    }

    async fn delete_draft(&self, owner: &UserId, id: &DraftId) -> Result<(), PersistenceError> {
        let _guard = self.enter().await;
        let before = self.drafts.len();
        self.drafts
            .retain(|(draft_owner, _), draft| !(draft_owner == owner && draft.id == *id));
        if self.drafts.len() == before {
            return Err(PersistenceError::NotFound);
        }
        Ok(())
    }
}

fn new_draft(
    owner: &UserId,
    request: &SaveRequest,
    now: chrono::DateTime<Utc>,
    ttl_days: i64,
) -> Draft {
    Draft {
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
        expires_at: Draft::expiry_from(now, ttl_days),
    }
}
