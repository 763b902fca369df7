//! The draft autosave state machine.
//!
//! `DraftMachine` is a pure transition table: it consumes [`DraftEvent`]s and
//! returns the [`Effect`]s the driver must perform (arm a timer, issue a
//! request, patch the form, settle a waiting caller). It never performs I/O
//! and never reads the clock for scheduling, so every transition is testable
//! without a runtime.
//!
//! Invariants held here:
//! - at most one request (load, save, fetch, delete) is in flight;
//! - every save carries the token of the last successful load or save;
//! - while a conflict record exists no autosave is dispatched.

use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use draftsync_types::config::AutoSaveConfig;
use draftsync_types::draft::{
    ConflictSeverity, Draft, DraftId, DraftKey, DraftPayload, SaveMode, SaveRequest,
    VersionToken,
};
use draftsync_types::error::{DraftSyncError, PersistenceError};
use draftsync_types::event::{DraftTelemetry, FailureReason, SaveOrigin};
use draftsync_types::status::{
    ConflictRecord, ControllerState, DraftErrorKind, DraftStatus, ResolutionMode,
};

use super::backoff::RateLimitBackoff;

/// Inputs to the machine. Payload-carrying events hold the form projection
/// taken at the moment the event happened.
#[derive(Debug, Clone, PartialEq)]
pub enum DraftEvent {
    /// The user changed the form.
    Edit,
    /// The debounce (or rate-limit retry) timer expired.
    TimerFired(DraftPayload),
    /// The periodic safety-save interval ticked.
    IntervalTick(DraftPayload),
    /// Explicit save requested by the caller.
    Flush(DraftPayload),
    LoadOk(Option<Draft>),
    LoadFailed(PersistenceError),
    SaveOk(Draft),
    SaveConflict {
        remote: Option<Draft>,
        severity: ConflictSeverity,
    },
    SaveError(PersistenceError),
    Resolve(ResolutionMode, DraftPayload),
    /// Answer to the load issued for a snapshot-less `reloadRemote`.
    RemoteFetched(Result<Option<Draft>, PersistenceError>),
    /// Delete the remote draft and reset (after publish).
    Clear,
    Cleared(Result<(), PersistenceError>),
}

/// Work the driver performs on behalf of the machine.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// (Re)arm the single debounce timer to fire after the delay.
    ArmTimer(Duration),
    CancelTimer,
    Load,
    Save {
        request: SaveRequest,
        origin: SaveOrigin,
    },
    /// Load the remote draft to complete a `reloadRemote`.
    FetchRemote,
    Delete(DraftId),
    /// Push a loaded draft into fields the user has not diverged on.
    Hydrate(Draft),
    /// Overwrite form fields the remote snapshot provides.
    AdoptRemote(Draft),
    /// Project the form now and feed the event matching `origin` back in.
    Reproject(SaveOrigin),
    /// Settle every waiting `trigger_save` caller.
    FlushSettled(Result<DraftPayload, DraftSyncError>),
    /// Settle the accepted (oldest) `resolve_conflict` caller.
    ResolveSettled(Result<(), DraftSyncError>),
    /// Reject the newest `resolve_conflict` caller without touching the accepted one.
    ResolveRejected(DraftSyncError),
    ClearSettled(Result<(), DraftSyncError>),
    Telemetry(DraftTelemetry),
}

#[derive(Debug, Clone, PartialEq)]
enum InFlight {
    Load,
    Save {
        origin: SaveOrigin,
        payload: DraftPayload,
        resolving: bool,
    },
    Fetch,
    Delete {
        previous: DraftStatus,
    },
}

/// Autosave state for one draft key.
#[derive(Debug, Clone)]
pub struct DraftMachine {
    key: DraftKey,
    debounce: Duration,
    backoff: RateLimitBackoff,
    state: ControllerState,
    started: bool,
    hydrated: bool,
    in_flight: Option<InFlight>,
    timer_armed: bool,
    /// Edits seen before hydration settled.
    edit_pending: bool,
    /// A dispatch postponed because a request was in flight.
    queued: Option<SaveOrigin>,
    flush_waiting: bool,
    clear_pending: bool,
    /// Delay of the pending rate-limit retry; edits never arm anything shorter.
    retry_floor: Option<Duration>,
    last_acked: Option<DraftPayload>,
    occurrences: u64,
}

impl DraftMachine {
    pub fn new(key: DraftKey, config: &AutoSaveConfig) -> Self {
        Self {
            key,
            debounce: config.debounce(),
            backoff: RateLimitBackoff::from_config(config),
            state: ControllerState::default(),
            started: false,
            hydrated: false,
            in_flight: None,
            timer_armed: false,
            edit_pending: false,
            queued: None,
            flush_waiting: false,
            clear_pending: false,
            retry_floor: None,
            last_acked: None,
            occurrences: 0,
        }
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    pub fn key(&self) -> &DraftKey {
        &self.key
    }

    pub fn is_hydrated(&self) -> bool {
        self.hydrated
    }

    /// Whether a request is currently outstanding.
    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn is_resolving(&self) -> bool {
        matches!(
            self.in_flight,
            Some(InFlight::Fetch) | Some(InFlight::Save { resolving: true, .. })
        )
    }

    /// Payload acknowledged by the last successful load or save.
    pub fn last_acknowledged(&self) -> Option<&DraftPayload> {
        self.last_acked.as_ref()
    }

    /// Begin hydration: `idle -> loading`.
    pub fn start(&mut self) -> Vec<Effect> {
        if self.started {
            return Vec::new();
        }
        self.started = true;
        self.state.status = DraftStatus::Loading;
        self.in_flight = Some(InFlight::Load);
        debug!(key = %self.key, "loading draft");
        vec![Effect::Load]
    }

    pub fn handle(&mut self, event: DraftEvent) -> Vec<Effect> {
        match event {
            DraftEvent::Edit => self.on_edit(),
            DraftEvent::TimerFired(payload) => self.on_timer(payload),
            DraftEvent::IntervalTick(payload) => self.on_interval(payload),
            DraftEvent::Flush(payload) => self.on_flush(payload),
            DraftEvent::LoadOk(draft) => self.on_load_ok(draft),
            DraftEvent::LoadFailed(error) => self.on_load_failed(error),
            DraftEvent::SaveOk(draft) => self.on_save_ok(draft),
            DraftEvent::SaveConflict { remote, severity } => self.on_save_conflict(remote, severity),
            DraftEvent::SaveError(error) => self.on_save_error(error),
            DraftEvent::Resolve(mode, payload) => self.on_resolve(mode, payload),
            DraftEvent::RemoteFetched(result) => self.on_remote_fetched(result),
            DraftEvent::Clear => self.on_clear(),
            DraftEvent::Cleared(result) => self.on_cleared(result),
        }
    }

    // -----------------------------------------------------------------------
    // Scheduling
    // -----------------------------------------------------------------------

    fn on_edit(&mut self) -> Vec<Effect> {
        if self.state.conflict.is_some() {
            return Vec::new();
        }
        if !self.hydrated {
            self.edit_pending = true;
            return Vec::new();
        }
        self.timer_armed = true;
        vec![Effect::ArmTimer(self.edit_delay())]
    }

    fn edit_delay(&self) -> Duration {
        match self.retry_floor {
            Some(floor) => self.debounce.max(floor),
            None => self.debounce,
        }
    }

    fn on_timer(&mut self, payload: DraftPayload) -> Vec<Effect> {
        self.timer_armed = false;
        if self.state.conflict.is_some() {
            return Vec::new();
        }
        if self.in_flight.is_some() {
            self.queue(SaveOrigin::Debounce);
            return Vec::new();
        }
        self.dispatch(payload, SaveOrigin::Debounce)
    }

    fn on_interval(&mut self, payload: DraftPayload) -> Vec<Effect> {
        if self.state.conflict.is_some()
            || !self.hydrated
            || self.in_flight.is_some()
            || self.timer_armed
        {
            return Vec::new();
        }
        self.dispatch(payload, SaveOrigin::Interval)
    }

    fn on_flush(&mut self, payload: DraftPayload) -> Vec<Effect> {
        if self.state.conflict.is_some() {
            return vec![Effect::FlushSettled(Err(DraftSyncError::ConflictUnresolved))];
        }
        self.flush_waiting = true;
        if self.in_flight.is_some() {
            self.queue(SaveOrigin::Manual);
            return Vec::new();
        }
        self.dispatch(payload, SaveOrigin::Manual)
    }

    fn queue(&mut self, origin: SaveOrigin) {
        self.queued = Some(match (self.queued, origin) {
            (Some(SaveOrigin::Manual), _) | (_, SaveOrigin::Manual) => SaveOrigin::Manual,
            (Some(SaveOrigin::Debounce), _) | (_, SaveOrigin::Debounce) => SaveOrigin::Debounce,
            _ => SaveOrigin::Interval,
        });
    }

    fn has_draft(&self) -> bool {
        self.state.draft_id.is_some() || !self.state.version.is_initial()
    }

    fn dispatch(&mut self, payload: DraftPayload, origin: SaveOrigin) -> Vec<Effect> {
        let mut effects = Vec::new();

        if !self.has_draft() && !payload.has_substantive_content() {
            debug!(key = %self.key, ?origin, "nothing to save for an empty new draft");
            if origin.is_manual() {
                self.flush_waiting = false;
                effects.push(Effect::FlushSettled(Err(DraftSyncError::NothingToSave)));
            }
            return effects;
        }

        if !origin.is_manual() && self.last_acked.as_ref() == Some(&payload) {
            if matches!(
                self.state.status,
                DraftStatus::Error(DraftErrorKind::SaveFailed | DraftErrorKind::RateLimited)
            ) {
                self.state.status = DraftStatus::Saved;
            }
            return effects;
        }

        if origin.is_manual() && self.timer_armed {
            self.timer_armed = false;
            effects.push(Effect::CancelTimer);
        }

        let request = SaveRequest {
            key: self.key.clone(),
            payload: payload.clone(),
            expected_version: self.state.version,
            mode: SaveMode::Checked,
        };
        debug!(key = %self.key, ?origin, expected = %request.expected_version, "dispatching save");
        self.state.status = DraftStatus::Saving;
        self.in_flight = Some(InFlight::Save {
            origin,
            payload,
            resolving: false,
        });
        effects.push(Effect::Save { request, origin });
        effects
    }

    /// Continue after a request settled: pending clear first, then edits and
    /// dispatches that waited for the request.
    fn resume(&mut self, effects: &mut Vec<Effect>) {
        if self.in_flight.is_some() {
            return;
        }
        if self.clear_pending {
            self.clear_pending = false;
            effects.extend(self.begin_clear());
            return;
        }
        if self.state.conflict.is_some() {
            self.queued = None;
            self.edit_pending = false;
            return;
        }
        if std::mem::take(&mut self.edit_pending) {
            self.timer_armed = true;
            effects.push(Effect::ArmTimer(self.edit_delay()));
        }
        if let Some(origin) = self.queued.take() {
            effects.push(Effect::Reproject(origin));
        }
    }

    // -----------------------------------------------------------------------
    // Load
    // -----------------------------------------------------------------------

    fn on_load_ok(&mut self, draft: Option<Draft>) -> Vec<Effect> {
        if self.in_flight != Some(InFlight::Load) {
            return Vec::new();
        }
        self.in_flight = None;
        self.hydrated = true;

        let mut effects = Vec::new();
        match draft {
            Some(draft) => {
                info!(key = %self.key, version = %draft.version, "restored draft");
                self.acknowledge(&draft, draft.to_payload());
                self.state.status = DraftStatus::Saved;
                effects.push(Effect::Hydrate(draft));
            }
            None => {
                debug!(key = %self.key, "no stored draft");
                self.state.status = DraftStatus::Idle;
            }
        }
        self.resume(&mut effects);
        effects
    }

    fn on_load_failed(&mut self, error: PersistenceError) -> Vec<Effect> {
        if self.in_flight != Some(InFlight::Load) {
            return Vec::new();
        }
        self.in_flight = None;
        self.hydrated = true;
        warn!(key = %self.key, error = %error, "draft restore failed");
        self.state.status = DraftStatus::Error(DraftErrorKind::LoadFailed);

        let mut effects = Vec::new();
        self.resume(&mut effects);
        effects
    }

    // -----------------------------------------------------------------------
    // Save results
    // -----------------------------------------------------------------------

    fn take_save(&mut self) -> Option<(SaveOrigin, DraftPayload, bool)> {
        match self.in_flight.take() {
            Some(InFlight::Save {
                origin,
                payload,
                resolving,
            }) => Some((origin, payload, resolving)),
            other => {
                self.in_flight = other;
                None
            }
        }
    }

    fn acknowledge(&mut self, draft: &Draft, payload: DraftPayload) {
        self.state.draft_id = Some(draft.id);
        self.state.version = draft.version;
        self.state.last_saved_at = Some(draft.updated_at);
        self.last_acked = Some(payload);
        self.retry_floor = None;
        self.backoff.reset();
    }

    fn on_save_ok(&mut self, draft: Draft) -> Vec<Effect> {
        let Some((origin, payload, resolving)) = self.take_save() else {
            return Vec::new();
        };
        info!(key = %self.key, version = %draft.version, ?origin, "draft saved");
        self.acknowledge(&draft, payload.clone());
        self.state.status = DraftStatus::Saved;

        let mut effects = Vec::new();
        if resolving {
            effects.extend(self.finish_resolution(ResolutionMode::KeepLocal));
        } else if origin.is_manual() && self.flush_waiting {
            self.flush_waiting = false;
            effects.push(Effect::FlushSettled(Ok(payload)));
        }
        self.resume(&mut effects);
        effects
    }

    fn on_save_conflict(
        &mut self,
        remote: Option<Draft>,
        severity: ConflictSeverity,
    ) -> Vec<Effect> {
        let Some((origin, payload, resolving)) = self.take_save() else {
            return Vec::new();
        };
        warn!(key = %self.key, %severity, ?origin, "save rejected by a newer remote draft");

        let mut effects = Vec::new();
        if resolving {
            self.state.status = DraftStatus::Conflict;
            if let Some(record) = self.state.conflict.as_mut() {
                record.local = payload;
                record.severity = severity;
                if remote.is_some() {
                    record.remote = remote;
                }
            }
            effects.push(self.failure_telemetry(
                FailureReason::for_conflict(severity),
                origin,
                Some(409),
            ));
            effects.push(Effect::ResolveSettled(Err(DraftSyncError::Conflict {
                severity,
            })));
            self.resume(&mut effects);
            return effects;
        }

        self.occurrences += 1;
        self.state.status = DraftStatus::Conflict;
        self.state.conflict = Some(ConflictRecord {
            local: payload,
            remote,
            severity,
            occurrence: self.occurrences,
            detected_at: Utc::now(),
        });
        if self.timer_armed {
            self.timer_armed = false;
            effects.push(Effect::CancelTimer);
        }
        self.queued = None;
        self.edit_pending = false;

        effects.push(self.failure_telemetry(
            FailureReason::for_conflict(severity),
            origin,
            Some(409),
        ));
        effects.push(Effect::Telemetry(DraftTelemetry::ConflictDetected {
            board_id: self.key.board_id.clone(),
            draft_id: self.state.draft_id,
            severity,
            occurrence: self.occurrences,
            timestamp: Utc::now(),
        }));
        if self.flush_waiting {
            self.flush_waiting = false;
            effects.push(Effect::FlushSettled(Err(DraftSyncError::Conflict {
                severity,
            })));
        }
        self.resume(&mut effects);
        effects
    }

    fn on_save_error(&mut self, error: PersistenceError) -> Vec<Effect> {
        let Some((origin, _payload, resolving)) = self.take_save() else {
            return Vec::new();
        };
        let http_status = error.http_status();
        let mut effects = Vec::new();

        if resolving {
            warn!(key = %self.key, error = %error, "keep-local resolution failed");
            self.state.status = DraftStatus::Conflict;
            let kind = if error.is_rate_limited() {
                DraftErrorKind::RateLimited
            } else {
                DraftErrorKind::SaveFailed
            };
            effects.push(self.failure_telemetry(FailureReason::for_error(kind), origin, http_status));
            effects.push(Effect::ResolveSettled(Err(error.into())));
            self.resume(&mut effects);
            return effects;
        }

        let kind = match &error {
            PersistenceError::NotFound => {
                warn!(key = %self.key, "remote draft vanished; will save as a new draft");
                self.state.version = VersionToken::INITIAL;
                self.state.draft_id = None;
                self.last_acked = None;
                self.retry_floor = None;
                self.timer_armed = true;
                effects.push(Effect::ArmTimer(self.debounce));
                DraftErrorKind::LoadFailed
            }
            PersistenceError::RateLimited { retry_after } => {
                let delay = self.backoff.next_delay(*retry_after);
                warn!(
                    key = %self.key,
                    delay_ms = delay.as_millis() as u64,
                    attempt = self.backoff.attempts(),
                    "save rate limited; retry scheduled"
                );
                self.retry_floor = Some(delay);
                self.timer_armed = true;
                effects.push(Effect::ArmTimer(delay));
                if self.queued != Some(SaveOrigin::Manual) {
                    self.queued = None;
                }
                DraftErrorKind::RateLimited
            }
            other => {
                warn!(key = %self.key, error = %other, ?origin, "draft save failed");
                self.retry_floor = None;
                DraftErrorKind::SaveFailed
            }
        };
        self.state.status = DraftStatus::Error(kind);
        effects.push(self.failure_telemetry(FailureReason::for_error(kind), origin, http_status));

        if origin.is_manual() && self.flush_waiting {
            self.flush_waiting = false;
            effects.push(Effect::FlushSettled(Err(error.into())));
        }
        self.resume(&mut effects);
        effects
    }

    fn failure_telemetry(
        &self,
        reason: FailureReason,
        origin: SaveOrigin,
        http_status: Option<u16>,
    ) -> Effect {
        Effect::Telemetry(DraftTelemetry::SaveFailure {
            reason,
            origin,
            status: self.state.status,
            error: self.state.status.error_kind(),
            board_id: self.key.board_id.clone(),
            draft_id: self.state.draft_id,
            http_status,
            timestamp: Utc::now(),
        })
    }

    // -----------------------------------------------------------------------
    // Conflict resolution
    // -----------------------------------------------------------------------

    fn on_resolve(&mut self, mode: ResolutionMode, payload: DraftPayload) -> Vec<Effect> {
        let Some(record) = self.state.conflict.as_ref() else {
            return vec![Effect::ResolveRejected(DraftSyncError::NoConflict)];
        };
        if self.in_flight.is_some() {
            return vec![Effect::ResolveRejected(DraftSyncError::ResolutionInProgress)];
        }
        info!(key = %self.key, %mode, occurrence = record.occurrence, "resolving conflict");

        match mode {
            ResolutionMode::KeepLocal => {
                let request = SaveRequest {
                    key: self.key.clone(),
                    payload: payload.clone(),
                    expected_version: self.state.version,
                    mode: SaveMode::Overwrite,
                };
                self.state.status = DraftStatus::Saving;
                self.in_flight = Some(InFlight::Save {
                    origin: SaveOrigin::Manual,
                    payload,
                    resolving: true,
                });
                vec![Effect::Save {
                    request,
                    origin: SaveOrigin::Manual,
                }]
            }
            ResolutionMode::ReloadRemote => match record.remote.clone() {
                Some(remote) => self.adopt_remote(remote),
                None => {
                    debug!(key = %self.key, "conflict carried no snapshot; fetching remote draft");
                    self.in_flight = Some(InFlight::Fetch);
                    vec![Effect::FetchRemote]
                }
            },
        }
    }

    fn on_remote_fetched(&mut self, result: Result<Option<Draft>, PersistenceError>) -> Vec<Effect> {
        if self.in_flight != Some(InFlight::Fetch) {
            return Vec::new();
        }
        self.in_flight = None;
        let mut effects = match result {
            Ok(Some(remote)) => self.adopt_remote(remote),
            Ok(None) => {
                warn!(key = %self.key, "remote draft disappeared during reload");
                vec![Effect::ResolveSettled(Err(PersistenceError::NotFound.into()))]
            }
            Err(error) => {
                warn!(key = %self.key, error = %error, "could not fetch remote draft");
                vec![Effect::ResolveSettled(Err(error.into()))]
            }
        };
        self.resume(&mut effects);
        effects
    }

    fn adopt_remote(&mut self, remote: Draft) -> Vec<Effect> {
        self.acknowledge(&remote, remote.to_payload());
        self.state.status = DraftStatus::Saved;
        let mut effects = vec![Effect::AdoptRemote(remote)];
        effects.extend(self.finish_resolution(ResolutionMode::ReloadRemote));
        effects
    }

    fn finish_resolution(&mut self, mode: ResolutionMode) -> Vec<Effect> {
        self.state.conflict = None;
        self.state.last_resolution = Some(mode);
        info!(key = %self.key, %mode, version = %self.state.version, "conflict resolved");
        vec![
            Effect::ResolveSettled(Ok(())),
            Effect::Telemetry(DraftTelemetry::ConflictResolved {
                board_id: self.key.board_id.clone(),
                draft_id: self.state.draft_id,
                strategy: mode,
                timestamp: Utc::now(),
            }),
        ]
    }

    // -----------------------------------------------------------------------
    // Teardown
    // -----------------------------------------------------------------------

    fn on_clear(&mut self) -> Vec<Effect> {
        if self.in_flight.is_some() {
            self.clear_pending = true;
            let mut effects = Vec::new();
            if self.timer_armed {
                self.timer_armed = false;
                effects.push(Effect::CancelTimer);
            }
            return effects;
        }
        self.begin_clear()
    }

    fn begin_clear(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        if self.timer_armed {
            self.timer_armed = false;
            effects.push(Effect::CancelTimer);
        }
        self.queued = None;
        self.edit_pending = false;
        if self.flush_waiting {
            self.flush_waiting = false;
            effects.push(Effect::FlushSettled(Err(DraftSyncError::NothingToSave)));
        }

        match self.state.draft_id {
            Some(id) => {
                self.in_flight = Some(InFlight::Delete {
                    previous: self.state.status,
                });
                effects.push(Effect::Delete(id));
            }
            None => {
                self.reset();
                effects.push(Effect::ClearSettled(Ok(())));
            }
        }
        effects
    }

    fn on_cleared(&mut self, result: Result<(), PersistenceError>) -> Vec<Effect> {
        let previous = match self.in_flight.take() {
            Some(InFlight::Delete { previous }) => previous,
            other => {
                self.in_flight = other;
                return Vec::new();
            }
        };
        match result {
            Ok(()) | Err(PersistenceError::NotFound) => {
                info!(key = %self.key, "draft cleared");
                self.reset();
                vec![Effect::ClearSettled(Ok(()))]
            }
            Err(error) => {
                warn!(key = %self.key, error = %error, "draft delete failed");
                self.state.status = previous;
                vec![Effect::ClearSettled(Err(error.into()))]
            }
        }
    }

    fn reset(&mut self) {
        self.state = ControllerState::default();
        self.last_acked = None;
        self.retry_floor = None;
        self.backoff.reset();
    }
}
