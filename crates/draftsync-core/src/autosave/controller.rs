//! Async driver for [`DraftMachine`].
//!
//! `DraftAutoSaveController::spawn` runs one tokio task per draft. The task
//! owns the machine, the debounce deadline, the periodic interval and the
//! single in-flight request; callers talk to it through a cloneable
//! [`DraftHandle`] (mpsc commands in, `watch` state out).

use std::collections::VecDeque;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, MissedTickBehavior, interval_at, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use draftsync_types::config::AutoSaveConfig;
use draftsync_types::draft::{DraftKey, DraftPayload, SaveOutcome};
use draftsync_types::error::DraftSyncError;
use draftsync_types::event::SaveOrigin;
use draftsync_types::identity::SessionIdentity;
use draftsync_types::status::{ControllerState, DraftErrorKind, DraftStatus, ResolutionMode};

use crate::event::TelemetryBus;
use crate::form::{FormState, FormStateBridge, FormValues};
use crate::persistence::DraftPersistenceClient;

use super::machine::{DraftEvent, DraftMachine, Effect};

/// Who is editing which draft.
#[derive(Debug, Clone, PartialEq)]
pub struct DraftSession {
    pub identity: SessionIdentity,
    pub key: DraftKey,
}

enum Command {
    Edit,
    Flush(oneshot::Sender<Result<DraftPayload, DraftSyncError>>),
    Resolve(ResolutionMode, oneshot::Sender<Result<(), DraftSyncError>>),
    Clear(oneshot::Sender<Result<(), DraftSyncError>>),
}

/// Cloneable handle to a running controller.
///
/// The controller stops when [`shutdown`](Self::shutdown) is called or when
/// every handle has been dropped.
#[derive(Clone)]
pub struct DraftHandle {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ControllerState>,
    cancel: CancellationToken,
    telemetry: TelemetryBus,
}

impl DraftHandle {
    /// Tell the controller the form changed.
    pub fn notify_edit(&self) {
        let _ = self.commands.send(Command::Edit);
    }

    /// Save the current form now, bypassing the debounce.
    ///
    /// Resolves with the acknowledged payload once the store accepted it.
    pub async fn trigger_save(&self) -> Result<DraftPayload, DraftSyncError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Flush(tx))?;
        rx.await.map_err(|_| DraftSyncError::ControllerStopped)?
    }

    pub async fn resolve_conflict(&self, mode: ResolutionMode) -> Result<(), DraftSyncError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Resolve(mode, tx))?;
        rx.await.map_err(|_| DraftSyncError::ControllerStopped)?
    }

    /// Delete the remote draft and reset to `idle`. Call only after publishing.
    pub async fn clear_draft(&self) -> Result<(), DraftSyncError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Clear(tx))?;
        rx.await.map_err(|_| DraftSyncError::ControllerStopped)?
    }

    pub fn status(&self) -> DraftStatus {
        self.state.borrow().status
    }

    pub fn error(&self) -> Option<DraftErrorKind> {
        self.state.borrow().error()
    }

    pub fn state(&self) -> ControllerState {
        self.state.borrow().clone()
    }

    /// Receiver notified on every published state change.
    pub fn subscribe(&self) -> watch::Receiver<ControllerState> {
        self.state.clone()
    }

    pub fn telemetry(&self) -> &TelemetryBus {
        &self.telemetry
    }

    /// Stop the controller: timers are cancelled and late responses ignored.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled() || self.commands.is_closed()
    }

    fn send(&self, command: Command) -> Result<(), DraftSyncError> {
        if self.cancel.is_cancelled() {
            return Err(DraftSyncError::ControllerStopped);
        }
        self.commands
            .send(command)
            .map_err(|_| DraftSyncError::ControllerStopped)
    }
}

impl std::fmt::Debug for DraftHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DraftHandle")
            .field("status", &self.status())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

/// Entry point for starting draft controllers.
pub struct DraftAutoSaveController;

impl DraftAutoSaveController {
    /// Spawn a controller with its own telemetry bus.
    pub fn spawn<C, F>(
        client: Arc<C>,
        form: Arc<F>,
        bridge: FormStateBridge,
        session: DraftSession,
        config: &AutoSaveConfig,
    ) -> DraftHandle
    where
        C: DraftPersistenceClient + 'static,
        F: FormState + 'static,
    {
        Self::spawn_with_telemetry(client, form, bridge, session, config, TelemetryBus::default())
    }

    /// Spawn a controller publishing telemetry on a shared bus.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn_with_telemetry<C, F>(
        client: Arc<C>,
        form: Arc<F>,
        bridge: FormStateBridge,
        session: DraftSession,
        config: &AutoSaveConfig,
        telemetry: TelemetryBus,
    ) -> DraftHandle
    where
        C: DraftPersistenceClient + 'static,
        F: FormState + 'static,
    {
        let mut machine = DraftMachine::new(session.key.clone(), config);
        let start = machine.start();

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(machine.state().clone());
        let cancel = CancellationToken::new();

        let baseline = form.snapshot();
        let driver = Driver {
            machine,
            client,
            form,
            bridge,
            session,
            baseline,
            state_tx,
            telemetry: telemetry.clone(),
            flush_waiters: Vec::new(),
            resolve_waiters: VecDeque::new(),
            clear_waiters: Vec::new(),
        };
        let interval = config.interval();
        tokio::spawn(driver.run(start, commands_rx, cancel.clone(), interval));

        DraftHandle {
            commands: commands_tx,
            state: state_rx,
            cancel,
            telemetry,
        }
    }
}

/// Timer and request slots polled by the driver loop.
struct Schedule {
    deadline: Option<Instant>,
    in_flight: Option<BoxFuture<'static, DraftEvent>>,
}

async fn settle(slot: &mut Option<BoxFuture<'static, DraftEvent>>) -> DraftEvent {
    match slot.as_mut() {
        Some(request) => request.await,
        None => std::future::pending().await,
    }
}

struct Driver<C, F> {
    machine: DraftMachine,
    client: Arc<C>,
    form: Arc<F>,
    bridge: FormStateBridge,
    session: DraftSession,
    /// Form values at mount; fields that moved away from these are not hydrated.
    baseline: FormValues,
    state_tx: watch::Sender<ControllerState>,
    telemetry: TelemetryBus,
    flush_waiters: Vec<oneshot::Sender<Result<DraftPayload, DraftSyncError>>>,
    resolve_waiters: VecDeque<oneshot::Sender<Result<(), DraftSyncError>>>,
    clear_waiters: Vec<oneshot::Sender<Result<(), DraftSyncError>>>,
}

impl<C, F> Driver<C, F>
where
    C: DraftPersistenceClient + 'static,
    F: FormState + 'static,
{
    async fn run(
        mut self,
        start: Vec<Effect>,
        mut commands: mpsc::UnboundedReceiver<Command>,
        cancel: CancellationToken,
        interval: std::time::Duration,
    ) {
        let mut schedule = Schedule {
            deadline: None,
            in_flight: None,
        };
        let mut ticker = interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        self.execute_all(start, &mut schedule);

        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                command = commands.recv() => match command {
                    Some(command) => self.accept(command),
                    None => break,
                },
                event = settle(&mut schedule.in_flight) => {
                    schedule.in_flight = None;
                    event
                }
                _ = sleep_until(schedule.deadline.unwrap_or_else(Instant::now)), if schedule.deadline.is_some() => {
                    schedule.deadline = None;
                    DraftEvent::TimerFired(self.project())
                }
                _ = ticker.tick() => DraftEvent::IntervalTick(self.project()),
            };
            let effects = self.machine.handle(event);
            self.execute_all(effects, &mut schedule);
        }

        debug!(key = %self.session.key, session = %self.session.identity.session_id, "draft controller stopped");
    }

    fn project(&self) -> DraftPayload {
        self.bridge.to_payload(&self.form.snapshot())
    }

    fn accept(&mut self, command: Command) -> DraftEvent {
        match command {
            Command::Edit => DraftEvent::Edit,
            Command::Flush(reply) => {
                self.flush_waiters.push(reply);
                DraftEvent::Flush(self.project())
            }
            Command::Resolve(mode, reply) => {
                self.resolve_waiters.push_back(reply);
                DraftEvent::Resolve(mode, self.project())
            }
            Command::Clear(reply) => {
                self.clear_waiters.push(reply);
                DraftEvent::Clear
            }
        }
    }

    fn execute_all(&mut self, effects: Vec<Effect>, schedule: &mut Schedule) {
        let mut pending: VecDeque<Effect> = effects.into();
        while let Some(effect) = pending.pop_front() {
            if let Some(follow_up) = self.execute(effect, schedule) {
                pending.extend(self.machine.handle(follow_up));
            }
        }
        let next = self.machine.state().clone();
        self.state_tx.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }

    /// Perform one effect; returns an event to feed back when the effect
    /// completes synchronously.
    fn execute(&mut self, effect: Effect, schedule: &mut Schedule) -> Option<DraftEvent> {
        match effect {
            Effect::ArmTimer(delay) => {
                schedule.deadline = Some(Instant::now() + delay);
            }
            Effect::CancelTimer => {
                schedule.deadline = None;
            }
            Effect::Load => {
                schedule.in_flight = Some(self.load(false));
            }
            Effect::FetchRemote => {
                schedule.in_flight = Some(self.load(true));
            }
            Effect::Save { request, origin } => {
                let client = Arc::clone(&self.client);
                let owner = self.session.identity.user_id.clone();
                debug!(key = %request.key, ?origin, "save dispatched");
                schedule.in_flight = Some(Box::pin(async move {
                    match client.save_draft(&owner, &request).await {
                        Ok(SaveOutcome::Saved(draft)) => DraftEvent::SaveOk(draft),
                        Ok(SaveOutcome::Conflict { remote, severity }) => {
                            DraftEvent::SaveConflict { remote, severity }
                        }
                        Err(error) => DraftEvent::SaveError(error),
                    }
                }));
            }
            Effect::Delete(id) => {
                let client = Arc::clone(&self.client);
                let owner = self.session.identity.user_id.clone();
                schedule.in_flight = Some(Box::pin(async move {
                    DraftEvent::Cleared(client.delete_draft(&owner, &id).await)
                }));
            }
            Effect::Hydrate(draft) => {
                let patch = self
                    .bridge
                    .hydration_patch(&draft, &self.form.snapshot(), &self.baseline);
                debug!(fields = patch.len(), "hydrating form from stored draft");
                self.form.apply_patch(&patch);
            }
            Effect::AdoptRemote(draft) => {
                let patch = self.bridge.to_patch(&draft, &self.form.snapshot());
                debug!(fields = patch.len(), "adopting remote draft");
                self.form.apply_patch(&patch);
            }
            Effect::Reproject(origin) => {
                let payload = self.project();
                return Some(match origin {
                    SaveOrigin::Manual => DraftEvent::Flush(payload),
                    SaveOrigin::Debounce => DraftEvent::TimerFired(payload),
                    SaveOrigin::Interval => DraftEvent::IntervalTick(payload),
                });
            }
            Effect::FlushSettled(result) => {
                for waiter in self.flush_waiters.drain(..) {
                    let _ = waiter.send(result.clone());
                }
            }
            Effect::ResolveSettled(result) => {
                if let Some(waiter) = self.resolve_waiters.pop_front() {
                    let _ = waiter.send(result);
                }
            }
            Effect::ResolveRejected(error) => {
                if let Some(waiter) = self.resolve_waiters.pop_back() {
                    let _ = waiter.send(Err(error));
                }
            }
            Effect::ClearSettled(result) => {
                for waiter in self.clear_waiters.drain(..) {
                    let _ = waiter.send(result.clone());
                }
            }
            Effect::Telemetry(event) => {
                self.telemetry.publish(event);
            }
        }
        None
    }

    fn load(&self, fetch: bool) -> BoxFuture<'static, DraftEvent> {
        let client = Arc::clone(&self.client);
        let owner = self.session.identity.user_id.clone();
        let key = self.session.key.clone();
        Box::pin(async move {
            let result = client.load_draft(&owner, &key).await;
            if let Err(error) = &result {
                warn!(key = %key, error = %error, "draft load failed");
            }
            match (fetch, result) {
                (true, result) => DraftEvent::RemoteFetched(result),
                (false, Ok(draft)) => DraftEvent::LoadOk(draft),
                (false, Err(error)) => DraftEvent::LoadFailed(error),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use draftsync_types::draft::{BoardId, ConflictSeverity, VersionToken};
    use draftsync_types::error::PersistenceError;
    use draftsync_types::event::{DraftTelemetry, FailureReason};
    use draftsync_types::identity::UserId;

    use crate::form::{FieldMapping, SharedForm};
    use crate::persistence::InMemoryDraftClient;

    fn key() -> DraftKey {
        DraftKey::new_post(BoardId::new("news"))
    }

    fn session(user: &str) -> DraftSession {
        DraftSession {
            identity: SessionIdentity::new(UserId::new(user)),
            key: key(),
        }
    }

    fn spawn(
        client: &Arc<InMemoryDraftClient>,
        form: &Arc<SharedForm>,
    ) -> DraftHandle {
        DraftAutoSaveController::spawn(
            Arc::clone(client),
            Arc::clone(form),
            FormStateBridge::new(key(), FieldMapping::default()),
            session("1"),
            &AutoSaveConfig::default(),
        )
    }

    async fn wait_status(handle: &DraftHandle, status: DraftStatus) -> ControllerState {
        let mut rx = handle.subscribe();
        let state = rx
            .wait_for(|state| state.status == status)
            .await
            .expect("controller stopped");
        state.clone()
    }

    fn type_text(form: &SharedForm, handle: &DraftHandle, content: &str) {
        form.set_field("content", content);
        handle.notify_edit();
    }

    // -----------------------------------------------------------------------
    // Scenario: sequential saves advance the token
    // -----------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn debounced_edits_save_with_advancing_tokens() {
        let client = Arc::new(InMemoryDraftClient::new());
        let form = Arc::new(SharedForm::default());
        let handle = spawn(&client, &form);
        wait_status(&handle, DraftStatus::Idle).await;

        type_text(&form, &handle, "Hello");
        let state = wait_status(&handle, DraftStatus::Saved).await;
        assert_eq!(state.version, VersionToken(1));

        type_text(&form, &handle, "Hello World");
        let mut rx = handle.subscribe();
        let state = rx
            .wait_for(|s| s.version == VersionToken(2))
            .await
            .unwrap()
            .clone();
        assert_eq!(state.status, DraftStatus::Saved);

        let log = client.save_log();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].expected_version, VersionToken(0));
        assert_eq!(log[1].expected_version, VersionToken(1));
        assert_eq!(log[1].payload.content, "Hello World");
    }

    #[tokio::test(start_paused = true)]
    async fn burst_of_edits_coalesces_into_one_save() {
        let client = Arc::new(InMemoryDraftClient::new());
        let form = Arc::new(SharedForm::default());
        let handle = spawn(&client, &form);
        wait_status(&handle, DraftStatus::Idle).await;

        for text in ["H", "He", "Hel", "Hell", "Hello"] {
            type_text(&form, &handle, text);
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        wait_status(&handle, DraftStatus::Saved).await;

        let log = client.save_log();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].payload.content, "Hello");
    }

    #[tokio::test(start_paused = true)]
    async fn only_one_save_in_flight() {
        let client = Arc::new(InMemoryDraftClient::new());
        client.set_latency(Some(Duration::from_secs(3)));
        let form = Arc::new(SharedForm::default());
        let handle = spawn(&client, &form);
        wait_status(&handle, DraftStatus::Idle).await;

        type_text(&form, &handle, "a");
        wait_status(&handle, DraftStatus::Saving).await;
        type_text(&form, &handle, "ab");
        tokio::time::sleep(Duration::from_secs(2)).await;
        type_text(&form, &handle, "abc");

        let mut rx = handle.subscribe();
        rx.wait_for(|s| s.status == DraftStatus::Saved && s.version == VersionToken(2))
            .await
            .unwrap();
        assert_eq!(client.max_in_flight(), 1);
        let log = client.save_log();
        assert_eq!(log.last().unwrap().payload.content, "abc");
    }

    // -----------------------------------------------------------------------
    // Hydration
    // -----------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn stored_draft_hydrates_untouched_fields() {
        let client = Arc::new(InMemoryDraftClient::new());
        let writer = Arc::new(SharedForm::default());
        let first = spawn(&client, &writer);
        wait_status(&first, DraftStatus::Idle).await;
        writer.set_field("title", "Saved title");
        type_text(&writer, &first, "Saved body");
        wait_status(&first, DraftStatus::Saved).await;
        first.shutdown();

        let form = Arc::new(SharedForm::default());
        let handle = spawn(&client, &form);
        let state = wait_status(&handle, DraftStatus::Saved).await;
        assert_eq!(state.version, VersionToken(1));
        assert_eq!(form.text("title"), "Saved title");
        assert_eq!(form.text("content"), "Saved body");
    }

    #[tokio::test(start_paused = true)]
    async fn load_failure_still_allows_saving() {
        let client = Arc::new(InMemoryDraftClient::new());
        client.fail_next_load(PersistenceError::Timeout);
        let form = Arc::new(SharedForm::default());
        let handle = spawn(&client, &form);
        wait_status(&handle, DraftStatus::Error(DraftErrorKind::LoadFailed)).await;
        assert_eq!(handle.error(), Some(DraftErrorKind::LoadFailed));

        type_text(&form, &handle, "fresh");
        let state = wait_status(&handle, DraftStatus::Saved).await;
        assert_eq!(state.version, VersionToken(1));
    }

    // -----------------------------------------------------------------------
    // Flush
    // -----------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn trigger_save_bypasses_debounce() {
        let client = Arc::new(InMemoryDraftClient::new());
        let form = Arc::new(SharedForm::default());
        let handle = spawn(&client, &form);
        wait_status(&handle, DraftStatus::Idle).await;

        type_text(&form, &handle, "now");
        let payload = handle.trigger_save().await.unwrap();
        assert_eq!(payload.content, "now");
        assert_eq!(handle.state().version, VersionToken(1));

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(client.save_log().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn trigger_save_on_empty_form_reports_nothing_to_save() {
        let client = Arc::new(InMemoryDraftClient::new());
        let form = Arc::new(SharedForm::default());
        let handle = spawn(&client, &form);
        let err = handle.trigger_save().await.unwrap_err();
        assert_eq!(err, DraftSyncError::NothingToSave);
        assert!(client.save_log().is_empty());
    }

    // -----------------------------------------------------------------------
    // Conflicts between two sessions
    // -----------------------------------------------------------------------

    async fn two_sessions_in_conflict(
        client: &Arc<InMemoryDraftClient>,
    ) -> (Arc<SharedForm>, DraftHandle, Arc<SharedForm>, DraftHandle) {
        let form_a = Arc::new(SharedForm::default());
        let a = spawn(client, &form_a);
        let form_b = Arc::new(SharedForm::default());
        let b = spawn(client, &form_b);
        wait_status(&a, DraftStatus::Idle).await;
        wait_status(&b, DraftStatus::Idle).await;

        type_text(&form_a, &a, "base");
        a.trigger_save().await.unwrap();

        // B picks up version 1 through a fresh controller.
        b.shutdown();
        let form_b = Arc::new(SharedForm::default());
        let b = spawn(client, &form_b);
        wait_status(&b, DraftStatus::Saved).await;

        type_text(&form_a, &a, "from A");
        a.trigger_save().await.unwrap();
        assert_eq!(a.state().version, VersionToken(2));

        type_text(&form_b, &b, "from B");
        let err = b.trigger_save().await.unwrap_err();
        assert_eq!(
            err,
            DraftSyncError::Conflict {
                severity: ConflictSeverity::Hard
            }
        );
        (form_a, a, form_b, b)
    }

    #[tokio::test(start_paused = true)]
    async fn reload_remote_adopts_other_session_content() {
        let client = Arc::new(InMemoryDraftClient::new());
        let (_form_a, _a, form_b, b) = two_sessions_in_conflict(&client).await;
        assert_eq!(b.status(), DraftStatus::Conflict);
        assert_eq!(b.error(), Some(DraftErrorKind::Conflict));

        b.resolve_conflict(ResolutionMode::ReloadRemote).await.unwrap();
        let state = b.state();
        assert_eq!(state.status, DraftStatus::Saved);
        assert_eq!(state.version, VersionToken(2));
        assert_eq!(state.last_resolution, Some(ResolutionMode::ReloadRemote));
        assert_eq!(form_b.text("content"), "from A");
    }

    #[tokio::test(start_paused = true)]
    async fn keep_local_overwrites_remote() {
        let client = Arc::new(InMemoryDraftClient::new());
        let (_form_a, _a, _form_b, b) = two_sessions_in_conflict(&client).await;

        b.resolve_conflict(ResolutionMode::KeepLocal).await.unwrap();
        let state = b.state();
        assert_eq!(state.status, DraftStatus::Saved);
        assert_eq!(state.version, VersionToken(3));
        let stored = client.stored(&UserId::new("1"), &key()).unwrap();
        assert_eq!(stored.content.as_deref(), Some("from B"));
        assert_eq!(stored.version, VersionToken(3));
    }

    #[tokio::test(start_paused = true)]
    async fn no_autosave_while_in_conflict() {
        let client = Arc::new(InMemoryDraftClient::new());
        let (_form_a, _a, form_b, b) = two_sessions_in_conflict(&client).await;
        let saves_before = client.save_log().len();

        type_text(&form_b, &b, "typing during conflict");
        tokio::time::sleep(Duration::from_secs(40)).await;
        assert_eq!(client.save_log().len(), saves_before);
        assert_eq!(b.status(), DraftStatus::Conflict);
        assert_eq!(
            b.trigger_save().await.unwrap_err(),
            DraftSyncError::ConflictUnresolved
        );
    }

    #[tokio::test(start_paused = true)]
    async fn reload_without_snapshot_fetches_remote() {
        let client = Arc::new(InMemoryDraftClient::new());
        client.omit_conflict_snapshot(true);
        let (_form_a, _a, form_b, b) = two_sessions_in_conflict(&client).await;
        assert!(b.state().conflict.unwrap().remote.is_none());

        b.resolve_conflict(ResolutionMode::ReloadRemote).await.unwrap();
        assert_eq!(form_b.text("content"), "from A");
        assert_eq!(b.state().version, VersionToken(2));
    }

    // -----------------------------------------------------------------------
    // Rate limiting
    // -----------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn rate_limited_saves_recover_once_edits_stop() {
        let client = Arc::new(InMemoryDraftClient::new());
        for _ in 0..3 {
            client.fail_next_save(PersistenceError::RateLimited { retry_after: None });
        }
        let form = Arc::new(SharedForm::default());
        let handle = spawn(&client, &form);
        let mut telemetry = handle.telemetry().subscribe();
        wait_status(&handle, DraftStatus::Idle).await;

        let mut text = String::new();
        for _ in 0..3 {
            text.push('x');
            type_text(&form, &handle, &text);
            match telemetry.recv().await.unwrap() {
                DraftTelemetry::SaveFailure { reason, status, .. } => {
                    assert_eq!(reason, FailureReason::RateLimited);
                    assert_eq!(status, DraftStatus::Error(DraftErrorKind::RateLimited));
                }
                other => panic!("unexpected telemetry: {other:?}"),
            }
        }

        let state = wait_status(&handle, DraftStatus::Saved).await;
        assert_eq!(state.version, VersionToken(1));
        assert_eq!(client.save_log().len(), 4);

        assert!(telemetry.try_recv().is_err());
    }

    // -----------------------------------------------------------------------
    // Teardown
    // -----------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn clear_draft_deletes_and_resets() {
        let client = Arc::new(InMemoryDraftClient::new());
        let form = Arc::new(SharedForm::default());
        let handle = spawn(&client, &form);
        type_text(&form, &handle, "publish me");
        handle.trigger_save().await.unwrap();
        assert_eq!(client.len(), 1);

        handle.clear_draft().await.unwrap();
        assert!(client.is_empty());
        let state = handle.state();
        assert_eq!(state.status, DraftStatus::Idle);
        assert!(state.version.is_initial());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_the_controller() {
        let client = Arc::new(InMemoryDraftClient::new());
        let form = Arc::new(SharedForm::default());
        let handle = spawn(&client, &form);
        wait_status(&handle, DraftStatus::Idle).await;

        type_text(&form, &handle, "never saved");
        handle.shutdown();
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(client.save_log().is_empty());
        assert_eq!(
            handle.trigger_save().await.unwrap_err(),
            DraftSyncError::ControllerStopped
        );
    }
}
