//! Banner and modal combined behind one observer.

use draftsync_types::error::DraftSyncError;
use draftsync_types::status::{ControllerState, ResolutionMode};
use tracing::warn;

use crate::autosave::DraftHandle;

use super::{BannerView, ConflictBanner, ConflictModal, ModalChange, ModalView, Notification};

/// A visible change the view layer should render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenterEvent {
    BannerShown(BannerView),
    BannerHidden,
    ModalOpened(ModalView),
    ModalClosed(Notification),
    ResolutionFailed(Notification),
}

/// Drives a [`ConflictBanner`] and a [`ConflictModal`] from controller state
/// and forwards the user's choice to the controller.
#[derive(Debug, Default)]
pub struct ConflictPresenter {
    banner: ConflictBanner,
    modal: ConflictModal,
    banner_visible: bool,
    last: ControllerState,
}

impl ConflictPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a state published by the controller.
    pub fn observe(&mut self, state: &ControllerState) -> Vec<PresenterEvent> {
        self.last = state.clone();
        let mut events = Vec::new();
        match self.modal.observe(state) {
            Some(ModalChange::Opened(view)) => events.push(PresenterEvent::ModalOpened(view)),
            Some(ModalChange::Closed(notification)) => {
                events.push(PresenterEvent::ModalClosed(notification))
            }
            None => {}
        }
        self.sync_banner(&mut events);
        events
    }

    pub fn dismiss_banner(&mut self) -> Vec<PresenterEvent> {
        self.banner.dismiss(&self.last);
        let mut events = Vec::new();
        self.sync_banner(&mut events);
        events
    }

    /// Forward a resolution choice. Failures are surfaced in the modal and
    /// returned; success is only reported once the controller leaves `conflict`.
    pub async fn choose(
        &mut self,
        handle: &DraftHandle,
        mode: ResolutionMode,
    ) -> Result<(), DraftSyncError> {
        let result = handle.resolve_conflict(mode).await;
        if let Err(error) = &result {
            warn!(%mode, error = %error, "conflict resolution failed");
            self.modal.record_failure(mode, error);
        }
        result
    }

    /// Like [`choose`](Self::choose), reporting a failure as a presenter event.
    pub async fn choose_and_report(
        &mut self,
        handle: &DraftHandle,
        mode: ResolutionMode,
    ) -> Option<PresenterEvent> {
        match handle.resolve_conflict(mode).await {
            Ok(()) => None,
            Err(error) => {
                warn!(%mode, error = %error, "conflict resolution failed");
                Some(PresenterEvent::ResolutionFailed(
                    self.modal.record_failure(mode, &error),
                ))
            }
        }
    }

    pub fn banner(&self) -> Option<BannerView> {
        self.banner.view(&self.last)
    }

    pub fn modal(&self) -> Option<ModalView> {
        self.modal.view(&self.last)
    }

    fn sync_banner(&mut self, events: &mut Vec<PresenterEvent>) {
        match (self.banner.view(&self.last), self.banner_visible) {
            (Some(view), false) => {
                self.banner_visible = true;
                events.push(PresenterEvent::BannerShown(view));
            }
            (None, true) => {
                self.banner_visible = false;
                events.push(PresenterEvent::BannerHidden);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use draftsync_types::config::AutoSaveConfig;
    use draftsync_types::draft::{BoardId, DraftKey};
    use draftsync_types::identity::{SessionIdentity, UserId};
    use draftsync_types::status::DraftStatus;

    use crate::autosave::{DraftAutoSaveController, DraftSession};
    use crate::form::{FieldMapping, FormStateBridge, SharedForm};
    use crate::persistence::InMemoryDraftClient;

    fn spawn(client: &Arc<InMemoryDraftClient>, form: &Arc<SharedForm>) -> DraftHandle {
        let key = DraftKey::new_post(BoardId::new("news"));
        DraftAutoSaveController::spawn(
            Arc::clone(client),
            Arc::clone(form),
            FormStateBridge::new(key.clone(), FieldMapping::default()),
            DraftSession {
                identity: SessionIdentity::new(UserId::new("1")),
                key,
            },
            &AutoSaveConfig::default(),
        )
    }

    async fn wait_for(handle: &DraftHandle, status: DraftStatus) {
        handle
            .subscribe()
            .wait_for(|s| s.status == status)
            .await
            .unwrap();
    }

    async fn edit_and_flush(form: &SharedForm, handle: &DraftHandle, text: &str) {
        form.set_field("content", text);
        handle.notify_edit();
        let _ = handle.trigger_save().await;
    }

    /// Two controllers on the same key; the second one ends in conflict.
    async fn conflicted() -> (Arc<InMemoryDraftClient>, DraftHandle) {
        let client = Arc::new(InMemoryDraftClient::new());
        let form_a = Arc::new(SharedForm::default());
        let a = spawn(&client, &form_a);
        wait_for(&a, DraftStatus::Idle).await;
        edit_and_flush(&form_a, &a, "base").await;

        let form_b = Arc::new(SharedForm::default());
        let b = spawn(&client, &form_b);
        wait_for(&b, DraftStatus::Saved).await;

        edit_and_flush(&form_a, &a, "A wins").await;
        edit_and_flush(&form_b, &b, "B loses").await;
        assert_eq!(b.status(), DraftStatus::Conflict);
        (client, b)
    }

    #[tokio::test(start_paused = true)]
    async fn conflict_shows_banner_and_modal() {
        let (_client, handle) = conflicted().await;
        let mut presenter = ConflictPresenter::new();
        let events = presenter.observe(&handle.state());
        assert!(matches!(events[0], PresenterEvent::ModalOpened(_)));
        assert!(matches!(events[1], PresenterEvent::BannerShown(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn dismissing_banner_keeps_conflict() {
        let (_client, handle) = conflicted().await;
        let mut presenter = ConflictPresenter::new();
        presenter.observe(&handle.state());

        assert_eq!(presenter.dismiss_banner(), vec![PresenterEvent::BannerHidden]);
        assert!(presenter.banner().is_none());
        assert!(presenter.modal().is_some());
        assert_eq!(handle.status(), DraftStatus::Conflict);
    }

    #[tokio::test(start_paused = true)]
    async fn resolution_closes_modal_with_notification() {
        let (_client, handle) = conflicted().await;
        let mut presenter = ConflictPresenter::new();
        presenter.observe(&handle.state());

        presenter
            .choose(&handle, ResolutionMode::ReloadRemote)
            .await
            .unwrap();
        let events = presenter.observe(&handle.state());
        assert!(events.contains(&PresenterEvent::ModalClosed(Notification::resolved(Some(
            ResolutionMode::ReloadRemote
        )))));
        assert!(events.contains(&PresenterEvent::BannerHidden));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_choice_is_surfaced() {
        let (client, handle) = conflicted().await;
        let mut presenter = ConflictPresenter::new();
        presenter.observe(&handle.state());

        client.fail_next_save(draftsync_types::error::PersistenceError::Timeout);
        let event = presenter
            .choose_and_report(&handle, ResolutionMode::KeepLocal)
            .await;
        assert!(matches!(event, Some(PresenterEvent::ResolutionFailed(_))));

        presenter.observe(&handle.state());
        let modal = presenter.modal().unwrap();
        assert!(modal.error.unwrap().contains("keep your version"));
        assert_eq!(handle.status(), DraftStatus::Conflict);
    }
}
