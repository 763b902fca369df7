//! Flush, publish, clear, navigate.
//!
//! The publish flow is the only caller of `clear_draft`: a draft is deleted
//! once, right after its content became a real post.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tracing::{info, warn};

use draftsync_types::draft::{BoardId, DraftKey, DraftPayload, PostId};
use draftsync_types::error::{PersistenceError, PublishError};
use draftsync_types::identity::UserId;

use crate::autosave::{DraftHandle, DraftSession};

/// Creates or updates the real post.
pub trait PostPublisher: Send + Sync {
    /// Publish `payload` under `key`; `key.post_id` selects update over create.
    /// Returns the id of the published post.
    fn publish(
        &self,
        owner: &UserId,
        key: &DraftKey,
        payload: &DraftPayload,
    ) -> impl std::future::Future<Output = Result<PostId, PersistenceError>> + Send;
}

/// Moves the view to a published post.
pub trait Navigator: Send + Sync {
    fn navigate_to_post(&self, board_id: &BoardId, post_id: &PostId);
}

/// Publishes the draft edited through one controller.
pub struct PublishFlow<P, N> {
    publisher: Arc<P>,
    navigator: Arc<N>,
    session: DraftSession,
}

impl<P: PostPublisher, N: Navigator> PublishFlow<P, N> {
    pub fn new(publisher: Arc<P>, navigator: Arc<N>, session: DraftSession) -> Self {
        Self {
            publisher,
            navigator,
            session,
        }
    }

    pub async fn publish(&self, handle: &DraftHandle) -> Result<PostId, PublishError> {
        let key = &self.session.key;
        let owner = &self.session.identity.user_id;

        let payload = handle.trigger_save().await.map_err(PublishError::Flush)?;

        let post_id = self
            .publisher
            .publish(owner, key, &payload)
            .await
            .map_err(|e| PublishError::Publish(e.to_string()))?;
        info!(board_id = %key.board_id, post_id = %post_id, "post published");

        if let Err(error) = handle.clear_draft().await {
            warn!(board_id = %key.board_id, error = %error, "published but draft delete failed");
        }

        self.navigator.navigate_to_post(&key.board_id, &post_id);
        Ok(post_id)
    }
}

/// Post store kept in memory; assigns sequential ids to new posts.
#[derive(Default)]
pub struct InMemoryPostPublisher {
    posts: DashMap<PostId, DraftPayload>,
    next_id: AtomicU64,
}

impl InMemoryPostPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn post(&self, id: &PostId) -> Option<DraftPayload> {
        self.posts.get(id).map(|p| p.value().clone())
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }
}

impl PostPublisher for InMemoryPostPublisher {
    async fn publish(
        &self,
        _owner: &UserId,
        key: &DraftKey,
        payload: &DraftPayload,
    ) -> Result<PostId, PersistenceError> {
        let id = match &key.post_id {
            Some(id) => {
                if !self.posts.contains_key(id) {
                    return Err(PersistenceError::NotFound);
                }
                id.clone()
            }
            None => PostId::new((self.next_id.fetch_add(1, Ordering::SeqCst) + 1).to_string()),
        };
        self.posts.insert(id.clone(), payload.clone());
        Ok(id)
    }
}
