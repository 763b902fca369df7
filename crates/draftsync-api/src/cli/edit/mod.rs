//! `draftsync edit`: a line-driven editor session over the autosave controller.

pub mod commands;
pub mod session;

use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use console::style;

use draftsync_core::autosave::DraftSession;
use draftsync_core::publish::{InMemoryPostPublisher, Navigator, PostPublisher};
use draftsync_infra::http::{HttpDraftClient, HttpPostPublisher};
use draftsync_types::config::ClientConfig;
use draftsync_types::draft::{BoardId, DraftKey, DraftPayload, PostId};
use draftsync_types::error::PersistenceError;
use draftsync_types::identity::{SessionIdentity, UserId};

use crate::cli::draft::parse_user;
use crate::state::AppState;

#[derive(Args, Debug)]
pub struct EditArgs {
    #[arg(long)]
    pub user: String,

    #[arg(long)]
    pub board: String,

    /// Post being edited; omit to draft a new post.
    #[arg(long)]
    pub post: Option<String>,

    /// Draftsync server to sync with instead of the local store.
    #[arg(long)]
    pub server: Option<String>,
}

/// Publishes to the configured post server, or keeps posts in memory.
pub enum SessionPublisher {
    Remote(HttpPostPublisher),
    Local(InMemoryPostPublisher),
}

impl SessionPublisher {
    pub fn from_config(client: &ClientConfig) -> Result<Self, PersistenceError> {
        Ok(match &client.posts_url {
            Some(url) => Self::Remote(HttpPostPublisher::new(url.clone())?),
            None => Self::Local(InMemoryPostPublisher::new()),
        })
    }
}

impl PostPublisher for SessionPublisher {
    async fn publish(
        &self,
        owner: &UserId,
        key: &DraftKey,
        payload: &DraftPayload,
    ) -> Result<PostId, PersistenceError> {
        match self {
            Self::Remote(publisher) => publisher.publish(owner, key, payload).await,
            Self::Local(publisher) => publisher.publish(owner, key, payload).await,
        }
    }
}

/// Prints where the published post lives.
pub struct TerminalNavigator;

impl Navigator for TerminalNavigator {
    fn navigate_to_post(&self, board_id: &BoardId, post_id: &PostId) {
        println!(
            "  {} /boards/{}/posts/{}",
            style("->").green().bold(),
            board_id,
            post_id
        );
    }
}

pub async fn run_edit(state: &AppState, args: EditArgs, json: bool) -> Result<()> {
    let user = parse_user(&args.user)?;
    let key = match args.post {
        Some(post) => DraftKey::existing_post(BoardId::new(args.board), PostId::new(post)),
        None => DraftKey::new_post(BoardId::new(args.board)),
    };
    let session = DraftSession {
        identity: SessionIdentity::new(user),
        key,
    };
    let publisher = Arc::new(SessionPublisher::from_config(&state.config.client)?);
    let autosave = state.config.autosave.clone();

    match args.server.or_else(|| state.config.client.base_url.clone()) {
        Some(url) => {
            let client = HttpDraftClient::with_timeout(url.clone(), autosave.request_timeout())?;
            if !json {
                println!("  {} syncing with {}", style("i").blue().bold(), style(&url).cyan());
            }
            session::run_session(Arc::new(client), publisher, session, &autosave, json).await
        }
        None => {
            session::run_session(Arc::clone(&state.store), publisher, session, &autosave, json)
                .await
        }
    }
}
