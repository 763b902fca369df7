//! `PostPublisher` against the board/post REST resource.
//!
//! New posts are created with `POST {posts_url}/boards/{board}/posts`,
//! existing ones replaced with `PUT {posts_url}/boards/{board}/posts/{post}`.
//! Either call answers with the post; only its `id` is read.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use draftsync_core::publish::PostPublisher;
use draftsync_types::draft::{DraftKey, DraftPayload, PostId};
use draftsync_types::error::PersistenceError;
use draftsync_types::identity::UserId;

use super::{DEFAULT_TIMEOUT, USER_HEADER, build_client, join, send_error, status_error};

#[derive(Debug, Serialize)]
struct PostBody<'a> {
    title: &'a str,
    content: &'a str,
    metadata: &'a Map<String, Value>,
}

/// Accepts the post either bare or inside a `data` envelope.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PostResponse {
    Enveloped { data: PostRef },
    Bare(PostRef),
}

#[derive(Debug, Deserialize)]
struct PostRef {
    id: IdValue,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum IdValue {
    Text(String),
    Number(i64),
}

impl PostResponse {
    fn into_id(self) -> PostId {
        let post = match self {
            PostResponse::Enveloped { data } => data,
            PostResponse::Bare(post) => post,
        };
        match post.id {
            IdValue::Text(id) => PostId::new(id),
            IdValue::Number(id) => PostId::new(id.to_string()),
        }
    }
}

/// Publishes posts to the content server at `posts_url`.
#[derive(Clone)]
pub struct HttpPostPublisher {
    client: reqwest::Client,
    posts_url: String,
}

impl HttpPostPublisher {
    pub fn new(posts_url: impl Into<String>) -> Result<Self, PersistenceError> {
        Self::with_timeout(posts_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        posts_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, PersistenceError> {
        Ok(Self {
            client: build_client(timeout)?,
            posts_url: posts_url.into(),
        })
    }

    fn endpoint(&self, key: &DraftKey) -> String {
        match &key.post_id {
            Some(post) => join(
                &self.posts_url,
                &format!("/boards/{}/posts/{post}", key.board_id),
            ),
            None => join(&self.posts_url, &format!("/boards/{}/posts", key.board_id)),
        }
    }
}

impl PostPublisher for HttpPostPublisher {
    async fn publish(
        &self,
        owner: &UserId,
        key: &DraftKey,
        payload: &DraftPayload,
    ) -> Result<PostId, PersistenceError> {
        let body = PostBody {
            title: &payload.title,
            content: &payload.content,
            metadata: &payload.metadata,
        };
        let url = self.endpoint(key);
        let request = match key.post_id {
            Some(_) => self.client.put(&url),
            None => self.client.post(&url),
        };
        debug!(%url, "publishing post");

        let response = request
            .header(USER_HEADER, owner.as_str())
            .json(&body)
            .send()
            .await
            .map_err(send_error)?;
        let status = response.status();
        let headers = response.headers().clone();
        let text = response.text().await.map_err(send_error)?;
        if !status.is_success() {
            return Err(status_error(status, &headers, &text));
        }

        serde_json::from_str::<PostResponse>(&text)
            .map(PostResponse::into_id)
            .map_err(|e| PersistenceError::Decode(format!("unexpected post response: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use draftsync_types::draft::BoardId;

    #[test]
    fn create_and_update_endpoints() {
        let publisher = HttpPostPublisher::new("http://posts.local/api").unwrap();
        assert_eq!(
            publisher.endpoint(&DraftKey::new_post(BoardId::new("news"))),
            "http://posts.local/api/boards/news/posts"
        );
        assert_eq!(
            publisher.endpoint(&DraftKey::existing_post(BoardId::new("news"), PostId::new("7"))),
            "http://posts.local/api/boards/news/posts/7"
        );
    }

    #[test]
    fn post_id_from_bare_or_enveloped_response() {
        let bare: PostResponse = serde_json::from_str(r#"{"id": 42, "title": "x"}"#).unwrap();
        assert_eq!(bare.into_id(), PostId::new("42"));
        let wrapped: PostResponse = serde_json::from_str(r#"{"data": {"id": "p-9"}}"#).unwrap();
        assert_eq!(wrapped.into_id(), PostId::new("p-9"));
    }
}
