//! REST adapters: the remote draft store client and the post publisher.
//!
//! Both map HTTP failures onto [`PersistenceError`] the same way: timeouts
//! and connection failures are transport problems, 429 carries the server's
//! `Retry-After` hint, 401 keeps its meaning, a 404 means "no such draft" only
//! when the envelope says `DRAFT_NOT_FOUND`, anything else is a server error
//! with the envelope's first message.

pub mod client;
pub mod publisher;

pub use client::HttpDraftClient;
pub use publisher::HttpPostPublisher;

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{HeaderMap, RETRY_AFTER};

use draftsync_types::error::PersistenceError;
use draftsync_types::wire::{ApiEnvelope, codes};

/// Header carrying the acting user.
pub const USER_HEADER: &str = "X-User-Id";

/// Default request timeout for both adapters.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(8);

fn build_client(timeout: Duration) -> Result<reqwest::Client, PersistenceError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| PersistenceError::Transport(format!("failed to create HTTP client: {e}")))
}

fn send_error(e: reqwest::Error) -> PersistenceError {
    if e.is_timeout() {
        PersistenceError::Timeout
    } else if e.is_decode() {
        PersistenceError::Decode(e.to_string())
    } else {
        PersistenceError::Transport(e.to_string())
    }
}

/// `Retry-After` in whole seconds; HTTP-date values are ignored.
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Map a non-success status to an error. `body` is the raw response text.
fn status_error(status: StatusCode, headers: &HeaderMap, body: &str) -> PersistenceError {
    let first_error = serde_json::from_str::<ApiEnvelope<serde_json::Value>>(body)
        .ok()
        .and_then(|env| env.first_error().cloned());
    match status {
        StatusCode::TOO_MANY_REQUESTS => PersistenceError::RateLimited {
            retry_after: retry_after(headers),
        },
        StatusCode::NOT_FOUND
            if first_error
                .as_ref()
                .is_some_and(|e| e.code == codes::DRAFT_NOT_FOUND) =>
        {
            PersistenceError::NotFound
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => PersistenceError::Unauthorized,
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => PersistenceError::Timeout,
        _ => PersistenceError::Server {
            status: status.as_u16(),
            message: first_error.map_or_else(|| body.to_string(), |e| e.message),
        },
    }
}

/// Join a base URL and a path without doubling the slash.
fn join(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn rate_limit_carries_retry_after() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("7"));
        assert_eq!(
            status_error(StatusCode::TOO_MANY_REQUESTS, &headers, ""),
            PersistenceError::RateLimited {
                retry_after: Some(Duration::from_secs(7))
            }
        );

        headers.insert(RETRY_AFTER, HeaderValue::from_static("Wed, 21 Oct 2026 07:28:00 GMT"));
        assert_eq!(
            status_error(StatusCode::TOO_MANY_REQUESTS, &headers, ""),
            PersistenceError::RateLimited { retry_after: None }
        );
    }

    #[test]
    fn server_error_uses_envelope_message() {
        let body = r#"{"errors":[{"code":"INTERNAL_ERROR","message":"disk full"}]}"#;
        assert_eq!(
            status_error(StatusCode::INTERNAL_SERVER_ERROR, &HeaderMap::new(), body),
            PersistenceError::Server {
                status: 500,
                message: "disk full".to_string()
            }
        );
        assert_eq!(
            status_error(StatusCode::BAD_GATEWAY, &HeaderMap::new(), "upstream down"),
            PersistenceError::Server {
                status: 502,
                message: "upstream down".to_string()
            }
        );
    }

    #[test]
    fn auth_and_missing_statuses() {
        let headers = HeaderMap::new();
        let body = r#"{"errors":[{"code":"DRAFT_NOT_FOUND","message":"Draft not found"}]}"#;
        assert_eq!(status_error(StatusCode::NOT_FOUND, &headers, body), PersistenceError::NotFound);
        assert_eq!(
            status_error(StatusCode::UNAUTHORIZED, &headers, ""),
            PersistenceError::Unauthorized
        );
    }

    #[test]
    fn uncoded_not_found_is_server_error() {
        assert_eq!(
            status_error(StatusCode::NOT_FOUND, &HeaderMap::new(), "no route"),
            PersistenceError::Server {
                status: 404,
                message: "no route".to_string()
            }
        );
    }

    #[test]
    fn join_normalizes_slashes() {
        assert_eq!(join("http://h:1/", "/api/v1/drafts"), "http://h:1/api/v1/drafts");
        assert_eq!(join("http://h:1", "api"), "http://h:1/api");
    }
}
