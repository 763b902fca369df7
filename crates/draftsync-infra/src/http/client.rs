//! `DraftPersistenceClient` over the draftsync REST surface.

use std::time::Duration;

use reqwest::StatusCode;
use tracing::debug;

use draftsync_core::persistence::DraftPersistenceClient;
use draftsync_types::draft::{Draft, DraftId, DraftKey, SaveOutcome, SaveRequest};
use draftsync_types::error::PersistenceError;
use draftsync_types::identity::UserId;
use draftsync_types::wire::{
    ApiEnvelope, ConflictDetails, DraftLookupQuery, SaveDraftBody, codes,
};

use super::{DEFAULT_TIMEOUT, USER_HEADER, build_client, join, send_error, status_error};

/// Remote draft store reached through `/api/v1/drafts`.
#[derive(Clone)]
pub struct HttpDraftClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDraftClient {
    /// Client for the server at `base_url` with the default 8 s timeout.
    pub fn new(base_url: impl Into<String>) -> Result<Self, PersistenceError> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, PersistenceError> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        join(&self.base_url, path)
    }
}

async fn read_envelope(
    response: reqwest::Response,
) -> Result<(StatusCode, reqwest::header::HeaderMap, String), PersistenceError> {
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.text().await.map_err(send_error)?;
    Ok((status, headers, body))
}

fn decode<T: serde::de::DeserializeOwned>(body: &str) -> Result<ApiEnvelope<T>, PersistenceError> {
    serde_json::from_str(body).map_err(|e| PersistenceError::Decode(e.to_string()))
}

fn data<T>(envelope: ApiEnvelope<T>) -> Result<T, PersistenceError> {
    envelope
        .data
        .ok_or_else(|| PersistenceError::Decode("response envelope has no data".to_string()))
}

impl DraftPersistenceClient for HttpDraftClient {
    async fn load_draft(
        &self,
        owner: &UserId,
        key: &DraftKey,
    ) -> Result<Option<Draft>, PersistenceError> {
        let response = self
            .client
            .get(self.url("/api/v1/drafts/lookup"))
            .header(USER_HEADER, owner.as_str())
            .query(&DraftLookupQuery::from(key))
            .send()
            .await
            .map_err(send_error)?;
        let (status, headers, body) = read_envelope(response).await?;

        if !status.is_success() {
            return match status_error(status, &headers, &body) {
                PersistenceError::NotFound => Ok(None),
                other => Err(other),
            };
        }
        data(decode::<Draft>(&body)?).map(Some)
    }

    async fn save_draft(
        &self,
        owner: &UserId,
        request: &SaveRequest,
    ) -> Result<SaveOutcome, PersistenceError> {
        let response = self
            .client
            .put(self.url("/api/v1/drafts"))
            .header(USER_HEADER, owner.as_str())
            .json(&SaveDraftBody::from(request))
            .send()
            .await
            .map_err(send_error)?;
        let (status, headers, body) = read_envelope(response).await?;

        if status == StatusCode::CONFLICT {
            let envelope = decode::<Draft>(&body)?;
            let details = envelope
                .first_error()
                .filter(|e| e.code == codes::DRAFT_CONFLICT)
                .and_then(|e| e.details.clone())
                .ok_or_else(|| PersistenceError::Decode("conflict without details".to_string()))?;
            let details: ConflictDetails = serde_json::from_value(details)
                .map_err(|e| PersistenceError::Decode(e.to_string()))?;
            debug!(key = %request.key, severity = %details.severity, "server reported conflict");
            return Ok(SaveOutcome::Conflict {
                remote: details.draft,
                severity: details.severity,
            });
        }
        if !status.is_success() {
            return Err(status_error(status, &headers, &body));
        }
        data(decode::<Draft>(&body)?).map(SaveOutcome::Saved)
    }

    async fn delete_draft(&self, owner: &UserId, id: &DraftId) -> Result<(), PersistenceError> {
        let response = self
            .client
            .delete(self.url(&format!("/api/v1/drafts/{id}")))
            .header(USER_HEADER, owner.as_str())
            .send()
            .await
            .map_err(send_error)?;
        let (status, headers, body) = read_envelope(response).await?;
        if !status.is_success() {
            return Err(status_error(status, &headers, &body));
        }
        Ok(())
    }
}
