//! JSON bodies exchanged between the REST surface and `HttpDraftClient`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::draft::{
    BoardId, ConflictSeverity, Draft, DraftKey, DraftPayload, PostId, SaveMode, SaveRequest,
    VersionToken,
};

/// Body of `PUT /api/v1/drafts`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveDraftBody {
    pub board_id: BoardId,
    #[serde(default)]
    pub post_id: Option<PostId>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub expected_version: VersionToken,
    #[serde(default)]
    pub mode: SaveMode,
}

impl SaveDraftBody {
    pub fn into_request(self) -> SaveRequest {
        let key = DraftKey {
            board_id: self.board_id,
            post_id: self.post_id.clone(),
        };
        SaveRequest {
            key,
            payload: DraftPayload {
                title: self.title,
                content: self.content,
                metadata: self.metadata,
                post_id: self.post_id,
            },
            expected_version: self.expected_version,
            mode: self.mode,
        }
    }
}

impl From<&SaveRequest> for SaveDraftBody {
    fn from(request: &SaveRequest) -> Self {
        Self {
            board_id: request.key.board_id.clone(),
            post_id: request.key.post_id.clone(),
            title: request.payload.title.clone(),
            content: request.payload.content.clone(),
            metadata: request.payload.metadata.clone(),
            expected_version: request.expected_version,
            mode: request.mode,
        }
    }
}

/// `details` of a 409 `DRAFT_CONFLICT` error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictDetails {
    #[serde(default)]
    pub draft: Option<Draft>,
    pub severity: ConflictSeverity,
}

/// Query of `GET /api/v1/drafts/lookup`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftLookupQuery {
    pub board_id: BoardId,
    #[serde(default)]
    pub post_id: Option<PostId>,
}

impl DraftLookupQuery {
    pub fn key(self) -> DraftKey {
        DraftKey {
            board_id: self.board_id,
            post_id: self.post_id,
        }
    }
}

impl From<&DraftKey> for DraftLookupQuery {
    fn from(key: &DraftKey) -> Self {
        Self {
            board_id: key.board_id.clone(),
            post_id: key.post_id.clone(),
        }
    }
}

/// Machine-readable error codes used in response envelopes.
pub mod codes {
    pub const DRAFT_NOT_FOUND: &str = "DRAFT_NOT_FOUND";
    pub const DRAFT_CONFLICT: &str = "DRAFT_CONFLICT";
    pub const RATE_LIMITED: &str = "RATE_LIMITED";
    pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
}

/// One entry of an envelope's `errors` list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// The parts of a response envelope a client reads.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<ApiErrorDetail>,
}

impl<T> ApiEnvelope<T> {
    pub fn first_error(&self) -> Option<&ApiErrorDetail> {
        self.errors.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_body_defaults_to_checked_initial_save() {
        let body: SaveDraftBody =
            serde_json::from_value(serde_json::json!({"board_id": "news", "title": "Hi"})).unwrap();
        let request = body.into_request();
        assert_eq!(request.expected_version, VersionToken::INITIAL);
        assert_eq!(request.mode, SaveMode::Checked);
        assert_eq!(request.key, DraftKey::new_post(BoardId::new("news")));
        assert_eq!(request.payload.title, "Hi");
    }

    #[test]
    fn body_carries_post_id_into_key_and_payload() {
        let body: SaveDraftBody = serde_json::from_value(serde_json::json!({
            "board_id": "news",
            "post_id": "12",
            "expected_version": 3,
            "mode": "overwrite"
        }))
        .unwrap();
        let request = body.into_request();
        assert_eq!(request.key.post_id, Some(PostId::new("12")));
        assert_eq!(request.payload.post_id, Some(PostId::new("12")));
        assert_eq!(request.mode, SaveMode::Overwrite);
        assert_eq!(request.expected_version, VersionToken(3));
    }

    #[test]
    fn lookup_query_omits_post_for_new_drafts() {
        let query = DraftLookupQuery::from(&DraftKey::new_post(BoardId::new("b")));
        let json = serde_json::to_value(&query).unwrap();
        assert_eq!(json["board_id"], "b");
        assert!(json["post_id"].is_null());
    }

    #[test]
    fn conflict_envelope_parses() {
        let body = serde_json::json!({
            "meta": {"request_id": "r"},
            "errors": [{
                "code": "DRAFT_CONFLICT",
                "message": "draft changed elsewhere",
                "details": {"draft": null, "severity": "soft"}
            }]
        });
        let envelope: ApiEnvelope<Draft> = serde_json::from_value(body).unwrap();
        assert!(envelope.data.is_none());
        let error = envelope.first_error().unwrap();
        assert_eq!(error.code, codes::DRAFT_CONFLICT);
        let details: ConflictDetails =
            serde_json::from_value(error.details.clone().unwrap()).unwrap();
        assert_eq!(details.severity, ConflictSeverity::Soft);
        assert!(details.draft.is_none());
    }
}
