//! Envelope response format for all API responses.
//!
//! Every response is wrapped in a consistent envelope:
//! ```json
//! {
//!   "data": { ... },
//!   "meta": { "request_id": "...", "timestamp": "...", "response_time_ms": 5 },
//!   "errors": [],
//!   "_links": { "self": "..." }
//! }
//! ```

use std::collections::HashMap;
use std::time::Instant;

use serde::Serialize;

use draftsync_types::wire::ApiErrorDetail;

/// Envelope response wrapping all API data.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,

    pub meta: ApiMeta,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ApiErrorDetail>,

    #[serde(rename = "_links", skip_serializing_if = "HashMap::is_empty")]
    pub links: HashMap<String, String>,
}

/// Metadata included in every response.
#[derive(Debug, Serialize)]
pub struct ApiMeta {
    pub request_id: String,
    pub timestamp: String,
    pub response_time_ms: u64,
    /// Pagination for list responses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<PageMeta>,
}

#[derive(Debug, Serialize)]
pub struct PageMeta {
    pub limit: u32,
    pub offset: u32,
    pub count: usize,
}

impl ApiMeta {
    pub fn new(request_id: String, response_time_ms: u64) -> Self {
        Self {
            request_id,
            timestamp: chrono::Utc::now().to_rfc3339(),
            response_time_ms,
            page: None,
        }
    }
}

/// Per-request timing and id, started when a handler begins.
pub struct RequestClock {
    start: Instant,
    request_id: String,
}

impl RequestClock {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
            request_id: uuid::Uuid::now_v7().to_string(),
        }
    }

    pub fn meta(&self) -> ApiMeta {
        ApiMeta::new(
            self.request_id.clone(),
            u64::try_from(self.start.elapsed().as_millis()).unwrap_or(u64::MAX),
        )
    }
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T, meta: ApiMeta) -> Self {
        Self {
            data: Some(data),
            meta,
            errors: Vec::new(),
            links: HashMap::new(),
        }
    }

    pub fn with_link(mut self, rel: &str, href: &str) -> Self {
        self.links.insert(rel.to_string(), href.to_string());
        self
    }
}

impl ApiResponse<()> {
    pub fn error(detail: ApiErrorDetail, meta: ApiMeta) -> Self {
        Self {
            data: None,
            meta,
            errors: vec![detail],
            links: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_envelope_shape() {
        let resp = ApiResponse::success(vec![1, 2], ApiMeta::new("r1".to_string(), 3))
            .with_link("self", "/api/v1/drafts");
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(value["data"], serde_json::json!([1, 2]));
        assert_eq!(value["meta"]["request_id"], "r1");
        assert_eq!(value["_links"]["self"], "/api/v1/drafts");
        assert!(value.get("errors").is_none());
    }

    #[test]
    fn error_envelope_has_no_data() {
        let resp = ApiResponse::error(
            ApiErrorDetail {
                code: "DRAFT_NOT_FOUND".to_string(),
                message: "Draft not found".to_string(),
                details: None,
            },
            ApiMeta::new(String::new(), 0),
        );
        let value = serde_json::to_value(&resp).unwrap();
        assert!(value.get("data").is_none());
        assert_eq!(value["errors"][0]["code"], "DRAFT_NOT_FOUND");
    }
}
