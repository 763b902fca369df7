//! Query parameter extractors for list endpoints.

use serde::Deserialize;

/// Largest page `GET /drafts` returns.
pub const MAX_PAGE: u32 = 20;

/// Page size when `limit` is absent.
pub const DEFAULT_PAGE: u32 = 10;

/// Query parameters for the draft list endpoint.
#[derive(Debug, Deserialize, Default)]
pub struct DraftListQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl DraftListQuery {
    /// `limit` clamped to `1..=MAX_PAGE`.
    pub fn limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_PAGE).clamp(1, MAX_PAGE)
    }

    pub fn offset(&self) -> u32 {
        self.offset.unwrap_or(0)
    }
}
