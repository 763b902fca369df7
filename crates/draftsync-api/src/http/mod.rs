//! HTTP/REST API layer for draftsync.
//!
//! Axum-based REST API at `/api/v1/` with per-user rate limiting, envelope
//! response format, and CORS support.

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod rate_limit;
pub mod response;
pub mod router;
