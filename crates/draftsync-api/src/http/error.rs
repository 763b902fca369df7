//! Application error type mapping to HTTP status codes and envelope format.

use std::time::Duration;

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};

use draftsync_types::error::PersistenceError;
use draftsync_types::wire::{ApiErrorDetail, ConflictDetails, codes};

use crate::http::response::{ApiMeta, ApiResponse};

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Store failures.
    Persistence(PersistenceError),
    /// A checked save lost the version race.
    Conflict(ConflictDetails),
    /// Missing or unusable `X-User-Id`.
    Unauthorized(String),
    /// Too many draft requests in the current window.
    RateLimited { retry_after: Duration },
    /// Bad input.
    Validation(String),
}

impl From<PersistenceError> for AppError {
    fn from(e: PersistenceError) -> Self {
        AppError::Persistence(e)
    }
}

impl AppError {
    fn parts(&self) -> (StatusCode, ApiErrorDetail) {
        let detail = |code: &str, message: String| ApiErrorDetail {
            code: code.to_string(),
            message,
            details: None,
        };
        match self {
            AppError::Persistence(PersistenceError::NotFound) => (
                StatusCode::NOT_FOUND,
                detail(codes::DRAFT_NOT_FOUND, "Draft not found".to_string()),
            ),
            AppError::Persistence(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                detail(codes::INTERNAL_ERROR, e.to_string()),
            ),
            AppError::Conflict(details) => (
                StatusCode::CONFLICT,
                ApiErrorDetail {
                    code: codes::DRAFT_CONFLICT.to_string(),
                    message: format!(
                        "Draft was changed elsewhere ({} conflict)",
                        details.severity
                    ),
                    details: serde_json::to_value(details).ok(),
                },
            ),
            AppError::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, detail(codes::UNAUTHORIZED, msg.clone()))
            }
            AppError::RateLimited { retry_after } => (
                StatusCode::TOO_MANY_REQUESTS,
                detail(
                    codes::RATE_LIMITED,
                    format!("Too many draft requests; retry in {}s", retry_after.as_secs()),
                ),
            ),
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, detail(codes::VALIDATION_ERROR, msg.clone()))
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, detail) = self.parts();
        if status.is_server_error() {
            tracing::error!(code = %detail.code, message = %detail.message, "request failed");
        }

        let mut response = (
            status,
            Json(ApiResponse::error(detail, ApiMeta::new(String::new(), 0))),
        )
            .into_response();

        if let AppError::RateLimited { retry_after } = self {
            // Round up so clients never retry inside the same window.
            let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
            if let Ok(value) = HeaderValue::from_str(&secs.max(1).to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use draftsync_types::draft::ConflictSeverity;

    #[test]
    fn not_found_maps_to_draft_not_found() {
        let (status, detail) = AppError::Persistence(PersistenceError::NotFound).parts();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(detail.code, codes::DRAFT_NOT_FOUND);
    }

    #[test]
    fn conflict_carries_details() {
        let (status, detail) = AppError::Conflict(ConflictDetails {
            draft: None,
            severity: ConflictSeverity::Soft,
        })
        .parts();
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(detail.details.unwrap()["severity"], "soft");
    }

    #[test]
    fn rate_limited_sets_retry_after() {
        let response = AppError::RateLimited {
            retry_after: Duration::from_millis(41_500),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "42");
    }
}
