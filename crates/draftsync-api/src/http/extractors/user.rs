//! Acting-user extractor.
//!
//! Identity is established upstream; the caller's user id arrives in the
//! `X-User-Id` header and is trusted as-is.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use draftsync_infra::http::USER_HEADER;
use draftsync_types::identity::UserId;

use crate::http::error::AppError;

/// The user a request acts for.
pub struct ActingUser(pub UserId);

/// Read and validate `X-User-Id`.
pub fn user_from_parts(parts: &Parts) -> Result<UserId, AppError> {
    let value = parts.headers.get(USER_HEADER).ok_or_else(|| {
        AppError::Unauthorized(format!("Missing {USER_HEADER} header"))
    })?;
    let raw = value.to_str().map_err(|_| {
        AppError::Unauthorized(format!("Invalid {USER_HEADER} header encoding"))
    })?;
    let user = UserId::new(raw.trim());
    if !user.is_valid() {
        return Err(AppError::Unauthorized(format!("Invalid {USER_HEADER} value")));
    }
    Ok(user)
}

impl<S: Send + Sync> FromRequestParts<S> for ActingUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        user_from_parts(parts).map(ActingUser)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/api/v1/drafts");
        if let Some(value) = header {
            builder = builder.header(USER_HEADER, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn reads_trimmed_user() {
        assert_eq!(user_from_parts(&parts(Some(" 42 "))).unwrap(), UserId::new("42"));
    }

    #[test]
    fn missing_or_blank_is_unauthorized() {
        assert!(matches!(user_from_parts(&parts(None)), Err(AppError::Unauthorized(_))));
        assert!(matches!(user_from_parts(&parts(Some("  "))), Err(AppError::Unauthorized(_))));
    }
}
