//! Per-user fixed-window rate limiting for the draft routes.
//!
//! Each user gets `limit` requests per one-minute window, counted from the
//! first request of the window. Requests without a usable `X-User-Id` pass
//! through untouched; the handler rejects them.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{Request, State};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use dashmap::DashMap;

use draftsync_types::identity::UserId;

use crate::http::error::AppError;
use crate::http::extractors::user::user_from_parts;

/// Remaining requests in the caller's window.
pub const REMAINING_HEADER: &str = "X-RateLimit-Remaining-drafts";

const WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Result of counting one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed { remaining: u32 },
    Limited { retry_after: Duration },
    /// Limiting is switched off.
    Unlimited,
}

/// Shared per-user counters.
#[derive(Clone)]
pub struct RateLimiter {
    windows: Arc<DashMap<UserId, Window>>,
    limit: u32,
    window: Duration,
}

impl RateLimiter {
    /// `limit` requests per user per minute; 0 disables limiting.
    pub fn per_minute(limit: u32) -> Self {
        Self::with_window(limit, WINDOW)
    }

    pub fn with_window(limit: u32, window: Duration) -> Self {
        Self {
            windows: Arc::new(DashMap::new()),
            limit,
            window,
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Count a request from `user` at `now`.
    pub fn check_at(&self, user: &UserId, now: Instant) -> Decision {
        if self.limit == 0 {
            return Decision::Unlimited;
        }
        let mut entry = self.windows.entry(user.clone()).or_insert(Window {
            started: now,
            count: 0,
        });
        let window = entry.value_mut();
        if now.duration_since(window.started) >= self.window {
            *window = Window {
                started: now,
                count: 0,
            };
        }
        if window.count >= self.limit {
            let elapsed = now.duration_since(window.started);
            return Decision::Limited {
                retry_after: self.window.saturating_sub(elapsed),
            };
        }
        window.count += 1;
        Decision::Allowed {
            remaining: self.limit - window.count,
        }
    }

    pub fn check(&self, user: &UserId) -> Decision {
        self.check_at(user, Instant::now())
    }

    /// Drop windows that ended before `now`; returns how many were dropped.
    pub fn sweep_at(&self, now: Instant) -> usize {
        let before = self.windows.len();
        self.windows
            .retain(|_, window| now.duration_since(window.started) < self.window);
        before.saturating_sub(self.windows.len())
    }

    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    /// Users with a tracked window.
    pub fn tracked(&self) -> usize {
        self.windows.len()
    }
}

/// Axum middleware enforcing [`RateLimiter`] on the routes it wraps.
pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiter>,
    req: Request,
    next: Next,
) -> Response {
    let (parts, body) = req.into_parts();
    let Ok(user) = user_from_parts(&parts) else {
        return next.run(Request::from_parts(parts, body)).await;
    };
    let req = Request::from_parts(parts, body);

    match limiter.check(&user) {
        Decision::Unlimited => next.run(req).await,
        Decision::Allowed { remaining } => {
            let mut response = next.run(req).await;
            response
                .headers_mut()
                .insert(REMAINING_HEADER, HeaderValue::from(remaining));
            response
        }
        Decision::Limited { retry_after } => {
            tracing::warn!(
                user_id = %user,
                limit = limiter.limit(),
                "draft rate limit exceeded"
            );
            let mut response = AppError::RateLimited { retry_after }.into_response();
            response
                .headers_mut()
                .insert(REMAINING_HEADER, HeaderValue::from(0u32));
            response
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_down_then_limits_until_window_ends() {
        let limiter = RateLimiter::per_minute(2);
        let user = UserId::new("1");
        let t0 = Instant::now();

        assert_eq!(limiter.check_at(&user, t0), Decision::Allowed { remaining: 1 });
        assert_eq!(limiter.check_at(&user, t0), Decision::Allowed { remaining: 0 });
        assert_eq!(
            limiter.check_at(&user, t0 + Duration::from_secs(20)),
            Decision::Limited {
                retry_after: Duration::from_secs(40)
            }
        );
        assert_eq!(
            limiter.check_at(&user, t0 + Duration::from_secs(60)),
            Decision::Allowed { remaining: 1 }
        );
    }

    #[test]
    fn users_have_separate_windows() {
        let limiter = RateLimiter::per_minute(1);
        let t0 = Instant::now();
        assert!(matches!(
            limiter.check_at(&UserId::new("a"), t0),
            Decision::Allowed { .. }
        ));
        assert!(matches!(
            limiter.check_at(&UserId::new("b"), t0),
            Decision::Allowed { .. }
        ));
        assert!(matches!(
            limiter.check_at(&UserId::new("a"), t0),
            Decision::Limited { .. }
        ));
    }

    #[test]
    fn sweep_drops_only_ended_windows() {
        let limiter = RateLimiter::per_minute(5);
        let t0 = Instant::now();
        limiter.check_at(&UserId::new("old"), t0);
        limiter.check_at(&UserId::new("recent"), t0 + Duration::from_secs(50));
        assert_eq!(limiter.tracked(), 2);

        assert_eq!(limiter.sweep_at(t0 + Duration::from_secs(70)), 1);
        assert_eq!(limiter.tracked(), 1);
        assert_eq!(
            limiter.check_at(&UserId::new("recent"), t0 + Duration::from_secs(70)),
            Decision::Allowed { remaining: 3 }
        );
    }

    #[test]
    fn zero_disables() {
        let limiter = RateLimiter::per_minute(0);
        for _ in 0..100 {
            assert_eq!(limiter.check(&UserId::new("1")), Decision::Unlimited);
        }
    }
}
