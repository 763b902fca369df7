//! Axum router configuration with middleware.
//!
//! Draft routes live under `/api/v1/` behind the per-user rate limiter.
//! Middleware: CORS, tracing.

use axum::Router;
use axum::middleware;
use axum::routing::{delete, get};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::http::rate_limit::rate_limit_middleware;
use crate::state::AppState;

/// Build the complete API router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let draft_routes = Router::new()
        .route(
            "/drafts",
            get(handlers::draft::list_drafts).put(handlers::draft::save_draft),
        )
        .route("/drafts/lookup", get(handlers::draft::lookup_draft))
        .route("/drafts/{id}", delete(handlers::draft::delete_draft))
        .route_layer(middleware::from_fn_with_state(
            state.limiter.clone(),
            rate_limit_middleware,
        ));

    Router::new()
        .nest("/api/v1", draft_routes)
        .route("/health", get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health - Liveness, no user required.
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
