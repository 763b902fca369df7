//! Draft handlers for the REST API.

use axum::Json;
use axum::extract::{Path, Query, State};
use tracing::Instrument;

use draftsync_core::persistence::DraftPersistenceClient;
use draftsync_observe::draft_attrs::{
    BOARD_ID, CONFLICT_SEVERITY, DRAFT_ID, EXPECTED_VERSION, SAVE_MODE, SAVE_RESULT, SPAN_DELETE,
    SPAN_LIST, SPAN_LOAD, SPAN_SAVE, USER_ID,
};
use draftsync_types::draft::{Draft, DraftId, SaveOutcome};
use draftsync_types::error::PersistenceError;
use draftsync_types::wire::{ConflictDetails, DraftLookupQuery, SaveDraftBody};

use crate::http::error::AppError;
use crate::http::extractors::query::DraftListQuery;
use crate::http::extractors::user::ActingUser;
use crate::http::response::{ApiResponse, PageMeta, RequestClock};
use crate::state::AppState;

fn draft_link(draft: &Draft) -> String {
    format!("/api/v1/drafts/{}", draft.id)
}

/// GET /api/v1/drafts - The caller's live drafts, newest first.
pub async fn list_drafts(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
    Query(query): Query<DraftListQuery>,
) -> Result<Json<ApiResponse<Vec<Draft>>>, AppError> {
    let clock = RequestClock::start();
    let span = tracing::info_span!(SPAN_LIST, { USER_ID } = %user);

    let (limit, offset) = (query.limit(), query.offset());
    let drafts = state
        .store
        .list_for_owner(&user, limit, offset)
        .instrument(span)
        .await?;

    let mut meta = clock.meta();
    meta.page = Some(PageMeta {
        limit,
        offset,
        count: drafts.len(),
    });
    Ok(Json(
        ApiResponse::success(drafts, meta).with_link("self", "/api/v1/drafts"),
    ))
}

/// GET /api/v1/drafts/lookup - Load the draft for a board/post key.
pub async fn lookup_draft(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
    Query(query): Query<DraftLookupQuery>,
) -> Result<Json<ApiResponse<Draft>>, AppError> {
    let clock = RequestClock::start();
    let key = query.key();
    let span = tracing::info_span!(SPAN_LOAD, { USER_ID } = %user, { BOARD_ID } = %key.board_id);

    let draft = state
        .store
        .load_draft(&user, &key)
        .instrument(span)
        .await?
        .ok_or(AppError::Persistence(PersistenceError::NotFound))?;

    let link = draft_link(&draft);
    Ok(Json(
        ApiResponse::success(draft, clock.meta()).with_link("self", &link),
    ))
}

/// PUT /api/v1/drafts - Version-checked save.
pub async fn save_draft(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
    Json(body): Json<SaveDraftBody>,
) -> Result<Json<ApiResponse<Draft>>, AppError> {
    let clock = RequestClock::start();
    if body.board_id.as_str().trim().is_empty() {
        return Err(AppError::Validation("board_id must not be empty".to_string()));
    }

    let request = body.into_request();
    let span = tracing::info_span!(
        SPAN_SAVE,
        { USER_ID } = %user,
        { BOARD_ID } = %request.key.board_id,
        { EXPECTED_VERSION } = %request.expected_version,
        { SAVE_MODE } = ?request.mode,
        { SAVE_RESULT } = tracing::field::Empty,
        { CONFLICT_SEVERITY } = tracing::field::Empty,
    );

    let outcome = state
        .store
        .save_draft(&user, &request)
        .instrument(span.clone())
        .await?;

    match outcome {
        SaveOutcome::Saved(draft) => {
            span.record(SAVE_RESULT, "saved");
            let link = draft_link(&draft);
            Ok(Json(
                ApiResponse::success(draft, clock.meta()).with_link("self", &link),
            ))
        }
        SaveOutcome::Conflict { remote, severity } => {
            span.record(SAVE_RESULT, "conflict");
            span.record(CONFLICT_SEVERITY, tracing::field::display(severity));
            Err(AppError::Conflict(ConflictDetails {
                draft: remote,
                severity,
            }))
        }
    }
}

/// DELETE /api/v1/drafts/{id}
pub async fn delete_draft(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let clock = RequestClock::start();
    let id: DraftId = id
        .parse()
        .map_err(|_| AppError::Validation(format!("invalid draft id '{id}'")))?;
    let span = tracing::info_span!(SPAN_DELETE, { USER_ID } = %user, { DRAFT_ID } = %id);

    state
        .store
        .delete_draft(&user, &id)
        .instrument(span)
        .await?;

    Ok(Json(ApiResponse::success(
        serde_json::json!({ "deleted": true, "id": id }),
        clock.meta(),
    )))
}
