use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tracing::info;

use citequotes_core::domain::draft::{DraftId, DraftInput, QuoteDraft};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiJson, ApiResult};
use crate::state::AppState;

/// Drafts belong to their author; anyone else's draft reads as missing.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/drafts", get(list_drafts).post(create_draft))
        .route("/api/drafts/{id}", get(get_draft).put(update_draft).delete(delete_draft))
}

async fn list_drafts(State(state): State<AppState>, user: AuthUser) -> ApiResult<Vec<QuoteDraft>> {
    Ok(Json(state.drafts.list(&user.id.0).await?))
}

async fn create_draft(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(input): ApiJson<DraftInput>,
) -> Result<(StatusCode, Json<QuoteDraft>), ApiError> {
    let draft = state.drafts.create(&user.id.0, input.validate()?).await?;
    info!(event_name = "drafts.draft.created", draft_id = %draft.id.0, user_id = %user.id.0, "draft saved");
    Ok((StatusCode::CREATED, Json(draft)))
}

async fn get_draft(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<QuoteDraft> {
    state
        .drafts
        .find(&user.id.0, &DraftId(id.clone()))
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("draft `{id}` was not found")))
}

async fn update_draft(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    ApiJson(input): ApiJson<DraftInput>,
) -> ApiResult<QuoteDraft> {
    let draft = state.drafts.update(&user.id.0, &DraftId(id), input.validate()?).await?;
    info!(event_name = "drafts.draft.updated", draft_id = %draft.id.0, "draft updated");
    Ok(Json(draft))
}

async fn delete_draft(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    state.drafts.delete(&user.id.0, &DraftId(id.clone())).await?;
    info!(event_name = "drafts.draft.deleted", draft_id = %id, "draft deleted");
    Ok(Json(json!({ "deleted": id })))
}
