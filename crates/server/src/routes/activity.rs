use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use citequotes_core::domain::activity::ActivityEntry;
use citequotes_core::domain::role::Privilege;

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::state::AppState;

const DEFAULT_LIMIT: u32 = 100;
const MAX_LIMIT: u32 = 500;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/activity", get(recent_activity))
}

#[derive(Debug, Default, Deserialize)]
pub struct ActivityQuery {
    pub limit: Option<u32>,
}

async fn recent_activity(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ActivityQuery>,
) -> ApiResult<Vec<ActivityEntry>> {
    user.require(Privilege::Admin)?;
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    Ok(Json(state.activity.recent(limit).await?))
}
