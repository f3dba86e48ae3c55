use axum::{
    extract::{Path, State},
    http::{header::AUTHORIZATION, HeaderMap},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use citequotes_core::credentials::parse_bearer;
use citequotes_core::domain::role::{check_role_change, Privilege, UserId, UserRole};

use crate::auth::{AuthUser, RateBucket};
use crate::error::{ApiError, ApiJson, ApiResult};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/me", get(me))
        .route("/api/logout", post(logout))
        .route("/api/roles", get(list_roles))
        .route("/api/roles/{user_id}", put(set_role))
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user_id: UserId,
    pub email: String,
    pub role: Privilege,
}

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub role: String,
}

async fn me(user: AuthUser) -> ApiResult<MeResponse> {
    Ok(Json(MeResponse { user_id: user.id, email: user.email, role: user.privilege }))
}

/// Revokes the token presented with this request.
async fn logout(
    State(state): State<AppState>,
    user: AuthUser,
    headers: HeaderMap,
) -> ApiResult<serde_json::Value> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_bearer)
        .ok_or_else(|| ApiError::Unauthorized("missing bearer token".to_string()))?;
    let revoked = state.users.revoke_token(token).await?;
    info!(event_name = "auth.token.revoked", user_id = %user.id.0, revoked, "token revoked");
    Ok(Json(json!({ "revoked": revoked })))
}

async fn list_roles(State(state): State<AppState>, user: AuthUser) -> ApiResult<Vec<UserRole>> {
    user.require(Privilege::Admin)?;
    Ok(Json(state.roles.list().await?))
}

async fn set_role(
    State(state): State<AppState>,
    user: AuthUser,
    Path(target): Path<String>,
    ApiJson(request): ApiJson<RoleRequest>,
) -> ApiResult<UserRole> {
    user.require(Privilege::Admin)?;
    state.limiter.check(RateBucket::RoleChange, &user.id).await?;

    let requested = Privilege::parse(&request.role)
        .ok_or_else(|| ApiError::bad_request(format!("unknown role `{}`", request.role)))?;
    let target = UserId(target);
    if state.users.find_by_id(&target).await?.is_none() {
        return Err(ApiError::not_found(format!("user `{}` was not found", target.0)));
    }
    let current = state.roles.privilege_of(&target).await?;
    check_role_change(&user.id, user.privilege, &target, current, requested)?;

    let role = state.roles.set_role(&target, requested, &user.id.0).await?;
    info!(
        event_name = "roles.role.changed",
        actor = %user.id.0,
        target = %target.0,
        from = %current,
        to = %requested,
        "role changed"
    );
    state
        .record(&user.id.0, "role.change", "user", Some(&target.0), json!({
            "from": current,
            "to": requested,
        }))
        .await;
    Ok(Json(role))
}
