pub mod activity;
pub mod assist;
pub mod cms;
pub mod drafts;
pub mod public;
pub mod quotes_api;
pub mod roles;
pub mod submissions;
pub mod transfer;

use axum::Router;
use tower_http::services::ServeDir;

use crate::health;
use crate::state::AppState;

/// Assembles every route module onto one router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(public::router())
        .merge(quotes_api::router())
        .merge(submissions::router())
        .merge(drafts::router())
        .merge(roles::router())
        .merge(assist::router())
        .merge(transfer::router())
        .merge(cms::router())
        .merge(activity::router())
        .nest_service("/static", ServeDir::new("static"))
        .with_state(state)
}
