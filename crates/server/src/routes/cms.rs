//! Articles, pages, media records, comments and the comment CAPTCHA.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Extension, Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use citequotes_core::captcha::{self, CaptchaError, Challenge, ChallengePrompt};
use citequotes_core::domain::cms::{
    Comment, CommentInput, CommentStatus, ContentEntry, ContentInput, ContentKind, ContentStatus,
    Media, MediaInput,
};
use citequotes_core::domain::role::Privilege;

use crate::auth::{AuthUser, OptionalAuthUser};
use crate::error::{ApiError, ApiJson, ApiResult};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(content_routes(ContentKind::Article, "/api/cms/articles"))
        .merge(content_routes(ContentKind::Page, "/api/cms/pages"))
        .route(
            "/api/cms/articles/{id}/comments",
            get(list_article_comments).post(create_comment),
        )
        .route("/api/cms/media", get(list_media).post(create_media))
        .route("/api/cms/media/{id}", delete(delete_media))
        .route("/api/cms/comments", get(list_comments))
        .route("/api/cms/comments/{id}/moderate", post(moderate_comment))
        .route("/api/captcha", get(new_captcha))
}

fn content_routes(kind: ContentKind, base: &str) -> Router<AppState> {
    Router::new()
        .route(base, get(list_content).post(create_content))
        .route(
            &format!("{base}/{{id}}"),
            get(get_content).put(update_content).delete(delete_content),
        )
        .route(&format!("{base}/{{id}}/status"), post(set_content_status))
        .layer(Extension(kind))
}

#[derive(Debug, Default, Deserialize)]
pub struct ContentListQuery {
    #[serde(default)]
    pub all: bool,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CommentRequest {
    pub author_name: Option<String>,
    pub body: String,
    pub captcha_id: Option<String>,
    pub captcha_answer: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CommentListQuery {
    pub status: Option<String>,
    pub article_id: Option<String>,
}

async fn list_content(
    State(state): State<AppState>,
    Extension(kind): Extension<ContentKind>,
    OptionalAuthUser(user): OptionalAuthUser,
    Query(query): Query<ContentListQuery>,
) -> ApiResult<Vec<ContentEntry>> {
    if query.all {
        user.as_ref()
            .ok_or_else(|| ApiError::Unauthorized("missing bearer token".to_string()))?
            .require(Privilege::Moderator)?;
    }
    Ok(Json(state.cms.list_content(kind, !query.all).await?))
}

/// Looks up by id first, then by slug. Unpublished entries are visible to moderators only.
async fn get_content(
    State(state): State<AppState>,
    Extension(kind): Extension<ContentKind>,
    OptionalAuthUser(user): OptionalAuthUser,
    Path(key): Path<String>,
) -> ApiResult<ContentEntry> {
    let entry = match state.cms.find_content(kind, &key).await? {
        Some(entry) => Some(entry),
        None => state.cms.find_by_slug(kind, &key).await?,
    };
    let can_preview = user.is_some_and(|u| u.privilege.at_least(Privilege::Moderator));
    entry
        .filter(|entry| entry.status == ContentStatus::Published || can_preview)
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("{} `{key}` was not found", kind.label())))
}

async fn create_content(
    State(state): State<AppState>,
    Extension(kind): Extension<ContentKind>,
    user: AuthUser,
    ApiJson(input): ApiJson<ContentInput>,
) -> Result<(StatusCode, Json<ContentEntry>), ApiError> {
    user.require(Privilege::Admin)?;
    let entry = state.cms.create_content(kind, input.validate()?, Some(&user.id.0)).await?;
    info!(
        event_name = "cms.content.created",
        kind = kind.label(),
        content_id = %entry.id,
        slug = %entry.slug,
        "content created"
    );
    state
        .record(&user.id.0, "cms.create", kind.label(), Some(&entry.id), json!({ "slug": entry.slug }))
        .await;
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn update_content(
    State(state): State<AppState>,
    Extension(kind): Extension<ContentKind>,
    user: AuthUser,
    Path(id): Path<String>,
    ApiJson(input): ApiJson<ContentInput>,
) -> ApiResult<ContentEntry> {
    user.require(Privilege::Admin)?;
    let entry = state.cms.update_content(kind, &id, input.validate()?).await?;
    info!(event_name = "cms.content.updated", kind = kind.label(), content_id = %id, "content updated");
    state.record(&user.id.0, "cms.update", kind.label(), Some(&id), Value::Null).await;
    Ok(Json(entry))
}

async fn set_content_status(
    State(state): State<AppState>,
    Extension(kind): Extension<ContentKind>,
    user: AuthUser,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<StatusRequest>,
) -> ApiResult<ContentEntry> {
    user.require(Privilege::Admin)?;
    let status = ContentStatus::parse(&request.status)
        .ok_or_else(|| ApiError::bad_request(format!("unknown status `{}`", request.status)))?;
    let entry = state.cms.set_status(kind, &id, status).await?;
    info!(
        event_name = "cms.content.status_changed",
        kind = kind.label(),
        content_id = %id,
        status = status.as_str(),
        "content status changed"
    );
    state
        .record(&user.id.0, "cms.status", kind.label(), Some(&id), json!({ "status": status }))
        .await;
    Ok(Json(entry))
}

async fn delete_content(
    State(state): State<AppState>,
    Extension(kind): Extension<ContentKind>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    user.require(Privilege::Admin)?;
    state.cms.delete_content(kind, &id).await?;
    info!(event_name = "cms.content.deleted", kind = kind.label(), content_id = %id, "content deleted");
    state.record(&user.id.0, "cms.delete", kind.label(), Some(&id), Value::Null).await;
    Ok(Json(json!({ "deleted": id })))
}

async fn list_media(State(state): State<AppState>, user: AuthUser) -> ApiResult<Vec<Media>> {
    user.require(Privilege::Admin)?;
    Ok(Json(state.cms.list_media().await?))
}

async fn create_media(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(input): ApiJson<MediaInput>,
) -> Result<(StatusCode, Json<Media>), ApiError> {
    user.require(Privilege::Admin)?;
    let media = state.cms.create_media(input.validate()?, Some(&user.id.0)).await?;
    info!(event_name = "cms.media.created", media_id = %media.id, "media recorded");
    state
        .record(&user.id.0, "cms.media.create", "media", Some(&media.id), json!({ "url": media.url }))
        .await;
    Ok((StatusCode::CREATED, Json(media)))
}

async fn delete_media(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    user.require(Privilege::Admin)?;
    state.cms.delete_media(&id).await?;
    info!(event_name = "cms.media.deleted", media_id = %id, "media deleted");
    state.record(&user.id.0, "cms.media.delete", "media", Some(&id), Value::Null).await;
    Ok(Json(json!({ "deleted": id })))
}

async fn new_captcha(State(state): State<AppState>) -> ApiResult<ChallengePrompt> {
    let now = Utc::now();
    let challenge = Challenge::generate(&mut rand::thread_rng(), now);
    state.captchas.store(&challenge).await?;
    let purged = state.captchas.purge_expired(now).await?;
    if purged > 0 {
        info!(event_name = "captcha.purged", purged, "expired captcha challenges removed");
    }
    Ok(Json(challenge.prompt()))
}

async fn published_article(state: &AppState, id: &str) -> Result<ContentEntry, ApiError> {
    state
        .cms
        .find_content(ContentKind::Article, id)
        .await?
        .filter(|article| article.status == ContentStatus::Published)
        .ok_or_else(|| ApiError::not_found(format!("article `{id}` was not found")))
}

async fn list_article_comments(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<Comment>> {
    let article = published_article(&state, &id).await?;
    Ok(Json(state.cms.list_comments(Some(CommentStatus::Approved), Some(&article.id)).await?))
}

/// Signed-in users comment directly; anonymous callers must solve a CAPTCHA first.
async fn create_comment(
    State(state): State<AppState>,
    OptionalAuthUser(user): OptionalAuthUser,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<CommentRequest>,
) -> Result<(StatusCode, Json<Comment>), ApiError> {
    let article = published_article(&state, &id).await?;

    if user.is_none() {
        let (Some(captcha_id), Some(answer)) =
            (request.captcha_id.as_deref(), request.captcha_answer.as_deref())
        else {
            return Err(ApiError::bad_request("anonymous comments require a captcha answer"));
        };
        let challenge = state.captchas.take(captcha_id).await?.ok_or(CaptchaError::Unknown)?;
        captcha::verify(&challenge, answer, Utc::now())?;
    }

    let author_name = match (request.author_name, &user) {
        (Some(name), _) if !name.trim().is_empty() => name,
        (_, Some(user)) => user.email.clone(),
        _ => String::new(),
    };
    let input = CommentInput { author_name, body: request.body }.validate()?;
    let author_id = user.as_ref().map(|u| u.id.0.as_str());
    let comment = state.cms.create_comment(&article.id, input, author_id).await?;

    info!(
        event_name = "cms.comment.created",
        comment_id = %comment.id,
        article_id = %article.id,
        anonymous = author_id.is_none(),
        "comment awaiting moderation"
    );
    Ok((StatusCode::CREATED, Json(comment)))
}

async fn list_comments(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<CommentListQuery>,
) -> ApiResult<Vec<Comment>> {
    user.require(Privilege::Moderator)?;
    let status = match query.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        None | Some("all") => None,
        Some(raw) => Some(
            CommentStatus::parse(raw)
                .ok_or_else(|| ApiError::bad_request(format!("unknown status `{raw}`")))?,
        ),
    };
    Ok(Json(state.cms.list_comments(status, query.article_id.as_deref()).await?))
}

async fn moderate_comment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<StatusRequest>,
) -> ApiResult<Comment> {
    user.require(Privilege::Moderator)?;
    let status = CommentStatus::parse(&request.status)
        .ok_or_else(|| ApiError::bad_request(format!("unknown status `{}`", request.status)))?;
    let comment = state.cms.moderate_comment(&id, status, &user.id.0).await?;
    info!(
        event_name = "cms.comment.moderated",
        comment_id = %id,
        status = status.as_str(),
        moderator = %user.id.0,
        "comment moderated"
    );
    state
        .record(&user.id.0, "cms.comment.moderate", "comment", Some(&id), json!({ "status": status }))
        .await;
    Ok(Json(comment))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use citequotes_core::domain::role::Privilege;

    use crate::test_support::{send, TestApp};

    #[tokio::test]
    async fn drafts_are_hidden_until_published() {
        let app = TestApp::seeded().await;
        let admin = app.token_for("admin@example.org", Privilege::Admin).await;

        let (status, article) = send(
            &app.router,
            "POST",
            "/api/cms/articles",
            Some(&admin),
            Some(json!({ "title": "Misattributed Quotes", "body": "A field guide." })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(article["slug"], "misattributed-quotes");
        assert_eq!(article["status"], "draft");
        let id = article["id"].as_str().unwrap_or_default().to_string();

        let (status, _) =
            send(&app.router, "GET", "/api/cms/articles/misattributed-quotes", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (_, listed) = send(&app.router, "GET", "/api/cms/articles", None, None).await;
        assert_eq!(listed.as_array().map(Vec::len), Some(1));

        let (status, published) = send(
            &app.router,
            "POST",
            &format!("/api/cms/articles/{id}/status"),
            Some(&admin),
            Some(json!({ "status": "published" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(published["published_at"].is_string());

        let (status, _) =
            send(&app.router, "GET", "/api/cms/articles/misattributed-quotes", None, None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn listing_everything_needs_a_moderator() {
        let app = TestApp::seeded().await;
        let user = app.token_for("reader@example.org", Privilege::User).await;

        let (status, _) = send(&app.router, "GET", "/api/cms/pages?all=true", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) =
            send(&app.router, "GET", "/api/cms/pages?all=true", Some(&user), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, page) = send(&app.router, "GET", "/api/cms/pages/about", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["title"], "About");
    }

    #[tokio::test]
    async fn duplicate_slugs_conflict() {
        let app = TestApp::seeded().await;
        let admin = app.token_for("admin@example.org", Privilege::Admin).await;

        let (status, _) = send(
            &app.router,
            "POST",
            "/api/cms/pages",
            Some(&admin),
            Some(json!({ "title": "About", "body": "again" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn anonymous_comments_need_a_solved_captcha() {
        let app = TestApp::seeded().await;
        let path = "/api/cms/articles/article-seed-001/comments";

        let (status, _) = send(
            &app.router,
            "POST",
            path,
            None,
            Some(json!({ "author_name": "Ann", "body": "Lovely." })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, challenge) = send(&app.router, "GET", "/api/captcha", None, None).await;
        assert_eq!(status, StatusCode::OK);
        let answer = challenge["prompt"]
            .as_str()
            .and_then(|p| p.strip_prefix("Select the "))
            .unwrap_or_default()
            .to_string();
        let captcha_id = challenge["id"].clone();

        let (status, comment) = send(
            &app.router,
            "POST",
            path,
            None,
            Some(json!({
                "author_name": "Ann",
                "body": "Lovely.",
                "captcha_id": captcha_id,
                "captcha_answer": answer,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(comment["status"], "pending");

        // challenges are single use
        let (status, _) = send(
            &app.router,
            "POST",
            path,
            None,
            Some(json!({
                "author_name": "Ann",
                "body": "Again.",
                "captcha_id": captcha_id,
                "captcha_answer": answer,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn moderators_approve_comments_before_they_show() {
        let app = TestApp::seeded().await;
        let reader = app.token_for("reader@example.org", Privilege::User).await;
        let moderator = app.token_for("mod@example.org", Privilege::Moderator).await;
        let path = "/api/cms/articles/article-seed-001/comments";

        let (status, comment) =
            send(&app.router, "POST", path, Some(&reader), Some(json!({ "body": "Sourced!" })))
                .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(comment["author_name"], "reader@example.org");

        let (_, visible) = send(&app.router, "GET", path, None, None).await;
        assert_eq!(visible.as_array().map(Vec::len), Some(0));

        let (status, _) =
            send(&app.router, "GET", "/api/cms/comments?status=pending", Some(&reader), None)
                .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (_, pending) =
            send(&app.router, "GET", "/api/cms/comments?status=pending", Some(&moderator), None)
                .await;
        assert_eq!(pending.as_array().map(Vec::len), Some(1));

        let id = comment["id"].as_str().unwrap_or_default();
        let (status, moderated) = send(
            &app.router,
            "POST",
            &format!("/api/cms/comments/{id}/moderate"),
            Some(&moderator),
            Some(json!({ "status": "approved" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(moderated["status"], "approved");

        let (_, visible) = send(&app.router, "GET", path, None, None).await;
        assert_eq!(visible.as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn media_records_are_admin_managed() {
        let app = TestApp::seeded().await;
        let admin = app.token_for("admin@example.org", Privilege::Admin).await;

        let (status, _) = send(
            &app.router,
            "POST",
            "/api/cms/media",
            Some(&admin),
            Some(json!({ "file_name": "scan.png", "url": "ftp://example.org/scan.png" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, media) = send(
            &app.router,
            "POST",
            "/api/cms/media",
            Some(&admin),
            Some(json!({ "file_name": "scan.png", "url": "https://example.org/scan.png" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let path = format!("/api/cms/media/{}", media["id"].as_str().unwrap_or_default());
        let (status, _) = send(&app.router, "DELETE", &path, Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&app.router, "DELETE", &path, Some(&admin), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
