//! Submission intake and review.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use citequotes_core::domain::quote::QuoteDetail;
use citequotes_core::domain::role::Privilege;
use citequotes_core::domain::submission::{
    QuoteSubmission, SubmissionForm, SubmissionId, SubmissionOrigin, SubmissionStatus,
};
use citequotes_core::duplicates::DuplicateGroup;
use citequotes_db::SubmissionIntake;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiJson, ApiResult};
use crate::state::AppState;

const DEFAULT_LIST_LIMIT: u32 = 100;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/submissions", get(list_submissions).post(create_submission))
        .route("/api/submissions/batch", post(create_batch))
        .route("/api/submissions/mine", get(my_submissions))
        .route("/api/submissions/duplicates", get(flagged_duplicates))
        .route("/api/submissions/{id}/approve", post(approve_submission))
        .route("/api/submissions/{id}/reject", post(reject_submission))
        .route("/api/submissions/{id}/process", post(process_submission))
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ReviewRequest {
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub submissions: Vec<Value>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct BatchItemResult {
    pub index: usize,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submission_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub potential_duplicate_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub created: usize,
    pub rejected: usize,
    pub results: Vec<BatchItemResult>,
}

#[derive(Debug, Serialize)]
pub struct ApprovalResponse {
    pub submission: QuoteSubmission,
    pub quote: QuoteDetail,
}

async fn create_submission(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(form): ApiJson<SubmissionForm>,
) -> Result<(StatusCode, Json<QuoteSubmission>), ApiError> {
    let form = form.validate()?;
    let mut intake =
        SubmissionIntake::load(state.quotes.as_ref(), state.submissions.as_ref()).await?;
    let submission = intake.submit(form, SubmissionOrigin::User, Some(&user.id.0)).await?;

    state
        .record(&user.id.0, "submission.create", "submission", Some(&submission.id.0), json!({
            "potential_duplicate_ids": submission.potential_duplicate_ids,
        }))
        .await;
    Ok((StatusCode::CREATED, Json(submission)))
}

async fn create_batch(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(batch): ApiJson<BatchRequest>,
) -> Result<(StatusCode, Json<BatchResponse>), ApiError> {
    if batch.submissions.is_empty() {
        return Err(ApiError::bad_request("submissions must not be empty"));
    }
    if batch.submissions.len() > state.import_limits.max_rows {
        return Err(ApiError::bad_request(format!(
            "batch has more than {} submissions",
            state.import_limits.max_rows
        )));
    }

    let mut intake =
        SubmissionIntake::load(state.quotes.as_ref(), state.submissions.as_ref()).await?;
    let mut results = Vec::with_capacity(batch.submissions.len());

    for (index, raw) in batch.submissions.into_iter().enumerate() {
        let form = serde_json::from_value::<SubmissionForm>(raw)
            .map_err(|e| e.to_string())
            .and_then(|form| form.validate().map_err(|e| e.to_string()));
        let result = match form {
            Ok(form) => {
                let submission =
                    intake.submit(form, SubmissionOrigin::User, Some(&user.id.0)).await?;
                BatchItemResult {
                    index,
                    status: "created",
                    submission_id: Some(submission.id.0),
                    potential_duplicate_ids: submission.potential_duplicate_ids,
                    error: None,
                }
            }
            Err(error) => BatchItemResult {
                index,
                status: "rejected",
                submission_id: None,
                potential_duplicate_ids: Vec::new(),
                error: Some(error),
            },
        };
        results.push(result);
    }

    let created = results.iter().filter(|r| r.status == "created").count();
    let rejected = results.len() - created;
    info!(
        event_name = "submissions.batch.processed",
        user_id = %user.id.0,
        created,
        rejected,
        "batch submission processed"
    );
    state
        .record(&user.id.0, "submission.batch", "submission", None, json!({
            "created": created,
            "rejected": rejected,
        }))
        .await;
    Ok((StatusCode::CREATED, Json(BatchResponse { created, rejected, results })))
}

async fn my_submissions(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Vec<QuoteSubmission>> {
    Ok(Json(state.submissions.list_by_submitter(&user.id.0).await?))
}

async fn list_submissions(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<QuoteSubmission>> {
    user.require(Privilege::Moderator)?;
    let status = match query.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        None | Some("all") => None,
        Some(raw) => Some(
            SubmissionStatus::parse(raw)
                .ok_or_else(|| ApiError::bad_request(format!("unknown status `{raw}`")))?,
        ),
    };
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT);
    Ok(Json(state.submissions.list(status, limit).await?))
}

async fn flagged_duplicates(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Vec<DuplicateGroup>> {
    user.require(Privilege::Moderator)?;
    Ok(Json(state.submissions.flagged_duplicates().await?))
}

/// Review bodies are optional; an empty body means no notes.
fn review_notes(body: &Bytes) -> Result<Option<String>, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    let request: ReviewRequest = serde_json::from_slice(body)
        .map_err(|e| ApiError::bad_request(format!("invalid review body: {e}")))?;
    Ok(request.notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()))
}

async fn approve_submission(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<ApprovalResponse> {
    user.require(Privilege::Admin)?;
    let notes = review_notes(&body)?;

    let (submission, quote) =
        state.submissions.approve(&SubmissionId(id), &user.id.0, notes).await?;
    info!(
        event_name = "submissions.submission.approved",
        submission_id = %submission.id.0,
        quote_id = %quote.quote.id.0,
        reviewer = %user.id.0,
        "submission approved"
    );
    state
        .record(&user.id.0, "submission.approve", "submission", Some(&submission.id.0), json!({
            "quote_id": quote.quote.id,
        }))
        .await;
    Ok(Json(ApprovalResponse { submission, quote }))
}

async fn reject_submission(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<QuoteSubmission> {
    user.require(Privilege::Admin)?;
    let notes = review_notes(&body)?;

    let submission = state.submissions.reject(&SubmissionId(id), &user.id.0, notes).await?;
    info!(
        event_name = "submissions.submission.rejected",
        submission_id = %submission.id.0,
        reviewer = %user.id.0,
        "submission rejected"
    );
    state
        .record(&user.id.0, "submission.reject", "submission", Some(&submission.id.0), json!({}))
        .await;
    Ok(Json(submission))
}

async fn process_submission(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<QuoteSubmission> {
    user.require(Privilege::Admin)?;
    let notes = review_notes(&body)?;

    let submission =
        state.submissions.mark_processed(&SubmissionId(id), &user.id.0, notes).await?;
    info!(
        event_name = "submissions.submission.processed",
        submission_id = %submission.id.0,
        reviewer = %user.id.0,
        "submission marked processed"
    );
    state
        .record(&user.id.0, "submission.process", "submission", Some(&submission.id.0), json!({}))
        .await;
    Ok(Json(submission))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use citequotes_core::domain::role::Privilege;

    use crate::test_support::{send, TestApp};

    #[tokio::test]
    async fn submission_flags_duplicates_of_existing_quotes() {
        let app = TestApp::seeded().await;
        let reader = app.token_for("reader@example.org", Privilege::User).await;

        let (status, body) = send(
            &app.router,
            "POST",
            "/api/submissions",
            Some(&reader),
            Some(json!({
                "quote_text": "I think, therefore I am",
                "author": "Descartes",
                "translations": [{ "language": "la", "translated_text": "Cogito, ergo sum" }]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["status"], "pending");
        assert_eq!(body["origin"], "user");
        assert_eq!(body["potential_duplicate_ids"], json!(["quote-seed-003"]));

        let (status, mine) =
            send(&app.router, "GET", "/api/submissions/mine", Some(&reader), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(mine.as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn submissions_require_authentication_and_fields() {
        let app = TestApp::seeded().await;
        let payload = json!({ "quote_text": "No author here" });

        let (status, _) =
            send(&app.router, "POST", "/api/submissions", None, Some(payload.clone())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let reader = app.token_for("reader@example.org", Privilege::User).await;
        let (status, body) =
            send(&app.router, "POST", "/api/submissions", Some(&reader), Some(payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap_or_default().contains("author"));
    }

    #[tokio::test]
    async fn batch_reports_per_item_results() {
        let app = TestApp::seeded().await;
        let reader = app.token_for("reader@example.org", Privilege::User).await;

        let (status, body) = send(
            &app.router,
            "POST",
            "/api/submissions/batch",
            Some(&reader),
            Some(json!({ "submissions": [
                { "quote_text": "Well begun is half done.", "author": "Aristotle" },
                { "quote_text": "", "author": "Nobody" },
                { "quote_text": "Well begun is half done", "author": "Aristotle" }
            ]})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["created"], 2);
        assert_eq!(body["rejected"], 1);
        assert_eq!(body["results"][1]["status"], "rejected");
        assert_eq!(
            body["results"][2]["potential_duplicate_ids"][0],
            body["results"][0]["submission_id"]
        );
    }

    #[tokio::test]
    async fn review_flow_is_admin_only_and_single_shot() {
        let app = TestApp::seeded().await;
        let moderator = app.token_for("mod@example.org", Privilege::Moderator).await;
        let admin = app.token_for("admin@example.org", Privilege::Admin).await;

        let (status, body) =
            send(&app.router, "GET", "/api/submissions?status=pending", Some(&moderator), None)
                .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["id"], "submission-seed-001");

        let (status, _) = send(
            &app.router,
            "POST",
            "/api/submissions/submission-seed-001/approve",
            Some(&moderator),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = send(
            &app.router,
            "POST",
            "/api/submissions/submission-seed-001/approve",
            Some(&admin),
            Some(json!({ "notes": "verified against Letters" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["submission"]["status"], "approved");
        assert_eq!(body["submission"]["review_notes"], "verified against Letters");
        assert_eq!(body["quote"]["author"], "Seneca");

        let (status, _) = send(
            &app.router,
            "POST",
            "/api/submissions/submission-seed-001/reject",
            Some(&admin),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) =
            send(&app.router, "POST", "/api/submissions/missing/process", Some(&admin), None)
                .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn duplicate_groups_collect_submissions_sharing_a_match() {
        let app = TestApp::seeded().await;
        let reader = app.token_for("reader@example.org", Privilege::User).await;
        let moderator = app.token_for("mod@example.org", Privilege::Moderator).await;

        for text in ["The unexamined life is not worth living", "The unexamined life is NOT worth living!"] {
            let (status, _) = send(
                &app.router,
                "POST",
                "/api/submissions",
                Some(&reader),
                Some(json!({ "quote_text": text, "author": "Socrates" })),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (status, body) =
            send(&app.router, "GET", "/api/submissions/duplicates", Some(&moderator), None).await;
        assert_eq!(status, StatusCode::OK);
        let groups = body.as_array().cloned().unwrap_or_default();
        assert_eq!(groups.len(), 1);
        assert!(groups[0]["shared_ids"]
            .as_array()
            .is_some_and(|ids| ids.contains(&json!("quote-seed-001"))));
        assert_eq!(groups[0]["submission_ids"].as_array().map(Vec::len), Some(2));
    }
}
