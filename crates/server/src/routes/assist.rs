//! CQ-assisted quote generation and form prefill.

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::Serialize;
use serde_json::json;
use tracing::info;

use citequotes_agent::{CqAssistant, GenerationRequest, PrefillRequest, PrefillSuggestion};
use citequotes_core::domain::role::Privilege;
use citequotes_core::domain::submission::{QuoteSubmission, SubmissionOrigin};
use citequotes_db::SubmissionIntake;

use crate::auth::{AuthUser, RateBucket};
use crate::error::{ApiError, ApiJson, ApiResult};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/cq-generate-quotes", post(generate_quotes))
        .route("/api/cq/prefill", post(prefill))
}

#[derive(Debug, Serialize)]
pub struct GenerationResponse {
    pub created: Vec<QuoteSubmission>,
    pub dropped: usize,
}

fn assistant(state: &AppState) -> Result<&CqAssistant, ApiError> {
    state
        .assistant
        .as_ref()
        .ok_or_else(|| ApiError::Upstream("language model is not configured".to_string()))
}

async fn generate_quotes(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(request): ApiJson<GenerationRequest>,
) -> Result<(StatusCode, Json<GenerationResponse>), ApiError> {
    user.require(Privilege::SuperAdmin)?;
    state.limiter.check(RateBucket::Generation, &user.id).await?;

    let outcome = assistant(&state)?.generate(&request).await?;

    let mut intake = SubmissionIntake::load(state.quotes.as_ref(), state.submissions.as_ref()).await?;
    let mut created = Vec::with_capacity(outcome.forms.len());
    for form in outcome.forms {
        created.push(intake.submit(form, SubmissionOrigin::Ai, Some(&user.id.0)).await?);
    }

    info!(
        event_name = "cq.generation.completed",
        user_id = %user.id.0,
        created = created.len(),
        dropped = outcome.dropped,
        "generated quotes queued for review"
    );
    state
        .record(&user.id.0, "cq.generate", "submission", None, json!({
            "topic": request.topic,
            "created": created.len(),
            "dropped": outcome.dropped,
        }))
        .await;

    Ok((StatusCode::CREATED, Json(GenerationResponse { created, dropped: outcome.dropped })))
}

async fn prefill(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(request): ApiJson<PrefillRequest>,
) -> ApiResult<PrefillSuggestion> {
    let suggestion = assistant(&state)?.prefill(&request).await?;
    info!(
        event_name = "cq.prefill.completed",
        user_id = %user.id.0,
        empty = suggestion.is_empty(),
        "prefill suggestion returned"
    );
    Ok(Json(suggestion))
}
