//! Bulk CSV/Markdown import into the review queue, and CSV export of published quotes.

use axum::{
    body::{to_bytes, Body},
    extract::{Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use citequotes_core::domain::role::Privilege;
use citequotes_core::domain::submission::SubmissionOrigin;
use citequotes_core::import::{self, ImportLimits, ImportReport, RejectedRow};
use citequotes_db::SubmissionIntake;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/import/csv", post(import_csv))
        .route("/api/import/markdown", post(import_markdown))
        .route("/api/export/csv", get(export_csv))
}

#[derive(Debug, Default, Deserialize)]
pub struct ImportQuery {
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Serialize)]
pub struct ImportedItem {
    pub line: usize,
    pub submission_id: Option<String>,
    pub potential_duplicate_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ImportSummary {
    pub format: &'static str,
    pub dry_run: bool,
    pub accepted: Vec<ImportedItem>,
    pub rejected: Vec<RejectedRow>,
    pub warnings: Vec<String>,
}

#[derive(Clone, Copy, Debug)]
enum ImportFormat {
    Csv,
    Markdown,
}

impl ImportFormat {
    fn as_str(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Markdown => "markdown",
        }
    }
}

async fn import_csv(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ImportQuery>,
    body: Body,
) -> Result<(StatusCode, Json<ImportSummary>), ApiError> {
    user.require(Privilege::Admin)?;
    let body = read_import_body(body, &state.import_limits).await?;
    run_import(state, user, ImportFormat::Csv, query.dry_run, &body).await
}

async fn import_markdown(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ImportQuery>,
    body: Body,
) -> Result<(StatusCode, Json<ImportSummary>), ApiError> {
    user.require(Privilege::Admin)?;
    let body = read_import_body(body, &state.import_limits).await?;
    run_import(state, user, ImportFormat::Markdown, query.dry_run, &body).await
}

/// Buffers at most `max_bytes` of the request body. Oversized or non-UTF-8
/// uploads are rejected with 400.
async fn read_import_body(body: Body, limits: &ImportLimits) -> Result<String, ApiError> {
    let bytes = to_bytes(body, limits.max_bytes).await.map_err(|_| {
        ApiError::bad_request(format!("import exceeds the limit of {} bytes", limits.max_bytes))
    })?;
    String::from_utf8(bytes.to_vec())
        .map_err(|error| ApiError::bad_request(format!("import is not valid UTF-8: {error}")))
}

async fn run_import(
    state: AppState,
    user: AuthUser,
    format: ImportFormat,
    dry_run: bool,
    body: &str,
) -> Result<(StatusCode, Json<ImportSummary>), ApiError> {
    let report: ImportReport = match format {
        ImportFormat::Csv => import::csv::parse_submissions(body, &state.import_limits)?,
        ImportFormat::Markdown => import::markdown::parse_submissions(body, &state.import_limits)?,
    };

    let mut intake = SubmissionIntake::load(state.quotes.as_ref(), state.submissions.as_ref()).await?;
    let mut accepted = Vec::with_capacity(report.accepted.len());
    for row in report.accepted {
        if dry_run {
            let key = format!("line-{}", row.line);
            accepted.push(ImportedItem {
                line: row.line,
                submission_id: None,
                potential_duplicate_ids: intake.preview(key, &row.form.quote_text),
            });
            continue;
        }
        let submission = intake.submit(row.form, SubmissionOrigin::Import, Some(&user.id.0)).await?;
        accepted.push(ImportedItem {
            line: row.line,
            submission_id: Some(submission.id.0),
            potential_duplicate_ids: submission.potential_duplicate_ids,
        });
    }

    info!(
        event_name = "import.completed",
        format = format.as_str(),
        dry_run,
        accepted = accepted.len(),
        rejected = report.rejected.len(),
        "import processed"
    );
    if !dry_run {
        state
            .record(&user.id.0, "import", "submission", None, json!({
                "format": format.as_str(),
                "accepted": accepted.len(),
                "rejected": report.rejected.len(),
            }))
            .await;
    }

    let status = if dry_run { StatusCode::OK } else { StatusCode::CREATED };
    Ok((
        status,
        Json(ImportSummary {
            format: format.as_str(),
            dry_run,
            accepted,
            rejected: report.rejected,
            warnings: report.warnings,
        }),
    ))
}

async fn export_csv(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let details = state.quotes.all_details().await?;
    let body = import::csv::export_quotes(&details)?;
    info!(event_name = "export.completed", quotes = details.len(), "quotes exported");
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"citequotes.csv\""),
        ],
        body,
    ))
}
