use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::SqliteConnection;

use citequotes_core::domain::quote::{NewOriginalSource, NewTranslation, QuoteDetail, QuoteId};
use citequotes_core::domain::submission::{
    QuoteSubmission, SubmissionForm, SubmissionId, SubmissionOrigin, SubmissionStatus,
};
use citequotes_core::duplicates::{group_shared_duplicates, DuplicateGroup};

use super::quote::{insert_quote, insert_source, insert_translation};
use super::{
    column, json_column, new_id, optional_timestamp, timestamp, to_json, RepositoryError,
    SubmissionRepository,
};
use crate::DbPool;

const SUBMISSION_COLUMNS: &str = "id, quote_text, author, quote_date, context, citation,
     source_title, source_author, source_publisher, source_date, source_url, translations_json,
     tags_json, evidence_image_urls_json, status, origin, submitted_by,
     potential_duplicate_ids_json, reviewed_by, reviewed_at, review_notes, approved_quote_id,
     created_at, updated_at";

pub struct SqlSubmissionRepository {
    pool: DbPool,
}

impl SqlSubmissionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_submission(row: &SqliteRow) -> Result<QuoteSubmission, RepositoryError> {
    let status: String = column(row, "status")?;
    let origin: String = column(row, "origin")?;
    let approved_quote_id: Option<String> = column(row, "approved_quote_id")?;

    Ok(QuoteSubmission {
        id: SubmissionId(column(row, "id")?),
        form: SubmissionForm {
            quote_text: column(row, "quote_text")?,
            author: column(row, "author")?,
            quote_date: column(row, "quote_date")?,
            context: column(row, "context")?,
            citation: column(row, "citation")?,
            source_title: column(row, "source_title")?,
            source_author: column(row, "source_author")?,
            source_publisher: column(row, "source_publisher")?,
            source_date: column(row, "source_date")?,
            source_url: column(row, "source_url")?,
            translations: json_column(row, "translations_json")?,
            tags: json_column(row, "tags_json")?,
            evidence_image_urls: json_column(row, "evidence_image_urls_json")?,
        },
        status: SubmissionStatus::parse(&status)
            .ok_or_else(|| RepositoryError::Decode(format!("unknown status `{status}`")))?,
        origin: SubmissionOrigin::parse(&origin)
            .ok_or_else(|| RepositoryError::Decode(format!("unknown origin `{origin}`")))?,
        submitted_by: column(row, "submitted_by")?,
        potential_duplicate_ids: json_column(row, "potential_duplicate_ids_json")?,
        reviewed_by: column(row, "reviewed_by")?,
        reviewed_at: optional_timestamp(row, "reviewed_at")?,
        review_notes: column(row, "review_notes")?,
        approved_quote_id: approved_quote_id.map(QuoteId),
        created_at: timestamp(row, "created_at")?,
        updated_at: timestamp(row, "updated_at")?,
    })
}

async fn fetch(
    conn: &mut SqliteConnection,
    id: &SubmissionId,
) -> Result<Option<QuoteSubmission>, RepositoryError> {
    let row = sqlx::query(&format!(
        "SELECT {SUBMISSION_COLUMNS} FROM quote_submissions WHERE id = ?"
    ))
    .bind(&id.0)
    .fetch_optional(&mut *conn)
    .await?;
    row.as_ref().map(row_to_submission).transpose()
}

async fn save_review(
    conn: &mut SqliteConnection,
    submission: &QuoteSubmission,
) -> Result<(), RepositoryError> {
    let result = sqlx::query(
        "UPDATE quote_submissions
         SET status = ?, reviewed_by = ?, reviewed_at = ?, review_notes = ?,
             approved_quote_id = ?, updated_at = ?
         WHERE id = ? AND status = 'pending'",
    )
    .bind(submission.status.as_str())
    .bind(&submission.reviewed_by)
    .bind(submission.reviewed_at.map(|at| at.to_rfc3339()))
    .bind(&submission.review_notes)
    .bind(submission.approved_quote_id.as_ref().map(|id| id.0.clone()))
    .bind(submission.updated_at.to_rfc3339())
    .bind(&submission.id.0)
    .execute(&mut *conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(RepositoryError::Conflict(format!(
            "submission `{}` is no longer pending",
            submission.id.0
        )));
    }
    Ok(())
}

impl SqlSubmissionRepository {
    async fn close(
        &self,
        id: &SubmissionId,
        next: SubmissionStatus,
        reviewer: &str,
        notes: Option<String>,
    ) -> Result<QuoteSubmission, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let mut submission = fetch(&mut tx, id)
            .await?
            .ok_or_else(|| RepositoryError::not_found("submission", &id.0))?;
        submission.transition_to(next, reviewer, notes)?;
        save_review(&mut tx, &submission).await?;
        tx.commit().await?;
        Ok(submission)
    }
}

#[async_trait::async_trait]
impl SubmissionRepository for SqlSubmissionRepository {
    async fn create(
        &self,
        form: SubmissionForm,
        origin: SubmissionOrigin,
        submitted_by: Option<&str>,
        potential_duplicate_ids: Vec<String>,
    ) -> Result<QuoteSubmission, RepositoryError> {
        let now = Utc::now();
        let submission = QuoteSubmission {
            id: SubmissionId(new_id()),
            form,
            status: SubmissionStatus::Pending,
            origin,
            submitted_by: submitted_by.map(str::to_string),
            potential_duplicate_ids,
            reviewed_by: None,
            reviewed_at: None,
            review_notes: None,
            approved_quote_id: None,
            created_at: now,
            updated_at: now,
        };
        let form = &submission.form;

        sqlx::query(
            "INSERT INTO quote_submissions (
                id, quote_text, author, quote_date, context, citation, source_title,
                source_author, source_publisher, source_date, source_url, translations_json,
                tags_json, evidence_image_urls_json, status, origin, submitted_by,
                potential_duplicate_ids_json, created_at, updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'pending', ?, ?, ?, ?, ?)",
        )
        .bind(&submission.id.0)
        .bind(&form.quote_text)
        .bind(&form.author)
        .bind(&form.quote_date)
        .bind(&form.context)
        .bind(&form.citation)
        .bind(&form.source_title)
        .bind(&form.source_author)
        .bind(&form.source_publisher)
        .bind(&form.source_date)
        .bind(&form.source_url)
        .bind(to_json(&form.translations)?)
        .bind(to_json(&form.tags)?)
        .bind(to_json(&form.evidence_image_urls)?)
        .bind(submission.origin.as_str())
        .bind(&submission.submitted_by)
        .bind(to_json(&submission.potential_duplicate_ids)?)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(submission)
    }

    async fn find_by_id(
        &self,
        id: &SubmissionId,
    ) -> Result<Option<QuoteSubmission>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        fetch(&mut conn, id).await
    }

    async fn list(
        &self,
        status: Option<SubmissionStatus>,
        limit: u32,
    ) -> Result<Vec<QuoteSubmission>, RepositoryError> {
        let limit = i64::from(limit.clamp(1, 500));
        let rows = match status {
            Some(status) => {
                sqlx::query(&format!(
                    "SELECT {SUBMISSION_COLUMNS} FROM quote_submissions
                     WHERE status = ? ORDER BY created_at DESC, id ASC LIMIT ?"
                ))
                .bind(status.as_str())
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {SUBMISSION_COLUMNS} FROM quote_submissions
                     ORDER BY created_at DESC, id ASC LIMIT ?"
                ))
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };
        rows.iter().map(row_to_submission).collect()
    }

    async fn list_by_submitter(
        &self,
        submitted_by: &str,
    ) -> Result<Vec<QuoteSubmission>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {SUBMISSION_COLUMNS} FROM quote_submissions
             WHERE submitted_by = ? ORDER BY created_at DESC, id ASC"
        ))
        .bind(submitted_by)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_submission).collect()
    }

    async fn pending_texts(&self) -> Result<Vec<(String, String)>, RepositoryError> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT id, quote_text FROM quote_submissions WHERE status = 'pending'",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn approve(
        &self,
        id: &SubmissionId,
        reviewer: &str,
        notes: Option<String>,
    ) -> Result<(QuoteSubmission, QuoteDetail), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let mut submission = fetch(&mut tx, id)
            .await?
            .ok_or_else(|| RepositoryError::not_found("submission", &id.0))?;
        submission.transition_to(SubmissionStatus::Approved, reviewer, notes)?;

        let form = submission.form.clone();
        let quote = insert_quote(&mut tx, &form.to_new_quote(), submission.submitted_by.as_deref())
            .await?;

        let original_source = match form.source_title.clone() {
            Some(title) => Some(
                insert_source(
                    &mut tx,
                    &NewOriginalSource {
                        quote_id: quote.id.0.clone(),
                        title,
                        author: form.source_author.clone(),
                        publisher: form.source_publisher.clone(),
                        publication_date: form.source_date.clone(),
                        location: None,
                        url: form.source_url.clone(),
                        source_type: None,
                    },
                )
                .await?,
            ),
            None => None,
        };

        let mut translations = Vec::with_capacity(form.translations.len());
        for translation in &form.translations {
            translations.push(
                insert_translation(
                    &mut tx,
                    &NewTranslation {
                        quote_id: quote.id.0.clone(),
                        language: translation.language.clone(),
                        translated_text: translation.translated_text.clone(),
                        translator: translation.translator.clone(),
                        source_url: None,
                    },
                )
                .await?,
            );
        }

        submission.approved_quote_id = Some(quote.id.clone());
        save_review(&mut tx, &submission).await?;
        tx.commit().await?;

        let detail = QuoteDetail { quote, original_source, translations, cited_by: Vec::new() };
        Ok((submission, detail))
    }

    async fn reject(
        &self,
        id: &SubmissionId,
        reviewer: &str,
        notes: Option<String>,
    ) -> Result<QuoteSubmission, RepositoryError> {
        self.close(id, SubmissionStatus::Rejected, reviewer, notes).await
    }

    async fn mark_processed(
        &self,
        id: &SubmissionId,
        reviewer: &str,
        notes: Option<String>,
    ) -> Result<QuoteSubmission, RepositoryError> {
        self.close(id, SubmissionStatus::Processed, reviewer, notes).await
    }

    async fn flagged_duplicates(&self) -> Result<Vec<DuplicateGroup>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, potential_duplicate_ids_json FROM quote_submissions
             WHERE status = 'pending' AND potential_duplicate_ids_json != '[]'",
        )
        .fetch_all(&self.pool)
        .await?;

        let flagged = rows
            .iter()
            .map(|row| {
                let id: String = column(row, "id")?;
                let ids: Vec<String> = json_column(row, "potential_duplicate_ids_json")?;
                Ok((id, ids))
            })
            .collect::<Result<Vec<_>, RepositoryError>>()?;

        Ok(group_shared_duplicates(&flagged))
    }
}
