use chrono::Utc;
use sqlx::sqlite::SqliteRow;

use citequotes_core::domain::draft::{DraftId, DraftInput, QuoteDraft};

use super::{column, json_column, new_id, timestamp, to_json, DraftRepository, RepositoryError};
use crate::DbPool;

pub struct SqlDraftRepository {
    pool: DbPool,
}

impl SqlDraftRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_draft(row: &SqliteRow) -> Result<QuoteDraft, RepositoryError> {
    Ok(QuoteDraft {
        id: DraftId(column(row, "id")?),
        user_id: column(row, "user_id")?,
        title: column(row, "title")?,
        form_data: json_column(row, "form_data_json")?,
        created_at: timestamp(row, "created_at")?,
        updated_at: timestamp(row, "updated_at")?,
    })
}

#[async_trait::async_trait]
impl DraftRepository for SqlDraftRepository {
    async fn create(&self, owner: &str, input: DraftInput) -> Result<QuoteDraft, RepositoryError> {
        let now = Utc::now();
        let draft = QuoteDraft {
            id: DraftId(new_id()),
            user_id: owner.to_string(),
            title: input.title,
            form_data: input.form_data,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO quote_drafts (id, user_id, title, form_data_json, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&draft.id.0)
        .bind(&draft.user_id)
        .bind(&draft.title)
        .bind(to_json(&draft.form_data)?)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(draft)
    }

    async fn find(
        &self,
        owner: &str,
        id: &DraftId,
    ) -> Result<Option<QuoteDraft>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, user_id, title, form_data_json, created_at, updated_at
             FROM quote_drafts WHERE id = ? AND user_id = ?",
        )
        .bind(&id.0)
        .bind(owner)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_draft).transpose()
    }

    async fn list(&self, owner: &str) -> Result<Vec<QuoteDraft>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, user_id, title, form_data_json, created_at, updated_at
             FROM quote_drafts WHERE user_id = ? ORDER BY updated_at DESC, id ASC",
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_draft).collect()
    }

    async fn update(
        &self,
        owner: &str,
        id: &DraftId,
        input: DraftInput,
    ) -> Result<QuoteDraft, RepositoryError> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE quote_drafts SET title = ?, form_data_json = ?, updated_at = ?
             WHERE id = ? AND user_id = ?",
        )
        .bind(&input.title)
        .bind(to_json(&input.form_data)?)
        .bind(now.to_rfc3339())
        .bind(&id.0)
        .bind(owner)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::not_found("draft", &id.0));
        }
        self.find(owner, id).await?.ok_or_else(|| RepositoryError::not_found("draft", &id.0))
    }

    async fn delete(&self, owner: &str, id: &DraftId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM quote_drafts WHERE id = ? AND user_id = ?")
            .bind(&id.0)
            .bind(owner)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::not_found("draft", &id.0));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use citequotes_core::domain::draft::DraftInput;

    use super::SqlDraftRepository;
    use crate::repositories::test_support::setup;
    use crate::repositories::{DraftRepository, RepositoryError};

    fn input(text: &str) -> DraftInput {
        DraftInput { title: Some("wip".into()), form_data: json!({ "quote_text": text }) }
    }

    #[tokio::test]
    async fn drafts_round_trip_their_form_state() {
        let repo = SqlDraftRepository::new(setup().await);
        let draft = repo.create("user-1", input("half")).await.expect("create");

        let updated = repo.update("user-1", &draft.id, input("whole")).await.expect("update");
        assert_eq!(updated.form_data["quote_text"], "whole");
        assert!(updated.updated_at >= draft.updated_at);

        let listed = repo.list("user-1").await.expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, draft.id);
    }

    #[tokio::test]
    async fn other_users_drafts_behave_as_missing() {
        let repo = SqlDraftRepository::new(setup().await);
        let draft = repo.create("owner", input("mine")).await.expect("create");

        assert!(repo.find("intruder", &draft.id).await.expect("find").is_none());
        assert!(repo.list("intruder").await.expect("list").is_empty());
        assert!(matches!(
            repo.update("intruder", &draft.id, input("theirs")).await,
            Err(RepositoryError::NotFound { entity: "draft", .. })
        ));
        assert!(matches!(
            repo.delete("intruder", &draft.id).await,
            Err(RepositoryError::NotFound { .. })
        ));

        repo.delete("owner", &draft.id).await.expect("owner deletes");
        assert!(repo.find("owner", &draft.id).await.expect("find").is_none());
    }
}
