use chrono::Utc;
use sqlx::sqlite::SqliteRow;

use citequotes_core::domain::cms::{
    Comment, CommentInput, CommentStatus, ContentEntry, ContentInput, ContentKind, ContentStatus,
    Media, MediaInput,
};

use super::{column, new_id, optional_timestamp, timestamp, CmsRepository, RepositoryError};
use crate::DbPool;

const CONTENT_COLUMNS: &str =
    "id, title, slug, excerpt, body, status, author_id, published_at, created_at, updated_at";

const COMMENT_COLUMNS: &str =
    "id, article_id, author_name, author_id, body, status, moderated_by, created_at";

pub struct SqlCmsRepository {
    pool: DbPool,
}

impl SqlCmsRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_content(row: &SqliteRow) -> Result<ContentEntry, RepositoryError> {
    let status: String = column(row, "status")?;
    Ok(ContentEntry {
        id: column(row, "id")?,
        title: column(row, "title")?,
        slug: column(row, "slug")?,
        excerpt: column(row, "excerpt")?,
        body: column(row, "body")?,
        status: ContentStatus::parse(&status)
            .ok_or_else(|| RepositoryError::Decode(format!("unknown status `{status}`")))?,
        author_id: column(row, "author_id")?,
        published_at: optional_timestamp(row, "published_at")?,
        created_at: timestamp(row, "created_at")?,
        updated_at: timestamp(row, "updated_at")?,
    })
}

fn row_to_media(row: &SqliteRow) -> Result<Media, RepositoryError> {
    Ok(Media {
        id: column(row, "id")?,
        file_name: column(row, "file_name")?,
        url: column(row, "url")?,
        mime_type: column(row, "mime_type")?,
        size_bytes: column(row, "size_bytes")?,
        alt_text: column(row, "alt_text")?,
        uploaded_by: column(row, "uploaded_by")?,
        created_at: timestamp(row, "created_at")?,
    })
}

fn row_to_comment(row: &SqliteRow) -> Result<Comment, RepositoryError> {
    let status: String = column(row, "status")?;
    Ok(Comment {
        id: column(row, "id")?,
        article_id: column(row, "article_id")?,
        author_name: column(row, "author_name")?,
        author_id: column(row, "author_id")?,
        body: column(row, "body")?,
        status: CommentStatus::parse(&status)
            .ok_or_else(|| RepositoryError::Decode(format!("unknown status `{status}`")))?,
        moderated_by: column(row, "moderated_by")?,
        created_at: timestamp(row, "created_at")?,
    })
}

fn slug_of(input: &ContentInput) -> String {
    input.slug.clone().unwrap_or_default()
}

fn slug_conflict(kind: ContentKind, slug: &str) -> String {
    format!("{} slug `{slug}` is already taken", kind.label())
}

#[async_trait::async_trait]
impl CmsRepository for SqlCmsRepository {
    async fn create_content(
        &self,
        kind: ContentKind,
        input: ContentInput,
        author_id: Option<&str>,
    ) -> Result<ContentEntry, RepositoryError> {
        let now = Utc::now();
        let entry = ContentEntry {
            id: new_id(),
            title: input.title.clone(),
            slug: slug_of(&input),
            excerpt: input.excerpt.clone(),
            body: input.body.clone(),
            status: ContentStatus::Draft,
            author_id: author_id.map(str::to_string),
            published_at: None,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(&format!(
            "INSERT INTO {} (id, title, slug, excerpt, body, status, author_id, created_at,
                             updated_at)
             VALUES (?, ?, ?, ?, ?, 'draft', ?, ?, ?)",
            kind.table()
        ))
        .bind(&entry.id)
        .bind(&entry.title)
        .bind(&entry.slug)
        .bind(&entry.excerpt)
        .bind(&entry.body)
        .bind(&entry.author_id)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::on_unique(e, slug_conflict(kind, &entry.slug)))?;

        Ok(entry)
    }

    async fn find_content(
        &self,
        kind: ContentKind,
        id: &str,
    ) -> Result<Option<ContentEntry>, RepositoryError> {
        let row =
            sqlx::query(&format!("SELECT {CONTENT_COLUMNS} FROM {} WHERE id = ?", kind.table()))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.as_ref().map(row_to_content).transpose()
    }

    async fn find_by_slug(
        &self,
        kind: ContentKind,
        slug: &str,
    ) -> Result<Option<ContentEntry>, RepositoryError> {
        let row =
            sqlx::query(&format!("SELECT {CONTENT_COLUMNS} FROM {} WHERE slug = ?", kind.table()))
                .bind(slug)
                .fetch_optional(&self.pool)
                .await?;
        row.as_ref().map(row_to_content).transpose()
    }

    async fn list_content(
        &self,
        kind: ContentKind,
        published_only: bool,
    ) -> Result<Vec<ContentEntry>, RepositoryError> {
        let filter = if published_only { "WHERE status = 'published'" } else { "" };
        let rows = sqlx::query(&format!(
            "SELECT {CONTENT_COLUMNS} FROM {} {filter}
             ORDER BY COALESCE(published_at, created_at) DESC, id ASC",
            kind.table()
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_content).collect()
    }

    async fn update_content(
        &self,
        kind: ContentKind,
        id: &str,
        input: ContentInput,
    ) -> Result<ContentEntry, RepositoryError> {
        let slug = slug_of(&input);
        let result = sqlx::query(&format!(
            "UPDATE {} SET title = ?, slug = ?, excerpt = ?, body = ?, updated_at = ?
             WHERE id = ?",
            kind.table()
        ))
        .bind(&input.title)
        .bind(&slug)
        .bind(&input.excerpt)
        .bind(&input.body)
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::on_unique(e, slug_conflict(kind, &slug)))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::not_found(kind.label(), id));
        }
        self.find_content(kind, id).await?.ok_or_else(|| RepositoryError::not_found(kind.label(), id))
    }

    /// Publishing stamps `published_at` the first time only.
    async fn set_status(
        &self,
        kind: ContentKind,
        id: &str,
        status: ContentStatus,
    ) -> Result<ContentEntry, RepositoryError> {
        let now = Utc::now().to_rfc3339();
        let published_at = (status == ContentStatus::Published).then(|| now.clone());
        let result = sqlx::query(&format!(
            "UPDATE {} SET status = ?, published_at = COALESCE(published_at, ?), updated_at = ?
             WHERE id = ?",
            kind.table()
        ))
        .bind(status.as_str())
        .bind(published_at)
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::not_found(kind.label(), id));
        }
        self.find_content(kind, id).await?.ok_or_else(|| RepositoryError::not_found(kind.label(), id))
    }

    async fn delete_content(&self, kind: ContentKind, id: &str) -> Result<(), RepositoryError> {
        let result = sqlx::query(&format!("DELETE FROM {} WHERE id = ?", kind.table()))
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::not_found(kind.label(), id));
        }
        Ok(())
    }

    async fn create_media(
        &self,
        input: MediaInput,
        uploaded_by: Option<&str>,
    ) -> Result<Media, RepositoryError> {
        let media = Media {
            id: new_id(),
            file_name: input.file_name,
            url: input.url,
            mime_type: input.mime_type,
            size_bytes: input.size_bytes,
            alt_text: input.alt_text,
            uploaded_by: uploaded_by.map(str::to_string),
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO cms_media (id, file_name, url, mime_type, size_bytes, alt_text,
                                    uploaded_by, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&media.id)
        .bind(&media.file_name)
        .bind(&media.url)
        .bind(&media.mime_type)
        .bind(media.size_bytes)
        .bind(&media.alt_text)
        .bind(&media.uploaded_by)
        .bind(media.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(media)
    }

    async fn list_media(&self) -> Result<Vec<Media>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, file_name, url, mime_type, size_bytes, alt_text, uploaded_by, created_at
             FROM cms_media ORDER BY created_at DESC, id ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_media).collect()
    }

    async fn delete_media(&self, id: &str) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("DELETE FROM cms_media WHERE id = ?").bind(id).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::not_found("media", id));
        }
        Ok(())
    }

    async fn create_comment(
        &self,
        article_id: &str,
        input: CommentInput,
        author_id: Option<&str>,
    ) -> Result<Comment, RepositoryError> {
        if self.find_content(ContentKind::Article, article_id).await?.is_none() {
            return Err(RepositoryError::not_found("article", article_id));
        }

        let comment = Comment {
            id: new_id(),
            article_id: article_id.to_string(),
            author_name: input.author_name,
            author_id: author_id.map(str::to_string),
            body: input.body,
            status: CommentStatus::Pending,
            created_at: Utc::now(),
            moderated_by: None,
        };

        sqlx::query(
            "INSERT INTO cms_comments (id, article_id, author_name, author_id, body, status,
                                       created_at)
             VALUES (?, ?, ?, ?, ?, 'pending', ?)",
        )
        .bind(&comment.id)
        .bind(&comment.article_id)
        .bind(&comment.author_name)
        .bind(&comment.author_id)
        .bind(&comment.body)
        .bind(comment.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(comment)
    }

    async fn list_comments(
        &self,
        status: Option<CommentStatus>,
        article_id: Option<&str>,
    ) -> Result<Vec<Comment>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {COMMENT_COLUMNS} FROM cms_comments
             WHERE (?1 IS NULL OR status = ?1) AND (?2 IS NULL OR article_id = ?2)
             ORDER BY created_at ASC, id ASC"
        ))
        .bind(status.map(|s| s.as_str()))
        .bind(article_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_comment).collect()
    }

    async fn moderate_comment(
        &self,
        id: &str,
        status: CommentStatus,
        moderator: &str,
    ) -> Result<Comment, RepositoryError> {
        let result = sqlx::query("UPDATE cms_comments SET status = ?, moderated_by = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(moderator)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::not_found("comment", id));
        }

        let row = sqlx::query(&format!("SELECT {COMMENT_COLUMNS} FROM cms_comments WHERE id = ?"))
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        row_to_comment(&row)
    }
}

#[cfg(test)]
mod tests {
    use citequotes_core::domain::cms::{
        CommentInput, CommentStatus, ContentInput, ContentKind, ContentStatus, MediaInput,
    };

    use super::SqlCmsRepository;
    use crate::repositories::test_support::setup;
    use crate::repositories::{CmsRepository, RepositoryError};

    fn content(title: &str) -> ContentInput {
        ContentInput {
            title: title.to_string(),
            body: "Body text".to_string(),
            ..ContentInput::default()
        }
        .validate()
        .expect("valid content")
    }

    #[tokio::test]
    async fn articles_start_as_drafts_and_publish_once() {
        let repo = SqlCmsRepository::new(setup().await);
        let article = repo
            .create_content(ContentKind::Article, content("Why sources matter"), Some("admin-1"))
            .await
            .expect("create");
        assert_eq!(article.status, ContentStatus::Draft);
        assert_eq!(article.slug, "why-sources-matter");
        assert!(repo.list_content(ContentKind::Article, true).await.expect("public").is_empty());

        let published = repo
            .set_status(ContentKind::Article, &article.id, ContentStatus::Published)
            .await
            .expect("publish");
        let first_stamp = published.published_at.expect("stamped");

        let archived = repo
            .set_status(ContentKind::Article, &article.id, ContentStatus::Archived)
            .await
            .expect("archive");
        assert_eq!(archived.published_at, Some(first_stamp));

        let by_slug = repo
            .find_by_slug(ContentKind::Article, "why-sources-matter")
            .await
            .expect("slug")
            .expect("exists");
        assert_eq!(by_slug.id, article.id);
    }

    #[tokio::test]
    async fn duplicate_slugs_conflict_within_a_kind_only() {
        let repo = SqlCmsRepository::new(setup().await);
        repo.create_content(ContentKind::Page, content("About"), None).await.expect("page");

        let clash = repo.create_content(ContentKind::Page, content("About"), None).await;
        assert!(matches!(clash, Err(RepositoryError::Conflict(_))));

        repo.create_content(ContentKind::Article, content("About"), None)
            .await
            .expect("articles have their own slug space");
    }

    #[tokio::test]
    async fn comments_need_an_article_and_start_pending() {
        let repo = SqlCmsRepository::new(setup().await);
        let missing = repo
            .create_comment(
                "nope",
                CommentInput { author_name: "Bob".into(), body: "hi".into() },
                None,
            )
            .await;
        assert!(matches!(missing, Err(RepositoryError::NotFound { entity: "article", .. })));

        let article = repo
            .create_content(ContentKind::Article, content("Launch"), None)
            .await
            .expect("article");
        let comment = repo
            .create_comment(
                &article.id,
                CommentInput { author_name: "Bob".into(), body: "Nice".into() },
                None,
            )
            .await
            .expect("comment");
        assert_eq!(comment.status, CommentStatus::Pending);

        let pending =
            repo.list_comments(Some(CommentStatus::Pending), None).await.expect("pending");
        assert_eq!(pending.len(), 1);

        let approved = repo
            .moderate_comment(&comment.id, CommentStatus::Approved, "mod-1")
            .await
            .expect("moderate");
        assert_eq!(approved.moderated_by.as_deref(), Some("mod-1"));
        assert!(repo
            .list_comments(Some(CommentStatus::Pending), Some(&article.id))
            .await
            .expect("none pending")
            .is_empty());
    }

    #[tokio::test]
    async fn media_can_be_listed_and_deleted() {
        let repo = SqlCmsRepository::new(setup().await);
        let media = repo
            .create_media(
                MediaInput {
                    file_name: "scan.png".into(),
                    url: "https://cdn.example/scan.png".into(),
                    size_bytes: Some(2048),
                    ..MediaInput::default()
                },
                Some("admin-1"),
            )
            .await
            .expect("media");

        assert_eq!(repo.list_media().await.expect("list").len(), 1);
        repo.delete_media(&media.id).await.expect("delete");
        assert!(matches!(repo.delete_media(&media.id).await, Err(RepositoryError::NotFound { .. })));
    }
}
