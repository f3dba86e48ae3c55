use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use citequotes_core::domain::quote::{
    CitedBy, NewCitedBy, NewOriginalSource, NewQuote, NewTranslation, OriginalSource, Quote,
    QuoteDetail, QuoteId, Translation,
};

use super::{
    column, json_column, new_id, timestamp, to_json, QuoteQuery, QuoteRepository,
    RepositoryError,
};
use crate::DbPool;

const QUOTE_COLUMNS: &str = "id, quote_text, author, quote_date, context, citation, tags_json,
     evidence_image_urls_json, created_by, created_at, updated_at";

const SOURCE_COLUMNS: &str = "id, quote_id, title, author, publisher, publication_date, location,
     url, source_type, created_at";

pub struct SqlQuoteRepository {
    pool: DbPool,
}

impl SqlQuoteRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_quote(row: &SqliteRow) -> Result<Quote, RepositoryError> {
    Ok(Quote {
        id: QuoteId(column(row, "id")?),
        quote_text: column(row, "quote_text")?,
        author: column(row, "author")?,
        quote_date: column(row, "quote_date")?,
        context: column(row, "context")?,
        citation: column(row, "citation")?,
        tags: json_column(row, "tags_json")?,
        evidence_image_urls: json_column(row, "evidence_image_urls_json")?,
        created_by: column(row, "created_by")?,
        created_at: timestamp(row, "created_at")?,
        updated_at: timestamp(row, "updated_at")?,
    })
}

fn row_to_source(row: &SqliteRow) -> Result<OriginalSource, RepositoryError> {
    Ok(OriginalSource {
        id: column(row, "id")?,
        quote_id: QuoteId(column(row, "quote_id")?),
        title: column(row, "title")?,
        author: column(row, "author")?,
        publisher: column(row, "publisher")?,
        publication_date: column(row, "publication_date")?,
        location: column(row, "location")?,
        url: column(row, "url")?,
        source_type: column(row, "source_type")?,
        created_at: timestamp(row, "created_at")?,
    })
}

fn row_to_translation(row: &SqliteRow) -> Result<Translation, RepositoryError> {
    Ok(Translation {
        id: column(row, "id")?,
        quote_id: QuoteId(column(row, "quote_id")?),
        language: column(row, "language")?,
        translated_text: column(row, "translated_text")?,
        translator: column(row, "translator")?,
        source_url: column(row, "source_url")?,
        created_at: timestamp(row, "created_at")?,
    })
}

fn row_to_cited_by(row: &SqliteRow) -> Result<CitedBy, RepositoryError> {
    Ok(CitedBy {
        id: column(row, "id")?,
        quote_id: QuoteId(column(row, "quote_id")?),
        title: column(row, "title")?,
        author: column(row, "author")?,
        year: column(row, "year")?,
        url: column(row, "url")?,
        created_at: timestamp(row, "created_at")?,
    })
}

fn push_filters<'a>(builder: &mut QueryBuilder<'a, Sqlite>, query: &'a QuoteQuery) {
    builder.push(" WHERE 1 = 1");
    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", escape_like(&search.to_lowercase()));
        builder
            .push(" AND (LOWER(quote_text) LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR LOWER(author) LIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\')");
    }
    if let Some(author) = query.author.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        builder.push(" AND LOWER(author) = ").push_bind(author.to_lowercase());
    }
}

/// Search terms match literally, so LIKE wildcards are escaped with `\`.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

pub(crate) async fn insert_quote(
    conn: &mut SqliteConnection,
    input: &NewQuote,
    created_by: Option<&str>,
) -> Result<Quote, RepositoryError> {
    let now = Utc::now();
    let quote = Quote {
        id: QuoteId(new_id()),
        quote_text: input.quote_text.clone(),
        author: input.author.clone(),
        quote_date: input.quote_date.clone(),
        context: input.context.clone(),
        citation: input.citation.clone(),
        tags: input.tags.clone(),
        evidence_image_urls: input.evidence_image_urls.clone(),
        created_by: created_by.map(str::to_string),
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        "INSERT INTO quotes (id, quote_text, author, quote_date, context, citation, tags_json,
                             evidence_image_urls_json, created_by, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&quote.id.0)
    .bind(&quote.quote_text)
    .bind(&quote.author)
    .bind(&quote.quote_date)
    .bind(&quote.context)
    .bind(&quote.citation)
    .bind(to_json(&quote.tags)?)
    .bind(to_json(&quote.evidence_image_urls)?)
    .bind(&quote.created_by)
    .bind(now.to_rfc3339())
    .bind(now.to_rfc3339())
    .execute(&mut *conn)
    .await?;

    Ok(quote)
}

pub(crate) async fn insert_source(
    conn: &mut SqliteConnection,
    input: &NewOriginalSource,
) -> Result<OriginalSource, RepositoryError> {
    let source = OriginalSource {
        id: new_id(),
        quote_id: QuoteId(input.quote_id.clone()),
        title: input.title.clone(),
        author: input.author.clone(),
        publisher: input.publisher.clone(),
        publication_date: input.publication_date.clone(),
        location: input.location.clone(),
        url: input.url.clone(),
        source_type: input.source_type.clone(),
        created_at: Utc::now(),
    };

    sqlx::query(
        "INSERT INTO original_sources (id, quote_id, title, author, publisher, publication_date,
                                       location, url, source_type, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&source.id)
    .bind(&source.quote_id.0)
    .bind(&source.title)
    .bind(&source.author)
    .bind(&source.publisher)
    .bind(&source.publication_date)
    .bind(&source.location)
    .bind(&source.url)
    .bind(&source.source_type)
    .bind(source.created_at.to_rfc3339())
    .execute(&mut *conn)
    .await
    .map_err(|e| {
        RepositoryError::on_unique(
            e,
            format!("quote `{}` already has an original source", input.quote_id),
        )
    })?;

    Ok(source)
}

pub(crate) async fn insert_translation(
    conn: &mut SqliteConnection,
    input: &NewTranslation,
) -> Result<Translation, RepositoryError> {
    let translation = Translation {
        id: new_id(),
        quote_id: QuoteId(input.quote_id.clone()),
        language: input.language.clone(),
        translated_text: input.translated_text.clone(),
        translator: input.translator.clone(),
        source_url: input.source_url.clone(),
        created_at: Utc::now(),
    };

    sqlx::query(
        "INSERT INTO translations (id, quote_id, language, translated_text, translator,
                                   source_url, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&translation.id)
    .bind(&translation.quote_id.0)
    .bind(&translation.language)
    .bind(&translation.translated_text)
    .bind(&translation.translator)
    .bind(&translation.source_url)
    .bind(translation.created_at.to_rfc3339())
    .execute(&mut *conn)
    .await?;

    Ok(translation)
}

async fn quote_exists(conn: &mut SqliteConnection, id: &str) -> Result<bool, RepositoryError> {
    let exists: i64 = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM quotes WHERE id = ?)")
        .bind(id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(exists == 1)
}

impl SqlQuoteRepository {
    async fn load_detail(&self, quote: Quote) -> Result<QuoteDetail, RepositoryError> {
        let source_row = sqlx::query(&format!(
            "SELECT {SOURCE_COLUMNS} FROM original_sources WHERE quote_id = ?"
        ))
        .bind(&quote.id.0)
        .fetch_optional(&self.pool)
        .await?;
        let original_source = source_row.as_ref().map(row_to_source).transpose()?;
        let translations = self.list_translations(Some(&quote.id)).await?;
        let cited_by = self.list_cited_by(Some(&quote.id)).await?;

        Ok(QuoteDetail { quote, original_source, translations, cited_by })
    }
}

#[async_trait::async_trait]
impl QuoteRepository for SqlQuoteRepository {
    async fn list(&self, query: &QuoteQuery) -> Result<Vec<Quote>, RepositoryError> {
        let mut builder = QueryBuilder::<Sqlite>::new(format!("SELECT {QUOTE_COLUMNS} FROM quotes"));
        push_filters(&mut builder, query);
        builder
            .push(" ORDER BY created_at DESC, id ASC LIMIT ")
            .push_bind(i64::from(query.normalized_limit()))
            .push(" OFFSET ")
            .push_bind(i64::from(query.offset));

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter().map(row_to_quote).collect()
    }

    async fn count(&self, query: &QuoteQuery) -> Result<i64, RepositoryError> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM quotes");
        push_filters(&mut builder, query);
        let total: i64 = builder.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(total)
    }

    async fn find_by_id(&self, id: &QuoteId) -> Result<Option<Quote>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {QUOTE_COLUMNS} FROM quotes WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_quote).transpose()
    }

    async fn detail(&self, id: &QuoteId) -> Result<Option<QuoteDetail>, RepositoryError> {
        match self.find_by_id(id).await? {
            Some(quote) => Ok(Some(self.load_detail(quote).await?)),
            None => Ok(None),
        }
    }

    async fn all_details(&self) -> Result<Vec<QuoteDetail>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {QUOTE_COLUMNS} FROM quotes ORDER BY created_at ASC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        let mut details = Vec::with_capacity(rows.len());
        for row in &rows {
            details.push(self.load_detail(row_to_quote(row)?).await?);
        }
        Ok(details)
    }

    async fn create(
        &self,
        input: NewQuote,
        created_by: Option<&str>,
    ) -> Result<Quote, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        insert_quote(&mut conn, &input, created_by).await
    }

    async fn update(&self, id: &QuoteId, input: NewQuote) -> Result<Quote, RepositoryError> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE quotes SET quote_text = ?, author = ?, quote_date = ?, context = ?,
                               citation = ?, tags_json = ?, evidence_image_urls_json = ?,
                               updated_at = ?
             WHERE id = ?",
        )
        .bind(&input.quote_text)
        .bind(&input.author)
        .bind(&input.quote_date)
        .bind(&input.context)
        .bind(&input.citation)
        .bind(to_json(&input.tags)?)
        .bind(to_json(&input.evidence_image_urls)?)
        .bind(now.to_rfc3339())
        .bind(&id.0)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::not_found("quote", &id.0));
        }
        self.find_by_id(id).await?.ok_or_else(|| RepositoryError::not_found("quote", &id.0))
    }

    async fn delete(&self, id: &QuoteId) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("DELETE FROM quotes WHERE id = ?").bind(&id.0).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::not_found("quote", &id.0));
        }
        Ok(())
    }

    async fn texts(&self) -> Result<Vec<(String, String)>, RepositoryError> {
        let rows: Vec<(String, String)> = sqlx::query_as("SELECT id, quote_text FROM quotes")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn create_source(
        &self,
        input: NewOriginalSource,
    ) -> Result<OriginalSource, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        if !quote_exists(&mut conn, &input.quote_id).await? {
            return Err(RepositoryError::not_found("quote", &input.quote_id));
        }
        insert_source(&mut conn, &input).await
    }

    async fn list_sources(
        &self,
        quote_id: Option<&QuoteId>,
    ) -> Result<Vec<OriginalSource>, RepositoryError> {
        let rows = match quote_id {
            Some(id) => {
                sqlx::query(&format!(
                    "SELECT {SOURCE_COLUMNS} FROM original_sources WHERE quote_id = ?"
                ))
                .bind(&id.0)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {SOURCE_COLUMNS} FROM original_sources ORDER BY created_at DESC"
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };
        rows.iter().map(row_to_source).collect()
    }

    async fn create_translation(
        &self,
        input: NewTranslation,
    ) -> Result<Translation, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        if !quote_exists(&mut conn, &input.quote_id).await? {
            return Err(RepositoryError::not_found("quote", &input.quote_id));
        }
        insert_translation(&mut conn, &input).await
    }

    async fn list_translations(
        &self,
        quote_id: Option<&QuoteId>,
    ) -> Result<Vec<Translation>, RepositoryError> {
        let select = "SELECT id, quote_id, language, translated_text, translator, source_url,
                             created_at
                      FROM translations";
        let rows = match quote_id {
            Some(id) => {
                sqlx::query(&format!("{select} WHERE quote_id = ? ORDER BY language ASC"))
                    .bind(&id.0)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                sqlx::query(&format!("{select} ORDER BY created_at DESC"))
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        rows.iter().map(row_to_translation).collect()
    }

    async fn create_cited_by(&self, input: NewCitedBy) -> Result<CitedBy, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        if !quote_exists(&mut conn, &input.quote_id).await? {
            return Err(RepositoryError::not_found("quote", &input.quote_id));
        }

        let cited = CitedBy {
            id: new_id(),
            quote_id: QuoteId(input.quote_id),
            title: input.title,
            author: input.author,
            year: input.year,
            url: input.url,
            created_at: Utc::now(),
        };
        sqlx::query(
            "INSERT INTO cited_by (id, quote_id, title, author, year, url, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&cited.id)
        .bind(&cited.quote_id.0)
        .bind(&cited.title)
        .bind(&cited.author)
        .bind(&cited.year)
        .bind(&cited.url)
        .bind(cited.created_at.to_rfc3339())
        .execute(&mut *conn)
        .await?;

        Ok(cited)
    }

    async fn list_cited_by(
        &self,
        quote_id: Option<&QuoteId>,
    ) -> Result<Vec<CitedBy>, RepositoryError> {
        let select = "SELECT id, quote_id, title, author, year, url, created_at FROM cited_by";
        let rows = match quote_id {
            Some(id) => {
                sqlx::query(&format!("{select} WHERE quote_id = ? ORDER BY created_at ASC"))
                    .bind(&id.0)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                sqlx::query(&format!("{select} ORDER BY created_at DESC"))
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        rows.iter().map(row_to_cited_by).collect()
    }
}

#[cfg(test)]
mod tests {
    use citequotes_core::domain::quote::{
        NewCitedBy, NewOriginalSource, NewQuote, NewTranslation, QuoteId,
    };

    use super::SqlQuoteRepository;
    use crate::repositories::test_support::setup;
    use crate::repositories::{QuoteQuery, QuoteRepository, RepositoryError};

    fn new_quote(text: &str, author: &str) -> NewQuote {
        NewQuote {
            quote_text: text.to_string(),
            author: author.to_string(),
            tags: vec!["philosophy".to_string()],
            ..NewQuote::default()
        }
    }

    #[tokio::test]
    async fn create_and_fetch_detail_with_children() {
        let repo = SqlQuoteRepository::new(setup().await);
        let quote = repo
            .create(new_quote("Know thyself.", "Socrates"), Some("user-1"))
            .await
            .expect("create");

        repo.create_source(NewOriginalSource {
            quote_id: quote.id.0.clone(),
            title: "Protagoras".into(),
            publisher: Some("Hackett".into()),
            ..NewOriginalSource::default()
        })
        .await
        .expect("source");
        repo.create_translation(NewTranslation {
            quote_id: quote.id.0.clone(),
            language: "fr".into(),
            translated_text: "Connais-toi toi-meme.".into(),
            ..NewTranslation::default()
        })
        .await
        .expect("translation");
        repo.create_cited_by(NewCitedBy {
            quote_id: quote.id.0.clone(),
            title: "Essays".into(),
            year: Some("1580".into()),
            ..NewCitedBy::default()
        })
        .await
        .expect("cited by");

        let detail = repo.detail(&quote.id).await.expect("detail").expect("exists");
        assert_eq!(detail.quote.tags, vec!["philosophy".to_string()]);
        assert_eq!(detail.quote.created_by.as_deref(), Some("user-1"));
        assert_eq!(detail.original_source.map(|s| s.title), Some("Protagoras".to_string()));
        assert_eq!(detail.translations.len(), 1);
        assert_eq!(detail.cited_by.len(), 1);
    }

    #[tokio::test]
    async fn second_original_source_conflicts() {
        let repo = SqlQuoteRepository::new(setup().await);
        let quote = repo.create(new_quote("A", "B"), None).await.expect("create");
        let source = NewOriginalSource {
            quote_id: quote.id.0.clone(),
            title: "First".into(),
            ..NewOriginalSource::default()
        };

        repo.create_source(source.clone()).await.expect("first source");
        let error = repo.create_source(source).await.expect_err("second source");
        assert!(matches!(error, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn children_require_an_existing_quote() {
        let repo = SqlQuoteRepository::new(setup().await);
        let error = repo
            .create_translation(NewTranslation {
                quote_id: "missing".into(),
                language: "de".into(),
                translated_text: "x".into(),
                ..NewTranslation::default()
            })
            .await
            .expect_err("missing quote");
        assert!(matches!(error, RepositoryError::NotFound { entity: "quote", .. }));
    }

    #[tokio::test]
    async fn list_filters_by_search_and_author_with_pagination() {
        let repo = SqlQuoteRepository::new(setup().await);
        repo.create(new_quote("The only true wisdom is knowing nothing.", "Socrates"), None)
            .await
            .expect("q1");
        repo.create(new_quote("Wisdom begins in wonder.", "Socrates"), None).await.expect("q2");
        repo.create(new_quote("I think, therefore I am.", "Descartes"), None).await.expect("q3");

        let wisdom = QuoteQuery { search: Some("WISDOM".into()), ..QuoteQuery::default() };
        assert_eq!(repo.list(&wisdom).await.expect("search").len(), 2);
        assert_eq!(repo.count(&wisdom).await.expect("count"), 2);

        let by_author = QuoteQuery { author: Some("descartes".into()), ..QuoteQuery::default() };
        let found = repo.list(&by_author).await.expect("author");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].author, "Descartes");

        let page = QuoteQuery { limit: 2, offset: 2, ..QuoteQuery::default() };
        assert_eq!(repo.list(&page).await.expect("page").len(), 1);
    }

    #[tokio::test]
    async fn search_treats_like_wildcards_literally() {
        let repo = SqlQuoteRepository::new(setup().await);
        repo.create(new_quote("Gains of 100% are rare.", "Economist"), None).await.expect("q1");
        repo.create(new_quote("snake_case or camelCase", "Programmer"), None).await.expect("q2");
        repo.create(new_quote("snakeXcase is odd", "Programmer"), None).await.expect("q3");

        let percent = QuoteQuery { search: Some("%".into()), ..QuoteQuery::default() };
        let found = repo.list(&percent).await.expect("percent");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].author, "Economist");

        let underscore = QuoteQuery { search: Some("snake_case".into()), ..QuoteQuery::default() };
        let found = repo.list(&underscore).await.expect("underscore");
        assert_eq!(found.len(), 1);
        assert!(found[0].quote_text.starts_with("snake_case"));
    }

    #[tokio::test]
    async fn update_and_delete_report_missing_rows() {
        let repo = SqlQuoteRepository::new(setup().await);
        let quote = repo.create(new_quote("Old", "Someone"), None).await.expect("create");

        let updated = repo.update(&quote.id, new_quote("New", "Someone")).await.expect("update");
        assert_eq!(updated.quote_text, "New");

        repo.delete(&quote.id).await.expect("delete");
        assert!(repo.find_by_id(&quote.id).await.expect("find").is_none());

        let missing = QuoteId("nope".into());
        assert!(matches!(
            repo.update(&missing, new_quote("x", "y")).await,
            Err(RepositoryError::NotFound { .. })
        ));
        assert!(matches!(repo.delete(&missing).await, Err(RepositoryError::NotFound { .. })));
    }

    #[tokio::test]
    async fn deleting_a_quote_cascades_to_children() {
        let pool = setup().await;
        let repo = SqlQuoteRepository::new(pool.clone());
        let quote = repo.create(new_quote("A", "B"), None).await.expect("create");
        repo.create_translation(NewTranslation {
            quote_id: quote.id.0.clone(),
            language: "es".into(),
            translated_text: "a".into(),
            ..NewTranslation::default()
        })
        .await
        .expect("translation");

        repo.delete(&quote.id).await.expect("delete");
        let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM translations")
            .fetch_one(&pool)
            .await
            .expect("count");
        assert_eq!(remaining, 0);
    }
}
