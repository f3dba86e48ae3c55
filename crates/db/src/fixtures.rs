use serde::Serialize;
use sqlx::Executor;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

/// Seed quotes and what each one must carry once loaded.
const SEED_QUOTES: &[SeedQuoteContract] = &[
    SeedQuoteContract {
        quote_id: "quote-seed-001",
        author: "Socrates",
        has_source: true,
        translation_languages: &["el"],
        cited_by_count: 1,
    },
    SeedQuoteContract {
        quote_id: "quote-seed-002",
        author: "Heraclitus",
        has_source: false,
        translation_languages: &[],
        cited_by_count: 0,
    },
    SeedQuoteContract {
        quote_id: "quote-seed-003",
        author: "Rene Descartes",
        has_source: true,
        translation_languages: &["fr"],
        cited_by_count: 0,
    },
];

const SEED_USER_IDS: &[&str] = &["user-seed-root", "user-seed-moderator", "user-seed-reader"];
const SEED_SUPER_ADMIN: &str = "user-seed-root";
const SEED_SUBMISSION_IDS: &[&str] = &["submission-seed-001"];
const SEED_ARTICLE_IDS: &[&str] = &["article-seed-001"];
const SEED_PAGE_IDS: &[&str] = &["page-seed-001"];

/// Deterministic development dataset: a few sourced quotes, a super admin,
/// a pending submission and published CMS content.
pub struct SeedDataset;

impl SeedDataset {
    pub const SQL: &str = include_str!("../../../config/fixtures/seed_data.sql");

    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;
        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        Ok(SeedResult {
            quotes_seeded: SEED_QUOTES.iter().map(|quote| quote.quote_id).collect(),
            super_admin: SEED_SUPER_ADMIN,
        })
    }

    /// Checks that every seeded row is present with its children.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        for quote in SEED_QUOTES {
            let exists: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM quotes WHERE id = ?1 AND author = ?2)",
            )
            .bind(quote.quote_id)
            .bind(quote.author)
            .fetch_one(pool)
            .await?;
            checks.push((quote.quote_id.to_string(), exists == 1));

            let sources: i64 =
                sqlx::query_scalar("SELECT COUNT(1) FROM original_sources WHERE quote_id = ?1")
                    .bind(quote.quote_id)
                    .fetch_one(pool)
                    .await?;
            checks.push((format!("{}:source", quote.quote_id), (sources == 1) == quote.has_source));

            let languages: Vec<String> = sqlx::query_scalar(
                "SELECT language FROM translations WHERE quote_id = ?1 ORDER BY language",
            )
            .bind(quote.quote_id)
            .fetch_all(pool)
            .await?;
            checks.push((
                format!("{}:translations", quote.quote_id),
                languages.iter().map(String::as_str).eq(quote.translation_languages.iter().copied()),
            ));

            let cited: i64 =
                sqlx::query_scalar("SELECT COUNT(1) FROM cited_by WHERE quote_id = ?1")
                    .bind(quote.quote_id)
                    .fetch_one(pool)
                    .await?;
            checks.push((format!("{}:cited-by", quote.quote_id), cited == quote.cited_by_count));
        }

        checks.push(("users".to_string(), count_ids(pool, "users", SEED_USER_IDS).await?));
        let super_admin: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM user_roles WHERE user_id = ?1 AND role = 'super_admin')",
        )
        .bind(SEED_SUPER_ADMIN)
        .fetch_one(pool)
        .await?;
        checks.push(("super-admin".to_string(), super_admin == 1));

        checks.push((
            "submissions".to_string(),
            count_ids(pool, "quote_submissions", SEED_SUBMISSION_IDS).await?,
        ));
        checks.push(("articles".to_string(), count_ids(pool, "cms_articles", SEED_ARTICLE_IDS).await?));
        checks.push(("pages".to_string(), count_ids(pool, "cms_pages", SEED_PAGE_IDS).await?));

        let all_present = checks.iter().all(|(_, ok)| *ok);
        Ok(VerificationResult { all_present, checks })
    }

    /// Removes seeded rows. Children go with their quotes through cascades.
    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let mut tx = pool.begin().await?;

        let quote_ids: Vec<&str> = SEED_QUOTES.iter().map(|quote| quote.quote_id).collect();
        for (table, ids) in [
            ("quote_submissions", SEED_SUBMISSION_IDS),
            ("cms_articles", SEED_ARTICLE_IDS),
            ("cms_pages", SEED_PAGE_IDS),
            ("quotes", quote_ids.as_slice()),
            ("users", SEED_USER_IDS),
        ] {
            sqlx::query(&format!("DELETE FROM {table} WHERE id IN {}", sql_array_from_ids(ids)))
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

async fn count_ids(pool: &DbPool, table: &str, ids: &[&str]) -> Result<bool, RepositoryError> {
    let count: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(1) FROM {table} WHERE id IN {}",
        sql_array_from_ids(ids)
    ))
    .fetch_one(pool)
    .await?;
    Ok(count == ids.len() as i64)
}

#[derive(Debug, Clone, Copy)]
struct SeedQuoteContract {
    quote_id: &'static str,
    author: &'static str,
    has_source: bool,
    translation_languages: &'static [&'static str],
    cited_by_count: i64,
}

fn sql_array_from_ids(ids: &[&str]) -> String {
    let quoted = ids.iter().map(|id| format!("'{id}'")).collect::<Vec<_>>().join(",");
    format!("({quoted})")
}

#[derive(Debug, Serialize)]
pub struct SeedResult {
    pub quotes_seeded: Vec<&'static str>,
    pub super_admin: &'static str,
}

#[derive(Debug, Serialize)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(String, bool)>,
}
