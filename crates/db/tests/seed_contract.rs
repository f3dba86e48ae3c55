use serde::Deserialize;
use std::collections::HashSet;

type SeedContractTestResult<T = ()> = Result<T, String>;

macro_rules! require {
    ($cond:expr) => {
        if !$cond {
            return Err(format!("assertion failed: `{}`", stringify!($cond)));
        }
    };
    ($cond:expr, $($arg:tt)*) => {
        if !$cond {
            return Err(format!($($arg)*));
        }
    };
}

macro_rules! require_eq {
    ($left:expr, $right:expr) => {
        if ($left) != ($right) {
            return Err(format!(
                "assertion failed: `left == right` (`{:?}` != `{:?}`)",
                $left,
                $right
            ));
        }
    };
}

#[derive(Debug, Deserialize)]
struct SuperAdmin {
    user_id: String,
    email: String,
}

#[derive(Debug, Deserialize)]
struct SeedQuote {
    quote_id: String,
    author: String,
    has_source: bool,
    translation_languages: Vec<String>,
    cited_by_count: u32,
}

#[derive(Debug, Deserialize)]
struct SeedContract {
    dataset_version: String,
    seed_dataset: String,
    super_admin: SuperAdmin,
    quotes: Vec<SeedQuote>,
    pending_submissions: Vec<String>,
    published_articles: Vec<String>,
    published_pages: Vec<String>,
}

fn fixture_sql() -> &'static str {
    include_str!("../../../config/fixtures/seed_data.sql")
}

fn contract() -> SeedContractTestResult<SeedContract> {
    serde_json::from_str(include_str!("../../../config/fixtures/seed_contract.json"))
        .map_err(|error| format!("seed contract JSON must parse: {error}"))
}

#[test]
fn seed_contract_matches_seed_sql_fixture() -> SeedContractTestResult {
    let sql = fixture_sql();
    let contract = contract()?;
    let mut seen = HashSet::new();

    require_eq!(contract.dataset_version, "2026.1");
    require_eq!(contract.seed_dataset, "deterministic_citequotes_core");
    require_eq!(contract.quotes.len(), 3);

    for quote in &contract.quotes {
        require!(seen.insert(quote.quote_id.clone()), "duplicate quote id: {}", quote.quote_id);
        require!(
            sql.contains(&format!("('{}'", quote.quote_id)),
            "seed SQL should insert quote {}",
            quote.quote_id
        );
        require!(
            sql.contains(&format!("'{}'", quote.author)),
            "seed SQL should name author {}",
            quote.author
        );

        let source_marker = format!("'quote-seed-{}', ", &quote.quote_id["quote-seed-".len()..]);
        let source_rows = sql
            .lines()
            .filter(|line| line.contains("'source-seed-") && line.contains(&source_marker))
            .count();
        require_eq!(source_rows == 1, quote.has_source);

        for language in &quote.translation_languages {
            require!(
                sql.contains(&format!("'{}', '{}',", quote.quote_id, language)),
                "seed SQL should translate {} into {}",
                quote.quote_id,
                language
            );
        }
        if quote.cited_by_count > 0 {
            require!(sql.contains(&format!("'cited-seed-{}'", &quote.quote_id["quote-seed-".len()..])));
        }
    }

    require!(sql.contains(&format!("'{}', 'super_admin'", contract.super_admin.user_id)));
    require!(sql.contains(&format!("'{}'", contract.super_admin.email)));
    Ok(())
}

#[test]
fn seed_sql_is_rerunnable_and_published_content_is_public() -> SeedContractTestResult {
    let sql = fixture_sql();
    let contract = contract()?;

    for statement in sql.split(';').map(str::trim).filter(|s| !s.is_empty()) {
        let body: String = statement
            .lines()
            .filter(|line| !line.trim_start().starts_with("--"))
            .collect::<Vec<_>>()
            .join("\n");
        if body.trim().is_empty() {
            continue;
        }
        require!(
            body.trim_start().starts_with("INSERT OR IGNORE"),
            "every seed statement must be INSERT OR IGNORE: {}",
            body.lines().next().unwrap_or_default()
        );
    }

    for id in &contract.pending_submissions {
        require!(sql.contains(&format!("('{id}'")), "missing submission {id}");
    }
    for slug in contract.published_articles.iter().chain(&contract.published_pages) {
        require!(sql.contains(&format!("'{slug}'")), "missing published slug {slug}");
    }
    require!(sql.matches("'published'").count() >= 2);
    Ok(())
}
