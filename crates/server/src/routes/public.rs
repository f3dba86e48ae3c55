//! Server-rendered public pages.
//!
//! HTML Endpoints:
//! - `GET /`            quote index with search and author filter
//! - `GET /quote/{id}`  quote detail with sources, translations and citations
//! - `GET /glossary`    CSV import format and privilege levels

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Html,
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use tera::{Context, Tera};
use tracing::{error, warn};

use citequotes_core::citation::{format_citation, CitationStyle};
use citequotes_core::domain::quote::QuoteId;
use citequotes_core::domain::role::Privilege;
use citequotes_core::import::Field;
use citequotes_db::repositories::QuoteQuery;

use crate::state::AppState;

type PageResult = Result<Html<String>, (StatusCode, Html<String>)>;

const PAGE_SIZE: u32 = 25;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index_page))
        .route("/quote/{id}", get(quote_page))
        .route("/glossary", get(glossary_page))
}

/// Loads templates from `templates/public`, falling back to the copies built into the binary.
pub fn init_templates() -> Arc<Tera> {
    let mut tera = match Tera::new("templates/public/**/*.html") {
        Ok(tera) => tera,
        Err(e) => {
            warn!(error = %e, "failed to load public templates from filesystem, using built-in copies");
            Tera::default()
        }
    };

    let builtin = [
        ("base.html", include_str!("../../../../templates/public/base.html")),
        ("index.html", include_str!("../../../../templates/public/index.html")),
        ("quote.html", include_str!("../../../../templates/public/quote.html")),
        ("glossary.html", include_str!("../../../../templates/public/glossary.html")),
    ];
    let missing: Vec<(&str, &str)> = builtin
        .into_iter()
        .filter(|(name, _)| !tera.get_template_names().any(|known| known == *name))
        .collect();
    if let Err(e) = tera.add_raw_templates(missing) {
        error!(error = %e, "built-in public templates failed to parse");
    }

    Arc::new(tera)
}

#[derive(Debug, Default, Deserialize)]
pub struct IndexQuery {
    pub search: Option<String>,
    pub author: Option<String>,
    pub page: Option<u32>,
}

#[derive(Debug, Serialize)]
struct GlossaryField {
    name: &'static str,
    aliases: Vec<&'static str>,
    array: bool,
    required: bool,
}

fn render(templates: &Tera, name: &str, context: &Context) -> PageResult {
    templates.render(name, context).map(Html).map_err(|e| {
        error!(event_name = "public.render_failed", template = name, error = ?e, "template render failed");
        (StatusCode::INTERNAL_SERVER_ERROR, Html("<h1>Template Error</h1>".to_string()))
    })
}

fn database_error(e: impl std::fmt::Display) -> (StatusCode, Html<String>) {
    error!(event_name = "public.query_failed", error = %e, "page query failed");
    (StatusCode::INTERNAL_SERVER_ERROR, Html("<h1>Database Error</h1>".to_string()))
}

async fn index_page(State(state): State<AppState>, Query(query): Query<IndexQuery>) -> PageResult {
    let search = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let author = query.author.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let page = query.page.unwrap_or(1).max(1);

    let quote_query = QuoteQuery {
        search: search.map(str::to_string),
        author: author.map(str::to_string),
        limit: PAGE_SIZE,
        offset: (page - 1) * PAGE_SIZE,
    };
    let quotes = state.quotes.list(&quote_query).await.map_err(database_error)?;
    let total = state.quotes.count(&quote_query).await.map_err(database_error)?;
    let has_next = i64::from(page * PAGE_SIZE) < total;

    let mut context = Context::new();
    context.insert("quotes", &quotes);
    context.insert("total", &total);
    context.insert("search", search.unwrap_or(""));
    context.insert("author", author.unwrap_or(""));
    context.insert("page", &page);
    context.insert("has_next", &has_next);
    render(&state.templates, "index.html", &context)
}

async fn quote_page(State(state): State<AppState>, Path(id): Path<String>) -> PageResult {
    let Some(detail) = state.quotes.detail(&QuoteId(id)).await.map_err(database_error)? else {
        return Err((StatusCode::NOT_FOUND, Html("<h1>Quote not found</h1>".to_string())));
    };

    let citations: Vec<(&str, String)> = CitationStyle::ALL
        .iter()
        .map(|style| (style.as_str(), format_citation(&detail, *style)))
        .collect();

    let mut context = Context::new();
    context.insert("detail", &detail);
    context.insert("citations", &citations);
    render(&state.templates, "quote.html", &context)
}

async fn glossary_page(State(state): State<AppState>) -> PageResult {
    let fields: Vec<GlossaryField> = Field::all()
        .map(|field| GlossaryField {
            name: field.canonical(),
            aliases: field.aliases().iter().copied().filter(|a| *a != field.canonical()).collect(),
            array: field.is_array(),
            required: matches!(field, Field::QuoteText | Field::Author),
        })
        .collect();
    let roles: Vec<&str> = Privilege::ALL.iter().map(Privilege::as_str).collect();

    let mut context = Context::new();
    context.insert("fields", &fields);
    context.insert("roles", &roles);
    context.insert("max_rows", &state.import_limits.max_rows);
    render(&state.templates, "glossary.html", &context)
}
