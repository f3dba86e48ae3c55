//! JSON resource API over the quote archive.
//!
//! - `GET    /quotes-api/quotes`               list with `search`, `author`, `limit`, `offset`
//! - `GET    /quotes-api/quotes/{id}`          detail with source, translations and citations
//! - `GET    /quotes-api/quotes/{id}/cite`     formatted citation, `?style=apa|mla|chicago|plain`
//! - `POST   /quotes-api/quotes`               moderator+
//! - `PUT    /quotes-api/quotes/{id}`          admin+
//! - `DELETE /quotes-api/quotes/{id}`          admin+
//! - `GET|POST /quotes-api/original_sources`, `/translations`, `/cited_by`

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use citequotes_core::citation::{format_citation, CitationStyle};
use citequotes_core::domain::quote::{
    CitedBy, NewCitedBy, NewOriginalSource, NewQuote, NewTranslation, OriginalSource, Quote,
    QuoteDetail, QuoteId, Translation,
};
use citequotes_core::domain::role::Privilege;
use citequotes_db::repositories::QuoteQuery;

use crate::auth::{AuthUser, RateBucket};
use crate::error::{ApiError, ApiJson, ApiResult};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/quotes-api/quotes", get(list_quotes).post(create_quote))
        .route(
            "/quotes-api/quotes/{id}",
            get(get_quote).put(update_quote).delete(delete_quote),
        )
        .route("/quotes-api/quotes/{id}/cite", get(cite_quote))
        .route("/quotes-api/original_sources", get(list_sources).post(create_source))
        .route("/quotes-api/translations", get(list_translations).post(create_translation))
        .route("/quotes-api/cited_by", get(list_cited_by).post(create_cited_by))
        .route("/quotes-api/{*resource}", axum::routing::any(unknown_resource))
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub search: Option<String>,
    pub author: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct QuoteList {
    pub quotes: Vec<Quote>,
    pub total: i64,
    pub limit: u32,
    pub offset: u32,
}

#[derive(Debug, Default, Deserialize)]
pub struct QuoteFilter {
    pub quote_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CiteQuery {
    pub style: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CitationResponse {
    pub quote_id: QuoteId,
    pub style: &'static str,
    pub citation: String,
}

async fn list_quotes(
    State(state): State<AppState>,
    Query(params): Query<ListQuery>,
) -> ApiResult<QuoteList> {
    let query = QuoteQuery {
        search: params.search,
        author: params.author,
        limit: params.limit.unwrap_or(0),
        offset: params.offset.unwrap_or(0),
    };
    let quotes = state.quotes.list(&query).await?;
    let total = state.quotes.count(&query).await?;
    Ok(Json(QuoteList { quotes, total, limit: query.normalized_limit(), offset: query.offset }))
}

async fn get_quote(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<QuoteDetail> {
    state
        .quotes
        .detail(&QuoteId(id.clone()))
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("quote `{id}` was not found")))
}

async fn cite_quote(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<CiteQuery>,
) -> ApiResult<CitationResponse> {
    let style = match params.style.as_deref() {
        Some(raw) => CitationStyle::parse(raw)?,
        None => CitationStyle::default(),
    };
    let detail = state
        .quotes
        .detail(&QuoteId(id.clone()))
        .await?
        .ok_or_else(|| ApiError::not_found(format!("quote `{id}` was not found")))?;

    Ok(Json(CitationResponse {
        citation: format_citation(&detail, style),
        quote_id: detail.quote.id,
        style: style.as_str(),
    }))
}

async fn create_quote(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(input): ApiJson<NewQuote>,
) -> Result<(StatusCode, Json<Quote>), ApiError> {
    user.require(Privilege::Moderator)?;
    state.limiter.check(RateBucket::ApiWrite, &user.id).await?;

    let quote = state.quotes.create(input.validate()?, Some(&user.id.0)).await?;
    info!(
        event_name = "quotes.quote.created",
        quote_id = %quote.id.0,
        user_id = %user.id.0,
        "quote created"
    );
    state.record(&user.id.0, "quote.create", "quote", Some(&quote.id.0), json!({})).await;
    Ok((StatusCode::CREATED, Json(quote)))
}

async fn update_quote(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    ApiJson(input): ApiJson<NewQuote>,
) -> ApiResult<Quote> {
    user.require(Privilege::Admin)?;
    state.limiter.check(RateBucket::ApiWrite, &user.id).await?;

    let quote = state.quotes.update(&QuoteId(id), input.validate()?).await?;
    info!(event_name = "quotes.quote.updated", quote_id = %quote.id.0, "quote updated");
    state.record(&user.id.0, "quote.update", "quote", Some(&quote.id.0), json!({})).await;
    Ok(Json(quote))
}

async fn delete_quote(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<serde_json::Value> {
    user.require(Privilege::Admin)?;
    state.limiter.check(RateBucket::ApiWrite, &user.id).await?;

    state.quotes.delete(&QuoteId(id.clone())).await?;
    info!(event_name = "quotes.quote.deleted", quote_id = %id, "quote deleted");
    state.record(&user.id.0, "quote.delete", "quote", Some(&id), json!({})).await;
    Ok(Json(json!({ "deleted": id })))
}

fn filter_id(filter: &QuoteFilter) -> Option<QuoteId> {
    filter.quote_id.as_deref().map(str::trim).filter(|id| !id.is_empty()).map(|id| QuoteId(id.to_string()))
}

async fn list_sources(
    State(state): State<AppState>,
    Query(filter): Query<QuoteFilter>,
) -> ApiResult<Vec<OriginalSource>> {
    Ok(Json(state.quotes.list_sources(filter_id(&filter).as_ref()).await?))
}

async fn create_source(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(input): ApiJson<NewOriginalSource>,
) -> Result<(StatusCode, Json<OriginalSource>), ApiError> {
    user.require(Privilege::Moderator)?;
    state.limiter.check(RateBucket::ApiWrite, &user.id).await?;

    let source = state.quotes.create_source(input.validate()?).await?;
    info!(
        event_name = "quotes.source.created",
        quote_id = %source.quote_id.0,
        source_id = %source.id,
        "original source created"
    );
    state
        .record(&user.id.0, "source.create", "original_source", Some(&source.id), json!({
            "quote_id": source.quote_id,
        }))
        .await;
    Ok((StatusCode::CREATED, Json(source)))
}

async fn list_translations(
    State(state): State<AppState>,
    Query(filter): Query<QuoteFilter>,
) -> ApiResult<Vec<Translation>> {
    Ok(Json(state.quotes.list_translations(filter_id(&filter).as_ref()).await?))
}

async fn create_translation(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(input): ApiJson<NewTranslation>,
) -> Result<(StatusCode, Json<Translation>), ApiError> {
    user.require(Privilege::Moderator)?;
    state.limiter.check(RateBucket::ApiWrite, &user.id).await?;

    let translation = state.quotes.create_translation(input.validate()?).await?;
    info!(
        event_name = "quotes.translation.created",
        quote_id = %translation.quote_id.0,
        language = %translation.language,
        "translation created"
    );
    state
        .record(&user.id.0, "translation.create", "translation", Some(&translation.id), json!({
            "quote_id": translation.quote_id,
            "language": translation.language,
        }))
        .await;
    Ok((StatusCode::CREATED, Json(translation)))
}

async fn list_cited_by(
    State(state): State<AppState>,
    Query(filter): Query<QuoteFilter>,
) -> ApiResult<Vec<CitedBy>> {
    Ok(Json(state.quotes.list_cited_by(filter_id(&filter).as_ref()).await?))
}

async fn create_cited_by(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(input): ApiJson<NewCitedBy>,
) -> Result<(StatusCode, Json<CitedBy>), ApiError> {
    user.require(Privilege::Moderator)?;
    state.limiter.check(RateBucket::ApiWrite, &user.id).await?;

    let cited = state.quotes.create_cited_by(input.validate()?).await?;
    info!(event_name = "quotes.cited_by.created", quote_id = %cited.quote_id.0, "citation added");
    state.record(&user.id.0, "cited_by.create", "cited_by", Some(&cited.id), json!({})).await;
    Ok((StatusCode::CREATED, Json(cited)))
}

async fn unknown_resource(Path(resource): Path<String>) -> ApiError {
    ApiError::not_found(format!("unknown resource `{resource}`"))
}
