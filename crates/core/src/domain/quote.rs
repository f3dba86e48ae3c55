use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;
use crate::validation::{
    optional, optional_url, required, MAX_LONG_FIELD_LEN, MAX_QUOTE_TEXT_LEN,
    MAX_SHORT_FIELD_LEN,
};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuoteId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub id: QuoteId,
    pub quote_text: String,
    pub author: String,
    pub quote_date: Option<String>,
    pub context: Option<String>,
    pub citation: Option<String>,
    pub tags: Vec<String>,
    pub evidence_image_urls: Vec<String>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginalSource {
    pub id: String,
    pub quote_id: QuoteId,
    pub title: String,
    pub author: Option<String>,
    pub publisher: Option<String>,
    pub publication_date: Option<String>,
    pub location: Option<String>,
    pub url: Option<String>,
    pub source_type: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Translation {
    pub id: String,
    pub quote_id: QuoteId,
    pub language: String,
    pub translated_text: String,
    pub translator: Option<String>,
    pub source_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitedBy {
    pub id: String,
    pub quote_id: QuoteId,
    pub title: String,
    pub author: Option<String>,
    pub year: Option<String>,
    pub url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A quote with everything hanging off it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteDetail {
    #[serde(flatten)]
    pub quote: Quote,
    pub original_source: Option<OriginalSource>,
    pub translations: Vec<Translation>,
    pub cited_by: Vec<CitedBy>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewQuote {
    pub quote_text: String,
    pub author: String,
    pub quote_date: Option<String>,
    pub context: Option<String>,
    pub citation: Option<String>,
    pub tags: Vec<String>,
    pub evidence_image_urls: Vec<String>,
}

impl NewQuote {
    pub fn validate(self) -> Result<Self, DomainError> {
        Ok(Self {
            quote_text: required("quote_text", &self.quote_text, MAX_QUOTE_TEXT_LEN)?,
            author: required("author", &self.author, MAX_SHORT_FIELD_LEN)?,
            quote_date: optional("quote_date", self.quote_date.as_deref(), MAX_SHORT_FIELD_LEN)?,
            context: optional("context", self.context.as_deref(), MAX_LONG_FIELD_LEN)?,
            citation: optional("citation", self.citation.as_deref(), MAX_LONG_FIELD_LEN)?,
            tags: normalize_tags(self.tags),
            evidence_image_urls: validate_urls("evidence_image_urls", self.evidence_image_urls)?,
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewOriginalSource {
    pub quote_id: String,
    pub title: String,
    pub author: Option<String>,
    pub publisher: Option<String>,
    pub publication_date: Option<String>,
    pub location: Option<String>,
    pub url: Option<String>,
    pub source_type: Option<String>,
}

impl NewOriginalSource {
    pub fn validate(self) -> Result<Self, DomainError> {
        Ok(Self {
            quote_id: required("quote_id", &self.quote_id, MAX_SHORT_FIELD_LEN)?,
            title: required("title", &self.title, MAX_SHORT_FIELD_LEN)?,
            author: optional("author", self.author.as_deref(), MAX_SHORT_FIELD_LEN)?,
            publisher: optional("publisher", self.publisher.as_deref(), MAX_SHORT_FIELD_LEN)?,
            publication_date: optional(
                "publication_date",
                self.publication_date.as_deref(),
                MAX_SHORT_FIELD_LEN,
            )?,
            location: optional("location", self.location.as_deref(), MAX_SHORT_FIELD_LEN)?,
            url: optional_url("url", self.url.as_deref())?,
            source_type: optional(
                "source_type",
                self.source_type.as_deref(),
                MAX_SHORT_FIELD_LEN,
            )?,
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewTranslation {
    pub quote_id: String,
    pub language: String,
    pub translated_text: String,
    pub translator: Option<String>,
    pub source_url: Option<String>,
}

impl NewTranslation {
    pub fn validate(self) -> Result<Self, DomainError> {
        Ok(Self {
            quote_id: required("quote_id", &self.quote_id, MAX_SHORT_FIELD_LEN)?,
            language: required("language", &self.language, 64)?,
            translated_text: required(
                "translated_text",
                &self.translated_text,
                MAX_QUOTE_TEXT_LEN,
            )?,
            translator: optional("translator", self.translator.as_deref(), MAX_SHORT_FIELD_LEN)?,
            source_url: optional_url("source_url", self.source_url.as_deref())?,
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewCitedBy {
    pub quote_id: String,
    pub title: String,
    pub author: Option<String>,
    pub year: Option<String>,
    pub url: Option<String>,
}

impl NewCitedBy {
    pub fn validate(self) -> Result<Self, DomainError> {
        Ok(Self {
            quote_id: required("quote_id", &self.quote_id, MAX_SHORT_FIELD_LEN)?,
            title: required("title", &self.title, MAX_SHORT_FIELD_LEN)?,
            author: optional("author", self.author.as_deref(), MAX_SHORT_FIELD_LEN)?,
            year: optional("year", self.year.as_deref(), 32)?,
            url: optional_url("url", self.url.as_deref())?,
        })
    }
}

pub fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim().to_lowercase();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

pub fn validate_urls(field: &str, urls: Vec<String>) -> Result<Vec<String>, DomainError> {
    urls.into_iter()
        .filter_map(|url| {
            let trimmed = url.trim().to_string();
            (!trimmed.is_empty()).then_some(trimmed)
        })
        .map(|url| crate::validation::url_like(field, &url).map(|()| url))
        .collect()
}
