use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;
use crate::validation::{
    optional, required, slugify, url_like, MAX_LONG_FIELD_LEN, MAX_SHORT_FIELD_LEN,
};

const MAX_BODY_LEN: usize = 200_000;
const MAX_COMMENT_LEN: usize = 4_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentStatus {
    Draft,
    Published,
    Archived,
}

impl ContentStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "draft" => Some(Self::Draft),
            "published" => Some(Self::Published),
            "archived" => Some(Self::Archived),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
            Self::Archived => "archived",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentStatus {
    Pending,
    Approved,
    Rejected,
}

impl CommentStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

/// Articles and pages share one shape; `kind` tells them apart in storage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Article,
    Page,
}

impl ContentKind {
    pub fn table(&self) -> &'static str {
        match self {
            Self::Article => "cms_articles",
            Self::Page => "cms_pages",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Article => "article",
            Self::Page => "page",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentEntry {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub body: String,
    pub status: ContentStatus,
    pub author_id: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentInput {
    pub title: String,
    pub slug: Option<String>,
    pub excerpt: Option<String>,
    pub body: String,
}

impl ContentInput {
    pub fn validate(self) -> Result<Self, DomainError> {
        let title = required("title", &self.title, MAX_SHORT_FIELD_LEN)?;
        let slug = match self.slug.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => slugify(raw),
            None => slugify(&title),
        };
        if slug.is_empty() {
            return Err(DomainError::validation("slug must contain letters or digits"));
        }
        Ok(Self {
            title,
            slug: Some(slug),
            excerpt: optional("excerpt", self.excerpt.as_deref(), MAX_LONG_FIELD_LEN)?,
            body: required("body", &self.body, MAX_BODY_LEN)?,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Media {
    pub id: String,
    pub file_name: String,
    pub url: String,
    pub mime_type: Option<String>,
    pub size_bytes: Option<i64>,
    pub alt_text: Option<String>,
    pub uploaded_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaInput {
    pub file_name: String,
    pub url: String,
    pub mime_type: Option<String>,
    pub size_bytes: Option<i64>,
    pub alt_text: Option<String>,
}

impl MediaInput {
    pub fn validate(self) -> Result<Self, DomainError> {
        let url = required("url", &self.url, crate::validation::MAX_URL_LEN)?;
        url_like("url", &url)?;
        if self.size_bytes.is_some_and(|size| size < 0) {
            return Err(DomainError::validation("size_bytes must not be negative"));
        }
        Ok(Self {
            file_name: required("file_name", &self.file_name, MAX_SHORT_FIELD_LEN)?,
            url,
            mime_type: optional("mime_type", self.mime_type.as_deref(), 128)?,
            size_bytes: self.size_bytes,
            alt_text: optional("alt_text", self.alt_text.as_deref(), MAX_SHORT_FIELD_LEN)?,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub article_id: String,
    pub author_name: String,
    pub author_id: Option<String>,
    pub body: String,
    pub status: CommentStatus,
    pub created_at: DateTime<Utc>,
    pub moderated_by: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommentInput {
    pub author_name: String,
    pub body: String,
}

impl CommentInput {
    pub fn validate(self) -> Result<Self, DomainError> {
        Ok(Self {
            author_name: required("author_name", &self.author_name, 120)?,
            body: required("body", &self.body, MAX_COMMENT_LEN)?,
        })
    }
}
