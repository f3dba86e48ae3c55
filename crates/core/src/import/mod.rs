//! Bulk quote import and export.
//!
//! Both importers produce [`SubmissionForm`]s through the same column catalog,
//! so a CSV header and a Markdown `- Key: value` line accept identical names.
//! Array-valued fields (`tags`, `evidence_image_urls`, `translations`) are
//! separated by `;`; a literal semicolon inside an item is written `\;`.

pub mod csv;
pub mod markdown;

use serde::Serialize;
use thiserror::Error;

use crate::domain::submission::{SubmissionForm, TranslationForm};
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImportLimits {
    pub max_rows: usize,
    pub max_bytes: usize,
}

impl Default for ImportLimits {
    fn default() -> Self {
        Self { max_rows: 1_000, max_bytes: 2 * 1024 * 1024 }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ImportedRow {
    pub line: usize,
    pub form: SubmissionForm,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RejectedRow {
    pub line: usize,
    pub reason: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub accepted: Vec<ImportedRow>,
    pub rejected: Vec<RejectedRow>,
    pub warnings: Vec<String>,
}

impl ImportReport {
    fn push_row(&mut self, line: usize, form: SubmissionForm) {
        match form.validate() {
            Ok(form) => self.accepted.push(ImportedRow { line, form }),
            Err(error) => self.rejected.push(RejectedRow { line, reason: reason_of(error) }),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ImportError {
    #[error("import is {actual} bytes, limit is {limit}")]
    TooLarge { actual: usize, limit: usize },
    #[error("import has more than {limit} rows")]
    TooManyRows { limit: usize },
    #[error("missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
    #[error("malformed document: {0}")]
    Malformed(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Field {
    QuoteText,
    Author,
    QuoteDate,
    Context,
    Citation,
    SourceTitle,
    SourceAuthor,
    SourcePublisher,
    SourceDate,
    SourceUrl,
    Translations,
    Tags,
    EvidenceImageUrls,
}

const FIELD_CATALOG: &[(Field, &str, &[&str])] = &[
    (Field::QuoteText, "quote_text", &["quote", "text", "quote_text", "quotation"]),
    (Field::Author, "author", &["author", "speaker", "attributed_to", "by"]),
    (Field::QuoteDate, "quote_date", &["date", "quote_date", "year", "date_original"]),
    (Field::Context, "context", &["context", "notes", "background"]),
    (Field::Citation, "citation", &["citation", "reference", "cite"]),
    (Field::SourceTitle, "source_title", &["source", "source_title", "work", "book", "title"]),
    (Field::SourceAuthor, "source_author", &["source_author", "editor"]),
    (Field::SourcePublisher, "source_publisher", &["publisher", "source_publisher"]),
    (Field::SourceDate, "source_date", &["source_date", "publication_date", "published"]),
    (Field::SourceUrl, "source_url", &["source_url", "url", "link"]),
    (Field::Translations, "translations", &["translations", "translation"]),
    (Field::Tags, "tags", &["tags", "tag", "keywords", "categories"]),
    (
        Field::EvidenceImageUrls,
        "evidence_image_urls",
        &["evidence_image_urls", "evidence", "images", "evidence_images", "image_urls"],
    ),
];

impl Field {
    /// Resolves a user-supplied column name (`Quote Text`, `source-url`, ...).
    pub fn resolve(raw: &str) -> Option<Self> {
        let key = normalize_key(raw);
        FIELD_CATALOG
            .iter()
            .find(|(_, _, aliases)| aliases.iter().any(|alias| *alias == key))
            .map(|(field, _, _)| *field)
    }

    pub fn canonical(&self) -> &'static str {
        FIELD_CATALOG
            .iter()
            .find(|(field, _, _)| field == self)
            .map(|(_, name, _)| *name)
            .unwrap_or("unknown")
    }

    /// Every accepted spelling, canonical name included. Used by the glossary page.
    pub fn aliases(&self) -> &'static [&'static str] {
        FIELD_CATALOG
            .iter()
            .find(|(field, _, _)| field == self)
            .map(|(_, _, aliases)| *aliases)
            .unwrap_or(&[])
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Self::Translations | Self::Tags | Self::EvidenceImageUrls)
    }

    pub fn all() -> impl Iterator<Item = Field> {
        FIELD_CATALOG.iter().map(|(field, _, _)| *field)
    }
}

fn normalize_key(raw: &str) -> String {
    raw.trim()
        .trim_start_matches('\u{feff}')
        .to_ascii_lowercase()
        .chars()
        .map(|ch| if ch == ' ' || ch == '-' || ch == '.' { '_' } else { ch })
        .collect()
}

/// Writes one raw value into the form. Blank values leave the field untouched.
pub fn apply_field(form: &mut SubmissionForm, field: Field, raw: &str) -> Result<(), DomainError> {
    let value = raw.trim();
    if value.is_empty() {
        return Ok(());
    }
    let owned = Some(value.to_string());
    match field {
        Field::QuoteText => form.quote_text = value.to_string(),
        Field::Author => form.author = value.to_string(),
        Field::QuoteDate => form.quote_date = owned,
        Field::Context => form.context = owned,
        Field::Citation => form.citation = owned,
        Field::SourceTitle => form.source_title = owned,
        Field::SourceAuthor => form.source_author = owned,
        Field::SourcePublisher => form.source_publisher = owned,
        Field::SourceDate => form.source_date = owned,
        Field::SourceUrl => form.source_url = owned,
        Field::Tags => form.tags.extend(split_array(value)),
        Field::EvidenceImageUrls => form.evidence_image_urls.extend(split_array(value)),
        Field::Translations => {
            for entry in split_array(value) {
                let (language, text) = entry.split_once(':').ok_or_else(|| {
                    DomainError::validation(format!(
                        "translation `{entry}` must be written as language:text"
                    ))
                })?;
                form.translations.push(TranslationForm {
                    language: language.trim().to_string(),
                    translated_text: text.trim().to_string(),
                    translator: None,
                });
            }
        }
    }
    Ok(())
}

/// Splits on `;`, honoring `\;` and `\\` escapes. Empty items are dropped.
pub fn split_array(raw: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut chars = raw.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' if matches!(chars.peek(), Some(';' | '\\')) => {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            ';' => items.push(std::mem::take(&mut current)),
            other => current.push(other),
        }
    }
    items.push(current);
    items.into_iter().map(|item| item.trim().to_string()).filter(|item| !item.is_empty()).collect()
}

pub fn join_array<I, S>(items: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    items
        .into_iter()
        .map(|item| item.as_ref().replace('\\', "\\\\").replace(';', "\\;"))
        .collect::<Vec<_>>()
        .join(";")
}

fn reason_of(error: DomainError) -> String {
    match error {
        DomainError::Validation(message) => message,
        other => other.to_string(),
    }
}

fn check_size(input: &str, limits: &ImportLimits) -> Result<(), ImportError> {
    if input.len() > limits.max_bytes {
        return Err(ImportError::TooLarge { actual: input.len(), limit: limits.max_bytes });
    }
    Ok(())
}
