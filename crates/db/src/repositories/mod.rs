use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use thiserror::Error;

use citequotes_core::captcha::Challenge;
use citequotes_core::domain::activity::ActivityEntry;
use citequotes_core::domain::cms::{
    Comment, CommentInput, CommentStatus, ContentEntry, ContentInput, ContentKind, ContentStatus,
    Media, MediaInput,
};
use citequotes_core::domain::draft::{DraftId, DraftInput, QuoteDraft};
use citequotes_core::domain::quote::{
    CitedBy, NewCitedBy, NewOriginalSource, NewQuote, NewTranslation, OriginalSource, Quote,
    QuoteDetail, QuoteId, Translation,
};
use citequotes_core::domain::role::{Privilege, User, UserId, UserRole};
use citequotes_core::domain::submission::{
    QuoteSubmission, SubmissionForm, SubmissionId, SubmissionOrigin, SubmissionStatus,
};
use citequotes_core::duplicates::DuplicateGroup;
use citequotes_core::errors::DomainError;

pub mod activity;
pub mod captcha;
pub mod cms;
pub mod draft;
pub mod memory;
pub mod quote;
pub mod role;
pub mod submission;
pub mod user;

pub use activity::SqlActivityRepository;
pub use captcha::SqlCaptchaRepository;
pub use cms::SqlCmsRepository;
pub use draft::SqlDraftRepository;
pub use memory::{InMemoryDraftRepository, InMemoryRoleRepository};
pub use quote::SqlQuoteRepository;
pub use role::SqlRoleRepository;
pub use submission::SqlSubmissionRepository;
pub use user::{IssuedToken, SqlUserRepository};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("{entity} `{id}` was not found")]
    NotFound { entity: &'static str, id: String },
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("{0}")]
    Validation(String),
}

impl RepositoryError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound { entity, id: id.into() }
    }

    /// Turns a unique-constraint violation into `Conflict`, leaving other errors alone.
    pub(crate) fn on_unique(error: sqlx::Error, message: impl Into<String>) -> Self {
        match &error {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Self::Conflict(message.into())
            }
            _ => Self::Database(error),
        }
    }
}

impl From<DomainError> for RepositoryError {
    fn from(error: DomainError) -> Self {
        match error {
            DomainError::NotFound { entity, id } => Self::NotFound { entity, id },
            DomainError::Validation(message) => Self::Validation(message),
            other => Self::Conflict(other.to_string()),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QuoteQuery {
    pub search: Option<String>,
    pub author: Option<String>,
    pub limit: u32,
    pub offset: u32,
}

impl QuoteQuery {
    pub const DEFAULT_LIMIT: u32 = 50;
    pub const MAX_LIMIT: u32 = 200;

    pub fn normalized_limit(&self) -> u32 {
        match self.limit {
            0 => Self::DEFAULT_LIMIT,
            limit => limit.min(Self::MAX_LIMIT),
        }
    }
}

#[async_trait]
pub trait QuoteRepository: Send + Sync {
    async fn list(&self, query: &QuoteQuery) -> Result<Vec<Quote>, RepositoryError>;
    async fn count(&self, query: &QuoteQuery) -> Result<i64, RepositoryError>;
    async fn find_by_id(&self, id: &QuoteId) -> Result<Option<Quote>, RepositoryError>;
    async fn detail(&self, id: &QuoteId) -> Result<Option<QuoteDetail>, RepositoryError>;
    async fn all_details(&self) -> Result<Vec<QuoteDetail>, RepositoryError>;
    async fn create(
        &self,
        input: NewQuote,
        created_by: Option<&str>,
    ) -> Result<Quote, RepositoryError>;
    async fn update(&self, id: &QuoteId, input: NewQuote) -> Result<Quote, RepositoryError>;
    async fn delete(&self, id: &QuoteId) -> Result<(), RepositoryError>;
    async fn texts(&self) -> Result<Vec<(String, String)>, RepositoryError>;

    async fn create_source(
        &self,
        input: NewOriginalSource,
    ) -> Result<OriginalSource, RepositoryError>;
    async fn list_sources(
        &self,
        quote_id: Option<&QuoteId>,
    ) -> Result<Vec<OriginalSource>, RepositoryError>;
    async fn create_translation(
        &self,
        input: NewTranslation,
    ) -> Result<Translation, RepositoryError>;
    async fn list_translations(
        &self,
        quote_id: Option<&QuoteId>,
    ) -> Result<Vec<Translation>, RepositoryError>;
    async fn create_cited_by(&self, input: NewCitedBy) -> Result<CitedBy, RepositoryError>;
    async fn list_cited_by(
        &self,
        quote_id: Option<&QuoteId>,
    ) -> Result<Vec<CitedBy>, RepositoryError>;
}

#[async_trait]
pub trait SubmissionRepository: Send + Sync {
    async fn create(
        &self,
        form: SubmissionForm,
        origin: SubmissionOrigin,
        submitted_by: Option<&str>,
        potential_duplicate_ids: Vec<String>,
    ) -> Result<QuoteSubmission, RepositoryError>;
    async fn find_by_id(
        &self,
        id: &SubmissionId,
    ) -> Result<Option<QuoteSubmission>, RepositoryError>;
    async fn list(
        &self,
        status: Option<SubmissionStatus>,
        limit: u32,
    ) -> Result<Vec<QuoteSubmission>, RepositoryError>;
    async fn list_by_submitter(
        &self,
        submitted_by: &str,
    ) -> Result<Vec<QuoteSubmission>, RepositoryError>;
    async fn pending_texts(&self) -> Result<Vec<(String, String)>, RepositoryError>;
    async fn approve(
        &self,
        id: &SubmissionId,
        reviewer: &str,
        notes: Option<String>,
    ) -> Result<(QuoteSubmission, QuoteDetail), RepositoryError>;
    async fn reject(
        &self,
        id: &SubmissionId,
        reviewer: &str,
        notes: Option<String>,
    ) -> Result<QuoteSubmission, RepositoryError>;
    async fn mark_processed(
        &self,
        id: &SubmissionId,
        reviewer: &str,
        notes: Option<String>,
    ) -> Result<QuoteSubmission, RepositoryError>;
    async fn flagged_duplicates(&self) -> Result<Vec<DuplicateGroup>, RepositoryError>;
}

/// Every method is scoped by `owner`; another user's draft behaves as missing.
#[async_trait]
pub trait DraftRepository: Send + Sync {
    async fn create(&self, owner: &str, input: DraftInput) -> Result<QuoteDraft, RepositoryError>;
    async fn find(&self, owner: &str, id: &DraftId)
        -> Result<Option<QuoteDraft>, RepositoryError>;
    async fn list(&self, owner: &str) -> Result<Vec<QuoteDraft>, RepositoryError>;
    async fn update(
        &self,
        owner: &str,
        id: &DraftId,
        input: DraftInput,
    ) -> Result<QuoteDraft, RepositoryError>;
    async fn delete(&self, owner: &str, id: &DraftId) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait RoleRepository: Send + Sync {
    async fn privilege_of(&self, user_id: &UserId) -> Result<Privilege, RepositoryError>;
    async fn set_role(
        &self,
        user_id: &UserId,
        role: Privilege,
        updated_by: &str,
    ) -> Result<UserRole, RepositoryError>;
    async fn list(&self) -> Result<Vec<UserRole>, RepositoryError>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, RepositoryError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError>;
    async fn ensure(
        &self,
        email: &str,
        display_name: Option<&str>,
    ) -> Result<User, RepositoryError>;
    async fn issue_token(
        &self,
        user_id: &UserId,
        ttl: chrono::Duration,
        label: Option<&str>,
    ) -> Result<IssuedToken, RepositoryError>;
    async fn authenticate(&self, raw_token: &str) -> Result<Option<User>, RepositoryError>;
    async fn revoke_token(&self, raw_token: &str) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait CmsRepository: Send + Sync {
    async fn create_content(
        &self,
        kind: ContentKind,
        input: ContentInput,
        author_id: Option<&str>,
    ) -> Result<ContentEntry, RepositoryError>;
    async fn find_content(
        &self,
        kind: ContentKind,
        id: &str,
    ) -> Result<Option<ContentEntry>, RepositoryError>;
    async fn find_by_slug(
        &self,
        kind: ContentKind,
        slug: &str,
    ) -> Result<Option<ContentEntry>, RepositoryError>;
    async fn list_content(
        &self,
        kind: ContentKind,
        published_only: bool,
    ) -> Result<Vec<ContentEntry>, RepositoryError>;
    async fn update_content(
        &self,
        kind: ContentKind,
        id: &str,
        input: ContentInput,
    ) -> Result<ContentEntry, RepositoryError>;
    async fn set_status(
        &self,
        kind: ContentKind,
        id: &str,
        status: ContentStatus,
    ) -> Result<ContentEntry, RepositoryError>;
    async fn delete_content(&self, kind: ContentKind, id: &str) -> Result<(), RepositoryError>;

    async fn create_media(
        &self,
        input: MediaInput,
        uploaded_by: Option<&str>,
    ) -> Result<Media, RepositoryError>;
    async fn list_media(&self) -> Result<Vec<Media>, RepositoryError>;
    async fn delete_media(&self, id: &str) -> Result<(), RepositoryError>;

    async fn create_comment(
        &self,
        article_id: &str,
        input: CommentInput,
        author_id: Option<&str>,
    ) -> Result<Comment, RepositoryError>;
    async fn list_comments(
        &self,
        status: Option<CommentStatus>,
        article_id: Option<&str>,
    ) -> Result<Vec<Comment>, RepositoryError>;
    async fn moderate_comment(
        &self,
        id: &str,
        status: CommentStatus,
        moderator: &str,
    ) -> Result<Comment, RepositoryError>;
}

#[async_trait]
pub trait ActivityRepository: Send + Sync {
    async fn record(&self, entry: ActivityEntry) -> Result<(), RepositoryError>;
    async fn recent(&self, limit: u32) -> Result<Vec<ActivityEntry>, RepositoryError>;
}

#[async_trait]
pub trait CaptchaRepository: Send + Sync {
    async fn store(&self, challenge: &Challenge) -> Result<(), RepositoryError>;
    /// Removes and returns the challenge so it can only be answered once.
    async fn take(&self, id: &str) -> Result<Option<Challenge>, RepositoryError>;
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, RepositoryError>;
}

pub(crate) fn column<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T, RepositoryError>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(name).map_err(|e| RepositoryError::Decode(format!("{name}: {e}")))
}

pub(crate) fn timestamp(row: &SqliteRow, name: &str) -> Result<DateTime<Utc>, RepositoryError> {
    let raw: String = column(row, name)?;
    parse_timestamp(name, &raw)
}

pub(crate) fn optional_timestamp(
    row: &SqliteRow,
    name: &str,
) -> Result<Option<DateTime<Utc>>, RepositoryError> {
    let raw: Option<String> = column(row, name)?;
    raw.map(|value| parse_timestamp(name, &value)).transpose()
}

fn parse_timestamp(name: &str, raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("{name}: {e}")))
}

pub(crate) fn json_column<T: DeserializeOwned>(
    row: &SqliteRow,
    name: &str,
) -> Result<T, RepositoryError> {
    let raw: String = column(row, name)?;
    serde_json::from_str(&raw).map_err(|e| RepositoryError::Decode(format!("{name}: {e}")))
}

pub(crate) fn to_json<T: serde::Serialize>(value: &T) -> Result<String, RepositoryError> {
    serde_json::to_string(value).map_err(|e| RepositoryError::Decode(e.to_string()))
}

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}


#[cfg(test)]
mod tests {
    use citequotes_core::domain::submission::SubmissionStatus;
    use citequotes_core::errors::DomainError;

    use super::RepositoryError;

    #[test]
    fn domain_errors_keep_their_category() {
        let validation = RepositoryError::from(DomainError::validation("author is required"));
        assert!(matches!(validation, RepositoryError::Validation(ref m) if m == "author is required"));

        let transition = RepositoryError::from(DomainError::InvalidSubmissionTransition {
            from: SubmissionStatus::Rejected,
            to: SubmissionStatus::Approved,
        });
        assert!(matches!(transition, RepositoryError::Conflict(_)));

        let missing = RepositoryError::from(DomainError::NotFound { entity: "quote", id: "q-9".into() });
        assert!(matches!(missing, RepositoryError::NotFound { entity: "quote", .. }));
    }
}
