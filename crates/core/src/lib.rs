pub mod captcha;
pub mod citation;
pub mod config;
pub mod credentials;
pub mod domain;
pub mod duplicates;
pub mod errors;
pub mod import;
pub mod validation;

pub use citation::{format_citation, CitationStyle};
pub use domain::cms::{Comment, CommentStatus, ContentEntry, ContentKind, ContentStatus, Media};
pub use domain::draft::{DraftId, QuoteDraft};
pub use domain::quote::{CitedBy, OriginalSource, Quote, QuoteDetail, QuoteId, Translation};
pub use domain::role::{Privilege, User, UserId, UserRole};
pub use domain::submission::{
    QuoteSubmission, SubmissionForm, SubmissionId, SubmissionOrigin, SubmissionStatus,
};
pub use duplicates::{find_potential_duplicates, group_shared_duplicates, DuplicateGroup};
pub use errors::DomainError;
pub use import::{ImportError, ImportLimits, ImportReport};
