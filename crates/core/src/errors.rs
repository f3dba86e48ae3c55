use thiserror::Error;

use crate::domain::role::Privilege;
use crate::domain::submission::SubmissionStatus;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid submission transition from {from:?} to {to:?}")]
    InvalidSubmissionTransition { from: SubmissionStatus, to: SubmissionStatus },
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("requires {required} privilege, caller has {actual}")]
    InsufficientPrivilege { required: Privilege, actual: Privilege },
    #[error("{entity} `{id}` was not found")]
    NotFound { entity: &'static str, id: String },
}

impl DomainError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}
