use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;
use crate::validation::optional;

/// Upper bound on the serialized size of a draft's form state.
pub const MAX_DRAFT_BYTES: usize = 256 * 1024;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DraftId(pub String);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuoteDraft {
    pub id: DraftId,
    pub user_id: String,
    pub title: Option<String>,
    pub form_data: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DraftInput {
    pub title: Option<String>,
    pub form_data: serde_json::Value,
}

impl DraftInput {
    pub fn validate(self) -> Result<Self, DomainError> {
        if !self.form_data.is_object() {
            return Err(DomainError::validation("form_data must be a JSON object"));
        }
        let size = serde_json::to_vec(&self.form_data).map(|bytes| bytes.len()).unwrap_or(0);
        if size > MAX_DRAFT_BYTES {
            return Err(DomainError::validation(format!(
                "form_data exceeds {MAX_DRAFT_BYTES} bytes"
            )));
        }
        Ok(Self { title: optional("title", self.title.as_deref(), 200)?, form_data: self.form_data })
    }
}
