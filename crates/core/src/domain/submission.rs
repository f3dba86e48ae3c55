use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::quote::{normalize_tags, validate_urls, NewQuote, QuoteId};
use crate::errors::DomainError;
use crate::validation::{
    optional, optional_url, required, MAX_LONG_FIELD_LEN, MAX_QUOTE_TEXT_LEN,
    MAX_SHORT_FIELD_LEN,
};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubmissionId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Pending,
    Approved,
    Rejected,
    Processed,
}

impl SubmissionStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "processed" => Some(Self::Processed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Processed => "processed",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionOrigin {
    User,
    Ai,
    Import,
}

impl SubmissionOrigin {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "user" => Some(Self::User),
            "ai" => Some(Self::Ai),
            "import" => Some(Self::Import),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Ai => "ai",
            Self::Import => "import",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationForm {
    pub language: String,
    pub translated_text: String,
    pub translator: Option<String>,
}

/// Everything a submitter can fill in for a single quote.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmissionForm {
    pub quote_text: String,
    pub author: String,
    pub quote_date: Option<String>,
    pub context: Option<String>,
    pub citation: Option<String>,
    pub source_title: Option<String>,
    pub source_author: Option<String>,
    pub source_publisher: Option<String>,
    pub source_date: Option<String>,
    pub source_url: Option<String>,
    pub translations: Vec<TranslationForm>,
    pub tags: Vec<String>,
    pub evidence_image_urls: Vec<String>,
}

impl SubmissionForm {
    pub fn validate(self) -> Result<Self, DomainError> {
        let translations = self
            .translations
            .into_iter()
            .filter(|t| !t.language.trim().is_empty() || !t.translated_text.trim().is_empty())
            .map(|t| {
                Ok(TranslationForm {
                    language: required("translations.language", &t.language, 64)?,
                    translated_text: required(
                        "translations.translated_text",
                        &t.translated_text,
                        MAX_QUOTE_TEXT_LEN,
                    )?,
                    translator: optional(
                        "translations.translator",
                        t.translator.as_deref(),
                        MAX_SHORT_FIELD_LEN,
                    )?,
                })
            })
            .collect::<Result<Vec<_>, DomainError>>()?;

        Ok(Self {
            quote_text: required("quote_text", &self.quote_text, MAX_QUOTE_TEXT_LEN)?,
            author: required("author", &self.author, MAX_SHORT_FIELD_LEN)?,
            quote_date: optional("quote_date", self.quote_date.as_deref(), MAX_SHORT_FIELD_LEN)?,
            context: optional("context", self.context.as_deref(), MAX_LONG_FIELD_LEN)?,
            citation: optional("citation", self.citation.as_deref(), MAX_LONG_FIELD_LEN)?,
            source_title: optional(
                "source_title",
                self.source_title.as_deref(),
                MAX_SHORT_FIELD_LEN,
            )?,
            source_author: optional(
                "source_author",
                self.source_author.as_deref(),
                MAX_SHORT_FIELD_LEN,
            )?,
            source_publisher: optional(
                "source_publisher",
                self.source_publisher.as_deref(),
                MAX_SHORT_FIELD_LEN,
            )?,
            source_date: optional(
                "source_date",
                self.source_date.as_deref(),
                MAX_SHORT_FIELD_LEN,
            )?,
            source_url: optional_url("source_url", self.source_url.as_deref())?,
            translations,
            tags: normalize_tags(self.tags),
            evidence_image_urls: validate_urls("evidence_image_urls", self.evidence_image_urls)?,
        })
    }

    pub fn has_source(&self) -> bool {
        self.source_title.is_some()
    }

    pub fn to_new_quote(&self) -> NewQuote {
        NewQuote {
            quote_text: self.quote_text.clone(),
            author: self.author.clone(),
            quote_date: self.quote_date.clone(),
            context: self.context.clone(),
            citation: self.citation.clone(),
            tags: self.tags.clone(),
            evidence_image_urls: self.evidence_image_urls.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteSubmission {
    pub id: SubmissionId,
    #[serde(flatten)]
    pub form: SubmissionForm,
    pub status: SubmissionStatus,
    pub origin: SubmissionOrigin,
    pub submitted_by: Option<String>,
    pub potential_duplicate_ids: Vec<String>,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub review_notes: Option<String>,
    pub approved_quote_id: Option<QuoteId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl QuoteSubmission {
    pub fn can_transition_to(&self, next: SubmissionStatus) -> bool {
        self.status == SubmissionStatus::Pending && next != SubmissionStatus::Pending
    }

    pub fn transition_to(
        &mut self,
        next: SubmissionStatus,
        reviewer: &str,
        notes: Option<String>,
    ) -> Result<(), DomainError> {
        if !self.can_transition_to(next) {
            return Err(DomainError::InvalidSubmissionTransition { from: self.status, to: next });
        }

        let now = Utc::now();
        self.status = next;
        self.reviewed_by = Some(reviewer.to_string());
        self.reviewed_at = Some(now);
        self.review_notes = notes;
        self.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{
        QuoteSubmission, SubmissionForm, SubmissionId, SubmissionOrigin, SubmissionStatus,
        TranslationForm,
    };
    use crate::errors::DomainError;

    fn form() -> SubmissionForm {
        SubmissionForm {
            quote_text: "The unexamined life is not worth living.".to_string(),
            author: "Socrates".to_string(),
            ..SubmissionForm::default()
        }
    }

    fn submission(status: SubmissionStatus) -> QuoteSubmission {
        let now = Utc::now();
        QuoteSubmission {
            id: SubmissionId("sub-1".to_string()),
            form: form(),
            status,
            origin: SubmissionOrigin::User,
            submitted_by: Some("user-1".to_string()),
            potential_duplicate_ids: Vec::new(),
            reviewed_by: None,
            reviewed_at: None,
            review_notes: None,
            approved_quote_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn form_requires_text_and_author() {
        let error = SubmissionForm { author: "Socrates".into(), ..SubmissionForm::default() }
            .validate()
            .expect_err("text missing");
        assert_eq!(error, DomainError::Validation("quote_text is required".to_string()));
    }

    #[test]
    fn form_drops_blank_translation_rows_but_rejects_half_filled_ones() {
        let mut with_blank = form();
        with_blank.translations = vec![TranslationForm::default()];
        assert!(with_blank.validate().expect("blank rows dropped").translations.is_empty());

        let mut half = form();
        half.translations =
            vec![TranslationForm { language: "fr".into(), ..TranslationForm::default() }];
        assert!(half.validate().is_err());
    }

    #[test]
    fn pending_moves_to_each_terminal_state() {
        for next in
            [SubmissionStatus::Approved, SubmissionStatus::Rejected, SubmissionStatus::Processed]
        {
            let mut sub = submission(SubmissionStatus::Pending);
            sub.transition_to(next, "admin-1", Some("ok".into())).expect("pending -> terminal");
            assert_eq!(sub.status, next);
            assert_eq!(sub.reviewed_by.as_deref(), Some("admin-1"));
            assert!(sub.reviewed_at.is_some());
        }
    }

    #[test]
    fn terminal_states_are_final() {
        let mut sub = submission(SubmissionStatus::Rejected);
        let error = sub
            .transition_to(SubmissionStatus::Approved, "admin-1", None)
            .expect_err("rejected is terminal");
        assert!(matches!(error, DomainError::InvalidSubmissionTransition { .. }));

        let mut pending = submission(SubmissionStatus::Pending);
        assert!(pending.transition_to(SubmissionStatus::Pending, "admin-1", None).is_err());
    }

    #[test]
    fn status_strings_round_trip() {
        for status in [
            SubmissionStatus::Pending,
            SubmissionStatus::Approved,
            SubmissionStatus::Rejected,
            SubmissionStatus::Processed,
        ] {
            assert_eq!(SubmissionStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(SubmissionOrigin::parse("AI"), Some(SubmissionOrigin::Ai));
    }
}
