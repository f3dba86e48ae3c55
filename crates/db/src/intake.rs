use tracing::info;

use citequotes_core::domain::submission::{QuoteSubmission, SubmissionForm, SubmissionOrigin};
use citequotes_core::duplicates::{find_potential_duplicates, Candidate, DEFAULT_THRESHOLD};

use crate::repositories::{QuoteRepository, RepositoryError, SubmissionRepository};

/// Creates pending submissions with duplicate detection against published
/// quotes and other pending submissions.
///
/// The corpus is loaded once, and each accepted submission joins it, so a
/// batch flags repeats within itself as well.
pub struct SubmissionIntake<'a> {
    submissions: &'a dyn SubmissionRepository,
    corpus: Vec<(String, String)>,
    threshold: f64,
}

impl<'a> SubmissionIntake<'a> {
    pub async fn load(
        quotes: &dyn QuoteRepository,
        submissions: &'a dyn SubmissionRepository,
    ) -> Result<Self, RepositoryError> {
        let mut corpus = quotes.texts().await?;
        corpus.extend(submissions.pending_texts().await?);
        Ok(Self { submissions, corpus, threshold: DEFAULT_THRESHOLD })
    }

    pub fn potential_duplicates(&self, text: &str) -> Vec<String> {
        let candidates: Vec<Candidate<'_>> =
            self.corpus.iter().map(|(id, text)| Candidate { id, text }).collect();
        find_potential_duplicates(text, &candidates, self.threshold)
    }

    /// Dry-run counterpart of [`submit`](Self::submit): reports duplicates and
    /// adds `text` to the corpus under `key` without writing anything.
    pub fn preview(&mut self, key: String, text: &str) -> Vec<String> {
        let duplicates = self.potential_duplicates(text);
        self.corpus.push((key, text.to_string()));
        duplicates
    }

    /// `form` must already be validated.
    pub async fn submit(
        &mut self,
        form: SubmissionForm,
        origin: SubmissionOrigin,
        submitted_by: Option<&str>,
    ) -> Result<QuoteSubmission, RepositoryError> {
        let duplicates = self.potential_duplicates(&form.quote_text);
        let submission = self.submissions.create(form, origin, submitted_by, duplicates).await?;

        info!(
            event_name = "submissions.submission.created",
            submission_id = %submission.id.0,
            origin = submission.origin.as_str(),
            duplicate_count = submission.potential_duplicate_ids.len(),
            "submission created"
        );
        self.corpus.push((submission.id.0.clone(), submission.form.quote_text.clone()));
        Ok(submission)
    }
}
