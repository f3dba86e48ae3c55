use std::sync::Arc;

use serde_json::Value;
use tera::Tera;
use tracing::error;

use citequotes_agent::CqAssistant;
use citequotes_core::config::AppConfig;
use citequotes_core::domain::activity::ActivityEntry;
use citequotes_core::import::ImportLimits;
use citequotes_db::repositories::{
    ActivityRepository, CaptchaRepository, CmsRepository, DraftRepository, QuoteRepository,
    RoleRepository, SqlActivityRepository, SqlCaptchaRepository, SqlCmsRepository,
    SqlDraftRepository, SqlQuoteRepository, SqlRoleRepository, SqlSubmissionRepository,
    SqlUserRepository, SubmissionRepository, UserRepository,
};
use citequotes_db::DbPool;

use crate::auth::{RateLimiter, RateLimits};

/// Shared handles for every route module.
#[derive(Clone)]
pub struct AppState {
    pub db_pool: DbPool,
    pub quotes: Arc<dyn QuoteRepository>,
    pub submissions: Arc<dyn SubmissionRepository>,
    pub drafts: Arc<dyn DraftRepository>,
    pub roles: Arc<dyn RoleRepository>,
    pub users: Arc<dyn UserRepository>,
    pub cms: Arc<dyn CmsRepository>,
    pub activity: Arc<dyn ActivityRepository>,
    pub captchas: Arc<dyn CaptchaRepository>,
    pub assistant: Option<CqAssistant>,
    pub limiter: RateLimiter,
    pub import_limits: ImportLimits,
    pub templates: Arc<Tera>,
}

impl AppState {
    pub fn new(db_pool: DbPool, config: &AppConfig) -> Self {
        Self {
            quotes: Arc::new(SqlQuoteRepository::new(db_pool.clone())),
            submissions: Arc::new(SqlSubmissionRepository::new(db_pool.clone())),
            drafts: Arc::new(SqlDraftRepository::new(db_pool.clone())),
            roles: Arc::new(SqlRoleRepository::new(db_pool.clone())),
            users: Arc::new(SqlUserRepository::new(db_pool.clone())),
            cms: Arc::new(SqlCmsRepository::new(db_pool.clone())),
            activity: Arc::new(SqlActivityRepository::new(db_pool.clone())),
            captchas: Arc::new(SqlCaptchaRepository::new(db_pool.clone())),
            assistant: None,
            limiter: RateLimiter::new(RateLimits::from(&config.auth)),
            import_limits: config.import_limits(),
            templates: crate::routes::public::init_templates(),
            db_pool,
        }
    }

    pub fn with_assistant(mut self, assistant: CqAssistant) -> Self {
        self.assistant = Some(assistant);
        self
    }

    /// Appends to the activity log. A failed write is logged, never surfaced.
    pub async fn record(
        &self,
        actor: &str,
        action: &str,
        entity_type: &str,
        entity_id: Option<&str>,
        detail: Value,
    ) {
        let entry = ActivityEntry::new(
            actor,
            action,
            entity_type,
            entity_id.map(str::to_string),
            detail,
        );
        if let Err(e) = self.activity.record(entry).await {
            error!(
                event_name = "activity.write_failed",
                action = %action,
                error = %e,
                "failed to write activity entry"
            );
        }
    }
}
