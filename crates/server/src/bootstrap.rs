use citequotes_agent::CqAssistant;
use citequotes_core::config::{AppConfig, ConfigError, LoadOptions};
use citequotes_db::{connect_with_settings, migrations, DbPool};
use thiserror::Error;
use tracing::{info, warn};

use crate::state::AppState;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub state: AppState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    // every in-memory connection is its own database
    let in_memory = config.database.url.contains(":memory:");
    let max_connections = if in_memory { 1 } else { config.database.max_connections };

    let db_pool =
        connect_with_settings(&config.database.url, max_connections, config.database.timeout_secs)
            .await
            .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        max_connections,
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(event_name = "system.bootstrap.migrations_applied", "database migrations applied");

    let mut state = AppState::new(db_pool.clone(), &config);
    match CqAssistant::from_config(&config.llm) {
        Ok(assistant) => {
            info!(
                event_name = "system.bootstrap.assistant_ready",
                provider = config.llm.provider.as_str(),
                model = %config.llm.model,
                "language model client configured"
            );
            state = state.with_assistant(assistant);
        }
        Err(error) => warn!(
            event_name = "system.bootstrap.assistant_disabled",
            error = %error,
            "language model client unavailable; CQ endpoints disabled"
        ),
    }

    Ok(Application { config, db_pool, state })
}

#[cfg(test)]
mod tests {
    use citequotes_core::config::{ConfigOverrides, LlmProvider, LoadOptions};

    use crate::bootstrap::bootstrap;

    #[tokio::test]
    async fn bootstrap_fails_fast_without_a_hosted_llm_key() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:".to_string()),
                llm_provider: Some(LlmProvider::Anthropic),
                llm_api_key: Some("   ".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await;

        let message = result.err().map(|e| e.to_string()).unwrap_or_default();
        assert!(message.contains("llm.api_key"), "unexpected: {message}");
    }

    #[tokio::test]
    async fn bootstrap_migrates_and_wires_the_assistant() {
        let app = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await
        .expect("bootstrap should succeed with the default ollama config");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name IN ('quotes', 'quote_submissions', 'user_roles', 'cms_articles')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("tables should exist after bootstrap");
        assert_eq!(table_count, 4);
        assert!(app.state.assistant.is_some());

        app.db_pool.close().await;
    }
}
