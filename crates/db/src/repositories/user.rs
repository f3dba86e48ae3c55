use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;

use citequotes_core::credentials::{generate_token, hash_token};
use citequotes_core::domain::role::{User, UserId};

use super::{column, new_id, timestamp, RepositoryError, UserRepository};
use crate::DbPool;

/// A freshly minted token. The raw value is only available here; storage keeps a hash.
#[derive(Clone, Debug, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub user_id: UserId,
    pub expires_at: DateTime<Utc>,
}

pub struct SqlUserRepository {
    pool: DbPool,
}

impl SqlUserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_user(row: &SqliteRow) -> Result<User, RepositoryError> {
    Ok(User {
        id: UserId(column(row, "id")?),
        email: column(row, "email")?,
        display_name: column(row, "display_name")?,
        created_at: timestamp(row, "created_at")?,
    })
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[async_trait::async_trait]
impl UserRepository for SqlUserRepository {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query("SELECT id, email, display_name, created_at FROM users WHERE id = ?")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_user).transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        let row =
            sqlx::query("SELECT id, email, display_name, created_at FROM users WHERE email = ?")
                .bind(normalize_email(email))
                .fetch_optional(&self.pool)
                .await?;
        row.as_ref().map(row_to_user).transpose()
    }

    async fn ensure(
        &self,
        email: &str,
        display_name: Option<&str>,
    ) -> Result<User, RepositoryError> {
        let email = normalize_email(email);
        if email.is_empty() {
            return Err(RepositoryError::Conflict("email must not be empty".to_string()));
        }

        sqlx::query(
            "INSERT INTO users (id, email, display_name, created_at) VALUES (?, ?, ?, ?)
             ON CONFLICT(email) DO UPDATE SET
                display_name = COALESCE(excluded.display_name, users.display_name)",
        )
        .bind(new_id())
        .bind(&email)
        .bind(display_name)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        self.find_by_email(&email).await?.ok_or_else(|| RepositoryError::not_found("user", email))
    }

    async fn issue_token(
        &self,
        user_id: &UserId,
        ttl: Duration,
        label: Option<&str>,
    ) -> Result<IssuedToken, RepositoryError> {
        if self.find_by_id(user_id).await?.is_none() {
            return Err(RepositoryError::not_found("user", &user_id.0));
        }

        let token = generate_token(&mut rand::thread_rng());
        let now = Utc::now();
        let expires_at = now + ttl;

        sqlx::query(
            "INSERT INTO auth_tokens (id, user_id, token_hash, label, expires_at, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(new_id())
        .bind(&user_id.0)
        .bind(hash_token(&token))
        .bind(label)
        .bind(expires_at.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::on_unique(e, "token collision"))?;

        Ok(IssuedToken { token, user_id: user_id.clone(), expires_at })
    }

    async fn authenticate(&self, raw_token: &str) -> Result<Option<User>, RepositoryError> {
        let token_hash = hash_token(raw_token);

        let row = sqlx::query(
            "SELECT u.id, u.email, u.display_name, u.created_at, t.expires_at
             FROM auth_tokens t JOIN users u ON u.id = t.user_id
             WHERE t.token_hash = ? AND t.revoked_at IS NULL",
        )
        .bind(&token_hash)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        // expires_at is compared as an instant; stored offsets vary
        let now = Utc::now();
        if timestamp(&row, "expires_at")? <= now {
            return Ok(None);
        }

        sqlx::query("UPDATE auth_tokens SET last_used_at = ? WHERE token_hash = ?")
            .bind(now.to_rfc3339())
            .bind(&token_hash)
            .execute(&self.pool)
            .await?;

        row_to_user(&row).map(Some)
    }

    async fn revoke_token(&self, raw_token: &str) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE auth_tokens SET revoked_at = ? WHERE token_hash = ? AND revoked_at IS NULL",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(hash_token(raw_token))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, FixedOffset, Utc};

    use citequotes_core::credentials::hash_token;
    use citequotes_core::domain::role::UserId;

    use super::SqlUserRepository;
    use crate::repositories::test_support::setup;
    use crate::repositories::{RepositoryError, UserRepository};

    #[tokio::test]
    async fn ensure_is_idempotent_per_email() {
        let repo = SqlUserRepository::new(setup().await);
        let first = repo.ensure("Ada@Example.com ", None).await.expect("first");
        let second = repo.ensure("ada@example.com", Some("Ada")).await.expect("second");

        assert_eq!(first.id, second.id);
        assert_eq!(second.email, "ada@example.com");
        assert_eq!(second.display_name.as_deref(), Some("Ada"));
    }

    #[tokio::test]
    async fn issued_token_authenticates_until_revoked() {
        let repo = SqlUserRepository::new(setup().await);
        let user = repo.ensure("grace@example.com", None).await.expect("user");
        let issued =
            repo.issue_token(&user.id, Duration::hours(1), Some("cli")).await.expect("token");

        assert!(issued.token.starts_with("cq_"));
        let found = repo.authenticate(&issued.token).await.expect("auth").expect("valid");
        assert_eq!(found.id, user.id);
        assert!(repo.authenticate("cq_not-a-token").await.expect("auth").is_none());

        assert!(repo.revoke_token(&issued.token).await.expect("revoke"));
        assert!(!repo.revoke_token(&issued.token).await.expect("second revoke"));
        assert!(repo.authenticate(&issued.token).await.expect("auth").is_none());
    }

    #[tokio::test]
    async fn expired_tokens_are_rejected() {
        let repo = SqlUserRepository::new(setup().await);
        let user = repo.ensure("old@example.com", None).await.expect("user");
        let issued =
            repo.issue_token(&user.id, Duration::seconds(-1), None).await.expect("token");

        assert!(repo.authenticate(&issued.token).await.expect("auth").is_none());
    }

    #[tokio::test]
    async fn expiry_compares_instants_across_offsets() {
        let pool = setup().await;
        let repo = SqlUserRepository::new(pool.clone());
        let user = repo.ensure("tz@example.com", None).await.expect("user");
        let expired = repo.issue_token(&user.id, Duration::hours(1), None).await.expect("expired");
        let live = repo.issue_token(&user.id, Duration::hours(1), None).await.expect("live");

        // An hour ago written east of UTC sorts after "now" as text.
        let east = FixedOffset::east_opt(5 * 3600).expect("offset");
        let past = (Utc::now() - Duration::hours(1)).with_timezone(&east).to_rfc3339();
        // An hour ahead written west of UTC sorts before "now" as text.
        let west = FixedOffset::west_opt(5 * 3600).expect("offset");
        let future = (Utc::now() + Duration::hours(1)).with_timezone(&west).to_rfc3339();
        for (token, expires_at) in [(&expired.token, past), (&live.token, future)] {
            sqlx::query("UPDATE auth_tokens SET expires_at = ? WHERE token_hash = ?")
                .bind(expires_at)
                .bind(hash_token(token))
                .execute(&pool)
                .await
                .expect("rewrite expiry");
        }

        assert!(repo.authenticate(&expired.token).await.expect("auth").is_none());
        assert!(repo.authenticate(&live.token).await.expect("auth").is_some());
    }

    #[tokio::test]
    async fn tokens_require_an_existing_user() {
        let repo = SqlUserRepository::new(setup().await);
        let result = repo.issue_token(&UserId("ghost".into()), Duration::hours(1), None).await;
        assert!(matches!(result, Err(RepositoryError::NotFound { .. })));
    }
}
