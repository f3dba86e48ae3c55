use chrono::{DateTime, Utc};

use citequotes_core::captcha::{Challenge, Shape};

use super::{column, json_column, timestamp, CaptchaRepository, RepositoryError};
use crate::DbPool;

pub struct SqlCaptchaRepository {
    pool: DbPool,
}

impl SqlCaptchaRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl CaptchaRepository for SqlCaptchaRepository {
    async fn store(&self, challenge: &Challenge) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO captcha_challenges (id, target, options_json, expires_at, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&challenge.id)
        .bind(challenge.target.as_str())
        .bind(super::to_json(&challenge.options)?)
        .bind(challenge.expires_at.to_rfc3339())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn take(&self, id: &str) -> Result<Option<Challenge>, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query(
            "SELECT id, target, options_json, expires_at FROM captcha_challenges WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        sqlx::query("DELETE FROM captcha_challenges WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        let target: String = column(&row, "target")?;
        Ok(Some(Challenge {
            id: column(&row, "id")?,
            target: Shape::parse(&target)
                .ok_or_else(|| RepositoryError::Decode(format!("unknown shape `{target}`")))?,
            options: json_column(&row, "options_json")?,
            expires_at: timestamp(&row, "expires_at")?,
        }))
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM captcha_challenges WHERE expires_at <= ?")
            .bind(now.to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use citequotes_core::captcha::Challenge;

    use super::SqlCaptchaRepository;
    use crate::repositories::test_support::setup;
    use crate::repositories::CaptchaRepository;

    #[tokio::test]
    async fn challenges_can_only_be_taken_once() {
        let repo = SqlCaptchaRepository::new(setup().await);
        let challenge = Challenge::generate(&mut StdRng::seed_from_u64(5), Utc::now());
        repo.store(&challenge).await.expect("store");

        let taken = repo.take(&challenge.id).await.expect("take").expect("present");
        assert_eq!(taken, challenge);
        assert!(repo.take(&challenge.id).await.expect("second take").is_none());
    }

    #[tokio::test]
    async fn purge_removes_only_expired_challenges() {
        let repo = SqlCaptchaRepository::new(setup().await);
        let now = Utc::now();
        let mut rng = StdRng::seed_from_u64(9);
        let stale = Challenge::generate(&mut rng, now - Duration::minutes(10));
        let fresh = Challenge::generate(&mut rng, now);
        repo.store(&stale).await.expect("stale");
        repo.store(&fresh).await.expect("fresh");

        assert_eq!(repo.purge_expired(now).await.expect("purge"), 1);
        assert!(repo.take(&fresh.id).await.expect("fresh").is_some());
    }
}
