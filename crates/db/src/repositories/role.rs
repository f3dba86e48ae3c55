use chrono::Utc;
use sqlx::sqlite::SqliteRow;

use citequotes_core::domain::role::{Privilege, UserId, UserRole};

use super::{column, timestamp, RepositoryError, RoleRepository};
use crate::DbPool;

pub struct SqlRoleRepository {
    pool: DbPool,
}

impl SqlRoleRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn parse_privilege(raw: &str) -> Result<Privilege, RepositoryError> {
    Privilege::parse(raw).ok_or_else(|| RepositoryError::Decode(format!("unknown role `{raw}`")))
}

fn row_to_role(row: &SqliteRow) -> Result<UserRole, RepositoryError> {
    let role: String = column(row, "role")?;
    Ok(UserRole {
        user_id: UserId(column(row, "user_id")?),
        email: column(row, "email")?,
        role: parse_privilege(&role)?,
        updated_by: column(row, "updated_by")?,
        updated_at: timestamp(row, "updated_at")?,
    })
}

#[async_trait::async_trait]
impl RoleRepository for SqlRoleRepository {
    /// Users without a row hold the base `user` privilege.
    async fn privilege_of(&self, user_id: &UserId) -> Result<Privilege, RepositoryError> {
        let role: Option<String> =
            sqlx::query_scalar("SELECT role FROM user_roles WHERE user_id = ?")
                .bind(&user_id.0)
                .fetch_optional(&self.pool)
                .await?;
        role.as_deref().map(parse_privilege).transpose().map(Option::unwrap_or_default)
    }

    async fn set_role(
        &self,
        user_id: &UserId,
        role: Privilege,
        updated_by: &str,
    ) -> Result<UserRole, RepositoryError> {
        let email: Option<String> = sqlx::query_scalar("SELECT email FROM users WHERE id = ?")
            .bind(&user_id.0)
            .fetch_optional(&self.pool)
            .await?;
        let email = email.ok_or_else(|| RepositoryError::not_found("user", &user_id.0))?;

        let now = Utc::now();
        sqlx::query(
            "INSERT INTO user_roles (user_id, role, updated_by, updated_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(user_id) DO UPDATE SET
                role = excluded.role,
                updated_by = excluded.updated_by,
                updated_at = excluded.updated_at",
        )
        .bind(&user_id.0)
        .bind(role.as_str())
        .bind(updated_by)
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(UserRole {
            user_id: user_id.clone(),
            email,
            role,
            updated_by: Some(updated_by.to_string()),
            updated_at: now,
        })
    }

    async fn list(&self) -> Result<Vec<UserRole>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT r.user_id, u.email, r.role, r.updated_by, r.updated_at
             FROM user_roles r JOIN users u ON u.id = r.user_id
             ORDER BY u.email ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_role).collect()
    }
}
