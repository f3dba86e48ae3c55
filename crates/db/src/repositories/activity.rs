use sqlx::sqlite::SqliteRow;

use citequotes_core::domain::activity::ActivityEntry;

use super::{column, json_column, timestamp, to_json, ActivityRepository, RepositoryError};
use crate::DbPool;

pub struct SqlActivityRepository {
    pool: DbPool,
}

impl SqlActivityRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_entry(row: &SqliteRow) -> Result<ActivityEntry, RepositoryError> {
    Ok(ActivityEntry {
        id: column(row, "id")?,
        actor: column(row, "actor")?,
        action: column(row, "action")?,
        entity_type: column(row, "entity_type")?,
        entity_id: column(row, "entity_id")?,
        detail: json_column(row, "detail_json")?,
        created_at: timestamp(row, "created_at")?,
    })
}

#[async_trait::async_trait]
impl ActivityRepository for SqlActivityRepository {
    async fn record(&self, entry: ActivityEntry) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO activity_log (id, actor, action, entity_type, entity_id, detail_json,
                                       created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&entry.id)
        .bind(&entry.actor)
        .bind(&entry.action)
        .bind(&entry.entity_type)
        .bind(&entry.entity_id)
        .bind(to_json(&entry.detail)?)
        .bind(entry.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn recent(&self, limit: u32) -> Result<Vec<ActivityEntry>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, actor, action, entity_type, entity_id, detail_json, created_at
             FROM activity_log ORDER BY created_at DESC, rowid DESC LIMIT ?",
        )
        .bind(i64::from(limit.clamp(1, 500)))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_entry).collect()
    }
}
