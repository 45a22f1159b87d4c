//! Append-only forwarding audit log

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use crate::{
    models::{ForwardLogEntry, ItemId},
    Result,
};

#[derive(Clone)]
pub struct ForwardLogRepository {
    pool: SqlitePool,
}

impl ForwardLogRepository {
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn append(&self, item: ItemId, now: DateTime<Utc>) -> Result<()> {
        sqlx::query("INSERT INTO forward_log (item_id, forwarded_at) VALUES (?1, ?2)")
            .bind(item)
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn count(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS total FROM forward_log")
            .fetch_one(&self.pool)
            .await?;

        Ok(row.try_get("total")?)
    }

    /// Newest entries first
    pub async fn recent(&self, limit: u32) -> Result<Vec<ForwardLogEntry>> {
        let rows = sqlx::query("SELECT id, item_id, forwarded_at FROM forward_log ORDER BY id DESC LIMIT ?1")
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|row| -> Result<ForwardLogEntry> {
                Ok(ForwardLogEntry {
                    id: row.try_get("id")?,
                    item_id: row.try_get("item_id")?,
                    forwarded_at: row.try_get("forwarded_at")?,
                })
            })
            .collect()
    }
}
