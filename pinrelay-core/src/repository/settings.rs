//! Key-value configuration table

use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::Result;

/// Settings repository
#[derive(Clone)]
pub struct SettingsRepository {
    pool: SqlitePool,
}

impl SettingsRepository {
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get a single value by key
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM config WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(match row {
            Some(row) => Some(row.try_get("value")?),
            None => None,
        })
    }

    /// Insert or replace a value
    pub async fn set(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO config (key, value) VALUES (?1, ?2)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            ",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        debug!(key, value, "Updated setting");
        Ok(())
    }
}
