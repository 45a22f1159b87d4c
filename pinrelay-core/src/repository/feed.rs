//! Source feeds table, kept in registration order

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use crate::{models::FeedId, Error, Result};

#[derive(Clone)]
pub struct FeedRepository {
    pool: SqlitePool,
}

impl FeedRepository {
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn list(&self) -> Result<Vec<FeedId>> {
        let rows = sqlx::query("SELECT feed_id FROM source_feeds ORDER BY rowid")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|row| row.try_get::<FeedId, _>("feed_id").map_err(Error::from))
            .collect()
    }

    pub async fn add(&self, feed: &FeedId, now: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query("INSERT OR IGNORE INTO source_feeds (feed_id, added_at) VALUES (?1, ?2)")
            .bind(feed)
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn remove(&self, feed: &FeedId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM source_feeds WHERE feed_id = ?1")
            .bind(feed)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
