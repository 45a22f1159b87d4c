//! Latest observed item per feed

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use crate::{
    models::{FeedId, ItemId, LastSeenItem},
    Result,
};

#[derive(Clone)]
pub struct LastSeenRepository {
    pool: SqlitePool,
}

impl LastSeenRepository {
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, feed: &FeedId) -> Result<Option<ItemId>> {
        let row = sqlx::query("SELECT item_id FROM last_seen_items WHERE feed_id = ?1")
            .bind(feed)
            .fetch_optional(&self.pool)
            .await?;

        Ok(match row {
            Some(row) => Some(row.try_get("item_id")?),
            None => None,
        })
    }

    pub async fn save(&self, feed: &FeedId, item: ItemId, now: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO last_seen_items (feed_id, item_id, seen_at) VALUES (?1, ?2, ?3)
            ON CONFLICT(feed_id) DO UPDATE SET item_id = excluded.item_id, seen_at = excluded.seen_at
            ",
        )
        .bind(feed)
        .bind(item)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<LastSeenItem>> {
        let rows = sqlx::query("SELECT feed_id, item_id, seen_at FROM last_seen_items ORDER BY feed_id")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(|row| -> Result<LastSeenItem> {
                Ok(LastSeenItem {
                    feed_id: row.try_get("feed_id")?,
                    item_id: row.try_get("item_id")?,
                    seen_at: row.try_get("seen_at")?,
                })
            })
            .collect()
    }

    pub async fn delete(&self, feed: &FeedId) -> Result<()> {
        sqlx::query("DELETE FROM last_seen_items WHERE feed_id = ?1")
            .bind(feed)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
