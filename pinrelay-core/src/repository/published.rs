//! Currently published item per destination. The primary key on
//! `destination_id` is what keeps a destination at one published item.

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use crate::{
    models::{DestinationId, ItemId, PublishedItem},
    Result,
};

#[derive(Clone)]
pub struct PublishedRepository {
    pool: SqlitePool,
}

impl PublishedRepository {
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, destination: DestinationId) -> Result<Option<ItemId>> {
        let row = sqlx::query("SELECT item_id FROM published_items WHERE destination_id = ?1")
            .bind(destination)
            .fetch_optional(&self.pool)
            .await?;

        Ok(match row {
            Some(row) => Some(row.try_get("item_id")?),
            None => None,
        })
    }

    pub async fn save(&self, destination: DestinationId, item: ItemId, now: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO published_items (destination_id, item_id, published_at) VALUES (?1, ?2, ?3)
            ON CONFLICT(destination_id) DO UPDATE
            SET item_id = excluded.item_id, published_at = excluded.published_at
            ",
        )
        .bind(destination)
        .bind(item)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<PublishedItem>> {
        let rows = sqlx::query(
            "SELECT destination_id, item_id, published_at FROM published_items ORDER BY destination_id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> Result<PublishedItem> {
                Ok(PublishedItem {
                    destination_id: row.try_get("destination_id")?,
                    item_id: row.try_get("item_id")?,
                    published_at: row.try_get("published_at")?,
                })
            })
            .collect()
    }

    pub async fn delete(&self, destination: DestinationId) -> Result<()> {
        sqlx::query("DELETE FROM published_items WHERE destination_id = ?1")
            .bind(destination)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
