//! Target destinations table

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use crate::{
    models::{DestinationId, DestinationKind, TargetDestination},
    Error, Result,
};

#[derive(Clone)]
pub struct DestinationRepository {
    pool: SqlitePool,
}

impl DestinationRepository {
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn list(&self) -> Result<Vec<TargetDestination>> {
        let rows = sqlx::query(
            r"
            SELECT destination_id, kind, added_at
            FROM target_destinations
            ORDER BY added_at, destination_id
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> Result<TargetDestination> {
                let kind: String = row.try_get("kind")?;
                Ok(TargetDestination {
                    id: row.try_get("destination_id")?,
                    kind: kind.parse().map_err(Error::Internal)?,
                    added_at: row.try_get("added_at")?,
                })
            })
            .collect()
    }

    /// Returns false when the destination was already registered
    pub async fn add(&self, id: DestinationId, kind: DestinationKind, now: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO target_destinations (destination_id, kind, added_at) VALUES (?1, ?2, ?3)",
        )
        .bind(id)
        .bind(kind.as_str())
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn remove(&self, id: DestinationId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM target_destinations WHERE destination_id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
