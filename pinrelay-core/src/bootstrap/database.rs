//! Database initialization

use std::str::FromStr;
use std::time::Duration;

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::{error, info};

use crate::Config;

/// Open the SQLite pool, creating the database file when missing.
pub async fn init_database(config: &Config) -> Result<SqlitePool> {
    let database_url = config.database_url();
    info!("Connecting to database: {}", database_url);

    let options = SqliteConnectOptions::from_str(database_url)
        .map_err(|e| anyhow::anyhow!("Invalid database url {database_url}: {e}"))?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.database.max_connections.max(1))
        .acquire_timeout(Duration::from_secs(config.database.connect_timeout_seconds))
        .connect_with(options)
        .await
        .map_err(|e| {
            error!("Failed to connect to database: {}", e);
            anyhow::anyhow!("Database connection failed: {e}")
        })?;

    info!("Database connected successfully");
    Ok(pool)
}

/// Apply the embedded migrations.
pub async fn run_migrations(pool: &SqlitePool) -> crate::Result<()> {
    info!("Running database migrations...");
    sqlx::migrate!("../migrations").run(pool).await.map_err(|e| {
        error!("Failed to run migrations: {}", e);
        crate::Error::from(e)
    })?;
    info!("Migrations completed");
    Ok(())
}
