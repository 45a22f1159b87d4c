//! Store defaults and service wiring

use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    models::FeedId,
    repository::{RelayStore, SqliteStore},
    service::{
        agent::{AgentSettings, RelayAgent, INTERVAL_KEY},
        engine::RelayEngine,
        locator::ItemLocator,
    },
    transport::Transport,
    Config, Result,
};

/// Container for the initialized relay services
#[derive(Clone)]
pub struct Services {
    pub store: Arc<dyn RelayStore>,
    pub engine: Arc<RelayEngine>,
    pub agent: Arc<RelayAgent>,
}

/// Write defaults the store has no value for yet and register configured feeds.
pub async fn seed_store(store: &dyn RelayStore, config: &Config) -> Result<()> {
    if store.get_setting(INTERVAL_KEY).await?.is_none() {
        let seconds = config.relay.default_interval_seconds.to_string();
        store.set_setting(INTERVAL_KEY, &seconds).await?;
        info!(interval = %seconds, "Seeded rotation interval");
    }

    for raw in &config.relay.source_feeds {
        let feed = FeedId::new(raw.as_str());
        if feed.as_str().is_empty() {
            warn!("Ignoring empty source feed in configuration");
            continue;
        }
        if store.add_feed(&feed).await? {
            info!(feed = %feed, "Registered configured source feed");
        }
    }

    Ok(())
}

/// Build the store, engine and agent over an open pool.
pub async fn init_services(
    pool: sqlx::SqlitePool,
    config: &Config,
    transport: Arc<dyn Transport>,
) -> Result<Services> {
    info!("Initializing services...");

    let store: Arc<dyn RelayStore> = Arc::new(SqliteStore::new(pool));
    seed_store(store.as_ref(), config).await?;

    let locator = ItemLocator::new(transport.clone(), &config.locator);
    let engine = Arc::new(RelayEngine::new(store.clone(), transport.clone(), locator));
    let agent = Arc::new(RelayAgent::new(
        engine.clone(),
        transport,
        AgentSettings::from_config(config),
    ));

    info!("Services initialized");
    Ok(Services { store, engine, agent })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryStore;

    #[tokio::test]
    async fn test_seed_store_keeps_existing_interval() {
        let store = MemoryStore::new();
        store.set_setting(INTERVAL_KEY, "900").await.unwrap();
        let mut config = Config::default();
        config.relay.source_feeds = vec!["@news".to_string(), " ".to_string(), "-100200".to_string()];

        seed_store(&store, &config).await.unwrap();
        seed_store(&store, &config).await.unwrap();

        assert_eq!(store.get_setting(INTERVAL_KEY).await.unwrap().as_deref(), Some("900"));
        assert_eq!(
            store.list_feeds().await.unwrap(),
            vec![FeedId::new("@news"), FeedId::new("-100200")]
        );
    }

    #[tokio::test]
    async fn test_seed_store_writes_default_interval() {
        let store = MemoryStore::new();
        seed_store(&store, &Config::default()).await.unwrap();
        assert_eq!(store.get_setting(INTERVAL_KEY).await.unwrap().as_deref(), Some("7200"));
    }
}
