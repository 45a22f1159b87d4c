//! Persistent store for relay state
//!
//! The store is the single source of truth: configuration, registered feeds
//! and destinations, the last item seen per feed, the item currently
//! published per destination and the forwarding audit log. Nothing is cached
//! in memory across restarts; everything is reloaded from here.

pub mod destination;
pub mod feed;
pub mod forward_log;
pub mod last_seen;
pub mod memory;
pub mod published;
pub mod settings;

pub use destination::DestinationRepository;
pub use feed::FeedRepository;
pub use forward_log::ForwardLogRepository;
pub use last_seen::LastSeenRepository;
pub use memory::MemoryStore;
pub use published::PublishedRepository;
pub use settings::SettingsRepository;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

use crate::{
    models::{
        DestinationId, DestinationKind, FeedId, ForwardLogEntry, ForwardStats, ItemId, LastSeenItem,
        PublishedItem, TargetDestination,
    },
    Result,
};

/// Storage operations used by the relay.
#[async_trait]
pub trait RelayStore: Send + Sync {
    async fn get_setting(&self, key: &str) -> Result<Option<String>>;
    async fn set_setting(&self, key: &str, value: &str) -> Result<()>;

    async fn list_destinations(&self) -> Result<Vec<TargetDestination>>;
    async fn add_destination(&self, id: DestinationId, kind: DestinationKind) -> Result<bool>;
    async fn remove_destination(&self, id: DestinationId) -> Result<bool>;

    /// Feeds in registration order
    async fn list_feeds(&self) -> Result<Vec<FeedId>>;
    async fn add_feed(&self, feed: &FeedId) -> Result<bool>;
    async fn remove_feed(&self, feed: &FeedId) -> Result<bool>;

    async fn last_seen(&self, feed: &FeedId) -> Result<Option<ItemId>>;
    async fn save_last_seen(&self, feed: &FeedId, item: ItemId) -> Result<()>;
    async fn list_last_seen(&self) -> Result<Vec<LastSeenItem>>;
    async fn delete_last_seen(&self, feed: &FeedId) -> Result<()>;

    async fn published(&self, destination: DestinationId) -> Result<Option<ItemId>>;
    async fn save_published(&self, destination: DestinationId, handle: ItemId) -> Result<()>;
    async fn list_published(&self) -> Result<Vec<PublishedItem>>;
    async fn delete_published(&self, destination: DestinationId) -> Result<()>;

    async fn append_forward_log(&self, item: ItemId) -> Result<()>;
    /// Newest entries first
    async fn recent_forwards(&self, limit: u32) -> Result<Vec<ForwardLogEntry>>;
    async fn forward_stats(&self) -> Result<ForwardStats>;
}

/// SQLite-backed store, one repository per table.
#[derive(Clone)]
pub struct SqliteStore {
    settings: SettingsRepository,
    destinations: DestinationRepository,
    feeds: FeedRepository,
    last_seen: LastSeenRepository,
    published: PublishedRepository,
    forward_log: ForwardLogRepository,
}

impl SqliteStore {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            settings: SettingsRepository::new(pool.clone()),
            destinations: DestinationRepository::new(pool.clone()),
            feeds: FeedRepository::new(pool.clone()),
            last_seen: LastSeenRepository::new(pool.clone()),
            published: PublishedRepository::new(pool.clone()),
            forward_log: ForwardLogRepository::new(pool),
        }
    }
}

#[async_trait]
impl RelayStore for SqliteStore {
    async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        self.settings.get(key).await
    }

    async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        self.settings.set(key, value).await
    }

    async fn list_destinations(&self) -> Result<Vec<TargetDestination>> {
        self.destinations.list().await
    }

    async fn add_destination(&self, id: DestinationId, kind: DestinationKind) -> Result<bool> {
        self.destinations.add(id, kind, Utc::now()).await
    }

    async fn remove_destination(&self, id: DestinationId) -> Result<bool> {
        self.destinations.remove(id).await
    }

    async fn list_feeds(&self) -> Result<Vec<FeedId>> {
        self.feeds.list().await
    }

    async fn add_feed(&self, feed: &FeedId) -> Result<bool> {
        self.feeds.add(feed, Utc::now()).await
    }

    async fn remove_feed(&self, feed: &FeedId) -> Result<bool> {
        self.feeds.remove(feed).await
    }

    async fn last_seen(&self, feed: &FeedId) -> Result<Option<ItemId>> {
        self.last_seen.get(feed).await
    }

    async fn save_last_seen(&self, feed: &FeedId, item: ItemId) -> Result<()> {
        self.last_seen.save(feed, item, Utc::now()).await
    }

    async fn list_last_seen(&self) -> Result<Vec<LastSeenItem>> {
        self.last_seen.list().await
    }

    async fn delete_last_seen(&self, feed: &FeedId) -> Result<()> {
        self.last_seen.delete(feed).await
    }

    async fn published(&self, destination: DestinationId) -> Result<Option<ItemId>> {
        self.published.get(destination).await
    }

    async fn save_published(&self, destination: DestinationId, handle: ItemId) -> Result<()> {
        self.published.save(destination, handle, Utc::now()).await
    }

    async fn list_published(&self) -> Result<Vec<PublishedItem>> {
        self.published.list().await
    }

    async fn delete_published(&self, destination: DestinationId) -> Result<()> {
        self.published.delete(destination).await
    }

    async fn append_forward_log(&self, item: ItemId) -> Result<()> {
        self.forward_log.append(item, Utc::now()).await
    }

    async fn recent_forwards(&self, limit: u32) -> Result<Vec<ForwardLogEntry>> {
        self.forward_log.recent(limit).await
    }

    async fn forward_stats(&self) -> Result<ForwardStats> {
        let total_forwards = self.forward_log.count().await?;
        let last_forward = self
            .forward_log
            .recent(1)
            .await?
            .into_iter()
            .next()
            .map(|entry| entry.forwarded_at);
        let last_seen = self.last_seen.list().await?;

        Ok(ForwardStats {
            total_forwards,
            last_forward,
            last_seen,
        })
    }
}
