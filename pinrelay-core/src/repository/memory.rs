//! In-process store
//!
//! Same semantics as the SQLite store without any I/O. Used by tests that run
//! on a paused clock, where a database worker thread would let virtual time
//! jump ahead.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use super::RelayStore;
use crate::{
    models::{
        DestinationId, DestinationKind, FeedId, ForwardLogEntry, ForwardStats, ItemId, LastSeenItem,
        PublishedItem, TargetDestination,
    },
    Result,
};

#[derive(Debug, Default)]
struct Tables {
    config: HashMap<String, String>,
    feeds: Vec<FeedId>,
    destinations: Vec<TargetDestination>,
    last_seen: BTreeMap<FeedId, LastSeenItem>,
    published: BTreeMap<DestinationId, PublishedItem>,
    forward_log: Vec<ForwardLogEntry>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    writes: AtomicU64,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of mutating calls made so far
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    fn write(&self) -> parking_lot::MutexGuard<'_, Tables> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.tables.lock()
    }
}

#[async_trait]
impl RelayStore for MemoryStore {
    async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        Ok(self.tables.lock().config.get(key).cloned())
    }

    async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        self.write().config.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn list_destinations(&self) -> Result<Vec<TargetDestination>> {
        Ok(self.tables.lock().destinations.clone())
    }

    async fn add_destination(&self, id: DestinationId, kind: DestinationKind) -> Result<bool> {
        let mut tables = self.write();
        if tables.destinations.iter().any(|d| d.id == id) {
            return Ok(false);
        }
        tables.destinations.push(TargetDestination {
            id,
            kind,
            added_at: Utc::now(),
        });
        Ok(true)
    }

    async fn remove_destination(&self, id: DestinationId) -> Result<bool> {
        let mut tables = self.write();
        let before = tables.destinations.len();
        tables.destinations.retain(|d| d.id != id);
        Ok(tables.destinations.len() != before)
    }

    async fn list_feeds(&self) -> Result<Vec<FeedId>> {
        Ok(self.tables.lock().feeds.clone())
    }

    async fn add_feed(&self, feed: &FeedId) -> Result<bool> {
        let mut tables = self.write();
        if tables.feeds.contains(feed) {
            return Ok(false);
        }
        tables.feeds.push(feed.clone());
        Ok(true)
    }

    async fn remove_feed(&self, feed: &FeedId) -> Result<bool> {
        let mut tables = self.write();
        let before = tables.feeds.len();
        tables.feeds.retain(|f| f != feed);
        Ok(tables.feeds.len() != before)
    }

    async fn last_seen(&self, feed: &FeedId) -> Result<Option<ItemId>> {
        Ok(self.tables.lock().last_seen.get(feed).map(|entry| entry.item_id))
    }

    async fn save_last_seen(&self, feed: &FeedId, item: ItemId) -> Result<()> {
        self.write().last_seen.insert(
            feed.clone(),
            LastSeenItem {
                feed_id: feed.clone(),
                item_id: item,
                seen_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn list_last_seen(&self) -> Result<Vec<LastSeenItem>> {
        Ok(self.tables.lock().last_seen.values().cloned().collect())
    }

    async fn delete_last_seen(&self, feed: &FeedId) -> Result<()> {
        self.write().last_seen.remove(feed);
        Ok(())
    }

    async fn published(&self, destination: DestinationId) -> Result<Option<ItemId>> {
        Ok(self.tables.lock().published.get(&destination).map(|entry| entry.item_id))
    }

    async fn save_published(&self, destination: DestinationId, handle: ItemId) -> Result<()> {
        self.write().published.insert(
            destination,
            PublishedItem {
                destination_id: destination,
                item_id: handle,
                published_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn list_published(&self) -> Result<Vec<PublishedItem>> {
        Ok(self.tables.lock().published.values().cloned().collect())
    }

    async fn delete_published(&self, destination: DestinationId) -> Result<()> {
        self.write().published.remove(&destination);
        Ok(())
    }

    async fn append_forward_log(&self, item: ItemId) -> Result<()> {
        let mut tables = self.write();
        let id = i64::try_from(tables.forward_log.len()).unwrap_or(i64::MAX) + 1;
        tables.forward_log.push(ForwardLogEntry {
            id,
            item_id: item,
            forwarded_at: Utc::now(),
        });
        Ok(())
    }

    async fn recent_forwards(&self, limit: u32) -> Result<Vec<ForwardLogEntry>> {
        let tables = self.tables.lock();
        Ok(tables
            .forward_log
            .iter()
            .rev()
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn forward_stats(&self) -> Result<ForwardStats> {
        let tables = self.tables.lock();
        Ok(ForwardStats {
            total_forwards: i64::try_from(tables.forward_log.len()).unwrap_or(i64::MAX),
            last_forward: tables.forward_log.last().map(|entry| entry.forwarded_at),
            last_seen: tables.last_seen.values().cloned().collect(),
        })
    }
}
