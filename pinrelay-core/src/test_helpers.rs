//! Shared fixtures for unit tests

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::{
    config::LocatorConfig,
    models::{
        DestinationId, DestinationKind, FeedId, ForwardLogEntry, ForwardStats, ItemId, LastSeenItem,
        PublishedItem, TargetDestination,
    },
    repository::{MemoryStore, RelayStore},
    service::{engine::RelayEngine, locator::ItemLocator},
    transport::{Transport, TransportError},
    Error,
};

pub const PROBE_LIMIT: u32 = 20;

pub fn locator_config() -> LocatorConfig {
    LocatorConfig {
        probe_limit: PROBE_LIMIT,
        default_start: 1000,
    }
}

pub fn engine_with(store: Arc<dyn RelayStore>, transport: Arc<dyn Transport>) -> RelayEngine {
    let locator = ItemLocator::new(transport.clone(), &locator_config());
    RelayEngine::new(store, transport, locator)
}

#[derive(Debug, Clone)]
pub struct Delivery {
    pub destination: DestinationId,
    pub feed: FeedId,
    pub item: ItemId,
    pub at: Instant,
}

#[derive(Default)]
struct State {
    items: HashSet<(String, i64)>,
    probe_only: HashSet<(String, i64)>,
    deliver_failures: HashMap<DestinationId, TransportError>,
    publish_failures: HashMap<DestinationId, TransportError>,
    unpublish_failures: HashMap<DestinationId, TransportError>,
    deliveries: Vec<Delivery>,
    pinned: HashMap<DestinationId, Vec<ItemId>>,
    unpublished: Vec<(DestinationId, ItemId)>,
    unpublish_attempts: usize,
    probes: usize,
    notices: Vec<(i64, String)>,
    next_handle: i64,
    panics: usize,
}

/// In-memory transport that records every call.
pub struct FakeTransport {
    state: Mutex<State>,
}

impl Default for FakeTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeTransport {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                next_handle: 10_000,
                ..State::default()
            }),
        }
    }

    /// Items that exist and can be delivered.
    pub fn add_items(&self, feed: &str, items: &[i64]) {
        let mut state = self.state.lock();
        for item in items {
            state.items.insert((feed.to_string(), *item));
        }
    }

    /// Items that pass an existence probe but fail delivery as missing.
    pub fn add_probe_only(&self, feed: &str, items: &[i64]) {
        let mut state = self.state.lock();
        for item in items {
            state.probe_only.insert((feed.to_string(), *item));
        }
    }

    pub fn fail_deliver(&self, destination: DestinationId, error: TransportError) {
        self.state.lock().deliver_failures.insert(destination, error);
    }

    pub fn fail_publish(&self, destination: DestinationId, error: TransportError) {
        self.state.lock().publish_failures.insert(destination, error);
    }

    pub fn fail_unpublish(&self, destination: DestinationId, error: TransportError) {
        self.state.lock().unpublish_failures.insert(destination, error);
    }

    /// The next `count` deliveries panic instead of returning.
    pub fn panic_next_deliveries(&self, count: usize) {
        self.state.lock().panics = count;
    }

    pub fn clear_failures(&self) {
        let mut state = self.state.lock();
        state.deliver_failures.clear();
        state.publish_failures.clear();
        state.unpublish_failures.clear();
    }

    /// Successful deliveries in call order
    pub fn deliveries(&self) -> Vec<(DestinationId, FeedId, ItemId)> {
        self.state
            .lock()
            .deliveries
            .iter()
            .map(|d| (d.destination, d.feed.clone(), d.item))
            .collect()
    }

    pub fn delivery_log(&self) -> Vec<Delivery> {
        self.state.lock().deliveries.clone()
    }

    /// Handles currently pinned in a destination
    pub fn pinned(&self, destination: DestinationId) -> Vec<ItemId> {
        self.state.lock().pinned.get(&destination).cloned().unwrap_or_default()
    }

    /// Successful unpublish calls
    pub fn unpublished(&self) -> Vec<(DestinationId, ItemId)> {
        self.state.lock().unpublished.clone()
    }

    pub fn unpublish_attempts(&self) -> usize {
        self.state.lock().unpublish_attempts
    }

    pub fn probe_count(&self) -> usize {
        self.state.lock().probes
    }

    pub fn notices(&self) -> Vec<(i64, String)> {
        self.state.lock().notices.clone()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn deliver(
        &self,
        destination: DestinationId,
        feed: &FeedId,
        item: ItemId,
    ) -> Result<ItemId, TransportError> {
        let mut state = self.state.lock();
        if state.panics > 0 {
            state.panics -= 1;
            drop(state);
            panic!("delivery of {item} to {destination} blew up");
        }
        if !state.items.contains(&(feed.as_str().to_string(), item.get())) {
            return Err(TransportError::ItemNotFound);
        }
        if let Some(error) = state.deliver_failures.get(&destination) {
            return Err(error.clone());
        }

        state.next_handle += 1;
        let handle = ItemId(state.next_handle);
        state.deliveries.push(Delivery {
            destination,
            feed: feed.clone(),
            item,
            at: Instant::now(),
        });
        Ok(handle)
    }

    async fn publish(&self, destination: DestinationId, handle: ItemId) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if let Some(error) = state.publish_failures.get(&destination) {
            return Err(error.clone());
        }
        state.pinned.entry(destination).or_default().push(handle);
        Ok(())
    }

    async fn unpublish(&self, destination: DestinationId, handle: ItemId) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        state.unpublish_attempts += 1;
        if let Some(error) = state.unpublish_failures.get(&destination) {
            return Err(error.clone());
        }
        if let Some(pinned) = state.pinned.get_mut(&destination) {
            pinned.retain(|h| *h != handle);
        }
        state.unpublished.push((destination, handle));
        Ok(())
    }

    async fn probe_exists(&self, feed: &FeedId, item: ItemId) -> Result<bool, TransportError> {
        let mut state = self.state.lock();
        state.probes += 1;
        let key = (feed.as_str().to_string(), item.get());
        Ok(state.items.contains(&key) || state.probe_only.contains(&key))
    }

    async fn notify(&self, recipient: i64, text: &str) -> Result<(), TransportError> {
        self.state.lock().notices.push((recipient, text.to_string()));
        Ok(())
    }
}

/// Memory store whose `list_feeds` can be made to fail a number of times.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    list_feeds_failures: AtomicUsize,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_list_feeds(&self, count: usize) {
        self.list_feeds_failures.store(count, Ordering::SeqCst);
    }
}

#[async_trait]
impl RelayStore for FlakyStore {
    async fn get_setting(&self, key: &str) -> crate::Result<Option<String>> {
        self.inner.get_setting(key).await
    }

    async fn set_setting(&self, key: &str, value: &str) -> crate::Result<()> {
        self.inner.set_setting(key, value).await
    }

    async fn list_destinations(&self) -> crate::Result<Vec<TargetDestination>> {
        self.inner.list_destinations().await
    }

    async fn add_destination(&self, id: DestinationId, kind: DestinationKind) -> crate::Result<bool> {
        self.inner.add_destination(id, kind).await
    }

    async fn remove_destination(&self, id: DestinationId) -> crate::Result<bool> {
        self.inner.remove_destination(id).await
    }

    async fn list_feeds(&self) -> crate::Result<Vec<FeedId>> {
        let failing = self
            .list_feeds_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(Error::Internal("database is locked".to_string()));
        }
        self.inner.list_feeds().await
    }

    async fn add_feed(&self, feed: &FeedId) -> crate::Result<bool> {
        self.inner.add_feed(feed).await
    }

    async fn remove_feed(&self, feed: &FeedId) -> crate::Result<bool> {
        self.inner.remove_feed(feed).await
    }

    async fn last_seen(&self, feed: &FeedId) -> crate::Result<Option<ItemId>> {
        self.inner.last_seen(feed).await
    }

    async fn save_last_seen(&self, feed: &FeedId, item: ItemId) -> crate::Result<()> {
        self.inner.save_last_seen(feed, item).await
    }

    async fn list_last_seen(&self) -> crate::Result<Vec<LastSeenItem>> {
        self.inner.list_last_seen().await
    }

    async fn delete_last_seen(&self, feed: &FeedId) -> crate::Result<()> {
        self.inner.delete_last_seen(feed).await
    }

    async fn published(&self, destination: DestinationId) -> crate::Result<Option<ItemId>> {
        self.inner.published(destination).await
    }

    async fn save_published(&self, destination: DestinationId, handle: ItemId) -> crate::Result<()> {
        self.inner.save_published(destination, handle).await
    }

    async fn list_published(&self) -> crate::Result<Vec<PublishedItem>> {
        self.inner.list_published().await
    }

    async fn delete_published(&self, destination: DestinationId) -> crate::Result<()> {
        self.inner.delete_published(destination).await
    }

    async fn append_forward_log(&self, item: ItemId) -> crate::Result<()> {
        self.inner.append_forward_log(item).await
    }

    async fn recent_forwards(&self, limit: u32) -> crate::Result<Vec<ForwardLogEntry>> {
        self.inner.recent_forwards(limit).await
    }

    async fn forward_stats(&self) -> crate::Result<ForwardStats> {
        self.inner.forward_stats().await
    }
}
