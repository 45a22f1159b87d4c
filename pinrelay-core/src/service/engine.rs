//! Publish-and-replace across destinations
//!
//! Every destination holds at most one published item. Publishing a new
//! item delivers it, clears the previous one (best effort), then records the
//! new one. Delivering the new item takes priority: a failure to clear the
//! old item is logged and never blocks the new one.
//!
//! All publish operations go through one async mutex, so rotation steps,
//! immediate rotations and auto-forward publishes never interleave.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::{
    models::{DestinationId, DestinationKind, FeedId, ForwardStats, ItemId, LastSeenItem, TargetDestination},
    repository::RelayStore,
    service::locator::ItemLocator,
    transport::Transport,
    Result,
};

/// Result of one rotation step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// No feeds registered
    NoFeeds,
    /// Nothing known or locatable for the feed in turn
    Skipped(FeedId),
    /// `publish_and_replace` ran; `true` if any destination received the item
    Published { feed: FeedId, item: ItemId, delivered: bool },
}

/// Result of registering a feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedRegistration {
    pub added: bool,
    pub latest: Option<ItemId>,
}

enum Round {
    Finished(bool),
    /// A stale item cut the round short; destinations before it may
    /// already have received it.
    Stale { delivered: bool },
}

pub struct RelayEngine {
    store: Arc<dyn RelayStore>,
    transport: Arc<dyn Transport>,
    locator: ItemLocator,
    publish_lock: Mutex<()>,
}

impl RelayEngine {
    #[must_use]
    pub fn new(store: Arc<dyn RelayStore>, transport: Arc<dyn Transport>, locator: ItemLocator) -> Self {
        Self {
            store,
            transport,
            locator,
            publish_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn RelayStore> {
        &self.store
    }

    /// Publish `item` of `feed` to every registered destination.
    ///
    /// Returns `true` if at least one destination received the item. A stale
    /// item triggers a single locator search; if that finds another item it
    /// becomes the feed's last seen item and the publish is retried once.
    pub async fn publish_and_replace(&self, feed: &FeedId, item: ItemId) -> Result<bool> {
        let _guard = self.publish_lock.lock().await;
        self.publish_locked(feed, item).await
    }

    async fn publish_locked(&self, feed: &FeedId, item: ItemId) -> Result<bool> {
        let destinations = self.store.list_destinations().await?;
        if destinations.is_empty() {
            warn!(feed = %feed, "No destinations registered, nothing to publish");
            return Ok(false);
        }

        let delivered_first = match self.publish_round(&destinations, feed, item).await? {
            Round::Finished(delivered) => return Ok(delivered),
            Round::Stale { delivered } => delivered,
        };

        warn!(feed = %feed, item = %item, "Item no longer resolves, searching for another one");
        let Some(replacement) = self.locator.locate(feed, Some(item)).await else {
            error!(feed = %feed, item = %item, "Could not locate a replacement item");
            return Ok(delivered_first);
        };
        if replacement == item {
            error!(feed = %feed, item = %item, "Locator returned the stale item again");
            return Ok(delivered_first);
        }

        info!(feed = %feed, stale = %item, item = %replacement, "Retrying publish with located item");
        self.store.save_last_seen(feed, replacement).await?;

        match self.publish_round(&destinations, feed, replacement).await? {
            Round::Finished(delivered) => Ok(delivered_first || delivered),
            Round::Stale { delivered } => {
                error!(feed = %feed, item = %replacement, "Located item is stale as well, giving up until next rotation");
                Ok(delivered_first || delivered)
            }
        }
    }

    async fn publish_round(
        &self,
        destinations: &[TargetDestination],
        feed: &FeedId,
        item: ItemId,
    ) -> Result<Round> {
        let mut delivered_any = false;

        for destination in destinations {
            let id = destination.id;

            if feed.refers_to(id) {
                debug!(feed = %feed, destination = %id, "Skipping self-relay");
                continue;
            }
            if !destination.kind.can_hold_publication() {
                info!(destination = %id, kind = %destination.kind, "Destination cannot hold a published item, skipping");
                continue;
            }

            let previous = self.store.published(id).await?;

            let handle = match self.transport.deliver(id, feed, item).await {
                Ok(handle) => handle,
                Err(e) if e.is_stale_reference() => return Ok(Round::Stale { delivered: delivered_any }),
                Err(e) => {
                    warn!(feed = %feed, item = %item, destination = %id, error = %e, "Delivery failed");
                    continue;
                }
            };
            delivered_any = true;
            self.store.append_forward_log(item).await?;
            debug!(feed = %feed, item = %item, destination = %id, handle = %handle, "Delivered");

            if let Some(previous) = previous {
                match self.transport.unpublish(id, previous).await {
                    Ok(()) => self.store.delete_published(id).await?,
                    Err(e) if e.is_stale_reference() => self.store.delete_published(id).await?,
                    Err(e) => {
                        warn!(destination = %id, item = %previous, error = %e, "Could not clear previously published item");
                    }
                }
            }

            match self.transport.publish(id, handle).await {
                Ok(()) => {
                    self.store.save_published(id, handle).await?;
                    info!(feed = %feed, item = %item, destination = %id, "Published");
                }
                Err(e) => {
                    error!(feed = %feed, item = %item, destination = %id, error = %e, "Delivered but could not publish");
                }
            }
        }

        Ok(Round::Finished(delivered_any))
    }

    /// Feed whose turn it is for the given rotation cursor
    pub async fn feed_in_turn(&self, turn: usize) -> Result<Option<FeedId>> {
        let feeds = self.store.list_feeds().await?;
        if feeds.is_empty() {
            return Ok(None);
        }
        Ok(feeds.get(turn % feeds.len()).cloned())
    }

    /// Publish the latest item of the feed in turn.
    pub async fn rotation_step(&self, turn: usize) -> Result<StepOutcome> {
        let _guard = self.publish_lock.lock().await;

        let Some(feed) = self.feed_in_turn(turn).await? else {
            warn!("No source feeds registered, rotation step skipped");
            return Ok(StepOutcome::NoFeeds);
        };

        let item = match self.store.last_seen(&feed).await? {
            Some(item) => item,
            None => match self.locator.locate(&feed, None).await {
                Some(found) => {
                    self.store.save_last_seen(&feed, found).await?;
                    found
                }
                None => {
                    warn!(feed = %feed, "No item recorded or locatable for feed, skipping its turn");
                    return Ok(StepOutcome::Skipped(feed));
                }
            },
        };

        info!(feed = %feed, item = %item, turn, "Rotation step");
        let delivered = self.publish_locked(&feed, item).await?;
        if !delivered {
            error!(feed = %feed, item = %item, "Rotation step reached no destination");
        }

        Ok(StepOutcome::Published { feed, item, delivered })
    }

    /// Clear every published item. Items that are already gone are
    /// forgotten; other failures keep their record for a later attempt.
    /// Returns the number of records cleared.
    pub async fn unpublish_all(&self) -> Result<usize> {
        let _guard = self.publish_lock.lock().await;
        let mut cleared = 0;

        for published in self.store.list_published().await? {
            let id = published.destination_id;
            match self.transport.unpublish(id, published.item_id).await {
                Ok(()) => {
                    self.store.delete_published(id).await?;
                    cleared += 1;
                    info!(destination = %id, item = %published.item_id, "Unpublished");
                }
                Err(e) if e.is_stale_reference() => {
                    self.store.delete_published(id).await?;
                    cleared += 1;
                    info!(destination = %id, item = %published.item_id, "Published item already gone, record dropped");
                }
                Err(e) => {
                    error!(destination = %id, item = %published.item_id, error = %e, "Could not unpublish");
                }
            }
        }

        Ok(cleared)
    }

    /// Record the latest item of a feed.
    pub async fn record_item(&self, feed: &FeedId, item: ItemId) -> Result<()> {
        self.store.save_last_seen(feed, item).await
    }

    /// Register a relay target. Kinds that cannot hold a pinned item are
    /// refused and `false` is returned.
    pub async fn add_destination(&self, id: DestinationId, kind: DestinationKind) -> Result<bool> {
        if !kind.can_hold_publication() {
            info!(destination = %id, kind = %kind, "Not a relay target, ignoring");
            return Ok(false);
        }
        let added = self.store.add_destination(id, kind).await?;
        if added {
            info!(destination = %id, kind = %kind, "Destination registered");
        }
        Ok(added)
    }

    /// Remove a destination on request: clear its published item first.
    pub async fn remove_destination(&self, id: DestinationId) -> Result<bool> {
        let _guard = self.publish_lock.lock().await;

        if let Some(handle) = self.store.published(id).await? {
            if let Err(e) = self.transport.unpublish(id, handle).await {
                warn!(destination = %id, item = %handle, error = %e, "Could not unpublish before removal");
            }
        }
        self.store.delete_published(id).await?;
        let removed = self.store.remove_destination(id).await?;
        if removed {
            info!(destination = %id, "Destination removed");
        }
        Ok(removed)
    }

    /// The agent lost access to a destination; there is nothing to unpublish.
    pub async fn destination_left(&self, id: DestinationId) -> Result<bool> {
        let _guard = self.publish_lock.lock().await;

        self.store.delete_published(id).await?;
        let removed = self.store.remove_destination(id).await?;
        if removed {
            info!(destination = %id, "Destination left");
        }
        Ok(removed)
    }

    /// Register a feed and try to find its latest item.
    pub async fn add_feed(&self, feed: &FeedId) -> Result<FeedRegistration> {
        let added = self.store.add_feed(feed).await?;
        let latest = match self.relocate(feed).await? {
            Some(item) => Some(item),
            None => self.store.last_seen(feed).await?,
        };

        info!(feed = %feed, added, latest = ?latest, "Feed registered");
        Ok(FeedRegistration { added, latest })
    }

    /// Search around the recorded item of a feed and record what is found.
    pub async fn relocate(&self, feed: &FeedId) -> Result<Option<ItemId>> {
        let hint = self.store.last_seen(feed).await?;
        let Some(found) = self.locator.locate(feed, hint).await else {
            return Ok(None);
        };
        self.store.save_last_seen(feed, found).await?;
        Ok(Some(found))
    }

    pub async fn is_registered(&self, feed: &FeedId) -> Result<bool> {
        Ok(self.store.list_feeds().await?.contains(feed))
    }

    /// Recorded items, for one feed or all of them
    pub async fn last_seen(&self, feed: Option<&FeedId>) -> Result<Vec<LastSeenItem>> {
        let mut items = self.store.list_last_seen().await?;
        if let Some(feed) = feed {
            items.retain(|item| &item.feed_id == feed);
        }
        Ok(items)
    }

    /// Destinations paired with the handle currently published there
    pub async fn destinations(&self) -> Result<Vec<(TargetDestination, Option<ItemId>)>> {
        let published = self.store.list_published().await?;
        let destinations = self.store.list_destinations().await?;
        Ok(destinations
            .into_iter()
            .map(|destination| {
                let handle = published
                    .iter()
                    .find(|p| p.destination_id == destination.id)
                    .map(|p| p.item_id);
                (destination, handle)
            })
            .collect())
    }

    pub async fn remove_feed(&self, feed: &FeedId) -> Result<bool> {
        let removed = self.store.remove_feed(feed).await?;
        self.store.delete_last_seen(feed).await?;
        if removed {
            info!(feed = %feed, "Feed removed");
        }
        Ok(removed)
    }

    /// Registered feed an incoming post belongs to, if any
    pub async fn registered_feed(&self, chat_id: i64, username: Option<&str>) -> Result<Option<FeedId>> {
        let feeds = self.store.list_feeds().await?;
        Ok(feeds.into_iter().find(|feed| feed.matches_chat(chat_id, username)))
    }

    pub async fn stats(&self) -> Result<ForwardStats> {
        self.store.forward_stats().await
    }
}
