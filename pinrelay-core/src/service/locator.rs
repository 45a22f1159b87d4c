//! Stale-item recovery
//!
//! When the item recorded for a feed no longer resolves, nearby ids are
//! probed until one does. The search is bounded per direction so that a feed
//! with a large gap costs at most `2 * probe_limit` transport calls.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::{
    config::LocatorConfig,
    models::{FeedId, ItemId},
    transport::Transport,
};

pub struct ItemLocator {
    transport: Arc<dyn Transport>,
    probe_limit: u32,
    default_start: i64,
}

impl ItemLocator {
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, config: &LocatorConfig) -> Self {
        Self {
            transport,
            probe_limit: config.probe_limit.max(1),
            default_start: config.default_start.max(1),
        }
    }

    /// Find a resolvable item near `hint`.
    ///
    /// Probes `hint+limit` down to `hint+1` first, so the newest resolvable
    /// item in that window wins. Then walks back from `hint` itself for
    /// another `limit` ids, never below 1. The first resolvable id in that
    /// order is returned.
    pub async fn locate(&self, feed: &FeedId, hint: Option<ItemId>) -> Option<ItemId> {
        let start = hint.map_or(self.default_start, ItemId::get);
        let limit = i64::from(self.probe_limit);
        let mut probes = 0_u32;

        for candidate in ((start + 1)..=(start + limit)).rev() {
            probes += 1;
            if self.probe(feed, ItemId(candidate), probes).await {
                info!(feed = %feed, item = candidate, probes, "Located newer item");
                return Some(ItemId(candidate));
            }
        }

        let lowest = (start - limit + 1).max(1);
        for candidate in (lowest..=start).rev() {
            probes += 1;
            if self.probe(feed, ItemId(candidate), probes).await {
                info!(feed = %feed, item = candidate, probes, "Located earlier item");
                return Some(ItemId(candidate));
            }
        }

        warn!(feed = %feed, start, probes, "No resolvable item within probe bound");
        None
    }

    async fn probe(&self, feed: &FeedId, candidate: ItemId, probes: u32) -> bool {
        if probes % 10 == 0 {
            debug!(feed = %feed, probes, "Still probing for a resolvable item");
        }

        match self.transport.probe_exists(feed, candidate).await {
            Ok(found) => found,
            Err(e) if e.is_stale_reference() => false,
            Err(e) => {
                warn!(feed = %feed, item = %candidate, error = %e, "Unexpected error while probing item");
                false
            }
        }
    }
}
