//! Messaging transport seam
//!
//! The relay core only talks to chats through this trait. It never sees
//! transport payloads: items are identified by id and the transport hands
//! back the id of the delivered copy, which is what gets published.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{DestinationId, FeedId, ItemId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The referenced item no longer resolves (deleted or expired)
    #[error("item not found")]
    ItemNotFound,

    /// The destination refused the request (permissions, bad request)
    #[error("request rejected: {0}")]
    Rejected(String),

    /// Network failure or server-side error
    #[error("transport unavailable: {0}")]
    Unavailable(String),
}

impl TransportError {
    /// Stale references are the only errors that justify searching for another item.
    #[must_use]
    pub const fn is_stale_reference(&self) -> bool {
        matches!(self, Self::ItemNotFound)
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Copy `item` from `feed` into `destination`, returning the copy's id.
    async fn deliver(
        &self,
        destination: DestinationId,
        feed: &FeedId,
        item: ItemId,
    ) -> Result<ItemId, TransportError>;

    /// Publish (pin) a delivered copy.
    async fn publish(&self, destination: DestinationId, handle: ItemId) -> Result<(), TransportError>;

    /// Remove a previously published copy from its published position.
    async fn unpublish(&self, destination: DestinationId, handle: ItemId) -> Result<(), TransportError>;

    /// Cheap existence check for an item on a feed.
    async fn probe_exists(&self, feed: &FeedId, item: ItemId) -> Result<bool, TransportError>;

    /// Send a plain-text notice to a user.
    async fn notify(&self, recipient: i64, text: &str) -> Result<(), TransportError>;
}
