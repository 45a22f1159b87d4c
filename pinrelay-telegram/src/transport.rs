//! `Transport` over the Bot API

use std::sync::Arc;

use async_trait::async_trait;
use pinrelay_core::{
    models::{DestinationId, FeedId, ItemId},
    Transport, TransportError,
};
use tracing::warn;

use super::client::BotClient;

pub struct TelegramTransport {
    client: Arc<BotClient>,
    /// Private chat that receives (and immediately loses) probe copies
    owner_id: i64,
}

impl TelegramTransport {
    #[must_use]
    pub fn new(client: Arc<BotClient>, owner_id: i64) -> Self {
        Self { client, owner_id }
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn deliver(
        &self,
        destination: DestinationId,
        feed: &FeedId,
        item: ItemId,
    ) -> Result<ItemId, TransportError> {
        let message = self.client.forward_message(destination.get(), feed, item).await?;
        Ok(ItemId(message.message_id))
    }

    async fn publish(&self, destination: DestinationId, handle: ItemId) -> Result<(), TransportError> {
        self.client.pin_chat_message(destination, handle).await?;
        Ok(())
    }

    async fn unpublish(&self, destination: DestinationId, handle: ItemId) -> Result<(), TransportError> {
        self.client.unpin_chat_message(destination, handle).await?;
        Ok(())
    }

    async fn probe_exists(&self, feed: &FeedId, item: ItemId) -> Result<bool, TransportError> {
        let copy = match self.client.forward_message(self.owner_id, feed, item).await {
            Ok(copy) => copy,
            Err(e) if e.is_missing_message() => return Ok(false),
            Err(e) => return Err(e.into()),
        };

        if let Err(e) = self.client.delete_message(self.owner_id, copy.message_id).await {
            warn!(feed = %feed, item = %item, error = %e, "Could not delete probe copy");
        }
        Ok(true)
    }

    async fn notify(&self, recipient: i64, text: &str) -> Result<(), TransportError> {
        self.client.send_message(recipient, text).await?;
        Ok(())
    }
}
