//! Long-poll update dispatcher
//!
//! Channel posts feed the relay, membership changes of the bot add or drop
//! destinations, and text messages from admins are treated as commands.

use std::sync::Arc;
use std::time::Duration;

use pinrelay_core::{
    models::{DestinationId, ItemId},
    service::{commands, AdminCommand, RelayAgent},
    Error,
};
use pinrelay_telegram::{
    types::{ChatMemberUpdated, Message, Update},
    BotClient,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const RETRY_DELAY: Duration = Duration::from_secs(5);

pub struct UpdateDispatcher {
    client: Arc<BotClient>,
    agent: Arc<RelayAgent>,
    bot_id: i64,
}

impl UpdateDispatcher {
    pub fn new(client: Arc<BotClient>, agent: Arc<RelayAgent>, bot_id: i64) -> Self {
        Self { client, agent, bot_id }
    }

    /// Poll until cancelled. Poll errors are retried after a short delay.
    pub async fn run(self, cancel: CancellationToken) {
        let mut offset: Option<i64> = None;
        info!("Update dispatcher started");

        loop {
            let polled = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                polled = self.client.get_updates(offset) => polled,
            };

            let updates = match polled {
                Ok(updates) => updates,
                Err(e) => {
                    warn!(error = %e, "Polling for updates failed");
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => break,
                        () = tokio::time::sleep(RETRY_DELAY) => continue,
                    }
                }
            };

            for update in updates {
                offset = Some(update.update_id + 1);
                self.dispatch(update).await;
            }
        }

        info!("Update dispatcher stopped");
    }

    async fn dispatch(&self, update: Update) {
        debug!(update_id = update.update_id, "Update received");
        if let Some(post) = update.channel_post {
            self.on_channel_post(post).await;
        }
        if let Some(change) = update.my_chat_member {
            self.on_membership_change(change).await;
        }
        if let Some(message) = update.message {
            self.on_message(message).await;
        }
    }

    async fn on_channel_post(&self, post: Message) {
        let engine = self.agent.engine();
        let feed = match engine.registered_feed(post.chat.id, post.chat.username.as_deref()).await {
            Ok(Some(feed)) => feed,
            Ok(None) => return,
            Err(e) => {
                error!(chat = post.chat.id, error = %e, "Could not match channel post");
                return;
            }
        };

        let item = ItemId(post.message_id);
        match self.agent.handle_feed_item(&feed, item).await {
            Ok(published) => info!(feed = %feed, item = %item, published, "New feed item"),
            Err(e) => error!(feed = %feed, item = %item, error = %e, "Could not record feed item"),
        }
    }

    async fn on_membership_change(&self, change: ChatMemberUpdated) {
        if change.new_chat_member.user.id != self.bot_id {
            return;
        }

        let chat = &change.chat;
        let id = DestinationId(chat.id);
        let name = chat
            .title
            .clone()
            .or_else(|| chat.username.clone())
            .unwrap_or_else(|| chat.id.to_string());
        let joined = change.new_chat_member.is_present();
        let was_present = change.old_chat_member.is_present();
        let engine = self.agent.engine();

        if joined && !was_present {
            let Some(kind) = chat.destination_kind() else {
                warn!(chat = chat.id, kind = %chat.kind, "Unknown chat type, not registering");
                return;
            };
            if !kind.can_hold_publication() {
                debug!(chat = chat.id, kind = %kind, "Not a relay target, not registering");
                return;
            }
            match engine.add_destination(id, kind).await {
                Ok(true) => {
                    self.agent
                        .notify_admins(&format!("Added to {kind} {name} ({id})."))
                        .await;
                }
                Ok(false) => {}
                Err(e) => error!(destination = %id, error = %e, "Could not register destination"),
            }
        } else if !joined && was_present {
            match engine.destination_left(id).await {
                Ok(true) => {
                    self.agent
                        .notify_admins(&format!("Removed from {name} ({id})."))
                        .await;
                }
                Ok(false) => {}
                Err(e) => error!(destination = %id, error = %e, "Could not drop destination"),
            }
        }
    }

    async fn on_message(&self, message: Message) {
        let (Some(text), Some(from)) = (message.text.as_deref(), message.from.as_ref()) else {
            return;
        };

        let reply = match AdminCommand::parse(text) {
            Ok(None) => return,
            Ok(Some(_)) | Err(_) if !self.agent.is_admin(from.id) => {
                debug!(user = from.id, "Ignoring command from non-admin");
                return;
            }
            Ok(Some(command)) => commands::execute(&self.agent, command).await,
            Err(Error::InvalidInput(usage)) => usage,
            Err(e) => format!("Command failed: {e}"),
        };

        if let Err(e) = self.client.send_message(message.chat.id, &reply).await {
            warn!(chat = message.chat.id, error = %e, "Could not send command reply");
        }
    }
}
