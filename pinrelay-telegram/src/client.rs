//! Bot API HTTP client
//!
//! Every method is a JSON POST to `{api_base}/bot{token}/{method}`. The
//! token never appears in errors or logs.

use std::time::Duration;

use pinrelay_core::{
    config::TelegramConfig,
    models::{DestinationId, FeedId, ItemId},
};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

use super::error::TelegramError;
use super::types::{ApiResponse, Message, Update, User};

const ALLOWED_UPDATES: &[&str] = &["message", "channel_post", "my_chat_member"];

pub struct BotClient {
    client: Client,
    endpoint: String,
    poll_timeout: u64,
}

impl BotClient {
    pub fn new(config: &TelegramConfig) -> Result<Self, TelegramError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(
                config.request_timeout_seconds.max(config.poll_timeout_seconds + 5),
            ))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/bot{}", config.api_base.trim_end_matches('/'), config.bot_token),
            poll_timeout: config.poll_timeout_seconds,
        })
    }

    async fn call<P, T>(&self, method: &str, params: &P) -> Result<T, TelegramError>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}/{method}", self.endpoint);
        let response = self.client.post(&url).json(params).send().await?;
        let status = response.status();
        let body = response.text().await?;

        // error replies carry the same envelope, so parse before checking status
        let envelope: ApiResponse<T> = match serde_json::from_str(&body) {
            Ok(envelope) => envelope,
            Err(e) if status.is_success() => return Err(e.into()),
            Err(_) => {
                return Err(TelegramError::Http {
                    status: status.as_u16(),
                    method: method.to_string(),
                })
            }
        };

        if !envelope.ok {
            return Err(TelegramError::Api {
                code: envelope.error_code.unwrap_or_else(|| i64::from(status.as_u16())),
                description: envelope.description.unwrap_or_default(),
            });
        }

        debug!(method, "Bot API call succeeded");
        envelope
            .result
            .ok_or_else(|| TelegramError::Parse(format!("{method}: missing result")))
    }

    pub async fn get_me(&self) -> Result<User, TelegramError> {
        self.call("getMe", &json!({})).await
    }

    /// Long-poll for updates after `offset`.
    pub async fn get_updates(&self, offset: Option<i64>) -> Result<Vec<Update>, TelegramError> {
        let params = json!({
            "offset": offset,
            "timeout": self.poll_timeout,
            "allowed_updates": ALLOWED_UPDATES,
        });
        self.call("getUpdates", &params).await
    }

    pub async fn forward_message(
        &self,
        chat_id: i64,
        from: &FeedId,
        message_id: ItemId,
    ) -> Result<Message, TelegramError> {
        let params = json!({
            "chat_id": chat_id,
            "from_chat_id": chat_ref(from),
            "message_id": message_id.get(),
        });
        self.call("forwardMessage", &params).await
    }

    /// Pin without notifying members.
    pub async fn pin_chat_message(&self, chat: DestinationId, message_id: ItemId) -> Result<bool, TelegramError> {
        let params = json!({
            "chat_id": chat.get(),
            "message_id": message_id.get(),
            "disable_notification": true,
        });
        self.call("pinChatMessage", &params).await
    }

    pub async fn unpin_chat_message(&self, chat: DestinationId, message_id: ItemId) -> Result<bool, TelegramError> {
        let params = json!({
            "chat_id": chat.get(),
            "message_id": message_id.get(),
        });
        self.call("unpinChatMessage", &params).await
    }

    pub async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<bool, TelegramError> {
        let params = json!({
            "chat_id": chat_id,
            "message_id": message_id,
        });
        self.call("deleteMessage", &params).await
    }

    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<Message, TelegramError> {
        let params = json!({
            "chat_id": chat_id,
            "text": text,
        });
        self.call("sendMessage", &params).await
    }
}

/// Numeric ids are sent as numbers, usernames as `@name`.
fn chat_ref(feed: &FeedId) -> Value {
    match feed.as_str().parse::<i64>() {
        Ok(id) => json!(id),
        Err(_) => json!(format!("@{}", feed.as_str().trim_start_matches('@'))),
    }
}
