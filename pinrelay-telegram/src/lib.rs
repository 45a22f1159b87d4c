//! Telegram Bot API transport for the relay
//!
//! `BotClient` is a thin JSON client over the Bot API. `TelegramTransport`
//! maps the relay's transport operations onto it: deliver is a forward,
//! publish is a silent pin, and existence probes forward into the owner's
//! private chat and delete the copy again.

pub mod client;
pub mod error;
pub mod transport;
pub mod types;

pub use client::BotClient;
pub use error::TelegramError;
pub use transport::TelegramTransport;
