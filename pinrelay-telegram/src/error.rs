//! Bot API error types

use pinrelay_core::TransportError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {status} from {method}")]
    Http { status: u16, method: String },

    #[error("API error (code {code}): {description}")]
    Api { code: i64, description: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for TelegramError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.without_url().to_string())
    }
}

impl From<serde_json::Error> for TelegramError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

/// Descriptions the Bot API uses when a referenced message is gone
const MISSING_MESSAGE: &[&str] = &[
    "message to forward not found",
    "message not found",
    "message_id_invalid",
    "message to unpin not found",
    "message to delete not found",
    "message to copy not found",
];

impl TelegramError {
    /// True when the error says the referenced message no longer exists
    #[must_use]
    pub fn is_missing_message(&self) -> bool {
        match self {
            Self::Api { description, .. } => {
                let description = description.to_ascii_lowercase();
                MISSING_MESSAGE.iter().any(|phrase| description.contains(phrase))
            }
            _ => false,
        }
    }
}

impl From<TelegramError> for TransportError {
    fn from(err: TelegramError) -> Self {
        if err.is_missing_message() {
            return Self::ItemNotFound;
        }
        match err {
            TelegramError::Api { code, description } if (400..500).contains(&code) && code != 429 => {
                Self::Rejected(description)
            }
            TelegramError::Http { status, method } if (400..500).contains(&status) && status != 429 => {
                Self::Rejected(format!("HTTP {status} from {method}"))
            }
            other => Self::Unavailable(other.to_string()),
        }
    }
}
