use serde::{Deserialize, Serialize};

/// Source feed identifier: a channel id such as `-1001234567890` or a public username.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct FeedId(pub String);

impl FeedId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into().trim().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the feed and the destination are the same chat.
    #[must_use]
    pub fn refers_to(&self, destination: DestinationId) -> bool {
        self.0.parse::<i64>().is_ok_and(|id| id == destination.0)
    }

    /// Match an incoming post against this feed, either by numeric chat id or
    /// by username (leading `@` and letter case ignored).
    #[must_use]
    pub fn matches_chat(&self, chat_id: i64, username: Option<&str>) -> bool {
        if self.0.parse::<i64>().is_ok_and(|id| id == chat_id) {
            return true;
        }
        username.is_some_and(|name| {
            self.0
                .trim_start_matches('@')
                .eq_ignore_ascii_case(name.trim_start_matches('@'))
        })
    }
}

impl std::fmt::Display for FeedId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for FeedId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for FeedId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Destination chat identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct DestinationId(pub i64);

impl DestinationId {
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for DestinationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for DestinationId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Item (message) id. Monotonically increasing within one chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct ItemId(pub i64);

impl ItemId {
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ItemId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}
