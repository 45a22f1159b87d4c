use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{DestinationId, FeedId, ItemId};

/// Chat type of a destination, as reported by the membership event that added it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestinationKind {
    Private,
    Group,
    Supergroup,
    Channel,
}

impl DestinationKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::Group => "group",
            Self::Supergroup => "supergroup",
            Self::Channel => "channel",
        }
    }

    /// Whether this kind of chat can be a relay target. Channels are
    /// sources: the bot is an admin there to receive posts, and relaying
    /// into them could pin a channel's own post inside itself.
    #[must_use]
    pub const fn can_hold_publication(self) -> bool {
        matches!(self, Self::Group | Self::Supergroup)
    }
}

impl std::fmt::Display for DestinationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DestinationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "private" => Ok(Self::Private),
            "group" => Ok(Self::Group),
            "supergroup" => Ok(Self::Supergroup),
            "channel" => Ok(Self::Channel),
            other => Err(format!("unknown destination kind: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetDestination {
    pub id: DestinationId,
    pub kind: DestinationKind,
    pub added_at: DateTime<Utc>,
}

/// Latest item observed on a feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastSeenItem {
    pub feed_id: FeedId,
    pub item_id: ItemId,
    pub seen_at: DateTime<Utc>,
}

/// Item currently published at a destination. `item_id` is the handle of the
/// delivered copy inside the destination, not the source item id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedItem {
    pub destination_id: DestinationId,
    pub item_id: ItemId,
    pub published_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardLogEntry {
    pub id: i64,
    pub item_id: ItemId,
    pub forwarded_at: DateTime<Utc>,
}

/// Forwarding statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardStats {
    pub total_forwards: i64,
    pub last_forward: Option<DateTime<Utc>>,
    pub last_seen: Vec<LastSeenItem>,
}
