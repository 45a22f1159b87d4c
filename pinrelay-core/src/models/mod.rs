pub mod id;
pub mod relay;

pub use id::{DestinationId, FeedId, ItemId};
pub use relay::{
    DestinationKind, ForwardLogEntry, ForwardStats, LastSeenItem, PublishedItem, TargetDestination,
};
