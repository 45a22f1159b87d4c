//! Admin text commands

use std::fmt::Write as _;

use tracing::{info, warn};

use super::agent::RelayAgent;
use super::engine::StepOutcome;
use crate::{
    models::{DestinationId, FeedId, ItemId},
    Error, Result,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    Run,
    Stop,
    Interval(u64),
    AddFeed(FeedId),
    RemoveFeed(FeedId),
    RemoveChat(DestinationId),
    Chats,
    SetLast(FeedId, ItemId),
    GetLast(Option<FeedId>),
    FindLast(FeedId),
    Rotate,
    Status,
    Help,
}

const HELP: &str = "\
/run - start rotating
/stop - stop rotating and clear published items
/interval <minutes> - set the rotation interval (5-1440)
/addfeed <id> - register a source feed
/removefeed <id> - remove a source feed
/removechat <id> - remove a destination chat
/chats - list destination chats and what is published there
/setlast <feed> <item> - set the latest known item of a feed
/getlast [feed] - show the latest known items
/findlast <feed> - search for the latest item of a feed
/rotate - publish the feed in turn now
/status - show relay state";

impl AdminCommand {
    /// Parse a message text. Non-commands and unknown commands give `None`.
    pub fn parse(text: &str) -> Result<Option<Self>> {
        let mut parts = text.split_whitespace();
        let Some(head) = parts.next() else {
            return Ok(None);
        };
        let Some(name) = head.strip_prefix('/') else {
            return Ok(None);
        };
        let name = name.split('@').next().unwrap_or_default().to_ascii_lowercase();
        let arg = parts.next();
        let second = parts.next();

        let command = match name.as_str() {
            "run" | "start" => Self::Run,
            "stop" => Self::Stop,
            "interval" => {
                let raw = required(arg, "/interval <minutes>")?;
                let minutes = raw
                    .parse()
                    .map_err(|_| Error::InvalidInput(format!("'{raw}' is not a number of minutes")))?;
                Self::Interval(minutes)
            }
            "addfeed" => Self::AddFeed(FeedId::new(required(arg, "/addfeed <id>")?)),
            "removefeed" => Self::RemoveFeed(FeedId::new(required(arg, "/removefeed <id>")?)),
            "removechat" => {
                let raw = required(arg, "/removechat <id>")?;
                let id = raw
                    .parse::<i64>()
                    .map_err(|_| Error::InvalidInput(format!("'{raw}' is not a chat id")))?;
                Self::RemoveChat(DestinationId(id))
            }
            "chats" => Self::Chats,
            "setlast" => {
                let usage = "/setlast <feed> <item>";
                let feed = FeedId::new(required(arg, usage)?);
                let raw = required(second, usage)?;
                let item = raw
                    .parse::<i64>()
                    .ok()
                    .filter(|id| *id > 0)
                    .ok_or_else(|| Error::InvalidInput(format!("'{raw}' is not an item id")))?;
                Self::SetLast(feed, ItemId(item))
            }
            "getlast" => Self::GetLast(arg.map(FeedId::new)),
            "findlast" => Self::FindLast(FeedId::new(required(arg, "/findlast <feed>")?)),
            "rotate" => Self::Rotate,
            "status" => Self::Status,
            "help" => Self::Help,
            _ => return Ok(None),
        };
        Ok(Some(command))
    }
}

fn required<'a>(arg: Option<&'a str>, usage: &str) -> Result<&'a str> {
    arg.ok_or_else(|| Error::InvalidInput(format!("usage: {usage}")))
}

/// Run a command and produce the reply text. Failures become replies.
pub async fn execute(agent: &RelayAgent, command: AdminCommand) -> String {
    info!(command = ?command, "Admin command");
    match run(agent, command).await {
        Ok(reply) => reply,
        Err(Error::InvalidInput(message)) => message,
        Err(e) => {
            warn!(error = %e, "Admin command failed");
            format!("Command failed: {e}")
        }
    }
}

async fn run(agent: &RelayAgent, command: AdminCommand) -> Result<String> {
    let engine = agent.engine();
    let reply = match command {
        AdminCommand::Run => {
            if agent.start().await? {
                "Relay started.".to_string()
            } else {
                "Relay is already running.".to_string()
            }
        }
        AdminCommand::Stop => {
            if agent.stop().await? {
                "Relay stopped.".to_string()
            } else {
                "Relay is not running.".to_string()
            }
        }
        AdminCommand::Interval(minutes) => {
            let interval = agent.set_interval_minutes(minutes).await?;
            format!("Interval set to {}.", humantime::format_duration(interval))
        }
        AdminCommand::AddFeed(feed) => {
            let registration = engine.add_feed(&feed).await?;
            let mut reply = if registration.added {
                format!("Feed {feed} added.")
            } else {
                format!("Feed {feed} was already registered.")
            };
            match registration.latest {
                Some(item) => {
                    let _ = write!(reply, " Latest item: {item}.");
                }
                None => reply.push_str(" No item found yet."),
            }
            reply
        }
        AdminCommand::RemoveFeed(feed) => {
            if engine.remove_feed(&feed).await? {
                format!("Feed {feed} removed.")
            } else {
                format!("Feed {feed} is not registered.")
            }
        }
        AdminCommand::RemoveChat(id) => {
            if engine.remove_destination(id).await? {
                format!("Chat {id} removed.")
            } else {
                format!("Chat {id} is not a destination.")
            }
        }
        AdminCommand::Chats => {
            let destinations = engine.destinations().await?;
            if destinations.is_empty() {
                return Ok("No destination chats. Add the bot to a group to register one.".to_string());
            }
            let mut reply = "Destination chats:".to_string();
            for (destination, handle) in destinations {
                match handle {
                    Some(handle) => {
                        let _ = write!(reply, "\n{} {}: published {handle}", destination.kind, destination.id);
                    }
                    None => {
                        let _ = write!(reply, "\n{} {}: nothing published", destination.kind, destination.id);
                    }
                }
            }
            reply
        }
        AdminCommand::SetLast(feed, item) => {
            if !engine.is_registered(&feed).await? {
                return Ok(format!("Feed {feed} is not registered."));
            }
            engine.record_item(&feed, item).await?;
            format!("Latest item of {feed} set to {item}.")
        }
        AdminCommand::GetLast(feed) => {
            let items = engine.last_seen(feed.as_ref()).await?;
            if items.is_empty() {
                match feed {
                    Some(feed) => format!("No item known for {feed}."),
                    None => "No items known yet.".to_string(),
                }
            } else {
                items
                    .iter()
                    .map(|item| {
                        format!(
                            "{}: {} (seen {})",
                            item.feed_id,
                            item.item_id,
                            item.seen_at.format("%Y-%m-%d %H:%M:%S UTC")
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            }
        }
        AdminCommand::FindLast(feed) => {
            if !engine.is_registered(&feed).await? {
                return Ok(format!("Feed {feed} is not registered."));
            }
            match engine.relocate(&feed).await? {
                Some(item) => format!("Found item {item} in {feed}."),
                None => format!("No item found in {feed}."),
            }
        }
        AdminCommand::Rotate => match agent.rotate_now().await? {
            StepOutcome::NoFeeds => "No feeds registered.".to_string(),
            StepOutcome::Skipped(feed) => format!("No item known for {feed}."),
            StepOutcome::Published { feed, item, delivered: true } => {
                format!("Published item {item} of {feed}.")
            }
            StepOutcome::Published { feed, item, delivered: false } => {
                format!("Item {item} of {feed} reached no destination.")
            }
        },
        AdminCommand::Status => {
            let status = agent.status().await?;
            let mut reply = format!(
                "State: {}\nInterval: {}\nFeeds: {}\nDestinations: {}\nForwards: {}",
                if status.running { "running" } else { "idle" },
                humantime::format_duration(status.interval),
                status.feeds.len(),
                status.destinations.len(),
                status.stats.total_forwards,
            );
            if let Some(feed) = status.current_feed {
                let _ = write!(reply, "\nIn turn: {feed}");
            }
            if let Some(at) = status.stats.last_forward {
                let _ = write!(reply, "\nLast forward: {}", at.format("%Y-%m-%d %H:%M:%S UTC"));
            }
            reply
        }
        AdminCommand::Help => HELP.to_string(),
    };
    Ok(reply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::{
        models::{DestinationKind, ItemId},
        repository::{MemoryStore, RelayStore},
        service::agent::AgentSettings,
        test_helpers::{engine_with, FakeTransport},
    };

    #[test]
    fn test_parse_commands() {
        assert_eq!(AdminCommand::parse("/run").unwrap(), Some(AdminCommand::Run));
        assert_eq!(AdminCommand::parse("/run@relay_bot").unwrap(), Some(AdminCommand::Run));
        assert_eq!(AdminCommand::parse("/interval 30").unwrap(), Some(AdminCommand::Interval(30)));
        assert_eq!(
            AdminCommand::parse("/addfeed @news").unwrap(),
            Some(AdminCommand::AddFeed(FeedId::new("@news")))
        );
        assert_eq!(
            AdminCommand::parse("/removechat -100123").unwrap(),
            Some(AdminCommand::RemoveChat(DestinationId(-100_123)))
        );
        assert_eq!(AdminCommand::parse("/STATUS").unwrap(), Some(AdminCommand::Status));
        assert_eq!(AdminCommand::parse("/chats").unwrap(), Some(AdminCommand::Chats));
        assert_eq!(
            AdminCommand::parse("/setlast @news 120").unwrap(),
            Some(AdminCommand::SetLast(FeedId::new("@news"), ItemId(120)))
        );
        assert_eq!(AdminCommand::parse("/getlast").unwrap(), Some(AdminCommand::GetLast(None)));
        assert_eq!(
            AdminCommand::parse("/getlast news").unwrap(),
            Some(AdminCommand::GetLast(Some(FeedId::new("news"))))
        );
        assert_eq!(
            AdminCommand::parse("/findlast@relay_bot news").unwrap(),
            Some(AdminCommand::FindLast(FeedId::new("news")))
        );
    }

    #[test]
    fn test_parse_ignores_non_commands() {
        assert_eq!(AdminCommand::parse("").unwrap(), None);
        assert_eq!(AdminCommand::parse("hello").unwrap(), None);
        assert_eq!(AdminCommand::parse("/unknown").unwrap(), None);
    }

    #[test]
    fn test_parse_rejects_bad_arguments() {
        assert!(matches!(AdminCommand::parse("/interval"), Err(Error::InvalidInput(_))));
        assert!(matches!(AdminCommand::parse("/interval soon"), Err(Error::InvalidInput(_))));
        assert!(matches!(AdminCommand::parse("/removechat news"), Err(Error::InvalidInput(_))));
        assert!(matches!(AdminCommand::parse("/setlast news"), Err(Error::InvalidInput(_))));
        assert!(matches!(AdminCommand::parse("/setlast news 0"), Err(Error::InvalidInput(_))));
        assert!(matches!(AdminCommand::parse("/setlast news latest"), Err(Error::InvalidInput(_))));
        assert!(matches!(AdminCommand::parse("/findlast"), Err(Error::InvalidInput(_))));
    }

    async fn agent() -> (Arc<MemoryStore>, Arc<FakeTransport>, RelayAgent) {
        let store = Arc::new(MemoryStore::new());
        let transport = Arc::new(FakeTransport::new());
        let engine = Arc::new(engine_with(store.clone(), transport.clone()));
        let agent = RelayAgent::new(engine, transport.clone(), AgentSettings::default());
        (store, transport, agent)
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_lifecycle() {
        let (store, transport, agent) = agent().await;
        store.add_destination(DestinationId(-5), DestinationKind::Group).await.unwrap();
        transport.add_items("news", &[1001]);

        let reply = execute(&agent, AdminCommand::AddFeed(FeedId::new("news"))).await;
        assert_eq!(reply, "Feed news added. Latest item: 1001.");

        assert_eq!(execute(&agent, AdminCommand::Run).await, "Relay started.");
        assert_eq!(execute(&agent, AdminCommand::Run).await, "Relay is already running.");
        tokio::time::sleep(Duration::from_secs(1)).await;

        let status = execute(&agent, AdminCommand::Status).await;
        assert!(status.contains("State: running"));
        assert!(status.contains("In turn: news"));

        assert_eq!(execute(&agent, AdminCommand::Rotate).await, "Published item 1001 of news.");
        assert_eq!(execute(&agent, AdminCommand::Stop).await, "Relay stopped.");
        assert_eq!(store.published(DestinationId(-5)).await.unwrap(), None);
        assert_eq!(store.last_seen(&FeedId::new("news")).await.unwrap(), Some(ItemId(1001)));
    }

    #[tokio::test]
    async fn test_execute_reports_invalid_input() {
        let (_, _, agent) = agent().await;

        assert_eq!(
            execute(&agent, AdminCommand::Interval(2)).await,
            "interval must be between 5 and 1440 minutes"
        );
        assert_eq!(execute(&agent, AdminCommand::Rotate).await, "relay is not running");
        assert_eq!(execute(&agent, AdminCommand::Interval(60)).await, "Interval set to 1h.");
    }

    #[tokio::test]
    async fn test_execute_chats() {
        let (store, transport, agent) = agent().await;
        assert_eq!(
            execute(&agent, AdminCommand::Chats).await,
            "No destination chats. Add the bot to a group to register one."
        );

        store.add_destination(DestinationId(-5), DestinationKind::Group).await.unwrap();
        store.add_destination(DestinationId(-6), DestinationKind::Supergroup).await.unwrap();
        transport.add_items("news", &[3]);
        transport.fail_deliver(DestinationId(-6), crate::transport::TransportError::Rejected("forbidden".to_string()));
        agent.engine().publish_and_replace(&FeedId::new("news"), ItemId(3)).await.unwrap();
        let handle = store.published(DestinationId(-5)).await.unwrap().unwrap();

        assert_eq!(
            execute(&agent, AdminCommand::Chats).await,
            format!("Destination chats:\ngroup -5: published {handle}\nsupergroup -6: nothing published")
        );
    }

    #[tokio::test]
    async fn test_execute_set_get_and_find_last() {
        let (store, transport, agent) = agent().await;
        let feed = FeedId::new("news");

        assert_eq!(
            execute(&agent, AdminCommand::SetLast(feed.clone(), ItemId(40))).await,
            "Feed news is not registered."
        );
        assert_eq!(execute(&agent, AdminCommand::GetLast(None)).await, "No items known yet.");

        store.add_feed(&feed).await.unwrap();
        assert_eq!(
            execute(&agent, AdminCommand::SetLast(feed.clone(), ItemId(40))).await,
            "Latest item of news set to 40."
        );
        let reply = execute(&agent, AdminCommand::GetLast(Some(feed.clone()))).await;
        assert!(reply.starts_with("news: 40 (seen "));
        assert_eq!(
            execute(&agent, AdminCommand::GetLast(Some(FeedId::new("other")))).await,
            "No item known for other."
        );

        transport.add_items("news", &[44]);
        assert_eq!(execute(&agent, AdminCommand::FindLast(feed.clone())).await, "Found item 44 in news.");
        assert_eq!(store.last_seen(&feed).await.unwrap(), Some(ItemId(44)));

        store.add_feed(&FeedId::new("quiet")).await.unwrap();
        assert_eq!(
            execute(&agent, AdminCommand::FindLast(FeedId::new("quiet"))).await,
            "No item found in quiet."
        );
    }
}
