//! Relay lifecycle
//!
//! The agent owns the Idle/Running state. Every transition happens while
//! holding the state lock, so at most one rotation task is ever live.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{error, info, warn};

use super::engine::{RelayEngine, StepOutcome};
use super::rotation::RotationTask;
use crate::{
    config::Config,
    models::{FeedId, ForwardStats, ItemId, TargetDestination},
    transport::Transport,
    Error, Result,
};

pub const MIN_INTERVAL_SECS: u64 = 300;
pub const MAX_INTERVAL_SECS: u64 = 86_400;

/// Store key holding the rotation interval in seconds
pub const INTERVAL_KEY: &str = "rotation_interval";

pub enum RelayState {
    Idle,
    Running {
        interval: Duration,
        cursor: Arc<AtomicUsize>,
        task: RotationTask,
    },
}

impl RelayState {
    #[must_use]
    pub const fn is_running(&self) -> bool {
        matches!(self, Self::Running { .. })
    }
}

#[derive(Debug, Clone)]
pub struct AgentSettings {
    /// Recipients of start/stop notices
    pub admins: Vec<i64>,
    pub auto_forward: bool,
    pub default_interval: Duration,
    pub restart_backoff: Duration,
}

impl AgentSettings {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            admins: config.privileged_ids(),
            auto_forward: config.relay.auto_forward,
            default_interval: Duration::from_secs(config.relay.default_interval_seconds),
            restart_backoff: Duration::from_secs(config.relay.restart_backoff_seconds),
        }
    }
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            admins: Vec::new(),
            auto_forward: false,
            default_interval: Duration::from_secs(7200),
            restart_backoff: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AgentStatus {
    pub running: bool,
    pub interval: Duration,
    pub current_feed: Option<FeedId>,
    pub feeds: Vec<FeedId>,
    pub destinations: Vec<TargetDestination>,
    pub stats: ForwardStats,
}

pub struct RelayAgent {
    engine: Arc<RelayEngine>,
    transport: Arc<dyn Transport>,
    settings: AgentSettings,
    state: Mutex<RelayState>,
}

impl RelayAgent {
    #[must_use]
    pub fn new(engine: Arc<RelayEngine>, transport: Arc<dyn Transport>, settings: AgentSettings) -> Self {
        Self {
            engine,
            transport,
            settings,
            state: Mutex::new(RelayState::Idle),
        }
    }

    #[must_use]
    pub fn engine(&self) -> &Arc<RelayEngine> {
        &self.engine
    }

    #[must_use]
    pub fn is_admin(&self, user_id: i64) -> bool {
        self.settings.admins.contains(&user_id)
    }

    pub async fn is_running(&self) -> bool {
        self.state.lock().await.is_running()
    }

    /// Idle -> Running. Returns `false` if already running.
    pub async fn start(&self) -> Result<bool> {
        let mut state = self.state.lock().await;
        if state.is_running() {
            info!("Relay already running");
            return Ok(false);
        }

        let interval = self.stored_interval().await?;
        let cursor = Arc::new(AtomicUsize::new(0));
        let task = RotationTask::spawn(
            self.engine.clone(),
            cursor.clone(),
            interval,
            self.settings.restart_backoff,
            true,
        );
        *state = RelayState::Running { interval, cursor, task };
        drop(state);

        info!(interval = ?interval, "Relay started");
        self.notify_admins(&format!(
            "Relay started. Rotating every {}.",
            humantime::format_duration(interval)
        ))
        .await;
        Ok(true)
    }

    /// Running -> Idle. Clears every published item best effort.
    /// Returns `false` if already idle.
    pub async fn stop(&self) -> Result<bool> {
        let mut state = self.state.lock().await;
        let RelayState::Running { task, .. } = std::mem::replace(&mut *state, RelayState::Idle) else {
            info!("Relay already idle");
            return Ok(false);
        };

        task.stop().await;
        match self.engine.unpublish_all().await {
            Ok(cleared) => info!(cleared, "Relay stopped"),
            Err(e) => error!(error = %e, "Relay stopped, clearing published items failed"),
        }
        drop(state);

        self.notify_admins("Relay stopped. Published items cleared.").await;
        Ok(true)
    }

    /// Persist a new interval and reschedule a running rotation. The next
    /// step fires one new interval from now.
    pub async fn set_interval_minutes(&self, minutes: u64) -> Result<Duration> {
        let seconds = minutes.saturating_mul(60);
        if !(MIN_INTERVAL_SECS..=MAX_INTERVAL_SECS).contains(&seconds) {
            return Err(Error::InvalidInput(format!(
                "interval must be between {} and {} minutes",
                MIN_INTERVAL_SECS / 60,
                MAX_INTERVAL_SECS / 60
            )));
        }
        let interval = Duration::from_secs(seconds);

        let mut state = self.state.lock().await;
        self.engine
            .store()
            .set_setting(INTERVAL_KEY, &seconds.to_string())
            .await?;

        if let RelayState::Running { cursor, task, .. } = std::mem::replace(&mut *state, RelayState::Idle) {
            task.stop().await;
            let task = RotationTask::spawn(
                self.engine.clone(),
                cursor.clone(),
                interval,
                self.settings.restart_backoff,
                false,
            );
            *state = RelayState::Running { interval, cursor, task };
            info!(interval = ?interval, "Rotation rescheduled");
        } else {
            info!(interval = ?interval, "Rotation interval updated");
        }

        Ok(interval)
    }

    /// Publish the feed in turn now, without advancing the rotation.
    pub async fn rotate_now(&self) -> Result<StepOutcome> {
        let cursor = match &*self.state.lock().await {
            RelayState::Running { cursor, .. } => cursor.clone(),
            RelayState::Idle => return Err(Error::InvalidInput("relay is not running".to_string())),
        };
        self.engine.rotation_step(cursor.load(Ordering::SeqCst)).await
    }

    /// Record a new item of a feed. With auto-forward enabled and the feed in
    /// turn, it is published right away. Returns whether a publish happened.
    pub async fn handle_feed_item(&self, feed: &FeedId, item: ItemId) -> Result<bool> {
        self.engine.record_item(feed, item).await?;

        if !self.settings.auto_forward {
            return Ok(false);
        }

        let state = self.state.lock().await;
        let RelayState::Running { cursor, .. } = &*state else {
            return Ok(false);
        };
        let in_turn = self.engine.feed_in_turn(cursor.load(Ordering::SeqCst)).await?;
        if in_turn.as_ref() != Some(feed) {
            return Ok(false);
        }

        info!(feed = %feed, item = %item, "Publishing new item of feed in turn");
        let delivered = self.engine.publish_and_replace(feed, item).await?;
        drop(state);
        Ok(delivered)
    }

    /// Stop the rotation task for process exit. Published items stay.
    pub async fn shutdown(&self) {
        let mut state = self.state.lock().await;
        if let RelayState::Running { task, .. } = std::mem::replace(&mut *state, RelayState::Idle) {
            task.stop().await;
            info!("Rotation task stopped for shutdown");
        }
    }

    pub async fn status(&self) -> Result<AgentStatus> {
        let (running, interval, turn) = match &*self.state.lock().await {
            RelayState::Running { interval, cursor, .. } => (true, *interval, Some(cursor.load(Ordering::SeqCst))),
            RelayState::Idle => (false, self.stored_interval().await?, None),
        };

        let current_feed = match turn {
            Some(turn) => self.engine.feed_in_turn(turn).await?,
            None => None,
        };

        let store = self.engine.store();
        Ok(AgentStatus {
            running,
            interval,
            current_feed,
            feeds: store.list_feeds().await?,
            destinations: store.list_destinations().await?,
            stats: self.engine.stats().await?,
        })
    }

    async fn stored_interval(&self) -> Result<Duration> {
        let default = self.settings.default_interval;
        let Some(raw) = self.engine.store().get_setting(INTERVAL_KEY).await? else {
            return Ok(default);
        };

        match raw.trim().parse::<u64>() {
            Ok(seconds) if (MIN_INTERVAL_SECS..=MAX_INTERVAL_SECS).contains(&seconds) => {
                Ok(Duration::from_secs(seconds))
            }
            Ok(seconds) => {
                let clamped = seconds.clamp(MIN_INTERVAL_SECS, MAX_INTERVAL_SECS);
                warn!(stored = seconds, using = clamped, "Stored interval out of bounds");
                Ok(Duration::from_secs(clamped))
            }
            Err(e) => {
                warn!(stored = %raw, error = %e, "Stored interval is not a number, using default");
                Ok(default)
            }
        }
    }

    /// Send a notice to every admin. Failures are logged.
    pub async fn notify_admins(&self, text: &str) {
        for admin in &self.settings.admins {
            if let Err(e) = self.transport.notify(*admin, text).await {
                warn!(admin, error = %e, "Could not notify admin");
            }
        }
    }
}
