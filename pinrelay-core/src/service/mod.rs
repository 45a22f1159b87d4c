//! Relay services
//!
//! `RelayEngine` publishes items, `ItemLocator` recovers stale ones,
//! `RelayAgent` drives the rotation lifecycle and `commands` maps admin text
//! to agent calls.

pub mod agent;
pub mod commands;
pub mod engine;
pub mod locator;
pub mod rotation;

pub use agent::{AgentSettings, AgentStatus, RelayAgent, RelayState};
pub use commands::AdminCommand;
pub use engine::{FeedRegistration, RelayEngine, StepOutcome};
pub use locator::ItemLocator;
pub use rotation::RotationTask;
