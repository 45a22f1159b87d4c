//! Bootstrap helpers for the `pinrelay` process
//!
//! This module handles:
//! - Configuration loading
//! - Database initialization and migrations
//! - Store defaults and service wiring

pub mod config;
pub mod database;
pub mod services;

pub use config::load_config;
pub use database::{init_database, run_migrations};
pub use services::{init_services, seed_store, Services};
