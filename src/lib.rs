//! Waypoint CLI library
//!
//! Exposes modules for integration testing

pub mod cli;
pub mod config;
pub mod jira;

pub use config::{ConfigError, RunConfig};
