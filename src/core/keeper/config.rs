// src/core/keeper/config.rs

use crate::core::errors::PgAutoCtlError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a keeper node, loaded from `pg_autoctl.cfg` (TOML).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeeperConfig {
    pub pgdata: String,

    #[serde(default = "default_pg_port")]
    pub pg_port: u16,

    pub nodename: String,

    #[serde(default = "default_node_host")]
    pub node_host: String,

    pub monitor_host: String,

    #[serde(default = "default_monitor_port")]
    pub monitor_port: u16,

    #[serde(default = "default_formation")]
    pub formation: String,

    #[serde(default)]
    pub group_id: i32,

    #[serde(default = "default_candidate_priority")]
    pub candidate_priority: u8,

    #[serde(default = "default_true")]
    pub replication_quorum: bool,

    /// Path to this keeper's local state file, used to survive restarts
    /// without re-registering (spec.md §4.4).
    #[serde(default = "default_state_file")]
    pub state_file: String,

    #[serde(with = "humantime_serde", default = "default_heartbeat_interval")]
    pub heartbeat_interval: Duration,

    #[serde(default)]
    pub ssl: SslMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SslMode {
    #[default]
    SelfSigned,
    NoSsl,
    UserProvided,
}

fn default_pg_port() -> u16 {
    5432
}
fn default_node_host() -> String {
    "127.0.0.1".to_string()
}
fn default_monitor_port() -> u16 {
    5431
}
fn default_formation() -> String {
    "default".to_string()
}
fn default_candidate_priority() -> u8 {
    50
}
fn default_true() -> bool {
    true
}
fn default_state_file() -> String {
    "pg_autoctl.state".to_string()
}
fn default_heartbeat_interval() -> Duration {
    Duration::from_secs(5)
}

impl KeeperConfig {
    pub fn from_file(path: &str) -> Result<Self, PgAutoCtlError> {
        let settings = config::Config::builder()
            .add_source(config::File::new(path, config::FileFormat::Toml))
            .build()?;
        settings
            .try_deserialize()
            .map_err(|e| PgAutoCtlError::BadConfig(e.to_string()))
    }
}
