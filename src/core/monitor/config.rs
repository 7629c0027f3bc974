// src/core/monitor/config.rs

use crate::core::errors::PgAutoCtlError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timeouts governing the decision engine (spec.md §5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timeouts {
    #[serde(with = "humantime_serde", default = "default_network_partition_timeout")]
    pub network_partition_timeout: Duration,

    #[serde(with = "humantime_serde", default = "default_prepare_promotion_catchup")]
    pub prepare_promotion_catchup: Duration,

    #[serde(with = "humantime_serde", default = "default_prepare_promotion_walreceiver")]
    pub prepare_promotion_walreceiver: Duration,

    #[serde(with = "humantime_serde", default = "default_restart_failure_timeout")]
    pub postgresql_restart_failure_timeout: Duration,

    #[serde(default = "default_restart_max_retries")]
    pub postgresql_restart_max_retries: u32,
}

fn default_network_partition_timeout() -> Duration {
    Duration::from_secs(20)
}
fn default_prepare_promotion_catchup() -> Duration {
    Duration::from_secs(30)
}
fn default_prepare_promotion_walreceiver() -> Duration {
    Duration::from_secs(5)
}
fn default_restart_failure_timeout() -> Duration {
    Duration::from_secs(20)
}
fn default_restart_max_retries() -> u32 {
    3
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            network_partition_timeout: default_network_partition_timeout(),
            prepare_promotion_catchup: default_prepare_promotion_catchup(),
            prepare_promotion_walreceiver: default_prepare_promotion_walreceiver(),
            postgresql_restart_failure_timeout: default_restart_failure_timeout(),
            postgresql_restart_max_retries: default_restart_max_retries(),
        }
    }
}

/// Configuration for a monitor node, loaded from `pg_autoctl.cfg` (TOML).
///
/// `deny_unknown_fields` is load-bearing: `NodeRole::from_file` tells a
/// monitor config from a keeper config by which one parses, and without
/// this a keeper's extra keys (`monitor_host`, `group_id`, ...) would be
/// silently ignored and a keeper config would parse as a (degenerate but
/// valid) monitor config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MonitorConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    pub pgdata: String,

    #[serde(default = "default_pg_port")]
    pub pg_port: u16,

    pub nodename: String,

    #[serde(default)]
    pub timeouts: Timeouts,

    /// Tick interval at which the decision engine sweeps every group for
    /// timed-out failovers, stale sync-names, etc. Independent of any
    /// single keeper's heartbeat cadence.
    #[serde(with = "humantime_serde", default = "default_sweep_interval")]
    pub sweep_interval: Duration,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    5431
}
fn default_pg_port() -> u16 {
    5432
}
fn default_sweep_interval() -> Duration {
    Duration::from_secs(1)
}

impl MonitorConfig {
    pub fn from_file(path: &str) -> Result<Self, PgAutoCtlError> {
        let settings = config::Config::builder()
            .add_source(config::File::new(path, config::FileFormat::Toml))
            .build()?;
        settings
            .try_deserialize()
            .map_err(|e| PgAutoCtlError::BadConfig(e.to_string()))
    }
}
