// src/config.rs

//! Top-level configuration loading. A `pg_autoctl.cfg` file is either a
//! monitor config or a keeper config (spec.md's Design Note: "the config
//! file's own shape says which role this process plays" — there is no
//! separate `role = monitor|keeper` key to keep in sync by hand). We probe
//! by trying a monitor parse first, then falling back to a keeper parse.
//! Both `MonitorConfig` and `KeeperConfig` derive
//! `#[serde(deny_unknown_fields)]`, which is what makes the probe
//! discriminating: without it, a keeper's extra fields (`monitor_host`,
//! `group_id`, ...) would be silently ignored by `config`'s deserializer
//! and every keeper file would parse cleanly as a monitor config too.

use crate::core::errors::PgAutoCtlError;
use crate::core::keeper::config::KeeperConfig;
use crate::core::monitor::config::MonitorConfig;

pub enum NodeRole {
    Monitor(MonitorConfig),
    Keeper(KeeperConfig),
}

impl NodeRole {
    pub fn from_file(path: &str) -> Result<Self, PgAutoCtlError> {
        match MonitorConfig::from_file(path) {
            Ok(cfg) => Ok(NodeRole::Monitor(cfg)),
            Err(monitor_err) => KeeperConfig::from_file(path).map(NodeRole::Keeper).map_err(|keeper_err| {
                PgAutoCtlError::BadConfig(format!(
                    "{path} matches neither a monitor config ({monitor_err}) nor a keeper config ({keeper_err})"
                ))
            }),
        }
    }
}
