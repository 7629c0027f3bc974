// src/core/monitor/mod.rs

//! The monitor: the authoritative controller that owns every node's current
//! and goal state, decides failovers, and serves the `MonitorClient`
//! contract (spec.md §4). Grounded in the teacher's `warden::mod::run`
//! shape: one task per background concern, joined in a `JoinSet` so a
//! crash in any of them is visible rather than silently stopping the whole
//! process.

pub mod config;
pub mod decision;
pub mod events;
pub mod listener;
pub mod node;
pub mod store;
pub mod sync_names;

use self::config::MonitorConfig;
use self::store::MonitorStore;
use anyhow::{Result, anyhow};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// Runs the monitor process to completion. Does not return under normal
/// operation; a `Result::Ok` from any of its sub-tasks is itself treated as
/// a failure, since none of them are meant to finish.
pub async fn run(config: MonitorConfig) -> Result<()> {
    info!(
        "pg_auto_failover monitor starting on {}:{}, sweeping every {:?}",
        config.host, config.port, config.sweep_interval
    );

    let store = Arc::new(MonitorStore::new());
    let timeouts = Arc::new(config.timeouts.clone());
    // `epoch` anchors every event's `timestamp_ms`; it is fixed once at
    // startup so the decision engine stays a pure function of `(now,
    // epoch)` rather than calling `Instant::now()`/`SystemTime::now()`
    // itself (see `decision::decide_group`).
    let epoch = Instant::now();

    let mut tasks: JoinSet<Result<()>> = JoinSet::new();

    tasks.spawn(listener::run(config.host.clone(), config.port, store.clone(), timeouts.clone(), epoch));
    tasks.spawn(run_sweep_loop(store.clone(), timeouts.clone(), config.sweep_interval, epoch));

    while let Some(res) = tasks.join_next().await {
        match res {
            Ok(Ok(())) => warn!("a monitor task completed unexpectedly without an error"),
            Ok(Err(e)) => error!("a monitor task failed: {e}"),
            Err(e) => error!("a monitor task panicked: {e}"),
        }
    }

    Err(anyhow!("all monitor tasks have terminated, shutting down"))
}

/// Periodically sweeps every known group through the decision engine, so
/// that timeouts and health regressions are noticed even without a
/// triggering `node_active` call.
async fn run_sweep_loop(store: Arc<MonitorStore>, timeouts: Arc<config::Timeouts>, interval: Duration, epoch: Instant) -> Result<()> {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        for ((formation, group_id), group) in store.all_groups() {
            let mut group = group.lock();
            let now = Instant::now();
            decision::decide_group(&mut group, &timeouts, &formation, group_id, now, epoch);
        }
    }
}
