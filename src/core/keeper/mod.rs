// src/core/keeper/mod.rs

//! The keeper: the per-node agent that registers with the monitor, reports
//! heartbeats, and executes whatever transition the monitor assigns
//! (spec.md §4.4). Grounded in the teacher's single-loop `MasterMonitor`
//! shape, simplified to one task since a keeper (unlike the Warden) has
//! only one thing to watch: its own local Postgres instance.

pub mod client;
pub mod config;
pub mod local_state;
pub mod observe;
pub mod pgcontrol;
pub mod transition;

use self::client::MonitorClient;
use self::config::KeeperConfig;
use self::local_state::{LocalState, LocalStateStore};
use self::pgcontrol::{PostgresControl, ProcessPostgresControl};
use self::transition::TransitionExecutor;
use crate::core::fsm::NodeState;
use crate::core::protocol::{RpcRequest, RpcResponse};
use anyhow::{Result, anyhow};
use tracing::{error, info, warn};

pub async fn run(config: KeeperConfig) -> Result<()> {
    let pg = ProcessPostgresControl::new(config.pgdata.clone(), config.pg_port);
    let state_store = LocalStateStore::new(&config.state_file);

    let mut local = if state_store.exists() {
        let state = state_store.load()?;
        info!("resuming as node {} ({:?} -> {:?})", state.node_id, state.current_state, state.goal_state);
        state
    } else {
        bootstrap(&config, &state_store).await?
    };

    let mut monitor = MonitorClient::connect(&config.monitor_host, config.monitor_port).await?;
    let mut ticker = tokio::time::interval(config.heartbeat_interval);

    loop {
        ticker.tick().await;

        if let Err(e) = heartbeat_and_converge(&mut monitor, &pg, &config, &mut local, &state_store).await {
            error!("heartbeat/converge cycle failed: {e}");
        }
    }
}

async fn bootstrap(config: &KeeperConfig, state_store: &LocalStateStore) -> Result<LocalState> {
    let mut monitor = MonitorClient::connect(&config.monitor_host, config.monitor_port).await?;
    let pg = ProcessPostgresControl::new(config.pgdata.clone(), config.pg_port);
    let sys_identifier = pg.system_identifier().await.ok();

    let response = monitor
        .call(RpcRequest::RegisterNode {
            formation: config.formation.clone(),
            group_id: config.group_id,
            nodename: config.nodename.clone(),
            node_host: config.node_host.clone(),
            pg_port: config.pg_port,
            candidate_priority: config.candidate_priority,
            replication_quorum: config.replication_quorum,
            sys_identifier,
        })
        .await?;

    let (node_id, goal_state) = match response {
        RpcResponse::Registered { node_id, goal_state } => (node_id, goal_state),
        RpcResponse::Error(e) => return Err(anyhow!("monitor rejected registration: {e}")),
        other => return Err(anyhow!("unexpected monitor reply to registration: {other:?}")),
    };

    let local = LocalState {
        node_id,
        formation: config.formation.clone(),
        group_id: config.group_id,
        current_state: NodeState::Init,
        goal_state,
    };
    state_store.save(&local)?;
    info!("registered as node {node_id}, initial goal {goal_state:?}");
    Ok(local)
}

async fn heartbeat_and_converge(
    monitor: &mut MonitorClient,
    pg: &dyn PostgresControl,
    config: &KeeperConfig,
    local: &mut LocalState,
    state_store: &LocalStateStore,
) -> Result<()> {
    let observation = observe::observe(pg, local.node_id, local.current_state).await?;

    let response = monitor
        .call(RpcRequest::NodeActive {
            formation: config.formation.clone(),
            observation,
        })
        .await?;

    let RpcResponse::Assigned { goal_state, .. } = response else {
        match response {
            RpcResponse::Error(e) => warn!("monitor reported an error for node_active: {e}"),
            other => warn!("unexpected monitor reply to node_active: {other:?}"),
        }
        return Ok(());
    };

    local.goal_state = goal_state;
    if local.current_state != local.goal_state {
        let executor = TransitionExecutor::new(pg);
        local.current_state = executor.step(local.current_state, local.goal_state).await?;
        state_store.save(local)?;
    }

    Ok(())
}
