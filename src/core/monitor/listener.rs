// src/core/monitor/listener.rs

//! The monitor's TCP RPC listener, implementing the `MonitorClient` contract
//! (spec.md §4.6) that keepers call into. Grounded in the teacher's
//! `warden::listener::run_listener`/`handle_connection` shape, generalized
//! from a single RESP command dispatcher to our bincode `RpcRequest` enum.

use super::decision;
use super::node::NodeRecord;
use super::store::MonitorStore;
use crate::core::fsm::NodeState;
use crate::core::monitor::config::Timeouts;
use crate::core::protocol::{RpcRequest, RpcResponse, WireCodec};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::Framed;
use tracing::{info, warn};

pub async fn run(host: String, port: u16, store: Arc<MonitorStore>, timeouts: Arc<Timeouts>, epoch: Instant) -> anyhow::Result<()> {
    let listener = TcpListener::bind(format!("{host}:{port}")).await?;
    info!("monitor listening for keeper connections on {host}:{port}");

    loop {
        match listener.accept().await {
            Ok((socket, addr)) => {
                let store = store.clone();
                let timeouts = timeouts.clone();
                tokio::spawn(async move {
                    info!("accepted keeper connection from {addr}");
                    if let Err(e) = handle_connection(socket, store, timeouts, epoch).await {
                        warn!("error handling keeper connection from {addr}: {e}");
                    }
                });
            }
            Err(e) => warn!("failed to accept keeper connection: {e}"),
        }
    }
}

async fn handle_connection(
    socket: TcpStream,
    store: Arc<MonitorStore>,
    timeouts: Arc<Timeouts>,
    epoch: Instant,
) -> anyhow::Result<()> {
    let mut framed = Framed::new(socket, WireCodec::<RpcRequest>::default());

    while let Some(result) = framed.next().await {
        let request = match result {
            Ok(r) => r,
            Err(e) => {
                warn!("error decoding keeper request: {e}");
                break;
            }
        };
        let response = dispatch(request, &store, &timeouts, epoch);
        if framed.send(response).await.is_err() {
            break;
        }
    }
    Ok(())
}

/// Handles one RPC to completion, taking and releasing the affected group's
/// lock exactly once so a registration or heartbeat is atomic with the
/// decision pass it triggers.
fn dispatch(request: RpcRequest, store: &Arc<MonitorStore>, timeouts: &Timeouts, epoch: Instant) -> RpcResponse {
    match request {
        RpcRequest::RegisterNode {
            formation,
            group_id,
            nodename,
            node_host,
            pg_port,
            candidate_priority,
            replication_quorum,
            sys_identifier,
        } => {
            let node_id = store.allocate_node_id();
            let group = store.group(&formation, group_id);
            let mut group = group.lock();

            if let Some(existing) = group.nodes.iter().find(|n| n.sys_identifier.is_some() && n.sys_identifier == sys_identifier) {
                warn!(
                    "registration for {nodename} carries a sysIdentifier already known as node {}",
                    existing.node_id
                );
            }

            let is_first = group.nodes.is_empty();
            let mut node = NodeRecord::new(node_id, formation.clone(), group_id, nodename, node_host, pg_port, candidate_priority, replication_quorum);
            node.sys_identifier = sys_identifier;
            node.current_state = NodeState::Init;
            node.goal_state = if is_first { NodeState::Single } else { NodeState::WaitStandby };
            if is_first {
                node.is_primary_track = true;
            }
            let goal_state = node.goal_state;
            group.nodes.push(node);

            let now = Instant::now();
            decision::decide_group(&mut group, timeouts, &formation, group_id, now, epoch);
            RpcResponse::Registered { node_id, goal_state }
        }

        RpcRequest::NodeActive { formation, observation } => {
            let Some(group) = store.group_of_node(observation.node_id) else {
                return RpcResponse::Error(format!("unknown node {}", observation.node_id));
            };
            let mut group = group.lock();
            let group_id = group.nodes.first().map(|n| n.group_id).unwrap_or(0);

            if let Some(node) = group.find_mut(observation.node_id) {
                node.current_state = observation.current_state;
                node.reported_lsn = observation.reported_lsn;
                node.last_heartbeat_at = Instant::now();
                if observation.reported_pg_is_running {
                    node.pg_not_running_since = None;
                } else if node.pg_not_running_since.is_none() {
                    node.pg_not_running_since = Some(Instant::now());
                }
                node.reported_pg_is_running = observation.reported_pg_is_running;
                if observation.sys_identifier.is_some() {
                    node.sys_identifier = observation.sys_identifier;
                }
            }

            let now = Instant::now();
            decision::decide_group(&mut group, timeouts, &formation, group_id, now, epoch);

            let Some(node) = group.find(observation.node_id) else {
                return RpcResponse::Error("node vanished mid-transition".to_string());
            };
            RpcResponse::Assigned {
                goal_state: node.goal_state,
                replication_quorum: node.replication_quorum,
                candidate_priority: node.candidate_priority,
                synchronous_standby_names: group.sync_standby_names.clone(),
            }
        }

        RpcRequest::RemoveNode { formation, node_id } => {
            let Some(group) = store.group_of_node(node_id) else {
                return RpcResponse::Error(format!("unknown node {node_id}"));
            };
            let mut group = group.lock();
            let snapshots: Vec<_> = group.nodes.iter().map(|n| n.snapshot()).collect();
            let Some(target) = snapshots.iter().find(|n| n.node_id == node_id) else {
                return RpcResponse::Error(format!("unknown node {node_id}"));
            };
            if !crate::core::fsm::guards::can_remove(target, &snapshots) {
                return RpcResponse::Error(format!("refusing to remove {node_id}: it is the group's sole primary-track node"));
            }
            group.nodes.retain(|n| n.node_id != node_id);
            let _ = formation;
            RpcResponse::Removed
        }

        RpcRequest::GetNodes { formation, group_id } => {
            let mut views = Vec::new();
            for ((f, g), group) in store.all_groups() {
                if f != formation {
                    continue;
                }
                if let Some(wanted) = group_id {
                    if wanted != g {
                        continue;
                    }
                }
                let group = group.lock();
                views.extend(group.nodes.iter().map(|n| n.into()));
            }
            RpcResponse::Nodes(views)
        }

        RpcRequest::GetEvents { formation, count } => {
            let mut events = Vec::new();
            for ((f, _), group) in store.all_groups() {
                if f != formation {
                    continue;
                }
                events.extend(group.lock().events.tail(count));
            }
            events.sort_by_key(|e| e.timestamp_ms);
            if events.len() > count {
                let skip = events.len() - count;
                events.drain(..skip);
            }
            RpcResponse::Events(events)
        }

        RpcRequest::SetSyncStandbyNames { formation, group_id, names } => {
            let group = store.group(&formation, group_id);
            let mut group = group.lock();
            group.sync_standby_names = Some(names);
            RpcResponse::SyncStandbyNamesSet
        }

        RpcRequest::FormationUri { formation } => {
            let nodes: Vec<_> = store
                .all_groups()
                .into_iter()
                .filter(|((f, _), _)| f == &formation)
                .flat_map(|(_, g)| g.lock().nodes.iter().filter(|n| n.is_primary_track).map(|n| format!("{}:{}", n.node_host, n.pg_port)).collect::<Vec<_>>())
                .collect();
            RpcResponse::FormationUri(format!("postgresql://{}/{formation}", nodes.join(",")))
        }

        RpcRequest::PerformFailover { formation, group_id } => {
            let group = store.group(&formation, group_id);
            let mut group = group.lock();
            if group.failover_in_flight {
                return RpcResponse::Error("a failover is already in progress for this group".to_string());
            }
            if let Some(primary) = group.nodes.iter_mut().find(|n| n.is_primary_track) {
                primary.health_state = crate::core::monitor::node::HealthState::Bad;
            }
            let now = Instant::now();
            decision::decide_group(&mut group, timeouts, &formation, group_id, now, epoch);
            RpcResponse::FailoverStarted
        }
    }
}
