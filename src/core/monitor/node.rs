// src/core/monitor/node.rs

//! The monitor's per-node record (spec.md §3 "Node").

use crate::core::fsm::NodeState;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

pub type NodeId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthState {
    Unknown,
    Good,
    Bad,
}

/// A managed Postgres instance as tracked by the monitor.
#[derive(Debug, Clone)]
pub struct NodeRecord {
    pub node_id: NodeId,
    pub formation: String,
    pub group_id: i32,
    pub nodename: String,
    pub node_host: String,
    pub pg_port: u16,
    pub current_state: NodeState,
    pub goal_state: NodeState,
    /// Whether this node currently occupies the primary track of its group
    /// (see `fsm::guards::NodeSnapshot::is_primary_track`). Set by the
    /// decision engine whenever it assigns a new goal.
    pub is_primary_track: bool,
    pub candidate_priority: u8,
    pub replication_quorum: bool,
    pub reported_lsn: u64,
    pub reported_pg_is_running: bool,
    pub sys_identifier: Option<u64>,
    pub last_heartbeat_at: Instant,
    pub health_state: HealthState,
    /// When this node's Postgres was first reported not running. Cleared the
    /// moment a heartbeat reports `pg_is_running = true` again.
    pub pg_not_running_since: Option<Instant>,
}

impl NodeRecord {
    pub fn new(
        node_id: NodeId,
        formation: String,
        group_id: i32,
        nodename: String,
        node_host: String,
        pg_port: u16,
        candidate_priority: u8,
        replication_quorum: bool,
    ) -> Self {
        Self {
            node_id,
            formation,
            group_id,
            nodename,
            node_host,
            pg_port,
            current_state: NodeState::Init,
            goal_state: NodeState::Init,
            is_primary_track: false,
            candidate_priority,
            replication_quorum,
            reported_lsn: 0,
            reported_pg_is_running: false,
            sys_identifier: None,
            last_heartbeat_at: Instant::now(),
            health_state: HealthState::Unknown,
            pg_not_running_since: None,
        }
    }

    /// spec.md §4.3 step 2: unhealthy if silent past `network_partition_timeout`,
    /// or reporting `pg_is_running = false` past `postgresql_restart_failure_timeout`.
    pub fn is_unhealthy(&self, now: Instant, partition_timeout: Duration, restart_timeout: Duration) -> bool {
        let silent_too_long = now.saturating_duration_since(self.last_heartbeat_at) > partition_timeout;
        let restart_too_long = !self.reported_pg_is_running
            && self
                .pg_not_running_since
                .is_some_and(|since| now.saturating_duration_since(since) > restart_timeout);
        silent_too_long || restart_too_long
    }

    pub fn snapshot(&self) -> crate::core::fsm::NodeSnapshot {
        crate::core::fsm::NodeSnapshot {
            node_id: self.node_id,
            state: self.current_state,
            is_primary_track: self.is_primary_track,
            candidate_priority: self.candidate_priority,
            reported_lsn: self.reported_lsn,
            healthy: self.health_state != HealthState::Bad,
        }
    }
}

/// A serializable, network-facing view of a node, used in RPC responses
/// (`show nodes`, `get_nodes`) where `Instant` has no meaningful wire form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeView {
    pub node_id: NodeId,
    pub formation: String,
    pub group_id: i32,
    pub nodename: String,
    pub node_host: String,
    pub pg_port: u16,
    pub current_state: NodeState,
    pub goal_state: NodeState,
    pub candidate_priority: u8,
    pub replication_quorum: bool,
    pub reported_lsn: u64,
    pub health_state: HealthState,
}

impl From<&NodeRecord> for NodeView {
    fn from(n: &NodeRecord) -> Self {
        Self {
            node_id: n.node_id,
            formation: n.formation.clone(),
            group_id: n.group_id,
            nodename: n.nodename.clone(),
            node_host: n.node_host.clone(),
            pg_port: n.pg_port,
            current_state: n.current_state,
            goal_state: n.goal_state,
            candidate_priority: n.candidate_priority,
            replication_quorum: n.replication_quorum,
            reported_lsn: n.reported_lsn,
            health_state: n.health_state,
        }
    }
}
