// src/core/protocol/messages.rs

//! Message types exchanged between a keeper and the monitor, implementing
//! the `MonitorClient` contract from spec.md §4.6.

use crate::core::fsm::NodeState;
use crate::core::monitor::node::{HealthState, NodeId, NodeView};
use serde::{Deserialize, Serialize};

/// What a keeper reports about its local Postgres instance on every
/// heartbeat (spec.md §4.3 step 1, "node_active").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeObservation {
    pub node_id: NodeId,
    pub current_state: NodeState,
    pub reported_lsn: u64,
    pub reported_pg_is_running: bool,
    pub sys_identifier: Option<u64>,
}

/// Every request a keeper can send to the monitor over the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RpcRequest {
    RegisterNode {
        formation: String,
        group_id: i32,
        nodename: String,
        node_host: String,
        pg_port: u16,
        candidate_priority: u8,
        replication_quorum: bool,
        sys_identifier: Option<u64>,
    },
    NodeActive {
        formation: String,
        observation: NodeObservation,
    },
    RemoveNode {
        formation: String,
        node_id: NodeId,
    },
    GetNodes {
        formation: String,
        group_id: Option<i32>,
    },
    GetEvents {
        formation: String,
        count: usize,
    },
    SetSyncStandbyNames {
        formation: String,
        group_id: i32,
        names: String,
    },
    FormationUri {
        formation: String,
    },
    PerformFailover {
        formation: String,
        group_id: i32,
    },
}

/// Every response the monitor can send back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RpcResponse {
    Registered {
        node_id: NodeId,
        goal_state: NodeState,
    },
    Assigned {
        goal_state: NodeState,
        replication_quorum: bool,
        candidate_priority: u8,
        synchronous_standby_names: Option<String>,
    },
    Removed,
    Nodes(Vec<NodeView>),
    Events(Vec<crate::core::monitor::events::Event>),
    SyncStandbyNamesSet,
    FormationUri(String),
    FailoverStarted,
    Error(String),
}

impl NodeObservation {
    pub fn health_hint(&self) -> HealthState {
        if self.reported_pg_is_running {
            HealthState::Good
        } else {
            HealthState::Bad
        }
    }
}
