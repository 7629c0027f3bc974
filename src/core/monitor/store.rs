// src/core/monitor/store.rs

//! The monitor's durable per-node record store (spec.md §4.2).
//!
//! Keyed by `(formation, group_id, node_id)`. Every mutation is
//! transactional: read-modify-write on a group takes that group's
//! `parking_lot::Mutex`, serializing decision-making per group while
//! different groups proceed fully in parallel — the same shape as the
//! teacher's `GlobalWardenState { masters: DashMap<String,
//! Arc<Mutex<MasterState>>> }`, generalized from "one master" to "one group
//! of N nodes".

use super::events::{Event, EventLog};
use super::node::{NodeId, NodeRecord};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

/// Formation-wide settings that are not per-node.
#[derive(Debug, Clone)]
pub struct FormationSettings {
    pub number_sync_standbys: u32,
    pub kind: FormationKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormationKind {
    Pgsql,
    Citus,
}

impl Default for FormationSettings {
    fn default() -> Self {
        Self {
            number_sync_standbys: 1,
            kind: FormationKind::Pgsql,
        }
    }
}

/// All mutable state for a single replication group, guarded by one lock so
/// that a read-modify-write sequence (health check -> decide -> commit goals
/// -> append events) is atomic with respect to concurrent `node_active`
/// calls for the same group.
#[derive(Debug, Default)]
pub struct GroupState {
    pub nodes: Vec<NodeRecord>,
    pub events: EventLog,
    pub settings: FormationSettings,
    /// True while a failover is being orchestrated for this group; the
    /// decision engine refuses to start a second one concurrently.
    pub failover_in_flight: bool,
    /// Milliseconds (relative to the decision engine's epoch) at which the
    /// current failover began, used to evaluate `prepare_promotion_catchup`.
    pub failover_started_at_ms: Option<u64>,
    pub sync_standby_names: Option<String>,
}

impl GroupState {
    pub fn find_mut(&mut self, node_id: NodeId) -> Option<&mut NodeRecord> {
        self.nodes.iter_mut().find(|n| n.node_id == node_id)
    }

    pub fn find(&self, node_id: NodeId) -> Option<&NodeRecord> {
        self.nodes.iter().find(|n| n.node_id == node_id)
    }
}

/// The top-level, process-wide monitor store.
#[derive(Debug, Default)]
pub struct MonitorStore {
    groups: DashMap<(String, i32), Arc<Mutex<GroupState>>>,
    next_node_id: AtomicI64,
}

impl MonitorStore {
    pub fn new() -> Self {
        Self {
            groups: DashMap::new(),
            next_node_id: AtomicI64::new(1),
        }
    }

    pub fn allocate_node_id(&self) -> NodeId {
        self.next_node_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Returns the lock-guarded state for `(formation, group_id)`, creating
    /// an empty one if this is the first node registered into it.
    pub fn group(&self, formation: &str, group_id: i32) -> Arc<Mutex<GroupState>> {
        self.groups
            .entry((formation.to_string(), group_id))
            .or_insert_with(|| Arc::new(Mutex::new(GroupState::default())))
            .clone()
    }

    /// All groups currently known, for fan-out iteration by the decision
    /// engine's background sweep.
    pub fn all_groups(&self) -> Vec<((String, i32), Arc<Mutex<GroupState>>)> {
        self.groups
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect()
    }

    /// Finds the group a given node belongs to, if any node with that id has
    /// ever been registered.
    pub fn group_of_node(&self, node_id: NodeId) -> Option<Arc<Mutex<GroupState>>> {
        self.groups
            .iter()
            .find(|e| e.value().lock().find(node_id).is_some())
            .map(|e| e.value().clone())
    }

    pub fn append_event(&self, formation: &str, group_id: i32, event: Event) {
        let group = self.group(formation, group_id);
        group.lock().events.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_distinct_node_ids() {
        let store = MonitorStore::new();
        let a = store.allocate_node_id();
        let b = store.allocate_node_id();
        assert_ne!(a, b);
    }

    #[test]
    fn group_lookup_creates_once() {
        let store = MonitorStore::new();
        let g1 = store.group("default", 0);
        let g2 = store.group("default", 0);
        assert!(Arc::ptr_eq(&g1, &g2));
    }
}
