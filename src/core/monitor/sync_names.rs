// src/core/monitor/sync_names.rs

//! Computes `synchronous_standby_names` (spec.md §4.3 step 4, invariants
//! I3/P5): `ANY <k> (<name1>,<name2>,...)` naming every quorum-eligible
//! standby currently in `Secondary`, with `k` bounded by the eligible count.

use crate::core::fsm::NodeState;
use crate::core::monitor::node::NodeRecord;

/// The quorum-eligible standby set: `replicationQuorum = true` and
/// currently `Secondary`.
pub fn eligible_standbys(nodes: &[NodeRecord]) -> Vec<&NodeRecord> {
    nodes
        .iter()
        .filter(|n| n.replication_quorum && n.current_state == NodeState::Secondary)
        .collect()
}

/// Computes the `synchronous_standby_names` string, or `None` if there are
/// no eligible standbys or `number_sync_standbys` is `0` (async commit,
/// explicitly requested by the operator), in which case the setting should
/// be cleared rather than forced up to a quorum of one (I3/P5: the quorum
/// number is exactly `min(numberSyncStandbys, |eligible|)`).
pub fn compute(nodes: &[NodeRecord], number_sync_standbys: u32) -> Option<String> {
    let eligible = eligible_standbys(nodes);
    if eligible.is_empty() || number_sync_standbys == 0 {
        return None;
    }
    let k = (number_sync_standbys as usize).min(eligible.len());
    let names = eligible
        .iter()
        .map(|n| n.nodename.as_str())
        .collect::<Vec<_>>()
        .join(",");
    Some(format!("ANY {k} ({names})"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::monitor::node::NodeRecord;

    fn standby(name: &str, quorum: bool, state: NodeState) -> NodeRecord {
        let mut n = NodeRecord::new(1, "default".into(), 0, name.into(), "127.0.0.1".into(), 5432, 50, quorum);
        n.current_state = state;
        n
    }

    #[test]
    fn empty_when_no_eligible_standbys() {
        let nodes = vec![standby("b", true, NodeState::CatchingUp)];
        assert_eq!(compute(&nodes, 1), None);
    }

    #[test]
    fn names_only_quorum_secondaries() {
        let nodes = vec![
            standby("b", true, NodeState::Secondary),
            standby("c", false, NodeState::Secondary),
            standby("d", true, NodeState::CatchingUp),
        ];
        assert_eq!(compute(&nodes, 1).as_deref(), Some("ANY 1 (b)"));
    }

    #[test]
    fn zero_configured_standbys_clears_setting() {
        let nodes = vec![standby("b", true, NodeState::Secondary)];
        assert_eq!(compute(&nodes, 0), None);
    }

    #[test]
    fn k_bounded_by_eligible_count() {
        let nodes = vec![
            standby("b", true, NodeState::Secondary),
            standby("c", true, NodeState::Secondary),
        ];
        // configured for 5 sync standbys but only 2 are eligible
        assert_eq!(compute(&nodes, 5).as_deref(), Some("ANY 2 (b,c)"));
    }
}
