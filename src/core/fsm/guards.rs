// src/core/fsm/guards.rs

//! Precondition checks shared by the monitor (before committing a goal) and,
//! defensively, by the keeper (before executing a transition). These encode
//! invariants I1-I3 from spec.md §3.

use super::states::NodeState;

/// A read-only view of a node, just enough to evaluate the group-wide
/// invariants. The monitor's `NodeRecord` converts into this; the FSM layer
/// never needs to know about the monitor's storage types.
#[derive(Debug, Clone, Copy)]
pub struct NodeSnapshot {
    pub node_id: i64,
    pub state: NodeState,
    /// Whether this node currently plays the primary-track role in its
    /// group. Disambiguates `ApplySettings`, which is reachable from both
    /// the primary track (`JoinPrimary -> ApplySettings -> Primary`) and the
    /// standby track (`Secondary -> ApplySettings -> Secondary`); the bare
    /// `NodeState` alone cannot tell the two apart.
    pub is_primary_track: bool,
    pub candidate_priority: u8,
    pub reported_lsn: u64,
    pub healthy: bool,
}

impl NodeSnapshot {
    /// I1: a node occupies write authority only if its state is in the
    /// writable set *and* it is on the primary track.
    pub fn is_writable(&self) -> bool {
        self.is_primary_track && self.state.is_writable()
    }
}

/// I1: at most one node per group may hold write authority at once.
///
/// Returns the offending node ids if the invariant is violated, so a caller
/// can log exactly which nodes collided instead of a bare boolean.
pub fn at_most_one_primary(nodes: &[NodeSnapshot]) -> Result<(), Vec<i64>> {
    let writable: Vec<i64> = nodes
        .iter()
        .filter(|n| n.is_writable())
        .map(|n| n.node_id)
        .collect();
    if writable.len() > 1 {
        Err(writable)
    } else {
        Ok(())
    }
}

/// I2: a node may be assigned `PreparePromotion` only if it has a nonzero
/// candidate priority, sits in `Secondary` or `CatchingUp`, and its last
/// reported LSN is at least the maximum LSN of every other *healthy*
/// quorum-eligible peer in the group.
pub fn promotion_eligible(candidate: &NodeSnapshot, peers: &[NodeSnapshot]) -> bool {
    if candidate.candidate_priority == 0 {
        return false;
    }
    if !candidate.state.is_promotable_from() {
        return false;
    }
    let max_peer_lsn = peers
        .iter()
        .filter(|p| p.node_id != candidate.node_id && p.healthy)
        .map(|p| p.reported_lsn)
        .max()
        .unwrap_or(0);
    candidate.reported_lsn >= max_peer_lsn
}

/// Rejects removing a node while it is the group's sole primary-track node.
pub fn can_remove(node: &NodeSnapshot, group: &[NodeSnapshot]) -> bool {
    if !node.is_writable() {
        return true;
    }
    group.iter().filter(|n| n.is_writable()).count() > 1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(id: i64, state: NodeState, primary_track: bool, prio: u8, lsn: u64, healthy: bool) -> NodeSnapshot {
        NodeSnapshot {
            node_id: id,
            state,
            is_primary_track: primary_track,
            candidate_priority: prio,
            reported_lsn: lsn,
            healthy,
        }
    }

    #[test]
    fn i1_detects_two_primaries() {
        let nodes = vec![
            snap(1, NodeState::Primary, true, 100, 10, true),
            snap(2, NodeState::Single, true, 100, 10, true),
        ];
        assert_eq!(at_most_one_primary(&nodes), Err(vec![1, 2]));
    }

    #[test]
    fn i1_apply_settings_on_standby_track_is_not_writable() {
        let nodes = vec![
            snap(1, NodeState::Primary, true, 100, 20, true),
            snap(2, NodeState::ApplySettings, false, 50, 15, true),
        ];
        assert_eq!(at_most_one_primary(&nodes), Ok(()));
    }

    #[test]
    fn i2_rejects_zero_priority_candidate() {
        let candidate = snap(2, NodeState::Secondary, false, 0, 100, true);
        let peers = vec![snap(1, NodeState::Primary, true, 100, 50, true)];
        assert!(!promotion_eligible(&candidate, &peers));
    }

    #[test]
    fn i2_rejects_behind_candidate() {
        let candidate = snap(2, NodeState::Secondary, false, 50, 40, true);
        let peers = vec![snap(3, NodeState::Secondary, false, 50, 60, true)];
        assert!(!promotion_eligible(&candidate, &peers));
    }

    #[test]
    fn i2_accepts_caught_up_highest_priority_candidate() {
        let candidate = snap(2, NodeState::Secondary, false, 50, 100, true);
        let peers = vec![
            snap(1, NodeState::Primary, true, 0, 90, true),
            snap(3, NodeState::Secondary, false, 30, 80, true),
        ];
        assert!(promotion_eligible(&candidate, &peers));
    }

    #[test]
    fn cannot_remove_sole_primary() {
        let sole = snap(1, NodeState::Single, true, 100, 0, true);
        let group = vec![sole];
        assert!(!can_remove(&sole, &group));
    }

    #[test]
    fn can_remove_standby() {
        let standby = snap(2, NodeState::Secondary, false, 50, 0, true);
        let group = vec![snap(1, NodeState::Primary, true, 100, 10, true), standby];
        assert!(can_remove(&standby, &group));
    }
}
