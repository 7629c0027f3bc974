// src/core/monitor/decision.rs

//! The monitor's decision engine (spec.md §4.3): for each group, computes
//! the next goal state for each node from the current collective
//! observation, recomputes `synchronous_standby_names`, and appends exactly
//! one event per committed transition.
//!
//! `decide_group` is a pure function of a `GroupState` snapshot plus a
//! caller-supplied "now" (so tests can drive timeouts deterministically
//! without sleeping); the one exception is per-node health bookkeeping,
//! which stamps `unhealthy_since` using the node's own field rather than
//! `Instant::now()`, keeping the whole function free of hidden clocks.

use super::events::Event;
use super::node::HealthState;
use super::store::GroupState;
use super::sync_names;
use crate::core::fsm::guards::{at_most_one_primary, promotion_eligible};
use crate::core::fsm::NodeState;
use crate::core::monitor::config::Timeouts;
use std::time::{Duration, Instant};
use tracing::error;

/// Bytes of WAL lag tolerated before a catching-up standby is promoted to
/// `Secondary`. Not named as a tunable in spec.md; chosen as a conservative
/// default and left overridable through `GroupState` in a future revision.
const CATCHUP_LAG_THRESHOLD_BYTES: u64 = 16 * 1024 * 1024;

fn now_ms(now: Instant, epoch: Instant) -> u64 {
    now.saturating_duration_since(epoch).as_millis() as u64
}

/// Runs one decision pass over a single locked group. Returns the events
/// committed during this pass (already appended to `group.events` too).
pub fn decide_group(
    group: &mut GroupState,
    timeouts: &Timeouts,
    formation: &str,
    group_id: i32,
    now: Instant,
    epoch: Instant,
) -> Vec<Event> {
    let mut events = Vec::new();
    classify_health(group, timeouts, now);

    let primary_idx = group
        .nodes
        .iter()
        .position(|n| n.is_primary_track && n.current_state.is_writable());
    let primary_healthy = primary_idx
        .map(|i| group.nodes[i].health_state != HealthState::Bad)
        .unwrap_or(false);

    // Runs whether or not a new primary has already been confirmed: the old
    // primary's demotion (Draining -> DemoteTimeout -> Demoted) must keep
    // advancing even after the candidate has already taken over, or it would
    // stall forever the moment the candidate's goal reaches Primary and the
    // decision engine stops routing through `progress_failover` below.
    advance_old_primary_demotion(group, formation, group_id, now, epoch, &mut events);

    if primary_idx.is_none() || !primary_healthy {
        run_failover(group, timeouts, formation, group_id, now, epoch, &mut events);
    } else {
        promote_lone_primary_on_standby_join(group, formation, group_id, now, epoch, &mut events);
        progress_standbys(group, formation, group_id, now, epoch, &mut events);
        recompute_sync_names(group, formation, group_id, now, epoch, &mut events);
        reunite_recovered_old_primary(group, formation, group_id, now, epoch, &mut events);
    }

    for e in &events {
        group.events.push(e.clone());
    }

    if let Err(offenders) = at_most_one_primary(&group.nodes.iter().map(|n| n.snapshot()).collect::<Vec<_>>()) {
        error!(formation, group_id, ?offenders, "I1 violated: more than one writable node in group");
    }

    events
}

fn emit(
    events: &mut Vec<Event>,
    formation: &str,
    group_id: i32,
    node_id: i64,
    prev: NodeState,
    new: NodeState,
    description: impl Into<String>,
    now: Instant,
    epoch: Instant,
) {
    events.push(Event {
        timestamp_ms: now_ms(now, epoch),
        formation: formation.to_string(),
        group_id,
        node_id,
        prev_state: prev.to_string(),
        new_state: new.to_string(),
        description: description.into(),
    });
}

/// A node is `unhealthy` if it has been silent past `network_partition_timeout`
/// or has reported `pg_is_running = false` past `postgresql_restart_failure_timeout`.
fn classify_health(group: &mut GroupState, timeouts: &Timeouts, now: Instant) {
    for node in &mut group.nodes {
        let unhealthy = node.is_unhealthy(
            now,
            timeouts.network_partition_timeout,
            timeouts.postgresql_restart_failure_timeout,
        );
        node.health_state = if unhealthy {
            HealthState::Bad
        } else {
            HealthState::Good
        };
    }
}

/// A lone primary starts out in `Single` (no standby to synchronize with).
/// Once a standby has registered into the group, the primary must move to
/// `WaitPrimary` so it starts requiring replication before settling into
/// steady-state `Primary` — `Single` has no demotion path in `TRANSITIONS`,
/// so a primary left behind in `Single` would be stuck if it later went
/// unhealthy with a standby present (see `start_failover`).
fn promote_lone_primary_on_standby_join(
    group: &mut GroupState,
    formation: &str,
    group_id: i32,
    now: Instant,
    epoch: Instant,
    events: &mut Vec<Event>,
) {
    let has_standby = group.nodes.iter().any(|n| !n.is_primary_track);
    if !has_standby {
        return;
    }
    let Some(primary) = group
        .nodes
        .iter_mut()
        .find(|n| n.is_primary_track && n.current_state == NodeState::Single && n.goal_state == NodeState::Single)
    else {
        return;
    };
    let prev = primary.goal_state;
    primary.goal_state = NodeState::WaitPrimary;
    emit(
        events,
        formation,
        group_id,
        primary.node_id,
        prev,
        primary.goal_state,
        "standby joined, primary now requires replication",
        now,
        epoch,
    );
}

/// Steady state: promote caught-up standbys whose lag has closed.
fn progress_standbys(
    group: &mut GroupState,
    formation: &str,
    group_id: i32,
    now: Instant,
    epoch: Instant,
    events: &mut Vec<Event>,
) {
    let primary_lsn = group
        .nodes
        .iter()
        .find(|n| n.is_primary_track && n.current_state.is_writable())
        .map(|n| n.reported_lsn)
        .unwrap_or(0);

    for node in &mut group.nodes {
        if node.is_primary_track {
            continue;
        }
        if node.current_state != node.goal_state {
            continue; // still converging on a previous goal
        }
        if node.health_state == HealthState::Bad {
            continue;
        }
        if node.current_state == NodeState::CatchingUp
            && primary_lsn.saturating_sub(node.reported_lsn) <= CATCHUP_LAG_THRESHOLD_BYTES
        {
            let prev = node.goal_state;
            node.goal_state = NodeState::Secondary;
            emit(
                events,
                formation,
                group_id,
                node.node_id,
                prev,
                node.goal_state,
                "standby caught up within lag threshold",
                now,
                epoch,
            );
        }
    }
}

/// When the old primary recovers after a failover left it `Demoted`, give it
/// a path back into the group as a standby via `pg_rewind`.
fn reunite_recovered_old_primary(
    group: &mut GroupState,
    formation: &str,
    group_id: i32,
    now: Instant,
    epoch: Instant,
    events: &mut Vec<Event>,
) {
    for node in &mut group.nodes {
        if node.current_state == NodeState::Demoted
            && node.goal_state == NodeState::Demoted
            && node.health_state != HealthState::Bad
        {
            node.is_primary_track = false;
            let prev = node.goal_state;
            node.goal_state = NodeState::CatchingUp;
            emit(
                events,
                formation,
                group_id,
                node.node_id,
                prev,
                node.goal_state,
                "recovered former primary rejoining via pg_rewind",
                now,
                epoch,
            );
        }
    }
}

/// Advances a demoting old primary one step (`Draining -> DemoteTimeout ->
/// Demoted`), independent of where the promotion candidate is in its own
/// sequence — called once per pass regardless of branch so demotion cannot
/// stall once a new primary is already confirmed.
fn advance_old_primary_demotion(
    group: &mut GroupState,
    formation: &str,
    group_id: i32,
    now: Instant,
    epoch: Instant,
    events: &mut Vec<Event>,
) {
    let Some(old) = group
        .nodes
        .iter_mut()
        .find(|n| !n.is_primary_track && matches!(n.current_state, NodeState::Draining | NodeState::DemoteTimeout))
        .filter(|n| n.current_state == n.goal_state)
    else {
        return;
    };

    let prev = old.goal_state;
    old.goal_state = match old.current_state {
        NodeState::Draining => NodeState::DemoteTimeout,
        NodeState::DemoteTimeout => NodeState::Demoted,
        other => other,
    };
    if prev != old.goal_state {
        emit(
            events,
            formation,
            group_id,
            old.node_id,
            prev,
            old.goal_state,
            "continuing demotion of old primary",
            now,
            epoch,
        );
    }
}

fn recompute_sync_names(
    group: &mut GroupState,
    formation: &str,
    group_id: i32,
    now: Instant,
    epoch: Instant,
    events: &mut Vec<Event>,
) {
    let wanted = sync_names::compute(&group.nodes, group.settings.number_sync_standbys);
    if wanted == group.sync_standby_names {
        return;
    }

    let Some(primary) = group
        .nodes
        .iter_mut()
        .find(|n| n.is_primary_track && n.current_state.is_writable())
    else {
        return;
    };

    if primary.current_state != primary.goal_state {
        return; // primary mid-transition, don't pile on another goal change
    }

    match primary.current_state {
        NodeState::Primary => {
            let prev = primary.goal_state;
            primary.goal_state = NodeState::JoinPrimary;
            emit(
                events,
                formation,
                group_id,
                primary.node_id,
                prev,
                primary.goal_state,
                format!("synchronous_standby_names changed to {wanted:?}"),
                now,
                epoch,
            );
        }
        NodeState::JoinPrimary => {
            let prev = primary.goal_state;
            primary.goal_state = NodeState::ApplySettings;
            emit(
                events,
                formation,
                group_id,
                primary.node_id,
                prev,
                primary.goal_state,
                "applying synchronous_standby_names",
                now,
                epoch,
            );
        }
        NodeState::ApplySettings => {
            let prev = primary.goal_state;
            primary.goal_state = NodeState::Primary;
            emit(
                events,
                formation,
                group_id,
                primary.node_id,
                prev,
                primary.goal_state,
                format!("synchronous_standby_names applied: {wanted:?}"),
                now,
                epoch,
            );
            group.sync_standby_names = wanted;
        }
        _ => {}
    }
}

/// Begins or progresses a failover for a group whose primary track is
/// missing or unhealthy. Only one failover may be in flight at a time.
fn run_failover(
    group: &mut GroupState,
    timeouts: &Timeouts,
    formation: &str,
    group_id: i32,
    now: Instant,
    epoch: Instant,
    events: &mut Vec<Event>,
) {
    if !group.failover_in_flight {
        start_failover(group, formation, group_id, now, epoch, events);
        return;
    }
    progress_failover(group, timeouts, formation, group_id, now, epoch, events);
}

fn start_failover(
    group: &mut GroupState,
    formation: &str,
    group_id: i32,
    now: Instant,
    epoch: Instant,
    events: &mut Vec<Event>,
) {
    let healthy_non_primary: Vec<_> = group
        .nodes
        .iter()
        .filter(|n| !n.is_primary_track && n.health_state != HealthState::Bad)
        .map(|n| n.snapshot())
        .collect();

    if healthy_non_primary.is_empty() {
        return; // no candidate yet; wait for a heartbeat to recover
    }

    // A candidate exists, so it's safe to start demoting the old primary.
    if let Some(old_primary) = group
        .nodes
        .iter_mut()
        .find(|n| n.is_primary_track && n.current_state.is_writable())
    {
        if old_primary.current_state == old_primary.goal_state {
            let prev = old_primary.goal_state;
            old_primary.goal_state = match old_primary.current_state {
                NodeState::Primary => NodeState::Draining,
                _ => NodeState::DemoteTimeout,
            };
            old_primary.is_primary_track = false;
            emit(
                events,
                formation,
                group_id,
                old_primary.node_id,
                prev,
                old_primary.goal_state,
                "primary unhealthy, beginning demotion",
                now,
                epoch,
            );
        }
    }

    // I2: a candidate's priority must be nonzero, its state promotable, and
    // its LSN at least the maximum of every other healthy peer's.
    let eligible: Vec<_> = healthy_non_primary
        .iter()
        .filter(|n| promotion_eligible(n, &healthy_non_primary))
        .collect();

    let Some(winner) = eligible
        .iter()
        .max_by(|a, b| {
            a.reported_lsn
                .cmp(&b.reported_lsn)
                .then_with(|| b.node_id.cmp(&a.node_id)) // ties: lowest nodeId wins
        })
        .copied()
    else {
        emit(
            events,
            formation,
            group_id,
            0,
            NodeState::Init,
            NodeState::Init,
            "no eligible promotion candidate (all candidate priorities are zero); group remains primary-less",
            now,
            epoch,
        );
        return;
    };

    let winner_id = winner.node_id;
    if let Some(w) = group.nodes.iter_mut().find(|n| n.node_id == winner_id) {
        if w.current_state == w.goal_state {
            w.is_primary_track = true;
            let prev = w.goal_state;
            w.goal_state = NodeState::PreparePromotion;
            emit(
                events,
                formation,
                group_id,
                w.node_id,
                prev,
                w.goal_state,
                "selected as promotion candidate",
                now,
                epoch,
            );
            group.failover_in_flight = true;
            group.failover_started_at_ms = Some(now_ms(now, epoch));
        }
    }
}

/// Progresses the promotion candidate through its own sequence. The old
/// primary's demotion is advanced separately by `advance_old_primary_demotion`
/// (called unconditionally from `decide_group`), since it must keep moving
/// even once the candidate has already taken over and this function is no
/// longer reached.
fn progress_failover(
    group: &mut GroupState,
    timeouts: &Timeouts,
    formation: &str,
    group_id: i32,
    now: Instant,
    epoch: Instant,
    events: &mut Vec<Event>,
) {
    let Some(candidate_id) = group
        .nodes
        .iter()
        .find(|n| n.is_primary_track && !n.current_state.is_writable())
        .map(|n| n.node_id)
    else {
        // No candidate marked yet (e.g. old primary still draining); nothing to progress.
        return;
    };

    let max_peer_lsn = group
        .nodes
        .iter()
        .filter(|n| n.node_id != candidate_id && n.health_state != HealthState::Bad)
        .map(|n| n.reported_lsn)
        .max()
        .unwrap_or(0);

    let started_at = group.failover_started_at_ms;
    let candidate = group
        .nodes
        .iter_mut()
        .find(|n| n.node_id == candidate_id)
        .expect("candidate_id came from this group");

    if candidate.current_state != candidate.goal_state {
        return; // waiting for keeper to converge on the current step
    }

    match candidate.current_state {
        NodeState::PreparePromotion => {
            if candidate.reported_lsn >= max_peer_lsn {
                let prev = candidate.goal_state;
                candidate.goal_state = NodeState::StopReplication;
                emit(
                    events,
                    formation,
                    group_id,
                    candidate.node_id,
                    prev,
                    candidate.goal_state,
                    "candidate caught up to all healthy peers",
                    now,
                    epoch,
                );
            } else {
                let elapsed_ms = now_ms(now, epoch).saturating_sub(started_at.unwrap_or(0));
                if elapsed_ms > timeouts.prepare_promotion_catchup.as_millis() as u64 {
                    let prev = candidate.goal_state;
                    candidate.is_primary_track = false;
                    candidate.goal_state = candidate.current_state;
                    let cid = candidate.node_id;
                    emit(
                        events,
                        formation,
                        group_id,
                        cid,
                        prev,
                        candidate.goal_state,
                        "promotion aborted: catchup timeout expired, group remains primary-less",
                        now,
                        epoch,
                    );
                    group.failover_in_flight = false;
                    let _ = cid;
                }
            }
        }
        NodeState::StopReplication => {
            let prev = candidate.goal_state;
            candidate.goal_state = NodeState::WaitPrimary;
            emit(events, formation, group_id, candidate.node_id, prev, candidate.goal_state, "replication stopped, promoting", now, epoch);
        }
        NodeState::WaitPrimary => {
            let prev = candidate.goal_state;
            candidate.goal_state = NodeState::Primary;
            emit(events, formation, group_id, candidate.node_id, prev, candidate.goal_state, "new primary confirmed writable", now, epoch);
        }
        NodeState::Primary => {
            group.failover_in_flight = false;
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::monitor::node::NodeRecord;

    fn mk_node(id: i64, state: NodeState, primary_track: bool, prio: u8, lsn: u64, quorum: bool) -> NodeRecord {
        let mut n = NodeRecord::new(id, "default".into(), 0, format!("n{id}"), "127.0.0.1".into(), 5432, prio, quorum);
        n.current_state = state;
        n.goal_state = state;
        n.is_primary_track = primary_track;
        n.reported_lsn = lsn;
        n.reported_pg_is_running = true;
        n.health_state = HealthState::Good;
        n
    }

    /// Backdates `last_heartbeat_at` so `classify_health` derives `Bad`
    /// regardless of the default `Timeouts::network_partition_timeout`.
    fn mark_silent(n: &mut NodeRecord) {
        n.last_heartbeat_at = Instant::now() - Duration::from_secs(3600);
    }

    #[test]
    fn bootstrap_group_stays_put_when_only_primary_healthy() {
        let mut group = GroupState {
            nodes: vec![mk_node(1, NodeState::Single, true, 100, 10, false)],
            ..Default::default()
        };
        let now = Instant::now();
        let events = decide_group(&mut group, &Timeouts::default(), "default", 0, now, now);
        assert!(events.is_empty());
        assert_eq!(group.nodes[0].goal_state, NodeState::Single);
    }

    #[test]
    fn catching_up_standby_promotes_to_secondary_once_within_lag() {
        let mut group = GroupState {
            nodes: vec![
                mk_node(1, NodeState::Primary, true, 100, 1000, false),
                mk_node(2, NodeState::CatchingUp, false, 50, 999, true),
            ],
            ..Default::default()
        };
        let now = Instant::now();
        decide_group(&mut group, &Timeouts::default(), "default", 0, now, now);
        assert_eq!(group.find(2).unwrap().goal_state, NodeState::Secondary);
    }

    #[test]
    fn zero_priority_standby_never_selected_for_promotion() {
        // Two surviving standbys, both priority zero: neither may be promoted
        // and the group stays primary-less (scenario 5 in spec.md §8).
        let mut group = GroupState {
            nodes: vec![
                mk_node(2, NodeState::Secondary, false, 0, 500, true),
                mk_node(3, NodeState::Secondary, false, 0, 400, true),
            ],
            ..Default::default()
        };
        let now = Instant::now();
        let events = decide_group(&mut group, &Timeouts::default(), "default", 0, now, now);
        assert_eq!(group.find(2).unwrap().goal_state, NodeState::Secondary);
        assert_eq!(group.find(3).unwrap().goal_state, NodeState::Secondary);
        assert!(events.iter().any(|e| e.description.contains("primary-less")));
    }

    #[test]
    fn healthy_candidate_is_promoted_when_primary_dies() {
        let mut group = GroupState {
            nodes: vec![
                mk_node(1, NodeState::Primary, true, 100, 1000, false),
                mk_node(2, NodeState::Secondary, false, 50, 1000, true),
            ],
            ..Default::default()
        };
        mark_silent(&mut group.nodes[0]);
        let now = Instant::now();
        decide_group(&mut group, &Timeouts::default(), "default", 0, now, now);
        assert_eq!(group.find(2).unwrap().goal_state, NodeState::PreparePromotion);
        assert!(group.find(2).unwrap().is_primary_track);
        assert_eq!(group.find(1).unwrap().goal_state, NodeState::Draining);
        assert!(group.failover_in_flight);
    }

    #[test]
    fn lone_single_primary_moves_to_wait_primary_once_standby_registers() {
        let mut group = GroupState {
            nodes: vec![
                mk_node(1, NodeState::Single, true, 100, 0, false),
                mk_node(2, NodeState::Init, false, 50, 0, true),
            ],
            ..Default::default()
        };
        let now = Instant::now();
        decide_group(&mut group, &Timeouts::default(), "default", 0, now, now);
        assert_eq!(group.find(1).unwrap().goal_state, NodeState::WaitPrimary);
    }

    #[test]
    fn old_primary_clears_primary_track_when_demotion_begins() {
        // Regression: start_failover must clear is_primary_track on the old
        // primary in the same step it assigns Draining, or progress_failover's
        // `is_primary_track && !is_writable()` candidate search matches the
        // old primary instead of the real candidate and the group deadlocks.
        let mut group = GroupState {
            nodes: vec![
                mk_node(1, NodeState::Primary, true, 100, 1000, false),
                mk_node(2, NodeState::Secondary, false, 50, 1000, true),
            ],
            ..Default::default()
        };
        mark_silent(&mut group.nodes[0]);
        let now = Instant::now();
        decide_group(&mut group, &Timeouts::default(), "default", 0, now, now);
        assert!(!group.find(1).unwrap().is_primary_track);
        assert!(group.find(2).unwrap().is_primary_track);
    }

    #[test]
    fn old_primary_reaches_demoted_and_rejoins_via_pg_rewind() {
        // Scenarios 3/4: once demotion starts, the old primary must progress
        // Draining -> DemoteTimeout -> Demoted independent of the candidate,
        // then reunite_recovered_old_primary gives it a path back in.
        let mut group = GroupState {
            nodes: vec![
                mk_node(1, NodeState::Draining, false, 100, 1000, false),
                mk_node(2, NodeState::Primary, true, 50, 1000, true),
            ],
            failover_in_flight: true,
            failover_started_at_ms: Some(0),
            ..Default::default()
        };
        let now = Instant::now();

        decide_group(&mut group, &Timeouts::default(), "default", 0, now, now);
        assert_eq!(group.find(1).unwrap().goal_state, NodeState::DemoteTimeout);
        group.find_mut(1).unwrap().current_state = NodeState::DemoteTimeout;

        decide_group(&mut group, &Timeouts::default(), "default", 0, now, now);
        assert_eq!(group.find(1).unwrap().goal_state, NodeState::Demoted);
        group.find_mut(1).unwrap().current_state = NodeState::Demoted;
        group.find_mut(1).unwrap().health_state = HealthState::Good;

        let events = decide_group(&mut group, &Timeouts::default(), "default", 0, now, now);
        assert_eq!(group.find(1).unwrap().goal_state, NodeState::CatchingUp);
        assert!(events.iter().any(|e| e.description.contains("pg_rewind")));
    }

    #[test]
    fn at_most_one_failover_in_flight() {
        let mut group = GroupState {
            nodes: vec![
                mk_node(1, NodeState::Draining, false, 100, 1000, false),
                mk_node(2, NodeState::PreparePromotion, true, 50, 1000, true),
            ],
            failover_in_flight: true,
            failover_started_at_ms: Some(0),
            ..Default::default()
        };
        let now = Instant::now();
        decide_group(&mut group, &Timeouts::default(), "default", 0, now, now);
        // candidate should advance since it's caught up to all peers (itself is the only peer)
        assert_eq!(group.find(2).unwrap().goal_state, NodeState::StopReplication);
    }
}
