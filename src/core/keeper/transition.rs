// src/core/keeper/transition.rs

//! Executes the action script for a single `(current, goal)` step against
//! `PostgresControl`, then advances `current_state` to `goal` only once
//! every action in the script has succeeded — a keeper that crashes
//! mid-script simply re-runs the whole (idempotent) script from
//! `current_state` on restart.

use super::pgcontrol::PostgresControl;
use crate::core::errors::PgAutoCtlError;
use crate::core::fsm::{NodeState, lookup};
use tracing::{info, warn};

pub struct TransitionExecutor<'a> {
    pg: &'a dyn PostgresControl,
}

impl<'a> TransitionExecutor<'a> {
    pub fn new(pg: &'a dyn PostgresControl) -> Self {
        Self { pg }
    }

    /// Runs the transition from `current` to `goal`. Returns the new
    /// current state on success: `goal` if every action ran, or `current`
    /// unchanged if `(current, goal)` is not a legal FSM transition (a
    /// keeper must never silently skip to a state it wasn't told it could
    /// reach — see spec.md §4.1's closed-catalog invariant).
    pub async fn step(&self, current: NodeState, goal: NodeState) -> Result<NodeState, PgAutoCtlError> {
        if current == goal {
            return Ok(current);
        }
        let Some(script) = lookup(current, goal) else {
            warn!("monitor assigned illegal transition {current:?} -> {goal:?}; ignoring");
            return Ok(current);
        };

        for action in script {
            info!("{current:?} -> {goal:?}: {action:?}");
            self.pg.execute(*action).await?;
        }
        Ok(goal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::keeper::pgcontrol::{MockPostgresControl, PgStatus};

    #[tokio::test]
    async fn runs_legal_transition_and_advances_state() {
        let mock = MockPostgresControl::new(PgStatus::default(), 0);
        let executor = TransitionExecutor::new(&mock);
        let result = executor.step(NodeState::Init, NodeState::Single).await.unwrap();
        assert_eq!(result, NodeState::Single);
        assert_eq!(mock.executed.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn illegal_transition_leaves_state_unchanged() {
        let mock = MockPostgresControl::new(PgStatus::default(), 0);
        let executor = TransitionExecutor::new(&mock);
        let result = executor.step(NodeState::Secondary, NodeState::Init).await.unwrap();
        assert_eq!(result, NodeState::Secondary);
        assert!(mock.executed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn noop_transition_runs_nothing() {
        let mock = MockPostgresControl::new(PgStatus::default(), 0);
        let executor = TransitionExecutor::new(&mock);
        let result = executor.step(NodeState::Primary, NodeState::Primary).await.unwrap();
        assert_eq!(result, NodeState::Primary);
        assert!(mock.executed.lock().unwrap().is_empty());
    }
}
