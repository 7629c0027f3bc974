// src/core/fsm/states.rs

//! The closed set of node-local states a keeper can report and a monitor
//! can assign as a goal. See `spec.md` §4.1 for the full catalog.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

/// A node-local FSM state, shared verbatim between monitor and keeper.
///
/// The monitor never invents a state outside this set, and a keeper that
/// observes an assigned goal not in this set must reject it as
/// `BadState` rather than guess at a transition.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
pub enum NodeState {
    Init,
    Single,
    WaitPrimary,
    Primary,
    JoinPrimary,
    ApplySettings,
    DemoteTimeout,
    Demoted,
    Draining,
    StopReplication,
    WaitStandby,
    CatchingUp,
    Secondary,
    PreparePromotion,
    PrepareMaintenance,
    Maintenance,
}

impl NodeState {
    /// States in which a node holds write authority over its own data
    /// directory. Invariant I1 requires at most one of these per group.
    pub const WRITABLE: &'static [NodeState] = &[
        NodeState::Single,
        NodeState::Primary,
        NodeState::WaitPrimary,
        NodeState::JoinPrimary,
        NodeState::ApplySettings,
    ];

    pub fn is_writable(self) -> bool {
        Self::WRITABLE.contains(&self)
    }

    /// States from which promotion eligibility (I2) may be evaluated.
    pub fn is_promotable_from(self) -> bool {
        matches!(self, NodeState::Secondary | NodeState::CatchingUp)
    }
}
