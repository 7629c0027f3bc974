// src/core/keeper/observe.rs

//! Turns a `PostgresControl::status()`/`current_lsn()` snapshot into the
//! `NodeObservation` sent to the monitor on every heartbeat (spec.md §4.3
//! step 1).

use super::pgcontrol::PostgresControl;
use crate::core::errors::PgAutoCtlError;
use crate::core::fsm::NodeState;
use crate::core::monitor::node::NodeId;
use crate::core::protocol::NodeObservation;

pub async fn observe(
    pg: &dyn PostgresControl,
    node_id: NodeId,
    current_state: NodeState,
) -> Result<NodeObservation, PgAutoCtlError> {
    let status = pg.status().await?;
    let reported_lsn = pg.current_lsn().await?;
    let sys_identifier = pg.system_identifier().await.ok();

    Ok(NodeObservation {
        node_id,
        current_state,
        reported_lsn,
        reported_pg_is_running: status.is_running,
        sys_identifier,
    })
}
