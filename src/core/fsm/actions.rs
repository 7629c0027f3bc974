// src/core/fsm/actions.rs

//! The keeper-side action vocabulary. Each legal `(from, to)` transition in
//! `TRANSITIONS` maps to an ordered list of these; the transition executor
//! (`core::keeper::transition`) runs them in order against `PostgresControl`.
//!
//! Every action is phrased as "ensure X" rather than "do X", so that running
//! the same list twice (after a keeper restart mid-transition) is safe —
//! this is what makes P4 (idempotence) hold by construction instead of by
//! bolted-on retry bookkeeping.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    /// Run `initdb` if PGDATA is empty, then write default settings.
    EnsureInitialized,
    /// Create the `autoctl` role used by the monitor to connect.
    EnsureAutoctlRole,
    /// Ensure PGDATA is empty or fully removable before a basebackup.
    EnsurePgdataRemovable,
    /// Take a `pg_basebackup` from the primary into PGDATA.
    TakeBasebackup,
    /// Write `primary_conninfo`/standby signal so Postgres streams from the primary.
    WriteStandbySettings,
    /// Start the local Postgres instance if it is not running.
    EnsureStarted,
    /// Stop the local Postgres instance if it is running.
    EnsureStopped,
    /// Block until the walreceiver reports a streaming connection.
    WaitForStreaming,
    /// Verify replication lag is within the configured threshold.
    VerifyReplicationLag,
    /// Ensure a physical replication slot exists for this node on the primary.
    EnsureReplicationSlot,
    /// Drop replication slots this node no longer needs.
    DropStaleReplicationSlots,
    /// Checkpoint while still a standby, ahead of promotion.
    CheckpointAsStandby,
    /// Stop the walreceiver / pause replication so no further WAL is applied.
    StopWalReceiver,
    /// Ensure the old primary cannot reconnect as a replication source.
    FenceOldPrimary,
    /// Run `pg_ctl promote` and wait for the instance to become writable.
    PromoteToPrimary,
    /// Confirm the instance accepts writes.
    ConfirmWritable,
    /// Create replication slots for every known standby.
    EnsureSlotsForStandbys,
    /// Add/refresh `pg_hba.conf` rules allowing standbys to replicate.
    EditHbaForStandbys,
    /// Recompute and write `synchronous_standby_names`, then reload.
    ApplySyncStandbyNames,
    /// Reload the Postgres configuration without a restart.
    ReloadConfig,
    /// `pg_rewind` from the new primary, then prepare to restart as a standby.
    RewindFromPrimary,
}

/// The ordered action script for a single FSM transition.
pub type ActionScript = &'static [Action];
