// src/core/keeper/local_state.rs

//! Durable local state for a keeper, so that a restart can resume a
//! transition already in flight instead of re-registering with the monitor
//! (spec.md §4.4). Persisted with the same write-to-temp-then-rename
//! pattern the teacher uses for its on-disk snapshots
//! (`core::persistence::spldb_saver`/`spldb::save`), adapted from an
//! async-file-plus-random-suffix scheme to a synchronous one since this
//! file is tiny and written far less often.

use crate::core::errors::PgAutoCtlError;
use crate::core::fsm::NodeState;
use crate::core::monitor::node::NodeId;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LocalState {
    pub node_id: NodeId,
    pub formation: String,
    pub group_id: i32,
    pub current_state: NodeState,
    pub goal_state: NodeState,
}

/// Loads and saves a keeper's `LocalState` at a fixed path, atomically.
pub struct LocalStateStore {
    path: PathBuf,
}

impl LocalStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn load(&self) -> Result<LocalState, PgAutoCtlError> {
        let bytes = fs::read(&self.path)?;
        let (state, _) = bincode::serde::decode_from_slice(&bytes, bincode::config::standard())?;
        Ok(state)
    }

    /// Writes `state` to a sibling temp file, then renames it into place so
    /// a crash mid-write never leaves a half-written state file behind.
    pub fn save(&self, state: &LocalState) -> Result<(), PgAutoCtlError> {
        let bytes = bincode::serde::encode_to_vec(state, bincode::config::standard())?;
        let temp_path = temp_sibling(&self.path);
        fs::write(&temp_path, &bytes)?;
        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut rand_bytes = [0u8; 4];
    let _ = getrandom::fill(&mut rand_bytes);
    let suffix = hex::encode(rand_bytes);
    let mut temp = path.as_os_str().to_owned();
    temp.push(format!(".tmp.{suffix}"));
    PathBuf::from(temp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn round_trips_through_disk() {
        let dir = tempdir().unwrap();
        let store = LocalStateStore::new(dir.path().join("pg_autoctl.state"));
        let state = LocalState {
            node_id: 7,
            formation: "default".into(),
            group_id: 0,
            current_state: NodeState::Init,
            goal_state: NodeState::Single,
        };
        store.save(&state).unwrap();
        assert!(store.exists());
        assert_eq!(store.load().unwrap(), state);
    }

    #[test]
    fn missing_file_is_reported_as_absent() {
        let dir = tempdir().unwrap();
        let store = LocalStateStore::new(dir.path().join("pg_autoctl.state"));
        assert!(!store.exists());
    }
}
