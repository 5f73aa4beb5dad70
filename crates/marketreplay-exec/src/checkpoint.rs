//! Checkpoint Manager: persists `StateSnapshot`s keyed by
//! `(base_dir/URI, run_id, checkpoint_id)` through the shared `Storage`
//! seam, so the atomic-write guarantee lives in one place (`FsStorage`'s
//! temp-then-rename) rather than being re-implemented here.

use serde::{Deserialize, Serialize};

use marketreplay_io::Storage;

use crate::error::{ExecError, Result};
use crate::state::{StateContainer, StateSnapshot};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub checkpoint_id: String,
    pub event_index: u64,
    pub state: serde_json::Value,
    pub state_hash: String,
    pub version: u64,
    pub created_at: u64,
}

pub struct CheckpointManager<'a> {
    storage: &'a dyn Storage,
    base_dir: String,
    run_id: String,
}

impl<'a> CheckpointManager<'a> {
    pub fn new(storage: &'a dyn Storage, base_dir: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self {
            storage,
            base_dir: base_dir.into(),
            run_id: run_id.into(),
        }
    }

    fn path(&self, checkpoint_id: &str) -> String {
        format!(
            "{}/checkpoints/run_id={}/{}.json",
            self.base_dir, self.run_id, checkpoint_id
        )
    }

    fn prefix(&self) -> String {
        format!("{}/checkpoints/run_id={}/", self.base_dir, self.run_id)
    }

    /// Atomic write through the storage backend (temp-then-rename for
    /// `FsStorage`, write-then-finalize for cloud adapters).
    pub fn save(
        &self,
        state: &StateContainer,
        checkpoint_id: &str,
        event_index: u64,
        created_at: u64,
    ) -> Result<()> {
        let snapshot = state.snapshot(created_at);
        let record = CheckpointRecord {
            checkpoint_id: checkpoint_id.to_string(),
            event_index,
            state: snapshot.state,
            state_hash: snapshot.hash,
            version: snapshot.version,
            created_at,
        };
        let bytes = serde_json::to_vec(&record)?;
        self.storage.write(&self.path(checkpoint_id), &bytes)?;
        Ok(())
    }

    /// Read and, by default, verify the stored hash against a recomputed
    /// hash of the persisted state.
    pub fn load(&self, checkpoint_id: &str, verify_hash: bool) -> Result<CheckpointRecord> {
        let bytes = self.storage.read_all(&self.path(checkpoint_id))?;
        let record: CheckpointRecord = serde_json::from_slice(&bytes)?;
        if verify_hash {
            let snapshot = StateSnapshot {
                state: record.state.clone(),
                hash: record.state_hash.clone(),
                version: record.version,
                timestamp: record.created_at,
            };
            let mut probe = StateContainer::new();
            probe.restore(&snapshot).map_err(|_| {
                ExecError::Restore(format!(
                    "checkpoint {checkpoint_id} failed hash verification on load"
                ))
            })?;
        }
        Ok(record)
    }

    pub fn list(&self) -> Result<Vec<String>> {
        let prefix = self.prefix();
        let entries = self.storage.list(&prefix)?;
        Ok(entries
            .into_iter()
            .filter_map(|path| {
                path.strip_prefix(&prefix)
                    .and_then(|name| name.strip_suffix(".json"))
                    .map(|id| id.to_string())
            })
            .collect())
    }

    pub fn delete(&self, checkpoint_id: &str) -> Result<()> {
        self.storage.delete(&self.path(checkpoint_id))?;
        Ok(())
    }

    pub fn exists(&self, checkpoint_id: &str) -> Result<bool> {
        match self.storage.size(&self.path(checkpoint_id)) {
            Ok(_) => Ok(true),
            Err(marketreplay_io::IoError::Io { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Selects the checkpoint with the highest `event_index`, verifying its
    /// hash before returning it.
    pub fn get_latest(&self) -> Result<Option<CheckpointRecord>> {
        let ids = self.list()?;
        let mut latest: Option<CheckpointRecord> = None;
        for id in ids {
            let record = self.load(&id, false)?;
            let is_newer = latest
                .as_ref()
                .map(|l| record.event_index > l.event_index)
                .unwrap_or(true);
            if is_newer {
                latest = Some(record);
            }
        }
        if let Some(record) = &latest {
            self.load(&record.checkpoint_id, true)?;
        }
        Ok(latest)
    }

    /// Retain the `keep_n` checkpoints with the highest `event_index`,
    /// deleting the rest.
    pub fn cleanup(&self, keep_n: usize) -> Result<()> {
        let ids = self.list()?;
        let mut records: Vec<CheckpointRecord> = ids
            .into_iter()
            .map(|id| self.load(&id, false))
            .collect::<Result<_>>()?;
        records.sort_by(|a, b| b.event_index.cmp(&a.event_index));
        for stale in records.into_iter().skip(keep_n) {
            self.delete(&stale.checkpoint_id)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marketreplay_io::storage::FsStorage;
    use tempfile::tempdir;

    #[test]
    fn save_then_load_round_trips_the_state() {
        let dir = tempdir().unwrap();
        let storage = FsStorage::new();
        let manager = CheckpointManager::new(&storage, dir.path().to_str().unwrap(), "run_a");
        let mut state = StateContainer::new();
        state.set("n", serde_json::json!(3));
        manager.save(&state, "cp_1", 10, 1_000).unwrap();
        let record = manager.load("cp_1", true).unwrap();
        assert_eq!(record.event_index, 10);
        assert_eq!(record.state, serde_json::json!({"n": 3}));
    }

    #[test]
    fn load_rejects_a_tampered_checkpoint() {
        let dir = tempdir().unwrap();
        let storage = FsStorage::new();
        let manager = CheckpointManager::new(&storage, dir.path().to_str().unwrap(), "run_b");
        let state = StateContainer::new();
        manager.save(&state, "cp_1", 1, 1_000).unwrap();
        let path = format!("{}/checkpoints/run_id=run_b/cp_1.json", dir.path().to_str().unwrap());
        let mut bytes = storage.read_all(&path).unwrap();
        let needle = b"\"state_hash\":\"";
        let pos = bytes
            .windows(needle.len())
            .position(|w| w == needle)
            .expect("state_hash field must be present");
        let flip_at = pos + needle.len();
        bytes[flip_at] = if bytes[flip_at] == b'0' { b'1' } else { b'0' };
        storage.write(&path, &bytes).unwrap();
        let err = manager.load("cp_1", true);
        assert!(err.is_err());
    }

    #[test]
    fn get_latest_selects_highest_event_index() {
        let dir = tempdir().unwrap();
        let storage = FsStorage::new();
        let manager = CheckpointManager::new(&storage, dir.path().to_str().unwrap(), "run_c");
        let state = StateContainer::new();
        manager.save(&state, "cp_1", 5, 100).unwrap();
        manager.save(&state, "cp_2", 20, 200).unwrap();
        manager.save(&state, "cp_3", 10, 300).unwrap();
        let latest = manager.get_latest().unwrap().unwrap();
        assert_eq!(latest.checkpoint_id, "cp_2");
    }

    #[test]
    fn cleanup_retains_only_the_highest_n_event_indices() {
        let dir = tempdir().unwrap();
        let storage = FsStorage::new();
        let manager = CheckpointManager::new(&storage, dir.path().to_str().unwrap(), "run_d");
        let state = StateContainer::new();
        for (id, idx) in [("cp_1", 1), ("cp_2", 2), ("cp_3", 3)] {
            manager.save(&state, id, idx, 0).unwrap();
        }
        manager.cleanup(1).unwrap();
        let remaining = manager.list().unwrap();
        assert_eq!(remaining, vec!["cp_3".to_string()]);
    }
}
