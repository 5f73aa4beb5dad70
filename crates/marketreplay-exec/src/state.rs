//! State Container: owns strategy state as an opaque JSON value, advances a
//! monotonic version on every mutation, and produces hash-verified
//! snapshots the Checkpoint Manager persists.

use marketreplay_core::canonical::json_to_canonical;
use marketreplay_core::hash::{hash_canonical, Hash256};
use serde::{Deserialize, Serialize};

use crate::error::{ExecError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub state: serde_json::Value,
    pub hash: String,
    pub version: u64,
    pub timestamp: u64,
}

#[derive(Debug, Clone)]
pub struct StateContainer {
    state: serde_json::Value,
    version: u64,
}

impl StateContainer {
    pub fn new() -> Self {
        Self {
            state: serde_json::Value::Object(Default::default()),
            version: 0,
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.state.get(key)
    }

    pub fn set(&mut self, key: &str, value: serde_json::Value) {
        self.ensure_object();
        self.state[key] = value;
        self.version += 1;
    }

    /// Replace the whole state document; used when a strategy maintains a
    /// structured state shape rather than flat key/value fields.
    pub fn set_value(&mut self, value: serde_json::Value) {
        self.state = value;
        self.version += 1;
    }

    pub fn update<F>(&mut self, f: F)
    where
        F: FnOnce(&mut serde_json::Value),
    {
        f(&mut self.state);
        self.version += 1;
    }

    /// Increment a numeric field, treating an absent or non-numeric field
    /// as zero.
    pub fn increment(&mut self, key: &str, by: f64) {
        self.ensure_object();
        let current = self.state.get(key).and_then(|v| v.as_f64()).unwrap_or(0.0);
        self.state[key] = serde_json::json!(current + by);
        self.version += 1;
    }

    fn ensure_object(&mut self) {
        if !self.state.is_object() {
            self.state = serde_json::Value::Object(Default::default());
        }
    }

    fn hash(&self) -> Hash256 {
        hash_canonical(&json_to_canonical(&self.state))
    }

    /// Freeze the current state into a hash-stamped, owned snapshot.
    pub fn snapshot(&self, timestamp: u64) -> StateSnapshot {
        StateSnapshot {
            state: self.state.clone(),
            hash: self.hash().to_hex(),
            version: self.version,
            timestamp,
        }
    }

    /// Rehydrate from a snapshot, recomputing and verifying its hash.
    pub fn restore(&mut self, snapshot: &StateSnapshot) -> Result<()> {
        let candidate = StateContainer {
            state: snapshot.state.clone(),
            version: snapshot.version,
        };
        let recomputed = candidate.hash().to_hex();
        if recomputed != snapshot.hash {
            return Err(ExecError::Restore(format!(
                "state hash mismatch on restore: expected {}, recomputed {}",
                snapshot.hash, recomputed
            )));
        }
        *self = candidate;
        Ok(())
    }
}

impl Default for StateContainer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_advances_on_every_mutation() {
        let mut c = StateContainer::new();
        c.set("x", serde_json::json!(1));
        c.increment("x", 2.0);
        assert_eq!(c.version(), 2);
        assert_eq!(c.get("x").unwrap(), &serde_json::json!(3.0));
    }

    #[test]
    fn snapshot_and_restore_round_trip() {
        let mut c = StateContainer::new();
        c.set("events", serde_json::json!(10));
        let snap = c.snapshot(1000);
        let mut restored = StateContainer::new();
        restored.restore(&snap).unwrap();
        assert_eq!(restored.version(), c.version());
        assert_eq!(restored.get("events"), c.get("events"));
    }

    #[test]
    fn restore_rejects_a_tampered_snapshot() {
        let mut c = StateContainer::new();
        c.set("events", serde_json::json!(10));
        let mut snap = c.snapshot(1000);
        snap.state = serde_json::json!({"events": 11});
        let mut restored = StateContainer::new();
        let err = restored.restore(&snap).unwrap_err();
        assert!(matches!(err, ExecError::Restore(_)));
    }
}
