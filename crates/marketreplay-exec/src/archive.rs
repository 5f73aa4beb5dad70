//! Run Archive Writer: on finalize, persists `manifest.json`,
//! `decisions.jsonl`, and `stats.json` under `replay_runs/replay_run_id=<ID>/`,
//! sharing the `Storage` seam with the Checkpoint Manager. Writes are
//! at-least-once with idempotent keys — rewriting the same run's archive is
//! a no-op in effect, never a duplicate.

use marketreplay_core::canonical::{canonical_bytes, json_to_canonical, Canonical};
use marketreplay_core::event::DecisionRecord;
use marketreplay_io::Storage;

use crate::error::Result;

#[derive(Debug, Clone, serde::Serialize)]
pub struct RunStats {
    pub emitted_event_count: u64,
    pub decision_count: u64,
    pub duration_ms: u64,
}

impl RunStats {
    fn to_canonical(&self) -> Canonical {
        Canonical::obj([
            (
                "emitted_event_count",
                Canonical::BigInt(self.emitted_event_count as u128),
            ),
            (
                "decision_count",
                Canonical::BigInt(self.decision_count as u128),
            ),
            ("duration_ms", Canonical::BigInt(self.duration_ms as u128)),
        ])
    }
}

pub struct RunArchiveWriter<'a> {
    storage: &'a dyn Storage,
    replay_run_id: String,
}

impl<'a> RunArchiveWriter<'a> {
    pub fn new(storage: &'a dyn Storage, replay_run_id: impl Into<String>) -> Self {
        Self {
            storage,
            replay_run_id: replay_run_id.into(),
        }
    }

    fn prefix(&self) -> String {
        format!("replay_runs/replay_run_id={}/", self.replay_run_id)
    }

    /// `manifest_subset` is the caller-chosen slice of the Run Manifest the
    /// archive publishes; the writer does not know the full manifest shape.
    pub fn write(
        &self,
        manifest_subset: &serde_json::Value,
        decisions: &[DecisionRecord],
        stats: &RunStats,
    ) -> Result<()> {
        let manifest_bytes = canonical_bytes(&json_to_canonical(manifest_subset));
        self.storage
            .write(&format!("{}manifest.json", self.prefix()), &manifest_bytes)?;

        let mut decisions_bytes = Vec::new();
        for decision in decisions {
            decisions_bytes.extend(canonical_bytes(&decision.to_canonical()));
            decisions_bytes.push(b'\n');
        }
        self.storage.write(
            &format!("{}decisions.jsonl", self.prefix()),
            &decisions_bytes,
        )?;

        let stats_bytes = canonical_bytes(&stats.to_canonical());
        self.storage
            .write(&format!("{}stats.json", self.prefix()), &stats_bytes)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marketreplay_io::storage::FsStorage;
    use tempfile::tempdir;

    #[test]
    fn write_produces_all_three_objects_under_the_keyed_prefix() {
        let dir = tempdir().unwrap();
        let storage = FsStorage::new();
        let base = dir.path().to_str().unwrap();

        let decisions = vec![DecisionRecord {
            replay_run_id: "replay_abc123".into(),
            cursor: "c1".into(),
            ts_event: 1000,
            decision: serde_json::json!({"action": "BUY"}),
        }];
        let stats = RunStats {
            emitted_event_count: 10,
            decision_count: 1,
            duration_ms: 42,
        };

        // Exercise through a storage rooted at the tempdir by prefixing the
        // writer's own keys; FsStorage operates on whatever path string it
        // is given, so route writes under `base` here.
        let rooted = RootedStorage { inner: &storage, base: base.to_string() };
        let rooted_writer = RunArchiveWriter::new(&rooted, "replay_abc123");
        rooted_writer
            .write(&serde_json::json!({"rows": 10}), &decisions, &stats)
            .unwrap();

        let listed = storage
            .list(&format!("{base}/replay_runs/replay_run_id=replay_abc123/"))
            .unwrap();
        assert_eq!(listed.len(), 3);
    }

    struct RootedStorage<'a> {
        inner: &'a dyn Storage,
        base: String,
    }

    impl<'a> Storage for RootedStorage<'a> {
        fn write(&self, path: &str, bytes: &[u8]) -> marketreplay_io::Result<()> {
            self.inner.write(&format!("{}/{path}", self.base), bytes)
        }
        fn read_range(&self, path: &str, offset: u64, len: usize) -> marketreplay_io::Result<Vec<u8>> {
            self.inner.read_range(&format!("{}/{path}", self.base), offset, len)
        }
        fn delete(&self, path: &str) -> marketreplay_io::Result<()> {
            self.inner.delete(&format!("{}/{path}", self.base))
        }
        fn list(&self, prefix: &str) -> marketreplay_io::Result<Vec<String>> {
            self.inner.list(&format!("{}/{prefix}", self.base))
        }
        fn size(&self, path: &str) -> marketreplay_io::Result<u64> {
            self.inner.size(&format!("{}/{path}", self.base))
        }
        fn etag(&self, path: &str) -> marketreplay_io::Result<Option<String>> {
            self.inner.etag(&format!("{}/{path}", self.base))
        }
    }
}
