//! Dataset manifests (input descriptors) and the terminal Run Manifest.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::id::ManifestId;

/// A validated dataset descriptor. `manifest_id` is derived, never supplied
/// by the input file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetManifest {
    pub schema_version: u32,
    pub rows: u64,
    pub ts_event_min: u64,
    pub ts_event_max: u64,
    pub ordering_columns: Vec<String>,
    pub stream_type: String,
    pub manifest_id: ManifestId,
    /// Set when this manifest is the result of merging several partitions.
    pub partition_count: u32,
}

/// Raw, on-disk shape of a dataset manifest JSON file before validation.
#[derive(Debug, Clone, Deserialize)]
struct RawDatasetManifest {
    schema_version: u32,
    rows: u64,
    ts_event_min: u64,
    ts_event_max: u64,
    ordering_columns: Vec<String>,
    stream_type: String,
    #[serde(default)]
    #[allow(dead_code)]
    source_files: Option<u32>,
}

/// The set of `schema_version` values this core accepts.
pub const SUPPORTED_SCHEMA_VERSIONS: &[u32] = &[1];

/// Parse and validate raw manifest bytes, computing `manifest_id` from them.
pub fn parse_and_validate(raw_bytes: &[u8], active_ordering_columns: &[&str]) -> Result<DatasetManifest> {
    let raw: RawDatasetManifest = serde_json::from_slice(raw_bytes)
        .map_err(|e| CoreError::ManifestParseError(e.to_string()))?;

    if !SUPPORTED_SCHEMA_VERSIONS.contains(&raw.schema_version) {
        return Err(CoreError::SchemaUnsupported(format!(
            "schema_version {} is not supported",
            raw.schema_version
        )));
    }
    if raw.ordering_columns != active_ordering_columns {
        return Err(CoreError::OrderingColumnsInvalid(format!(
            "expected {active_ordering_columns:?}, got {:?}",
            raw.ordering_columns
        )));
    }
    if raw.ts_event_min > raw.ts_event_max {
        return Err(CoreError::ManifestInvalid(
            "ts_event_min must not exceed ts_event_max".into(),
        ));
    }

    Ok(DatasetManifest {
        schema_version: raw.schema_version,
        rows: raw.rows,
        ts_event_min: raw.ts_event_min,
        ts_event_max: raw.ts_event_max,
        ordering_columns: raw.ordering_columns,
        stream_type: raw.stream_type,
        manifest_id: ManifestId::from_raw_bytes(raw_bytes),
        partition_count: 1,
    })
}

/// Merge several already-validated manifests into one view. Enforces cross-
/// manifest agreement on `schema_version`, `stream_type`, and
/// `ordering_columns`.
pub fn merge(manifests: &[DatasetManifest]) -> Result<DatasetManifest> {
    let first = manifests
        .first()
        .ok_or_else(|| CoreError::ManifestInvalid("cannot merge zero manifests".into()))?;

    for other in &manifests[1..] {
        if other.schema_version != first.schema_version
            || other.stream_type != first.stream_type
            || other.ordering_columns != first.ordering_columns
        {
            return Err(CoreError::MultiManifestInconsistent(format!(
                "manifest {} disagrees with {} on schema_version/stream_type/ordering_columns",
                other.manifest_id, first.manifest_id
            )));
        }
    }

    let rows = manifests.iter().map(|m| m.rows).sum();
    let ts_event_min = manifests.iter().map(|m| m.ts_event_min).min().unwrap();
    let ts_event_max = manifests.iter().map(|m| m.ts_event_max).max().unwrap();

    Ok(DatasetManifest {
        schema_version: first.schema_version,
        rows,
        ts_event_min,
        ts_event_max,
        ordering_columns: first.ordering_columns.clone(),
        stream_type: first.stream_type.clone(),
        manifest_id: first.manifest_id.clone(),
        partition_count: manifests.len() as u32,
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifestInput {
    pub dataset: String,
    pub config_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifestOutput {
    pub event_count: u64,
    pub fills_count: u64,
    pub decision_count: u64,
    pub decision_hash: String,
    pub state_hash: String,
    pub fills_hash: String,
    pub last_cursor: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifestReplay {
    pub replay_run_id: String,
    pub first_ts_event: Option<u64>,
    pub last_ts_event: Option<u64>,
    pub stop_reason: String,
    pub emitted_event_count: u64,
}

/// The terminal artifact a Strategy Runtime emits on finalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_id: String,
    pub started_at: u64,
    pub ended_at: u64,
    pub ended_reason: String,
    pub input: RunManifestInput,
    pub output: RunManifestOutput,
    pub replay: RunManifestReplay,
}
