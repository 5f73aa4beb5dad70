use thiserror::Error;

/// Canonical result type for `marketreplay-core`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Error taxonomy for the serializer, ordering contract, and manifest model.
/// Names follow the shared taxonomy so callers above this crate can match on
/// category without re-deriving it from a string.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("ordering violation: duplicate event at {ts_event}:{seq}")]
    OrderingViolationDuplicate { ts_event: u64, seq: u64 },

    #[error(
        "ordering violation: out-of-order event at {ts_event}:{seq} (previous was {prev_ts_event}:{prev_seq})"
    )]
    OrderingViolationOutOfOrder {
        ts_event: u64,
        seq: u64,
        prev_ts_event: u64,
        prev_seq: u64,
    },

    #[error("manifest invalid: {0}")]
    ManifestInvalid(String),

    #[error("manifest parse error: {0}")]
    ManifestParseError(String),

    #[error("manifest load error: {0}")]
    ManifestLoadError(String),

    #[error("inconsistent manifests across partitions: {0}")]
    MultiManifestInconsistent(String),

    #[error("unsupported schema version: {0}")]
    SchemaUnsupported(String),

    #[error("row count mismatch: expected {expected}, got {actual}")]
    RowCountMismatch { expected: u64, actual: u64 },

    #[error("invalid ordering columns: {0}")]
    OrderingColumnsInvalid(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Serialization(e.to_string())
    }
}
