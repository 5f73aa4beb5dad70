use thiserror::Error;

pub type Result<T> = std::result::Result<T, IoError>;

/// Error taxonomy for the columnar reader adapter and storage layer.
#[derive(Debug, Error)]
pub enum IoError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("missing remote-storage credentials: {0}")]
    CredentialError(String),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("schema error at {path}: {message}")]
    Schema { path: String, message: String },

    #[error("corrupted source at {path}: {message}")]
    Corruption { path: String, message: String },

    #[error("compressed-data corruption at {path}: {message}")]
    CompressionCorruption { path: String, message: String },

    #[error("storage backend error: {0}")]
    Storage(String),

    #[error(transparent)]
    Core(#[from] marketreplay_core::CoreError),
}

impl From<serde_json::Error> for IoError {
    fn from(e: serde_json::Error) -> Self {
        IoError::Schema {
            path: String::new(),
            message: e.to_string(),
        }
    }
}
