use thiserror::Error;

pub type Result<T> = std::result::Result<T, ExecError>;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("lifecycle error: {0}")]
    Lifecycle(String),

    #[error("error limit exceeded: {error_count} contained errors exceeds max_errors={max_errors}")]
    ErrorLimitExceeded { error_count: u64, max_errors: u64 },

    #[error("restore error: {0}")]
    Restore(String),

    #[error("archive error: {0}")]
    Archive(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("queue overflow: backpressure capacity {capacity} reached")]
    QueueOverflow { capacity: usize },

    #[error(transparent)]
    Core(#[from] marketreplay_core::CoreError),

    #[error(transparent)]
    Io(#[from] marketreplay_io::IoError),
}

impl From<serde_json::Error> for ExecError {
    fn from(e: serde_json::Error) -> Self {
        ExecError::Serialization(e.to_string())
    }
}
