//! Storage adapters behind the [`traits::Storage`] trait.
//!
//! - `fs`: local filesystem (default), atomic write-then-rename.
//! - `cloud`: S3/GCS/Azure via `object_store`, feature-gated one backend per
//!   flag so a build with none of `s3`/`gcs`/`azure` pulls in no async
//!   runtime at all.

pub mod traits;
pub use traits::Storage;

mod fs;
pub use fs::FsStorage;

#[cfg(any(feature = "s3", feature = "gcs", feature = "azure"))]
mod cloud;
#[cfg(any(feature = "s3", feature = "gcs", feature = "azure"))]
pub use cloud::{AzureBlobStorage, CloudStorageBuilderError, GcsStorage, S3Storage};

use std::time::Duration;

use crate::error::IoError;
use crate::Result;
use marketreplay_core::config::StorageConfig;

/// Retry/backoff configuration shared across cloud adapters.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: usize,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(5),
        }
    }
}

/// Build the storage backend matching a URI's scheme. `None` or `file`
/// resolves to the local adapter; missing feature flags fail loudly rather
/// than silently falling back.
pub fn build_storage_for_uri(uri: Option<&str>, cfg: &StorageConfig) -> Result<Box<dyn Storage>> {
    let scheme = uri.and_then(|u| u.split_once("://")).map(|(scheme, _)| scheme);

    match scheme {
        Some("s3") => {
            #[cfg(feature = "s3")]
            {
                Ok(Box::new(S3Storage::new(uri.unwrap(), cfg)?))
            }
            #[cfg(not(feature = "s3"))]
            {
                Err(IoError::Config(
                    "built without the `s3` feature; rebuild with --features marketreplay-io/s3"
                        .into(),
                ))
            }
        }
        Some("gs") | Some("gcs") => {
            #[cfg(feature = "gcs")]
            {
                Ok(Box::new(GcsStorage::new(uri.unwrap(), cfg)?))
            }
            #[cfg(not(feature = "gcs"))]
            {
                Err(IoError::Config(
                    "built without the `gcs` feature; rebuild with --features marketreplay-io/gcs"
                        .into(),
                ))
            }
        }
        Some("azure") | Some("azblob") => {
            #[cfg(feature = "azure")]
            {
                Ok(Box::new(AzureBlobStorage::new(uri.unwrap(), cfg)?))
            }
            #[cfg(not(feature = "azure"))]
            {
                Err(IoError::Config(
                    "built without the `azure` feature; rebuild with --features marketreplay-io/azure"
                        .into(),
                ))
            }
        }
        Some("file") | None => Ok(Box::new(FsStorage::new())),
        Some(other) => Err(IoError::Config(format!("unsupported storage scheme '{other}'"))),
    }
}
