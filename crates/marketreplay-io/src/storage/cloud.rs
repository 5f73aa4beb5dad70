use std::future::Future;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use futures::StreamExt;
use object_store::client::backoff::BackoffConfig;
use object_store::path::Path as ObjectPath;
use object_store::{Error as ObjectStoreError, ObjectStore};
use tokio::runtime::Runtime;
use url::Url;

#[cfg(feature = "s3")]
use object_store::aws::{AmazonS3, AmazonS3Builder};
#[cfg(feature = "azure")]
use object_store::azure::{MicrosoftAzure, MicrosoftAzureBuilder};
#[cfg(feature = "gcs")]
use object_store::gcp::{GoogleCloudStorage, GoogleCloudStorageBuilder};

use super::RetryConfig;
use crate::error::IoError;
use crate::storage::traits::Storage;
use crate::Result;
use marketreplay_core::config::StorageConfig;

#[derive(Debug, thiserror::Error)]
pub enum CloudStorageBuilderError {
    #[error("missing URI for {scheme} storage")]
    MissingUri { scheme: &'static str },

    #[error("unsupported or malformed URI '{uri}': {source}")]
    InvalidUri {
        uri: String,
        #[source]
        source: url::ParseError,
    },

    #[error("URI '{uri}' missing bucket/container component")]
    MissingBucket { uri: String },

    #[error("URI '{uri}' missing container segment")]
    MissingContainer { uri: String },

    #[error("failed to initialize async runtime: {0}")]
    Runtime(String),

    #[error("object_store builder error: {0}")]
    Builder(String),

    #[error("missing remote-storage credential: {0}")]
    MissingCredential(String),
}

impl From<CloudStorageBuilderError> for IoError {
    fn from(err: CloudStorageBuilderError) -> Self {
        match &err {
            CloudStorageBuilderError::MissingCredential(_) => {
                IoError::CredentialError(err.to_string())
            }
            _ => IoError::Config(err.to_string()),
        }
    }
}

type BuilderResult<T> = std::result::Result<T, CloudStorageBuilderError>;

#[derive(Debug, Clone)]
struct CloudIdentity {
    scheme: &'static str,
    account: String,
    bucket: String,
    prefix: String,
    root_uri: String,
}

impl CloudIdentity {
    fn new_s3(uri: &str) -> BuilderResult<Self> {
        let parsed = Url::parse(uri).map_err(|source| CloudStorageBuilderError::InvalidUri {
            uri: uri.to_string(),
            source,
        })?;
        if parsed.scheme() != "s3" {
            return Err(CloudStorageBuilderError::MissingUri { scheme: "s3" });
        }
        let bucket = parsed
            .host_str()
            .ok_or_else(|| CloudStorageBuilderError::MissingBucket {
                uri: uri.to_string(),
            })?
            .to_string();
        let prefix = parsed.path().trim_matches('/').to_string();
        Ok(Self {
            scheme: "s3",
            account: bucket.clone(),
            bucket,
            prefix,
            root_uri: uri.trim_end_matches('/').to_string(),
        })
    }

    fn new_gcs(uri: &str) -> BuilderResult<Self> {
        let parsed = Url::parse(uri).map_err(|source| CloudStorageBuilderError::InvalidUri {
            uri: uri.to_string(),
            source,
        })?;
        let scheme = parsed.scheme();
        if scheme != "gs" && scheme != "gcs" {
            return Err(CloudStorageBuilderError::MissingUri { scheme: "gs" });
        }
        let bucket = parsed
            .host_str()
            .ok_or_else(|| CloudStorageBuilderError::MissingBucket {
                uri: uri.to_string(),
            })?
            .to_string();
        let prefix = parsed.path().trim_matches('/').to_string();
        Ok(Self {
            scheme: if scheme == "gs" { "gs" } else { "gcs" },
            account: bucket.clone(),
            bucket,
            prefix,
            root_uri: uri.trim_end_matches('/').to_string(),
        })
    }

    fn new_azure(uri: &str) -> BuilderResult<Self> {
        let parsed = Url::parse(uri).map_err(|source| CloudStorageBuilderError::InvalidUri {
            uri: uri.to_string(),
            source,
        })?;
        let scheme = parsed.scheme();
        if scheme != "azure" && scheme != "azblob" {
            return Err(CloudStorageBuilderError::MissingUri { scheme: "azure" });
        }
        let account = parsed
            .host_str()
            .ok_or_else(|| CloudStorageBuilderError::MissingBucket {
                uri: uri.to_string(),
            })?
            .to_string();
        let mut segments = parsed.path().trim_matches('/').splitn(2, '/');
        let container = segments
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| CloudStorageBuilderError::MissingContainer {
                uri: uri.to_string(),
            })?
            .to_string();
        let prefix = segments.next().unwrap_or("").trim_matches('/').to_string();
        Ok(Self {
            scheme: if scheme == "azure" { "azure" } else { "azblob" },
            account,
            bucket: container,
            prefix,
            root_uri: uri.trim_end_matches('/').to_string(),
        })
    }

    fn key_from_relative(&self, rel: &str) -> String {
        if self.prefix.is_empty() {
            rel.to_string()
        } else if rel.is_empty() {
            self.prefix.clone()
        } else {
            format!("{}/{}", self.prefix.trim_end_matches('/'), rel)
        }
    }

    fn uri_for_key(&self, key: &str) -> String {
        match self.scheme {
            "azure" | "azblob" => {
                if key.is_empty() {
                    self.root_uri.clone()
                } else {
                    format!(
                        "{}://{}/{}/{}",
                        self.scheme,
                        self.account,
                        self.bucket,
                        key.trim_start_matches('/')
                    )
                }
            }
            _ => {
                if key.is_empty() {
                    self.root_uri.clone()
                } else {
                    format!(
                        "{}://{}/{}",
                        self.scheme,
                        self.bucket,
                        key.trim_start_matches('/')
                    )
                }
            }
        }
    }

    fn relative_from_uri<'a>(&self, path: &'a str) -> Result<&'a str> {
        if path == self.root_uri {
            return Ok("");
        }
        let root = format!("{}/", self.root_uri.trim_end_matches('/'));
        if path.starts_with(&root) {
            Ok(&path[root.len()..])
        } else {
            Err(IoError::Storage(format!(
                "path '{path}' outside configured root '{}'",
                self.root_uri
            )))
        }
    }
}

struct CloudStorage {
    runtime: Runtime,
    store: Arc<dyn ObjectStore>,
    identity: CloudIdentity,
    retry: RetryConfig,
}

impl CloudStorage {
    fn new(store: Arc<dyn ObjectStore>, identity: CloudIdentity, retry: RetryConfig) -> BuilderResult<Self> {
        let runtime =
            Runtime::new().map_err(|e| CloudStorageBuilderError::Runtime(e.to_string()))?;
        Ok(Self {
            runtime,
            store,
            identity,
            retry,
        })
    }

    fn object_path(&self, uri: &str) -> Result<ObjectPath> {
        let rel = self.identity.relative_from_uri(uri)?;
        let key = self.identity.key_from_relative(rel);
        Ok(ObjectPath::from(key))
    }

    fn list_prefix(&self, prefix: &str) -> Result<Option<ObjectPath>> {
        let rel = self.identity.relative_from_uri(prefix)?;
        let key = self.identity.key_from_relative(rel);
        if key.is_empty() {
            Ok(None)
        } else {
            Ok(Some(ObjectPath::from(key)))
        }
    }

    fn run_with_retry<F, Fut, T>(&self, mut op: F, retry_not_found: bool) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = object_store::Result<T>>,
    {
        let mut attempt = 0usize;
        let mut backoff = self.retry.initial_backoff;

        loop {
            let result = self.runtime.block_on(op());
            match result {
                Ok(value) => return Ok(value),
                Err(err) => {
                    let is_not_found = matches!(err, ObjectStoreError::NotFound { .. });
                    if is_not_found && !retry_not_found {
                        return Err(IoError::Storage(format!("{err}")));
                    }
                    if attempt >= self.retry.max_retries || !is_retryable(&err) {
                        return Err(IoError::Storage(format!("{err}")));
                    }
                    attempt += 1;
                    thread::sleep(backoff);
                    backoff = std::cmp::min(backoff * 2, self.retry.max_backoff);
                }
            }
        }
    }
}

fn is_retryable(err: &ObjectStoreError) -> bool {
    match err {
        ObjectStoreError::NotFound { .. } => false,
        ObjectStoreError::AlreadyExists { .. } => false,
        _ => true,
    }
}

impl Storage for CloudStorage {
    fn write(&self, path: &str, bytes: &[u8]) -> Result<()> {
        let obj_path = self.object_path(path)?;
        let data = Bytes::copy_from_slice(bytes);
        self.run_with_retry(
            || {
                let bytes = data.clone();
                let store = Arc::clone(&self.store);
                async move { store.put(&obj_path, bytes).await.map(|_| ()) }
            },
            true,
        )
    }

    fn read_range(&self, path: &str, offset: u64, len: usize) -> Result<Vec<u8>> {
        let obj_path = self.object_path(path)?;
        let range = (offset as usize)..(offset as usize + len);
        self.run_with_retry(
            || {
                let store = Arc::clone(&self.store);
                async move { store.get_range(&obj_path, range.clone()).await }
            },
            false,
        )
        .map(|bytes| bytes.to_vec())
    }

    fn delete(&self, path: &str) -> Result<()> {
        let obj_path = self.object_path(path)?;
        self.run_with_retry(
            || {
                let store = Arc::clone(&self.store);
                async move { store.delete(&obj_path).await }
            },
            true,
        )
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let prefix_path = self.list_prefix(prefix)?;
        let store = Arc::clone(&self.store);
        let identity = self.identity.clone();
        self.runtime.block_on(async move {
            let mut stream = store.list(prefix_path.as_ref());
            let mut out = Vec::new();
            while let Some(item) = stream.next().await {
                let meta = item.map_err(|e| IoError::Storage(format!("{e}")))?;
                out.push(identity.uri_for_key(meta.location.as_ref()));
            }
            Ok(out)
        })
    }

    fn size(&self, path: &str) -> Result<u64> {
        let obj_path = self.object_path(path)?;
        self.run_with_retry(
            || {
                let store = Arc::clone(&self.store);
                async move { store.head(&obj_path).await }
            },
            false,
        )
        .map(|meta| meta.size as u64)
    }

    fn etag(&self, path: &str) -> Result<Option<String>> {
        let obj_path = self.object_path(path)?;
        self.run_with_retry(
            || {
                let store = Arc::clone(&self.store);
                async move { store.head(&obj_path).await }
            },
            false,
        )
        .map(|meta| meta.e_tag)
    }
}

fn retry_config_from(_cfg: &StorageConfig) -> RetryConfig {
    RetryConfig::default()
}

fn object_store_retry(retry: &RetryConfig) -> object_store::RetryConfig {
    object_store::RetryConfig {
        max_retries: retry.max_retries,
        retry_timeout: retry.max_backoff,
        backoff: BackoffConfig {
            init_backoff: retry.initial_backoff,
            max_backoff: retry.max_backoff,
            base: 2.0,
        },
    }
}

#[cfg(feature = "s3")]
pub struct S3Storage {
    inner: CloudStorage,
}

#[cfg(feature = "s3")]
impl S3Storage {
    pub fn new(uri: &str, cfg: &StorageConfig) -> Result<Self> {
        let identity = CloudIdentity::new_s3(uri)?;
        let retry = retry_config_from(cfg);
        let mut builder = AmazonS3Builder::new().with_bucket_name(identity.bucket.clone());
        if let Some(region) = &cfg.region {
            builder = builder.with_region(region.clone());
        }
        if let Some(access_key) = &cfg.key {
            builder = builder.with_access_key_id(access_key.clone());
        } else {
            return Err(CloudStorageBuilderError::MissingCredential("storage key".into()).into());
        }
        if let Some(secret_key) = &cfg.secret {
            builder = builder.with_secret_access_key(secret_key.clone());
        } else {
            return Err(CloudStorageBuilderError::MissingCredential("storage secret".into()).into());
        }
        if let Some(endpoint) = &cfg.endpoint {
            builder = builder.with_endpoint(endpoint.clone());
        }
        builder = builder.with_retry(object_store_retry(&retry));
        let store: AmazonS3 = builder
            .build()
            .map_err(|e| CloudStorageBuilderError::Builder(e.to_string()))?;
        let inner = CloudStorage::new(Arc::new(store), identity, retry)?;
        Ok(Self { inner })
    }
}

#[cfg(feature = "gcs")]
pub struct GcsStorage {
    inner: CloudStorage,
}

#[cfg(feature = "gcs")]
impl GcsStorage {
    pub fn new(uri: &str, cfg: &StorageConfig) -> Result<Self> {
        let identity = CloudIdentity::new_gcs(uri)?;
        let retry = retry_config_from(cfg);
        let mut builder =
            GoogleCloudStorageBuilder::new().with_bucket_name(identity.bucket.clone());
        if let Some(endpoint) = &cfg.endpoint {
            builder = builder.with_service_account_path(endpoint.clone());
        }
        builder = builder.with_retry(object_store_retry(&retry));
        let store: GoogleCloudStorage = builder
            .build()
            .map_err(|e| CloudStorageBuilderError::Builder(e.to_string()))?;
        let inner = CloudStorage::new(Arc::new(store), identity, retry)?;
        Ok(Self { inner })
    }
}

#[cfg(feature = "azure")]
pub struct AzureBlobStorage {
    inner: CloudStorage,
}

#[cfg(feature = "azure")]
impl AzureBlobStorage {
    pub fn new(uri: &str, cfg: &StorageConfig) -> Result<Self> {
        let identity = CloudIdentity::new_azure(uri)?;
        let retry = retry_config_from(cfg);
        let mut builder = MicrosoftAzureBuilder::new()
            .with_account(identity.account.clone())
            .with_container_name(identity.bucket.clone())
            .with_retry(object_store_retry(&retry));
        if let Some(key) = &cfg.secret {
            builder = builder.with_access_key(key.clone());
        } else {
            return Err(CloudStorageBuilderError::MissingCredential("storage secret".into()).into());
        }
        let store: MicrosoftAzure = builder
            .build()
            .map_err(|e| CloudStorageBuilderError::Builder(e.to_string()))?;
        let inner = CloudStorage::new(Arc::new(store), identity, retry)?;
        Ok(Self { inner })
    }
}

#[cfg(feature = "s3")]
impl Storage for S3Storage {
    fn write(&self, path: &str, bytes: &[u8]) -> Result<()> {
        self.inner.write(path, bytes)
    }

    fn read_range(&self, path: &str, offset: u64, len: usize) -> Result<Vec<u8>> {
        self.inner.read_range(path, offset, len)
    }

    fn delete(&self, path: &str) -> Result<()> {
        self.inner.delete(path)
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        self.inner.list(prefix)
    }

    fn size(&self, path: &str) -> Result<u64> {
        self.inner.size(path)
    }

    fn etag(&self, path: &str) -> Result<Option<String>> {
        self.inner.etag(path)
    }
}

#[cfg(feature = "gcs")]
impl Storage for GcsStorage {
    fn write(&self, path: &str, bytes: &[u8]) -> Result<()> {
        self.inner.write(path, bytes)
    }

    fn read_range(&self, path: &str, offset: u64, len: usize) -> Result<Vec<u8>> {
        self.inner.read_range(path, offset, len)
    }

    fn delete(&self, path: &str) -> Result<()> {
        self.inner.delete(path)
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        self.inner.list(prefix)
    }

    fn size(&self, path: &str) -> Result<u64> {
        self.inner.size(path)
    }

    fn etag(&self, path: &str) -> Result<Option<String>> {
        self.inner.etag(path)
    }
}

#[cfg(feature = "azure")]
impl Storage for AzureBlobStorage {
    fn write(&self, path: &str, bytes: &[u8]) -> Result<()> {
        self.inner.write(path, bytes)
    }

    fn read_range(&self, path: &str, offset: u64, len: usize) -> Result<Vec<u8>> {
        self.inner.read_range(path, offset, len)
    }

    fn delete(&self, path: &str) -> Result<()> {
        self.inner.delete(path)
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        self.inner.list(prefix)
    }

    fn size(&self, path: &str) -> Result<u64> {
        self.inner.size(path)
    }

    fn etag(&self, path: &str) -> Result<Option<String>> {
        self.inner.etag(path)
    }
}
