//! Bounded TTL+LRU cache for dataset manifests, file lists, and data pages.
//! An accelerator only: every operation it speeds up must still be correct
//! when every segment is empty. Hand-rolled insertion-order eviction in the
//! style of the teacher's pool accounting, not an external LRU crate.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};

use marketreplay_core::id::ManifestId;
use marketreplay_core::manifest::{merge, parse_and_validate, DatasetManifest};

use crate::error::IoError;
use crate::storage::Storage;
use crate::Result;

struct Entry<V> {
    value: V,
    manifest_id: String,
    inserted_at: Instant,
    ttl: Duration,
}

impl<V> Entry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.inserted_at) > self.ttl
    }
}

/// One bounded segment: capacity-limited, TTL-expiring, insertion-order
/// eviction on overflow (oldest key evicted first, expired or not).
struct Segment<V> {
    capacity: usize,
    ttl: Duration,
    order: Vec<String>,
    entries: HashMap<String, Entry<V>>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl<V> Segment<V> {
    fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            capacity,
            ttl,
            order: Vec::new(),
            entries: HashMap::new(),
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    fn get(&mut self, key: &str) -> Option<&V> {
        let now = Instant::now();
        let expired = self
            .entries
            .get(key)
            .map(|e| e.is_expired(now))
            .unwrap_or(false);
        if expired {
            self.remove(key);
        }
        match self.entries.get(key) {
            Some(entry) => {
                self.hits += 1;
                Some(&entry.value)
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    fn insert(&mut self, key: String, value: V, manifest_id: String) {
        if !self.entries.contains_key(&key) {
            self.order.push(key.clone());
        }
        self.entries.insert(
            key,
            Entry {
                value,
                manifest_id,
                inserted_at: Instant::now(),
                ttl: self.ttl,
            },
        );
        while self.entries.len() > self.capacity {
            if self.order.is_empty() {
                break;
            }
            let oldest = self.order.remove(0);
            if self.entries.remove(&oldest).is_some() {
                self.evictions += 1;
            }
        }
    }

    fn remove(&mut self, key: &str) {
        if self.entries.remove(key).is_some() {
            self.order.retain(|k| k != key);
        }
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}

/// Observability counters for one segment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// Three process-wide segments with distinct capacity and TTL: manifests
/// (larger, minutes), file lists (medium), data pages (small, seconds).
pub struct ManifestCache {
    manifests: Segment<DatasetManifest>,
    file_lists: Segment<Vec<String>>,
    data_pages: Segment<Vec<u8>>,
    path_hashes: HashMap<String, String>,
}

impl ManifestCache {
    pub fn new() -> Self {
        Self {
            manifests: Segment::new(512, Duration::from_secs(300)),
            file_lists: Segment::new(256, Duration::from_secs(60)),
            data_pages: Segment::new(128, Duration::from_secs(10)),
            path_hashes: HashMap::new(),
        }
    }

    pub fn manifest_stats(&self) -> CacheStats {
        CacheStats {
            hits: self.manifests.hits,
            misses: self.manifests.misses,
            evictions: self.manifests.evictions,
        }
    }

    pub fn file_list_stats(&self) -> CacheStats {
        CacheStats {
            hits: self.file_lists.hits,
            misses: self.file_lists.misses,
            evictions: self.file_lists.evictions,
        }
    }

    pub fn data_page_stats(&self) -> CacheStats {
        CacheStats {
            hits: self.data_pages.hits,
            misses: self.data_pages.misses,
            evictions: self.data_pages.evictions,
        }
    }

    pub fn put_file_list(&mut self, prefix: &str, manifest_id: &str, files: Vec<String>) {
        self.file_lists
            .insert(prefix.to_string(), files, manifest_id.to_string());
    }

    pub fn get_file_list(&mut self, prefix: &str) -> Option<Vec<String>> {
        self.file_lists.get(prefix).cloned()
    }

    pub fn put_data_page(&mut self, key: &str, manifest_id: &str, bytes: Vec<u8>) {
        self.data_pages
            .insert(key.to_string(), bytes, manifest_id.to_string());
    }

    pub fn get_data_page(&mut self, key: &str) -> Option<Vec<u8>> {
        self.data_pages.get(key).cloned()
    }

    /// `load(path, identity)`: read raw bytes, validate, compute
    /// `manifest_id`, store under both a path-hash key and the full identity
    /// key. On a path-hash collision where the manifest id differs from what
    /// is already cached, invalidate every segment (the underlying bytes
    /// changed out from under the cache).
    pub fn load(
        &mut self,
        storage: &dyn Storage,
        path: &str,
        identity: &str,
        active_ordering_columns: &[String],
    ) -> Result<DatasetManifest> {
        let path_key = path_hash(path);
        let raw = storage.read_all(path)?;
        let manifest_id = ManifestId::from_raw_bytes(&raw).as_str().to_string();

        if let Some(prev_id) = self.path_hashes.get(&path_key) {
            if prev_id != &manifest_id {
                self.invalidate_all();
            }
        }

        let columns: Vec<&str> = active_ordering_columns.iter().map(String::as_str).collect();
        let manifest = parse_and_validate(&raw, &columns).map_err(IoError::from)?;

        self.path_hashes.insert(path_key.clone(), manifest_id.clone());
        self.manifests
            .insert(path_key, manifest.clone(), manifest_id.clone());

        let identity_key = format!(
            "meta:{}:{}:{}",
            identity,
            manifest.schema_version,
            manifest_id
        );
        self.manifests
            .insert(identity_key, manifest.clone(), manifest_id);

        Ok(manifest)
    }

    /// Load every path, enforce cross-manifest consistency, and return the
    /// merged manifest. Caches each constituent manifest along the way.
    pub fn load_many(
        &mut self,
        storage: &dyn Storage,
        paths: &[String],
        identity: &str,
        active_ordering_columns: &[String],
    ) -> Result<DatasetManifest> {
        let mut loaded = Vec::with_capacity(paths.len());
        for path in paths {
            loaded.push(self.load(storage, path, identity, active_ordering_columns)?);
        }
        merge(&loaded).map_err(IoError::from)
    }

    fn invalidate_all(&mut self) {
        self.manifests.clear();
        self.file_lists.clear();
        self.data_pages.clear();
        self.path_hashes.clear();
    }
}

impl Default for ManifestCache {
    fn default() -> Self {
        Self::new()
    }
}

fn path_hash(path: &str) -> String {
    let mut h = Sha256::new();
    h.update(path.as_bytes());
    h.finalize().iter().map(|b| format!("{b:02x}")).collect()
}
