//! Engine configuration, built from environment variables with CLI
//! overrides layered on top at the binary boundary.

use serde::{Deserialize, Serialize};

use crate::canonical::Canonical;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ErrorPolicy {
    FailFast,
    SkipAndLog,
    Quarantine,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderingMode {
    Strict,
    Warn,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Cooperative yield cadence, in events processed.
    pub yield_every: u64,

    /// Backpressure hysteresis thresholds and hard queue capacity.
    pub backpressure_high: usize,
    pub backpressure_low: usize,
    pub max_queue_capacity: usize,

    /// Whether the Run Archive Writer is active on finalize.
    pub archive_enabled: bool,

    /// Events between checkpoint saves. Zero disables periodic checkpoints.
    pub checkpoint_interval: u64,

    /// Maximum contained errors tolerated before `ErrorLimitExceeded`.
    pub max_errors: u64,

    pub error_policy: ErrorPolicy,
    pub ordering_mode: OrderingMode,

    /// Object-storage settings, required only when a source URI is remote.
    pub storage_endpoint: Option<String>,
    pub storage_key: Option<String>,
    pub storage_secret: Option<String>,
    pub storage_region: Option<String>,
    pub storage_bucket: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            yield_every: 1_000,
            backpressure_high: 8_000,
            backpressure_low: 2_000,
            max_queue_capacity: 10_000,
            archive_enabled: true,
            checkpoint_interval: 10_000,
            max_errors: 100,
            error_policy: ErrorPolicy::FailFast,
            ordering_mode: OrderingMode::Strict,
            storage_endpoint: None,
            storage_key: None,
            storage_secret: None,
            storage_region: None,
            storage_bucket: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub endpoint: Option<String>,
    pub key: Option<String>,
    pub secret: Option<String>,
    pub region: Option<String>,
    pub bucket: Option<String>,
}

impl EngineConfig {
    /// Build a config from environment variables, falling back to defaults.
    /// Unknown keys are ignored; every key here has a documented default.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(s) = std::env::var("YIELD_EVERY") {
            if let Ok(v) = s.parse() {
                cfg.yield_every = v;
            }
        }
        if let Ok(s) = std::env::var("BACKPRESSURE_HIGH") {
            if let Ok(v) = s.parse() {
                cfg.backpressure_high = v;
            }
        }
        if let Ok(s) = std::env::var("BACKPRESSURE_LOW") {
            if let Ok(v) = s.parse() {
                cfg.backpressure_low = v;
            }
        }
        if let Ok(s) = std::env::var("MAX_QUEUE_CAPACITY") {
            if let Ok(v) = s.parse() {
                cfg.max_queue_capacity = v;
            }
        }
        if let Ok(s) = std::env::var("ARCHIVE_ENABLED") {
            cfg.archive_enabled = matches!(s.as_str(), "1" | "true" | "TRUE" | "yes");
        }
        if let Ok(s) = std::env::var("CHECKPOINT_INTERVAL") {
            if let Ok(v) = s.parse() {
                cfg.checkpoint_interval = v;
            }
        }
        if let Ok(s) = std::env::var("MARKETREPLAY_STORAGE_ENDPOINT") {
            cfg.storage_endpoint = Some(s);
        }
        if let Ok(s) = std::env::var("MARKETREPLAY_STORAGE_KEY") {
            cfg.storage_key = Some(s);
        }
        if let Ok(s) = std::env::var("MARKETREPLAY_STORAGE_SECRET") {
            cfg.storage_secret = Some(s);
        }
        if let Ok(s) = std::env::var("MARKETREPLAY_STORAGE_REGION") {
            cfg.storage_region = Some(s);
        }
        if let Ok(s) = std::env::var("MARKETREPLAY_STORAGE_BUCKET") {
            cfg.storage_bucket = Some(s);
        }

        cfg
    }

    pub fn storage_config(&self) -> StorageConfig {
        StorageConfig {
            endpoint: self.storage_endpoint.clone(),
            key: self.storage_key.clone(),
            secret: self.storage_secret.clone(),
            region: self.storage_region.clone(),
            bucket: self.storage_bucket.clone(),
        }
    }

    /// Canonical rendering used to compute the Run Manifest's `config_hash`.
    pub fn to_canonical(&self) -> Canonical {
        Canonical::obj([
            ("yield_every", Canonical::UInt(self.yield_every)),
            ("backpressure_high", Canonical::UInt(self.backpressure_high as u64)),
            ("backpressure_low", Canonical::UInt(self.backpressure_low as u64)),
            ("max_queue_capacity", Canonical::UInt(self.max_queue_capacity as u64)),
            ("archive_enabled", Canonical::Bool(self.archive_enabled)),
            ("checkpoint_interval", Canonical::UInt(self.checkpoint_interval)),
            ("max_errors", Canonical::UInt(self.max_errors)),
            ("error_policy", Canonical::Str(format!("{:?}", self.error_policy))),
            ("ordering_mode", Canonical::Str(format!("{:?}", self.ordering_mode))),
            ("storage_endpoint", opt_str(&self.storage_endpoint)),
            ("storage_key", opt_str(&self.storage_key)),
            ("storage_secret", opt_str(&self.storage_secret)),
            ("storage_region", opt_str(&self.storage_region)),
            ("storage_bucket", opt_str(&self.storage_bucket)),
        ])
    }
}

fn opt_str(v: &Option<String>) -> Canonical {
    match v {
        Some(s) => Canonical::Str(s.clone()),
        None => Canonical::Null,
    }
}
