//! Strongly-typed identifiers. Every identifier here is a pure function of
//! hashed inputs or a local monotonic counter — no randomness, since any ID
//! that can end up in a hashed or replay-relevant path must be reproducible
//! across machines.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::hash::{hash_bytes, Hash256};

macro_rules! new_counter_id {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Ord, PartialOrd,
        )]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            pub const fn new(v: u64) -> Self {
                Self(v)
            }
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    };
}

/// Monotonic, per-run decision sequence number. Never persisted across runs.
new_counter_id!(DecisionId);

macro_rules! new_hash_id {
    ($name:ident, $prefix:expr, $len:expr) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Derive the id from the hex digest of `hash`, truncated to the
            /// fixed width and prefixed with the id's tag.
            pub fn from_hash(hash: &Hash256) -> Self {
                let hex = hash.to_hex();
                Self(format!("{}{}", $prefix, &hex[..$len]))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

/// `run_id = "run_" + first 16 hex chars of SHA-256(canonical({dataset, strategy_config, seed}))`.
new_hash_id!(RunId, "run_", 16);

/// Identifies one invocation of the Replay Engine within a run.
new_hash_id!(ReplayRunId, "replay_", 16);

/// `manifest_id = first 12 hex chars of SHA-256(raw_bytes)`. No prefix — the
/// spec defines this one as the bare hex slice.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(transparent)]
pub struct ManifestId(String);

impl ManifestId {
    pub fn from_raw_bytes(raw: &[u8]) -> Self {
        let hash = hash_bytes(raw);
        Self(hash.to_hex()[..12].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ManifestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_id_is_first_12_hex_chars_of_sha256() {
        let id = ManifestId::from_raw_bytes(b"hello");
        assert_eq!(id.as_str().len(), 12);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn run_id_is_deterministic_for_equal_hash() {
        let h = hash_bytes(b"same input");
        assert_eq!(RunId::from_hash(&h), RunId::from_hash(&h));
    }
}
