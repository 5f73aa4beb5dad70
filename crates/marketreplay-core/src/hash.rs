//! Determinism hashing: `hash(value) = SHA-256(canonical_bytes(value))`.

use sha2::{Digest, Sha256};

use crate::canonical::{canonical_bytes, Canonical};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    pub fn to_hex(&self) -> String {
        let mut s = String::with_capacity(64);
        for b in &self.0 {
            use std::fmt::Write as _;
            let _ = write!(&mut s, "{:02x}", b);
        }
        s
    }
}

impl std::fmt::Display for Hash256 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

pub fn hash_bytes(bytes: &[u8]) -> Hash256 {
    let mut h = Sha256::new();
    h.update(bytes);
    Hash256(h.finalize().into())
}

pub fn hash_str(s: &str) -> Hash256 {
    hash_bytes(s.as_bytes())
}

/// Hash a canonical value: `SHA-256(canonical_bytes(value))`.
pub fn hash_canonical(value: &Canonical) -> Hash256 {
    hash_bytes(&canonical_bytes(value))
}

/// `state_hash({cursor, execution_state, strategy_state})`.
pub fn state_hash(cursor: &Canonical, execution_state: &Canonical, strategy_state: &Canonical) -> Hash256 {
    let v = Canonical::obj([
        ("cursor", cursor.clone()),
        ("execution_state", execution_state.clone()),
        ("strategy_state", strategy_state.clone()),
    ]);
    hash_canonical(&v)
}

/// `fills_hash(normalized_fills)` over an already-ordered list of fills,
/// each pre-normalized to `{id, side, price, qty, ts}` by the caller.
pub fn fills_hash(normalized_fills: &[Canonical]) -> Hash256 {
    hash_canonical(&Canonical::Array(normalized_fills.to_vec()))
}

/// `decision_hash` over the full ordered decision log.
pub fn decision_hash(decisions: &[Canonical]) -> Hash256 {
    hash_canonical(&Canonical::Array(decisions.to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_stable_for_equal_canonical_values() {
        let a = Canonical::obj([("x", Canonical::UInt(1))]);
        let b = Canonical::obj([("x", Canonical::UInt(1))]);
        assert_eq!(hash_canonical(&a), hash_canonical(&b));
    }

    #[test]
    fn hash_differs_on_key_order_insensitive_but_value_sensitive_change() {
        let a = Canonical::obj([("x", Canonical::UInt(1)), ("y", Canonical::UInt(2))]);
        let b = Canonical::obj([("y", Canonical::UInt(2)), ("x", Canonical::UInt(1))]);
        assert_eq!(hash_canonical(&a), hash_canonical(&b));
    }

    #[test]
    fn to_hex_is_64_lowercase_hex_chars() {
        let h = hash_str("abc");
        assert_eq!(h.to_hex().len(), 64);
        assert!(h.to_hex().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}
