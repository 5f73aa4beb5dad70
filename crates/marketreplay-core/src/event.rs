//! The event, fill, and decision record data model shared by the Replay
//! Engine and the Strategy Runtime.

use serde::{Deserialize, Serialize};

use crate::canonical::Canonical;
use crate::ordering::OrderingTuple;

/// A single record from the columnar source. `ts_event`/`seq` are always
/// present and unique within a dataset; `payload` carries the
/// stream-specific fields (e.g. top-of-book bid/ask price and size) as an
/// opaque JSON object the runtime passes through to the strategy untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub ts_event: u64,
    pub seq: u64,
    pub payload: serde_json::Value,
}

impl Event {
    pub fn ordering_tuple(&self) -> OrderingTuple {
        OrderingTuple::new(self.ts_event, self.seq)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

/// A materialized order intent. Fills are appended in arrival order and
/// never reordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub id: String,
    pub side: Side,
    pub fill_price: f64,
    pub qty: f64,
    pub ts_event: u64,
}

impl Fill {
    /// Normalize to `{id, side, price, qty, ts}` for `fills_hash`, per the
    /// hashing contract's fill-normalization rule.
    pub fn normalize(&self) -> Canonical {
        let side = match self.side {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        };
        Canonical::obj([
            ("id", Canonical::Str(self.id.clone())),
            ("side", Canonical::Str(side.to_string())),
            ("price", Canonical::Float(self.fill_price)),
            ("qty", Canonical::Float(self.qty)),
            ("ts", Canonical::Str(self.ts_event.to_string())),
        ])
    }
}

/// Emitted on each accepted order intent; appended to an ordered log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub replay_run_id: String,
    pub cursor: String,
    pub ts_event: u64,
    pub decision: serde_json::Value,
}

impl DecisionRecord {
    pub fn to_canonical(&self) -> Canonical {
        Canonical::obj([
            ("replay_run_id", Canonical::Str(self.replay_run_id.clone())),
            ("cursor", Canonical::Str(self.cursor.clone())),
            ("ts_event", Canonical::BigInt(self.ts_event as u128)),
            (
                "decision",
                crate::canonical::json_to_canonical(&self.decision),
            ),
        ])
    }
}
