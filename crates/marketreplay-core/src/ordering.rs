//! Ordering Contract & Cursor Codec: total order over `(ts_event, seq)`,
//! progress enforcement, and the exclusive resume cursor.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;

use crate::canonical::{canonical_bytes, parse_canonical, Canonical};
use crate::error::{CoreError, Result};

/// The active ordering tuple. Fixed at `(ts_event, seq)` in v1; kept as a
/// named struct rather than a bare tuple so a tie-break column can be
/// appended later without touching comparison call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OrderingTuple {
    pub ts_event: u64,
    pub seq: u64,
}

impl OrderingTuple {
    pub fn new(ts_event: u64, seq: u64) -> Self {
        Self { ts_event, seq }
    }

    /// -1, 0, +1 lexicographic comparison, matching the contract's
    /// `compare(a, b)` rather than relying on the derived `Ord` directly so
    /// call sites can stay close to the spec wording.
    pub fn compare(&self, other: &OrderingTuple) -> i32 {
        match self.cmp(other) {
            std::cmp::Ordering::Less => -1,
            std::cmp::Ordering::Equal => 0,
            std::cmp::Ordering::Greater => 1,
        }
    }
}

/// An opaque, round-trippable resume point. Binds every OrderingTuple
/// column; represents an *exclusive* position (the next event must be
/// strictly greater).
pub type Cursor = OrderingTuple;

/// `enforce_progress(prev, curr)`. `prev == None` (first call) is always
/// accepted.
pub fn enforce_progress(prev: Option<&OrderingTuple>, curr: &OrderingTuple) -> Result<()> {
    let Some(prev) = prev else {
        return Ok(());
    };
    match curr.compare(prev) {
        0 => Err(CoreError::OrderingViolationDuplicate {
            ts_event: curr.ts_event,
            seq: curr.seq,
        }),
        c if c < 0 => Err(CoreError::OrderingViolationOutOfOrder {
            ts_event: curr.ts_event,
            seq: curr.seq,
            prev_ts_event: prev.ts_event,
            prev_seq: prev.seq,
        }),
        _ => Ok(()),
    }
}

/// Build the exclusive resume predicate for a cursor: the reader should only
/// admit rows where `(ts_event, seq) > cursor` in tuple order. Returned as a
/// small closure-free struct since the constructing party (this codec) is
/// the only one allowed to synthesize cursor filters.
#[derive(Debug, Clone, Copy)]
pub struct ResumePredicate {
    cursor: OrderingTuple,
}

impl ResumePredicate {
    pub fn from_cursor(cursor: OrderingTuple) -> Self {
        Self { cursor }
    }

    /// `(ts_event > V1) OR (ts_event = V1 AND seq > V2)`, evaluated against
    /// values the reader has already widened to u64.
    pub fn admits(&self, ts_event: u64, seq: u64) -> bool {
        (ts_event > self.cursor.ts_event)
            || (ts_event == self.cursor.ts_event && seq > self.cursor.seq)
    }

    pub fn cursor(&self) -> OrderingTuple {
        self.cursor
    }
}

/// Encode a cursor as URL-safe base64 over its canonical-bytes rendering.
pub fn encode_cursor(cursor: &OrderingTuple) -> String {
    let value = Canonical::obj([
        ("ts_event", Canonical::BigInt(cursor.ts_event as u128)),
        ("seq", Canonical::BigInt(cursor.seq as u128)),
    ]);
    URL_SAFE_NO_PAD.encode(canonical_bytes(&value))
}

/// Decode a cursor token, validating that both OrderingTuple columns are
/// present and parse as unsigned integers.
pub fn decode_cursor(token: &str) -> Result<OrderingTuple> {
    let bytes = URL_SAFE_NO_PAD
        .decode(token)
        .map_err(|e| CoreError::Serialization(format!("invalid cursor encoding: {e}")))?;
    let value = parse_canonical(&bytes)?;
    let Canonical::Object(fields) = value else {
        return Err(CoreError::Serialization("cursor is not an object".into()));
    };
    let ts_event = extract_u64(&fields, "ts_event")?;
    let seq = extract_u64(&fields, "seq")?;
    Ok(OrderingTuple::new(ts_event, seq))
}

fn extract_u64(fields: &std::collections::BTreeMap<String, Canonical>, key: &str) -> Result<u64> {
    match fields.get(key) {
        Some(Canonical::BigInt(v)) => u64::try_from(*v)
            .map_err(|_| CoreError::Serialization(format!("cursor field {key} exceeds u64"))),
        Some(Canonical::UInt(v)) => Ok(*v),
        _ => Err(CoreError::Serialization(format!("cursor missing field {key}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_call_with_no_previous_is_always_accepted() {
        assert!(enforce_progress(None, &OrderingTuple::new(1, 0)).is_ok());
    }

    #[test]
    fn equal_tuples_are_duplicates() {
        let t = OrderingTuple::new(5, 2);
        let err = enforce_progress(Some(&t), &t).unwrap_err();
        assert!(matches!(err, CoreError::OrderingViolationDuplicate { .. }));
    }

    #[test]
    fn decreasing_tuple_is_out_of_order() {
        let prev = OrderingTuple::new(5, 2);
        let curr = OrderingTuple::new(5, 1);
        let err = enforce_progress(Some(&prev), &curr).unwrap_err();
        assert!(matches!(err, CoreError::OrderingViolationOutOfOrder { .. }));
    }

    #[test]
    fn resume_predicate_excludes_the_cursor_tuple_itself() {
        let pred = ResumePredicate::from_cursor(OrderingTuple::new(10, 3));
        assert!(!pred.admits(10, 3));
        assert!(pred.admits(10, 4));
        assert!(pred.admits(11, 0));
        assert!(!pred.admits(9, 999));
    }

    #[test]
    fn cursor_round_trips_through_encode_decode() {
        let original = OrderingTuple::new(123456789, 42);
        let token = encode_cursor(&original);
        let decoded = decode_cursor(&token).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn decode_rejects_malformed_token() {
        assert!(decode_cursor("not-base64!!!").is_err());
    }
}
