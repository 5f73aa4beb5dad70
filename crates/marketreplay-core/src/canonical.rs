//! Order-stable canonical byte rendering: `canonical_bytes(value)`.
//!
//! Rules: object keys sorted, absent fields omitted, explicit nulls kept,
//! sequences keep insertion order, extended-precision integers render as a
//! decimal string with an `n` suffix (BigInt literal notation), floats
//! render via `f64::to_string` (already shortest-round-trip) with a
//! trailing `.0` forced onto whole numbers so floats and ints never collide
//! in the byte stream.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::error::{CoreError, Result};

/// A canonical value. `BigInt` is the extended-precision integer case (up to
/// u128) used for `ts_event`, `seq`, and any other wide unsigned column;
/// plain `UInt`/`Int` cover ordinary JSON-range numbers.
#[derive(Debug, Clone, PartialEq)]
pub enum Canonical {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    BigInt(u128),
    Float(f64),
    Str(String),
    Array(Vec<Canonical>),
    Object(BTreeMap<String, Canonical>),
}

impl Canonical {
    pub fn obj(fields: impl IntoIterator<Item = (&'static str, Canonical)>) -> Canonical {
        Canonical::Object(fields.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }
}

/// Render `value` to its canonical UTF-8 byte form.
pub fn canonical_bytes(value: &Canonical) -> Vec<u8> {
    let mut out = String::new();
    write_value(value, &mut out);
    out.into_bytes()
}

fn write_value(value: &Canonical, out: &mut String) {
    match value {
        Canonical::Null => out.push_str("null"),
        Canonical::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Canonical::Int(i) => {
            let _ = write!(out, "{i}");
        }
        Canonical::UInt(u) => {
            let _ = write!(out, "{u}");
        }
        Canonical::BigInt(v) => {
            let _ = write!(out, "{v}n");
        }
        Canonical::Float(f) => out.push_str(&render_float(*f)),
        Canonical::Str(s) => write_string(s, out),
        Canonical::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(item, out);
            }
            out.push(']');
        }
        Canonical::Object(fields) => {
            out.push('{');
            // BTreeMap already iterates in sorted key order.
            for (i, (k, v)) in fields.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(k, out);
                out.push(':');
                write_value(v, out);
            }
            out.push('}');
        }
    }
}

fn write_string(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

fn render_float(f: f64) -> String {
    if f.is_nan() || f.is_infinite() {
        // Not representable in the canonical grammar; callers must not feed
        // these through the hasher (no strategy value is allowed to be NaN).
        return "null".to_string();
    }
    let mut s = f.to_string();
    if !s.contains('.') && !s.contains('e') && !s.contains('E') {
        s.push_str(".0");
    }
    s
}

/// Parse canonical bytes back into a `Canonical`. This is the inverse of
/// [`canonical_bytes`]; it is a small hand-rolled recursive-descent parser
/// because the BigInt `n` suffix is not valid JSON.
pub fn parse_canonical(bytes: &[u8]) -> Result<Canonical> {
    let s = std::str::from_utf8(bytes)
        .map_err(|e| CoreError::Serialization(format!("invalid utf8: {e}")))?;
    let mut p = Parser { s: s.as_bytes(), pos: 0 };
    let v = p.parse_value()?;
    p.skip_ws();
    if p.pos != p.s.len() {
        return Err(CoreError::Serialization("trailing bytes after value".into()));
    }
    Ok(v)
}

struct Parser<'a> {
    s: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn skip_ws(&mut self) {
        while self.pos < self.s.len() && self.s[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<u8> {
        self.s.get(self.pos).copied()
    }

    fn expect(&mut self, b: u8) -> Result<()> {
        if self.peek() == Some(b) {
            self.pos += 1;
            Ok(())
        } else {
            Err(CoreError::Serialization(format!(
                "expected '{}' at byte {}",
                b as char, self.pos
            )))
        }
    }

    fn parse_value(&mut self) -> Result<Canonical> {
        self.skip_ws();
        match self.peek() {
            Some(b'"') => self.parse_string().map(Canonical::Str),
            Some(b'{') => self.parse_object(),
            Some(b'[') => self.parse_array(),
            Some(b't') => {
                self.expect_literal("true")?;
                Ok(Canonical::Bool(true))
            }
            Some(b'f') => {
                self.expect_literal("false")?;
                Ok(Canonical::Bool(false))
            }
            Some(b'n') => {
                self.expect_literal("null")?;
                Ok(Canonical::Null)
            }
            Some(c) if c == b'-' || c.is_ascii_digit() => self.parse_number(),
            _ => Err(CoreError::Serialization(format!(
                "unexpected byte at {}",
                self.pos
            ))),
        }
    }

    fn expect_literal(&mut self, lit: &str) -> Result<()> {
        let end = self.pos + lit.len();
        if end <= self.s.len() && &self.s[self.pos..end] == lit.as_bytes() {
            self.pos = end;
            Ok(())
        } else {
            Err(CoreError::Serialization(format!("expected literal {lit}")))
        }
    }

    fn parse_string(&mut self) -> Result<String> {
        self.expect(b'"')?;
        let mut out = String::new();
        loop {
            match self.peek() {
                None => return Err(CoreError::Serialization("unterminated string".into())),
                Some(b'"') => {
                    self.pos += 1;
                    return Ok(out);
                }
                Some(b'\\') => {
                    self.pos += 1;
                    match self.peek() {
                        Some(b'"') => {
                            out.push('"');
                            self.pos += 1;
                        }
                        Some(b'\\') => {
                            out.push('\\');
                            self.pos += 1;
                        }
                        Some(b'n') => {
                            out.push('\n');
                            self.pos += 1;
                        }
                        Some(b'r') => {
                            out.push('\r');
                            self.pos += 1;
                        }
                        Some(b't') => {
                            out.push('\t');
                            self.pos += 1;
                        }
                        Some(b'u') => {
                            self.pos += 1;
                            let hex = std::str::from_utf8(
                                self.s.get(self.pos..self.pos + 4).ok_or_else(|| {
                                    CoreError::Serialization("truncated \\u escape".into())
                                })?,
                            )
                            .map_err(|_| CoreError::Serialization("bad \\u escape".into()))?;
                            let cp = u32::from_str_radix(hex, 16)
                                .map_err(|_| CoreError::Serialization("bad \\u escape".into()))?;
                            out.push(
                                char::from_u32(cp)
                                    .ok_or_else(|| CoreError::Serialization("bad codepoint".into()))?,
                            );
                            self.pos += 4;
                        }
                        _ => return Err(CoreError::Serialization("bad escape".into())),
                    }
                }
                Some(_) => {
                    // Safe: we only ever advance by the byte length of one char.
                    let rest = std::str::from_utf8(&self.s[self.pos..])
                        .map_err(|e| CoreError::Serialization(format!("invalid utf8: {e}")))?;
                    let c = rest.chars().next().unwrap();
                    out.push(c);
                    self.pos += c.len_utf8();
                }
            }
        }
    }

    fn parse_number(&mut self) -> Result<Canonical> {
        let start = self.pos;
        if self.peek() == Some(b'-') {
            self.pos += 1;
        }
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.pos += 1;
        }
        let mut is_float = false;
        if self.peek() == Some(b'.') {
            is_float = true;
            self.pos += 1;
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        if matches!(self.peek(), Some(b'e') | Some(b'E')) {
            is_float = true;
            self.pos += 1;
            if matches!(self.peek(), Some(b'+') | Some(b'-')) {
                self.pos += 1;
            }
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        let is_bigint = self.peek() == Some(b'n');
        let text = std::str::from_utf8(&self.s[start..self.pos]).unwrap();
        if is_bigint {
            self.pos += 1;
            let v: u128 = text
                .parse()
                .map_err(|_| CoreError::Serialization(format!("invalid bigint literal {text}")))?;
            return Ok(Canonical::BigInt(v));
        }
        if is_float {
            let v: f64 = text
                .parse()
                .map_err(|_| CoreError::Serialization(format!("invalid float literal {text}")))?;
            return Ok(Canonical::Float(v));
        }
        if let Ok(v) = text.parse::<u64>() {
            return Ok(Canonical::UInt(v));
        }
        let v: i64 = text
            .parse()
            .map_err(|_| CoreError::Serialization(format!("invalid integer literal {text}")))?;
        Ok(Canonical::Int(v))
    }

    fn parse_array(&mut self) -> Result<Canonical> {
        self.expect(b'[')?;
        let mut items = Vec::new();
        self.skip_ws();
        if self.peek() == Some(b']') {
            self.pos += 1;
            return Ok(Canonical::Array(items));
        }
        loop {
            items.push(self.parse_value()?);
            self.skip_ws();
            match self.peek() {
                Some(b',') => {
                    self.pos += 1;
                }
                Some(b']') => {
                    self.pos += 1;
                    break;
                }
                _ => return Err(CoreError::Serialization("expected ',' or ']'".into())),
            }
        }
        Ok(Canonical::Array(items))
    }

    fn parse_object(&mut self) -> Result<Canonical> {
        self.expect(b'{')?;
        let mut fields = BTreeMap::new();
        self.skip_ws();
        if self.peek() == Some(b'}') {
            self.pos += 1;
            return Ok(Canonical::Object(fields));
        }
        loop {
            self.skip_ws();
            let key = self.parse_string()?;
            self.skip_ws();
            self.expect(b':')?;
            let value = self.parse_value()?;
            fields.insert(key, value);
            self.skip_ws();
            match self.peek() {
                Some(b',') => {
                    self.pos += 1;
                }
                Some(b'}') => {
                    self.pos += 1;
                    break;
                }
                _ => return Err(CoreError::Serialization("expected ',' or '}'".into())),
            }
        }
        Ok(Canonical::Object(fields))
    }
}

/// Convert an arbitrary `serde_json::Value` into `Canonical`, used for the
/// opaque strategy/execution state values the runtime never interprets.
/// Plain JSON numbers have no BigInt suffix, so integers land in `Int`/`UInt`
/// and fractional numbers in `Float`; callers that need a wide integer
/// (`ts_event`, `seq`) must construct `Canonical::BigInt` explicitly rather
/// than going through this path.
pub fn json_to_canonical(value: &serde_json::Value) -> Canonical {
    match value {
        serde_json::Value::Null => Canonical::Null,
        serde_json::Value::Bool(b) => Canonical::Bool(*b),
        serde_json::Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                Canonical::UInt(u)
            } else if let Some(i) = n.as_i64() {
                Canonical::Int(i)
            } else {
                Canonical::Float(n.as_f64().unwrap_or(0.0))
            }
        }
        serde_json::Value::String(s) => Canonical::Str(s.clone()),
        serde_json::Value::Array(items) => {
            Canonical::Array(items.iter().map(json_to_canonical).collect())
        }
        serde_json::Value::Object(map) => Canonical::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), json_to_canonical(v)))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_keys_are_sorted_regardless_of_insertion_order() {
        let v = Canonical::obj([("b", Canonical::UInt(1)), ("a", Canonical::UInt(2))]);
        assert_eq!(canonical_bytes(&v), br#"{"a":2,"b":1}"#);
    }

    #[test]
    fn bigint_renders_with_suffix_and_round_trips() {
        let v = Canonical::BigInt(18_446_744_073_709_551_999);
        let bytes = canonical_bytes(&v);
        assert_eq!(bytes, b"18446744073709551999n");
        assert_eq!(parse_canonical(&bytes).unwrap(), v);
    }

    #[test]
    fn round_trip_is_stable_for_nested_structures() {
        let v = Canonical::obj([
            (
                "events",
                Canonical::Array(vec![
                    Canonical::obj([("ts_event", Canonical::BigInt(1)), ("seq", Canonical::BigInt(0))]),
                    Canonical::obj([("ts_event", Canonical::BigInt(2)), ("seq", Canonical::BigInt(0))]),
                ]),
            ),
            ("note", Canonical::Str("hello \"world\"".into())),
            ("missing", Canonical::Null),
        ]);
        let bytes = canonical_bytes(&v);
        let parsed = parse_canonical(&bytes).unwrap();
        assert_eq!(canonical_bytes(&parsed), bytes);
    }

    #[test]
    fn float_renders_shortest_form_with_trailing_dot_zero() {
        assert_eq!(render_float(1.0), "1.0");
        assert_eq!(render_float(1.5), "1.5");
    }

    #[test]
    fn json_conversion_leaves_wide_ts_event_as_plain_uint() {
        let j: serde_json::Value = serde_json::json!({"a": 1, "b": [1,2,3]});
        let c = json_to_canonical(&j);
        match c {
            Canonical::Object(ref m) => assert!(matches!(m.get("a"), Some(Canonical::UInt(1)))),
            _ => panic!("expected object"),
        }
    }
}
