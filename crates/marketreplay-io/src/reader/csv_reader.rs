//! Default columnar reader: CSV files with a mandatory `ts_event,seq` prefix
//! followed by stream-specific payload columns, standing in for the
//! out-of-scope Parquet/DuckDB library. Multiple sources concatenate under
//! one ordering predicate.

use marketreplay_core::event::Event;
use marketreplay_core::ordering::Cursor;

use super::{filter_rows, ColumnarReader, TsRange};
use crate::error::IoError;
use crate::storage::Storage;
use crate::Result;

#[derive(Debug)]
pub struct CsvReader {
    rows: Vec<Event>,
    offset: usize,
}

impl CsvReader {
    /// Open one or many sources, reading and sorting all rows up front.
    /// Multiple sources behave as a concatenation under the same ordering.
    pub fn open(storage: &dyn Storage, sources: &[String]) -> Result<Self> {
        let mut rows = Vec::new();
        for source in sources {
            let bytes = storage.read_all(source)?;
            rows.extend(parse_csv(source, &bytes)?);
        }
        rows.sort_by_key(|e: &Event| (e.ts_event, e.seq));
        Ok(Self { rows, offset: 0 })
    }
}

fn parse_csv(source: &str, bytes: &[u8]) -> Result<Vec<Event>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(bytes);

    let headers = reader
        .headers()
        .map_err(|e| IoError::Corruption {
            path: source.to_string(),
            message: e.to_string(),
        })?
        .clone();

    let ts_idx = headers
        .iter()
        .position(|h| h == "ts_event")
        .ok_or_else(|| IoError::Schema {
            path: source.to_string(),
            message: "missing required column 'ts_event'".into(),
        })?;
    let seq_idx = headers
        .iter()
        .position(|h| h == "seq")
        .ok_or_else(|| IoError::Schema {
            path: source.to_string(),
            message: "missing required column 'seq'".into(),
        })?;

    let mut out = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| IoError::Corruption {
            path: source.to_string(),
            message: e.to_string(),
        })?;

        let ts_event: u64 = record
            .get(ts_idx)
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| IoError::Corruption {
                path: source.to_string(),
                message: "ts_event is not a valid u64".into(),
            })?;
        let seq: u64 = record
            .get(seq_idx)
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| IoError::Corruption {
                path: source.to_string(),
                message: "seq is not a valid u64".into(),
            })?;

        let mut payload = serde_json::Map::new();
        for (i, header) in headers.iter().enumerate() {
            if i == ts_idx || i == seq_idx {
                continue;
            }
            let raw = record.get(i).unwrap_or("");
            payload.insert(header.to_string(), coerce_value(raw));
        }

        out.push(Event {
            ts_event,
            seq,
            payload: serde_json::Value::Object(payload),
        });
    }
    Ok(out)
}

fn coerce_value(raw: &str) -> serde_json::Value {
    if raw.is_empty() {
        return serde_json::Value::Null;
    }
    if let Ok(i) = raw.parse::<i64>() {
        return serde_json::Value::from(i);
    }
    if let Ok(f) = raw.parse::<f64>() {
        if let Some(n) = serde_json::Number::from_f64(f) {
            return serde_json::Value::Number(n);
        }
    }
    serde_json::Value::String(raw.to_string())
}

impl ColumnarReader for CsvReader {
    fn row_count(&self) -> Result<u64> {
        Ok(self.rows.len() as u64)
    }

    fn filtered_row_count(&self, range: TsRange) -> Result<u64> {
        Ok(self.rows.iter().filter(|e| range.admits(e.ts_event)).count() as u64)
    }

    fn batch(&mut self, limit: usize, cursor: Option<Cursor>, range: TsRange) -> Result<Vec<Event>> {
        if self.offset >= self.rows.len() {
            return Ok(Vec::new());
        }
        let remaining = self.rows[self.offset..].to_vec();
        let filtered = filter_rows(remaining, cursor, range);
        let batch: Vec<Event> = filtered.into_iter().take(limit).collect();

        self.offset = match batch.last() {
            Some(last) => {
                self.rows[self.offset..]
                    .iter()
                    .position(|e| e.ts_event == last.ts_event && e.seq == last.seq)
                    .map(|p| self.offset + p + 1)
                    .unwrap_or(self.rows.len())
            }
            None => self.rows.len(),
        };

        Ok(batch)
    }

    fn close(&mut self) -> Result<()> {
        self.offset = self.rows.len();
        Ok(())
    }
}
