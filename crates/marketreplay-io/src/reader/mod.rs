//! Columnar reader adapter. `csv` is the default, working backend; `parquet`
//! is a feature-gated placeholder following the same pattern the rest of the
//! ecosystem uses for a library that is deliberately out of scope here.

mod csv_reader;
#[cfg(feature = "parquet")]
pub mod parquet;

pub use csv_reader::CsvReader;

use marketreplay_core::event::Event;
use marketreplay_core::ordering::{Cursor, ResumePredicate};

use crate::Result;

/// Inclusive/exclusive timestamp bound used to stop a scan early.
#[derive(Debug, Clone, Copy, Default)]
pub struct TsRange {
    pub start_ts: Option<u64>,
    pub end_ts: Option<u64>,
}

impl TsRange {
    pub fn admits(&self, ts_event: u64) -> bool {
        if let Some(start) = self.start_ts {
            if ts_event < start {
                return false;
            }
        }
        if let Some(end) = self.end_ts {
            if ts_event > end {
                return false;
            }
        }
        true
    }
}

/// A handle over one or many concatenated sources, answering row counts and
/// cursor-filtered batches. Implementors own whatever file handles or remote
/// clients they need; `close()` must be safe to call more than once.
pub trait ColumnarReader {
    fn row_count(&self) -> Result<u64>;
    fn filtered_row_count(&self, range: TsRange) -> Result<u64>;
    fn batch(&mut self, limit: usize, cursor: Option<Cursor>, range: TsRange) -> Result<Vec<Event>>;
    fn close(&mut self) -> Result<()>;
}

/// Applies the exclusive-resume rule and range filter uniformly in front of
/// whichever backend produced the raw rows.
pub(crate) fn filter_rows(rows: Vec<Event>, cursor: Option<Cursor>, range: TsRange) -> Vec<Event> {
    let predicate = cursor.map(ResumePredicate::from_cursor);
    rows.into_iter()
        .filter(|e| range.admits(e.ts_event))
        .filter(|e| match &predicate {
            None => true,
            Some(p) => p.admits(e.ts_event, e.seq),
        })
        .collect()
}
