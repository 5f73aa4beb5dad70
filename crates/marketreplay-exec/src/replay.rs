//! Replay Engine: turns a `ColumnarReader` into a deterministic, resumable
//! event sequence with a terminal `{rows_emitted, stop_reason}`, plus a
//! `row_factory` for independent multi-pass access over the same dataset.

use marketreplay_core::error::CoreError;
use marketreplay_core::ordering::{enforce_progress, Cursor, OrderingTuple};
use marketreplay_io::reader::{ColumnarReader, TsRange};

use crate::error::{ExecError, Result};

#[derive(Debug, Clone, Copy, Default)]
pub struct ReplayParams {
    pub batch_size: usize,
    pub cursor: Option<Cursor>,
    pub start_ts: Option<u64>,
    pub end_ts: Option<u64>,
}

impl ReplayParams {
    fn range(&self) -> TsRange {
        TsRange {
            start_ts: self.start_ts,
            end_ts: self.end_ts,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    EndOfStream,
    StopAtCursor,
    Error,
}

impl StopReason {
    /// The string label this reason takes in the Run Manifest's `replay` block.
    pub fn label(self) -> &'static str {
        match self {
            StopReason::EndOfStream => "END_OF_STREAM",
            StopReason::StopAtCursor => "STOP_AT_CURSOR",
            StopReason::Error => "ERROR",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ReplayResult {
    pub rows_emitted: u64,
    pub stop_reason: StopReason,
}

/// One independent pass over a dataset. Holds its own reader handle and
/// cursor state so concurrent passes from the same factory never interfere.
pub struct ReplayPass {
    reader: Box<dyn ColumnarReader>,
    params: ReplayParams,
    pending: std::collections::VecDeque<marketreplay_core::event::Event>,
    cursor: Option<Cursor>,
    last_accepted: Option<OrderingTuple>,
    rows_emitted: u64,
    expected_rows: Option<u64>,
    stop_reason: Option<StopReason>,
    closed: bool,
}

impl ReplayPass {
    fn new(reader: Box<dyn ColumnarReader>, params: ReplayParams, expected_rows: u64) -> Self {
        Self {
            reader,
            cursor: params.cursor,
            pending: std::collections::VecDeque::new(),
            params,
            last_accepted: None,
            rows_emitted: 0,
            expected_rows: Some(expected_rows),
            stop_reason: None,
            closed: false,
        }
    }

    pub fn rows_emitted(&self) -> u64 {
        self.rows_emitted
    }

    pub fn cursor(&self) -> Option<Cursor> {
        self.cursor
    }

    /// `None` once the pass is exhausted; inspect `result()` for the
    /// terminal outcome at that point.
    pub fn next_event(&mut self) -> Result<Option<marketreplay_core::event::Event>> {
        if self.closed || self.stop_reason.is_some() {
            return Ok(None);
        }

        if self.pending.is_empty() {
            let range = self.params.range();
            let batch = self
                .reader
                .batch(self.params.batch_size, self.cursor, range)
                .map_err(|e| self.fail(ExecError::Io(e)))?;
            if batch.is_empty() {
                self.finish_end_of_stream()?;
                return Ok(None);
            }
            self.pending.extend(batch);
        }

        let event = self.pending.pop_front().expect("checked non-empty above");

        if let Some(end_ts) = self.params.end_ts {
            if event.ts_event > end_ts {
                self.pending.clear();
                self.stop_reason = Some(StopReason::StopAtCursor);
                return Ok(None);
            }
        }

        let tuple = event.ordering_tuple();
        enforce_progress(self.last_accepted.as_ref(), &tuple)
            .map_err(|e| self.fail(ExecError::Core(e)))?;
        self.last_accepted = Some(tuple);
        self.cursor = Some(tuple);
        self.rows_emitted += 1;

        Ok(Some(event))
    }

    fn finish_end_of_stream(&mut self) -> Result<()> {
        if let Some(expected) = self.expected_rows {
            if self.rows_emitted != expected {
                self.stop_reason = Some(StopReason::Error);
                return Err(ExecError::Core(CoreError::RowCountMismatch {
                    expected,
                    actual: self.rows_emitted,
                }));
            }
        }
        self.stop_reason = Some(StopReason::EndOfStream);
        Ok(())
    }

    fn fail(&mut self, err: ExecError) -> ExecError {
        self.stop_reason = Some(StopReason::Error);
        err
    }

    /// Terminal result. Only meaningful once `next_event` has returned
    /// `Ok(None)`.
    pub fn result(&self) -> ReplayResult {
        ReplayResult {
            rows_emitted: self.rows_emitted,
            stop_reason: self.stop_reason.unwrap_or(StopReason::EndOfStream),
        }
    }

    /// Release reader resources. Safe to call more than once.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.reader.close().map_err(ExecError::Io)
    }
}

impl Drop for ReplayPass {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

impl Iterator for ReplayPass {
    type Item = Result<marketreplay_core::event::Event>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_event() {
            Ok(Some(event)) => Some(Ok(event)),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

/// Opens a fresh, independent reader handle for one pass. Implementors
/// typically re-open the same sources from storage; the factory must never
/// hand back a reader that already has rows consumed.
pub trait ReaderFactory {
    fn open(&self) -> Result<Box<dyn ColumnarReader>>;
}

impl<F> ReaderFactory for F
where
    F: Fn() -> Result<Box<dyn ColumnarReader>>,
{
    fn open(&self) -> Result<Box<dyn ColumnarReader>> {
        self()
    }
}

/// The Replay Engine: a manifest-validated factory of independent replay
/// passes. `row_factory()` is the only way to get a pass; there is no
/// shared iterator to accidentally reuse after exhaustion.
pub struct ReplayEngine {
    factory: Box<dyn ReaderFactory>,
    manifest_rows: u64,
}

impl ReplayEngine {
    pub fn new(factory: Box<dyn ReaderFactory>, manifest_rows: u64) -> Self {
        Self {
            factory,
            manifest_rows,
        }
    }

    /// Start a fresh, independently-cursored pass over the dataset.
    pub fn row_factory(&self, params: ReplayParams) -> Result<ReplayPass> {
        let reader = self.factory.open()?;
        let expected_rows = if params.start_ts.is_some() || params.end_ts.is_some() {
            reader.filtered_row_count(params.range())?
        } else {
            self.manifest_rows
        };
        Ok(ReplayPass::new(reader, params, expected_rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marketreplay_core::event::Event;
    use marketreplay_core::ordering::ResumePredicate;
    use marketreplay_io::Result as IoResult;

    struct VecReader {
        rows: Vec<Event>,
        offset: usize,
    }

    impl ColumnarReader for VecReader {
        fn row_count(&self) -> IoResult<u64> {
            Ok(self.rows.len() as u64)
        }

        fn filtered_row_count(&self, range: TsRange) -> IoResult<u64> {
            Ok(self.rows.iter().filter(|e| range.admits(e.ts_event)).count() as u64)
        }

        fn batch(
            &mut self,
            limit: usize,
            cursor: Option<Cursor>,
            range: TsRange,
        ) -> IoResult<Vec<Event>> {
            let predicate = cursor.map(ResumePredicate::from_cursor);
            let filtered: Vec<Event> = self.rows[self.offset..]
                .iter()
                .filter(|e| range.admits(e.ts_event))
                .filter(|e| match &predicate {
                    None => true,
                    Some(p) => p.admits(e.ts_event, e.seq),
                })
                .cloned()
                .collect();
            let taken: Vec<Event> = filtered.into_iter().take(limit).collect();
            if let Some(last) = taken.last() {
                let pos = self.rows[self.offset..]
                    .iter()
                    .position(|e| e.ts_event == last.ts_event && e.seq == last.seq)
                    .unwrap();
                self.offset += pos + 1;
            }
            Ok(taken)
        }

        fn close(&mut self) -> IoResult<()> {
            Ok(())
        }
    }

    fn ten_events() -> Vec<Event> {
        (1..=10)
            .map(|i| Event {
                ts_event: i * 1000,
                seq: i,
                payload: serde_json::json!({}),
            })
            .collect()
    }

    fn engine() -> ReplayEngine {
        let rows = ten_events();
        ReplayEngine::new(
            Box::new(move || {
                Ok(Box::new(VecReader {
                    rows: rows.clone(),
                    offset: 0,
                }) as Box<dyn ColumnarReader>)
            }),
            10,
        )
    }

    #[test]
    fn a_full_pass_emits_all_rows_and_ends_at_end_of_stream() {
        let engine = engine();
        let mut pass = engine.row_factory(ReplayParams::default()).unwrap();
        let mut count = 0;
        while pass.next_event().unwrap().is_some() {
            count += 1;
        }
        assert_eq!(count, 10);
        assert_eq!(pass.result().rows_emitted, 10);
        assert_eq!(pass.result().stop_reason, StopReason::EndOfStream);
    }

    #[test]
    fn resuming_from_a_cursor_excludes_the_cursor_tuple_itself() {
        let engine = engine();
        let mut first = engine.row_factory(ReplayParams::default()).unwrap();
        for _ in 0..5 {
            first.next_event().unwrap();
        }
        let resume_cursor = first.cursor();

        let mut resumed = engine
            .row_factory(ReplayParams {
                cursor: resume_cursor,
                ..Default::default()
            })
            .unwrap();
        let mut events = Vec::new();
        while let Some(e) = resumed.next_event().unwrap() {
            events.push(e);
        }
        assert_eq!(events.len(), 5);
        assert_eq!(events[0].seq, 6);
    }

    #[test]
    fn row_factory_gives_each_pass_an_independent_cursor() {
        let engine = engine();
        let mut pass_a = engine.row_factory(ReplayParams::default()).unwrap();
        pass_a.next_event().unwrap();
        pass_a.next_event().unwrap();

        let mut pass_b = engine.row_factory(ReplayParams::default()).unwrap();
        let mut count_b = 0;
        while pass_b.next_event().unwrap().is_some() {
            count_b += 1;
        }
        assert_eq!(count_b, 10);
    }
}
