//! Shared fixtures for the integration suite: an in-memory `ColumnarReader`
//! over a fixed row set, a couple of minimal `Strategy` implementations, and
//! small config helpers so each scenario file only states what varies.

use marketreplay_core::config::{EngineConfig, ErrorPolicy, OrderingMode};
use marketreplay_core::event::Event;
use marketreplay_core::ordering::{Cursor, ResumePredicate};
use marketreplay_exec::error::Result;
use marketreplay_exec::replay::ReaderFactory;
use marketreplay_exec::runtime::{RuntimeContext, Strategy};
use marketreplay_io::reader::{ColumnarReader, TsRange};

/// An event stream with `ts_event` spaced by 1000, `seq` running 1..=n.
pub fn evenly_spaced_events(n: u64) -> Vec<Event> {
    (1..=n)
        .map(|i| Event {
            ts_event: i * 1000,
            seq: i,
            payload: serde_json::json!({}),
        })
        .collect()
}

pub struct VecReader {
    rows: Vec<Event>,
    offset: usize,
}

impl VecReader {
    pub fn new(rows: Vec<Event>) -> Self {
        Self { rows, offset: 0 }
    }
}

impl ColumnarReader for VecReader {
    fn row_count(&self) -> marketreplay_io::Result<u64> {
        Ok(self.rows.len() as u64)
    }

    fn filtered_row_count(&self, range: TsRange) -> marketreplay_io::Result<u64> {
        Ok(self.rows.iter().filter(|e| range.admits(e.ts_event)).count() as u64)
    }

    fn batch(&mut self, limit: usize, cursor: Option<Cursor>, range: TsRange) -> marketreplay_io::Result<Vec<Event>> {
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
                .expect("batch row must still be present in the backing vec");
            self.offset += pos + 1;
        }
        Ok(taken)
    }

    fn close(&mut self) -> marketreplay_io::Result<()> {
        Ok(())
    }
}

/// A `ReaderFactory` that hands back an independent `VecReader` over the
/// same fixed row set on every call, the way `CsvReaderFactory` re-reads
/// from storage on each `open()`.
pub struct FixedRowsFactory {
    rows: Vec<Event>,
}

impl FixedRowsFactory {
    pub fn new(rows: Vec<Event>) -> Self {
        Self { rows }
    }
}

impl ReaderFactory for FixedRowsFactory {
    fn open(&self) -> Result<Box<dyn ColumnarReader>> {
        Ok(Box::new(VecReader::new(self.rows.clone())))
    }
}

/// Records `event_count` in state; places no orders.
pub struct CountingStrategy;

impl Strategy for CountingStrategy {
    fn init(&mut self, _ctx: &mut RuntimeContext) -> std::result::Result<(), String> {
        Ok(())
    }

    fn on_event(&mut self, ctx: &mut RuntimeContext, _event: &Event) -> std::result::Result<(), String> {
        ctx.state.increment("event_count", 1.0);
        Ok(())
    }

    fn finalize(&mut self, _ctx: &mut RuntimeContext) -> std::result::Result<(), String> {
        Ok(())
    }
}

/// Fails every `n`th event (1-indexed) so the ErrorContainment policies can
/// be exercised without a real fault to trigger.
pub struct FlakyStrategy {
    pub fail_every: u64,
    seen: u64,
}

impl FlakyStrategy {
    pub fn new(fail_every: u64) -> Self {
        Self { fail_every, seen: 0 }
    }
}

impl Strategy for FlakyStrategy {
    fn init(&mut self, _ctx: &mut RuntimeContext) -> std::result::Result<(), String> {
        Ok(())
    }

    fn on_event(&mut self, _ctx: &mut RuntimeContext, _event: &Event) -> std::result::Result<(), String> {
        self.seen += 1;
        if self.seen % self.fail_every == 0 {
            return Err(format!("synthetic failure on event {}", self.seen));
        }
        Ok(())
    }

    fn finalize(&mut self, _ctx: &mut RuntimeContext) -> std::result::Result<(), String> {
        Ok(())
    }
}

pub fn strict_config() -> EngineConfig {
    let mut cfg = EngineConfig::default();
    cfg.error_policy = ErrorPolicy::FailFast;
    cfg.ordering_mode = OrderingMode::Strict;
    cfg
}
