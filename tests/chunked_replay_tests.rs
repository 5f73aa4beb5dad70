//! S3 — chunked 20% slices: five independent sub-runs, each stopping at the
//! 20/40/60/80/100th event and resuming from the last cursor in a fresh
//! Replay Engine instance, must concatenate to the same event sequence as a
//! single full pass.

mod support;

use marketreplay_exec::replay::{ReplayEngine, ReplayParams};
use support::{evenly_spaced_events, FixedRowsFactory};

fn fresh_engine() -> ReplayEngine {
    ReplayEngine::new(Box::new(FixedRowsFactory::new(evenly_spaced_events(100))), 100)
}

#[test]
fn s3_five_chunked_sub_runs_concatenate_to_the_full_sequence() {
    let full_engine = fresh_engine();
    let mut full = full_engine.row_factory(ReplayParams::default()).unwrap();
    let mut expected = Vec::new();
    while let Some(e) = full.next_event().unwrap() {
        expected.push((e.ts_event, e.seq));
    }
    assert_eq!(expected.len(), 100);

    let mut concatenated = Vec::new();
    let mut cursor = None;
    for chunk_end in [20usize, 40, 60, 80, 100] {
        let engine = fresh_engine();
        let mut pass = engine
            .row_factory(ReplayParams {
                cursor,
                ..Default::default()
            })
            .unwrap();
        let want = chunk_end - concatenated.len();
        for _ in 0..want {
            let event = pass.next_event().unwrap().expect("chunk must have enough rows remaining");
            concatenated.push((event.ts_event, event.seq));
        }
        cursor = pass.cursor();
    }

    assert_eq!(concatenated, expected);
}
