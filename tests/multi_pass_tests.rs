//! S4 — multi-pass factory: `row_factory()` must hand back an independent,
//! full pass every time it is called, never a shared iterator left
//! exhausted by a prior pass.

mod support;

use marketreplay_exec::replay::{ReplayEngine, ReplayParams};
use support::{evenly_spaced_events, FixedRowsFactory};

#[test]
fn s4_three_independent_passes_each_deliver_the_full_row_count() {
    let engine = ReplayEngine::new(Box::new(FixedRowsFactory::new(evenly_spaced_events(10))), 10);

    for pass_number in 1..=3 {
        let mut pass = engine.row_factory(ReplayParams::default()).unwrap();
        let mut count = 0;
        while pass.next_event().unwrap().is_some() {
            count += 1;
        }
        assert_eq!(count, 10, "pass {pass_number} did not deliver the full row count");
    }
}

#[test]
fn s4_a_second_pass_does_not_observe_the_first_passs_cursor_advancement() {
    let engine = ReplayEngine::new(Box::new(FixedRowsFactory::new(evenly_spaced_events(10))), 10);

    let mut first = engine.row_factory(ReplayParams::default()).unwrap();
    for _ in 0..7 {
        first.next_event().unwrap();
    }
    assert_eq!(first.rows_emitted(), 7);

    let mut second = engine.row_factory(ReplayParams::default()).unwrap();
    let first_event = second.next_event().unwrap().expect("a fresh pass starts at row 1");
    assert_eq!(first_event.seq, 1);
}
