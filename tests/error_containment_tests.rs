//! Invariant 7 — under `SKIP_AND_LOG` with `max_errors = N`, a run
//! containing exactly `N` failing events reaches DONE with
//! `skipped_events_total == error_count`; the `(N+1)`th failing event fails
//! the run via `ErrorLimitExceeded`.

mod support;

use marketreplay_core::config::ErrorPolicy;
use marketreplay_exec::error::ExecError;
use marketreplay_exec::runtime::Runtime;
use support::{evenly_spaced_events, strict_config, FlakyStrategy};

fn skip_and_log_config(max_errors: u64) -> marketreplay_core::config::EngineConfig {
    let mut cfg = strict_config();
    cfg.error_policy = ErrorPolicy::SkipAndLog;
    cfg.max_errors = max_errors;
    cfg
}

#[test]
fn invariant_7_exactly_max_errors_contained_failures_reach_done() {
    // 10 events, fails on every event (fail_every=1) capped at max_errors=10:
    // all ten are contained, error_count never exceeds max_errors.
    let strategy = Box::new(FlakyStrategy::new(1));
    let mut rt = Runtime::new("run_cap", "dataset_e", "flaky", 0, skip_and_log_config(10), strategy, 0);
    rt.initialize(0).unwrap();
    rt.start(0).unwrap();
    for event in evenly_spaced_events(10) {
        rt.dispatch_event(event).unwrap();
    }
    let manifest = rt.finalize(100, None, None).unwrap();
    assert_eq!(manifest.output.event_count, 10);
    let skipped = rt
        .metrics()
        .snapshot()
        .counters
        .get("skipped_events_total")
        .copied()
        .unwrap_or(0);
    assert_eq!(skipped, 10);
}

#[test]
fn invariant_7_error_count_one_past_max_errors_fails_the_run() {
    // 10 events, fails on every event, max_errors=9: the tenth failing
    // event pushes error_count to 10, one past max_errors.
    let strategy = Box::new(FlakyStrategy::new(1));
    let mut rt = Runtime::new("run_over", "dataset_e", "flaky", 0, skip_and_log_config(9), strategy, 0);
    rt.initialize(0).unwrap();
    rt.start(0).unwrap();
    let events = evenly_spaced_events(10);
    let mut last_err = None;
    for event in events {
        if let Err(e) = rt.dispatch_event(event) {
            last_err = Some(e);
            break;
        }
    }
    let err = last_err.expect("the tenth event must exceed max_errors");
    assert!(matches!(
        err,
        ExecError::ErrorLimitExceeded {
            error_count: 10,
            max_errors: 9
        }
    ));
}
