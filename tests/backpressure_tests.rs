//! S6 — backpressure hysteresis: HIGH=1500, LOW=500, MAX=2000, driven
//! through the Strategy Runtime's externally-supplied-stream path
//! (`ingest_external_event` / `drain_one`) rather than the bare queue.

mod support;

use marketreplay_core::event::Event;
use marketreplay_exec::backpressure::{BackpressureThresholds, FlowSignal};
use marketreplay_exec::runtime::Runtime;
use support::{strict_config, CountingStrategy};

fn thresholds() -> BackpressureThresholds {
    BackpressureThresholds {
        high: 1500,
        low: 500,
        max: 2000,
    }
}

fn event(i: u64) -> Event {
    Event {
        ts_event: i,
        seq: i,
        payload: serde_json::json!({}),
    }
}

fn runtime() -> Runtime {
    Runtime::new(
        "run_s6",
        "dataset_s6",
        "counting",
        0,
        strict_config(),
        Box::new(CountingStrategy),
        0,
    )
    .with_backpressure(thresholds())
}

#[test]
fn s6_feeding_1600_events_without_draining_signals_stop() {
    let mut rt = runtime();
    let mut saw_stop = false;
    for i in 1..=1600 {
        let signal = rt.ingest_external_event(event(i)).expect("below max, push must succeed");
        if signal == FlowSignal::Stop {
            saw_stop = true;
        }
    }
    assert!(saw_stop);
    assert_eq!(rt.queue_len(), 1600);
}

#[test]
fn s6_draining_to_400_after_crossing_high_signals_resume() {
    let mut rt = runtime();
    for i in 1..=1600 {
        rt.ingest_external_event(event(i)).unwrap();
    }
    rt.initialize(0).unwrap();
    rt.start(0).unwrap();

    let mut saw_resume = false;
    for _ in 0..1200 {
        let (_, signal) = rt.drain_one().unwrap().expect("queue still has items");
        if signal == FlowSignal::Resume {
            saw_resume = true;
        }
    }
    assert!(saw_resume);
    assert_eq!(rt.queue_len(), 400);
}

#[test]
fn s6_feeding_2001_events_without_draining_is_rejected_at_the_hard_capacity() {
    let mut rt = runtime();
    for i in 1..=2000 {
        rt.ingest_external_event(event(i)).expect("within max");
    }
    let rejected = rt.ingest_external_event(event(2001));
    assert!(rejected.is_err());

    rt.initialize(0).unwrap();
    rt.start(0).unwrap();
    rt.fail("queue_overflow", 0).unwrap();
    assert_eq!(rt.lifecycle(), marketreplay_exec::runtime::LifecycleState::Failed);
}
