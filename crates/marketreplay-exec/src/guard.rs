//! Safety collaborators the dispatch loop wraps every event in: the
//! ordering guard (duplicate/out-of-order detection) and error containment
//! (bounding how many per-event failures a run tolerates).

use std::collections::VecDeque;

use marketreplay_core::config::ErrorPolicy;
use marketreplay_core::ordering::{enforce_progress, OrderingTuple};
use marketreplay_core::CoreError;

use crate::error::{ExecError, Result};

const VIOLATION_HISTORY_CAPACITY: usize = 64;
const ERROR_RING_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderingMode {
    Strict,
    Warn,
}

impl From<marketreplay_core::config::OrderingMode> for OrderingMode {
    fn from(m: marketreplay_core::config::OrderingMode) -> Self {
        match m {
            marketreplay_core::config::OrderingMode::Strict => OrderingMode::Strict,
            marketreplay_core::config::OrderingMode::Warn => OrderingMode::Warn,
        }
    }
}

/// Holds the last accepted ordering tuple. STRICT raises on violation; WARN
/// logs and counts but admits the event anyway.
#[derive(Debug)]
pub struct OrderingGuard {
    mode: OrderingMode,
    last_accepted: Option<OrderingTuple>,
    violation_count: u64,
    recent_violations: VecDeque<CoreError>,
}

impl OrderingGuard {
    pub fn new(mode: OrderingMode) -> Self {
        Self {
            mode,
            last_accepted: None,
            violation_count: 0,
            recent_violations: VecDeque::new(),
        }
    }

    /// Check `curr` against the last accepted tuple and advance state on
    /// admission. Returns `Err` only in STRICT mode.
    pub fn check(&mut self, curr: OrderingTuple) -> Result<()> {
        match enforce_progress(self.last_accepted.as_ref(), &curr) {
            Ok(()) => {
                self.last_accepted = Some(curr);
                Ok(())
            }
            Err(e) => {
                self.violation_count += 1;
                self.push_violation(clone_core_error(&e));
                match self.mode {
                    OrderingMode::Strict => Err(ExecError::Core(e)),
                    OrderingMode::Warn => {
                        tracing::warn!(error = %e, "ordering violation admitted under WARN mode");
                        self.last_accepted = Some(curr);
                        Ok(())
                    }
                }
            }
        }
    }

    /// Resume from a known checkpoint tuple, e.g. after restoring state.
    pub fn reset_to(&mut self, tuple: OrderingTuple) {
        self.last_accepted = Some(tuple);
    }

    pub fn violation_count(&self) -> u64 {
        self.violation_count
    }

    pub fn recent_violations(&self) -> impl Iterator<Item = &CoreError> {
        self.recent_violations.iter()
    }

    fn push_violation(&mut self, err: CoreError) {
        if self.recent_violations.len() == VIOLATION_HISTORY_CAPACITY {
            self.recent_violations.pop_front();
        }
        self.recent_violations.push_back(err);
    }
}

fn clone_core_error(e: &CoreError) -> CoreError {
    match e {
        CoreError::OrderingViolationDuplicate { ts_event, seq } => {
            CoreError::OrderingViolationDuplicate {
                ts_event: *ts_event,
                seq: *seq,
            }
        }
        CoreError::OrderingViolationOutOfOrder {
            ts_event,
            seq,
            prev_ts_event,
            prev_seq,
        } => CoreError::OrderingViolationOutOfOrder {
            ts_event: *ts_event,
            seq: *seq,
            prev_ts_event: *prev_ts_event,
            prev_seq: *prev_seq,
        },
        other => CoreError::Serialization(other.to_string()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainmentOutcome {
    Ok,
    Skipped,
    Quarantined,
}

/// A retained context for one contained failure, kept for diagnostics and
/// for the archive's quarantine record.
#[derive(Debug, Clone)]
pub struct ContainedError {
    pub ts_event: u64,
    pub seq: u64,
    pub message: String,
}

/// Wraps the strategy's per-event callback. Bounds how many failures a run
/// tolerates before escalating to `ErrorLimitExceeded`, independent of the
/// configured policy.
pub struct ErrorContainment {
    policy: ErrorPolicy,
    max_errors: u64,
    error_count: u64,
    skip_count: u64,
    ring: VecDeque<ContainedError>,
}

impl ErrorContainment {
    pub fn new(policy: ErrorPolicy, max_errors: u64) -> Self {
        Self {
            policy,
            max_errors,
            error_count: 0,
            skip_count: 0,
            ring: VecDeque::new(),
        }
    }

    pub fn error_count(&self) -> u64 {
        self.error_count
    }

    pub fn skip_count(&self) -> u64 {
        self.skip_count
    }

    pub fn recent_errors(&self) -> impl Iterator<Item = &ContainedError> {
        self.ring.iter()
    }

    /// Run `callback`, classifying the outcome per the configured policy.
    /// `Ok(Ok(outcome))` is a contained result the dispatch loop should
    /// continue past; `Ok(Err(_))`/`Err(_)` propagate and end the run.
    pub fn call<F>(&mut self, ts_event: u64, seq: u64, callback: F) -> Result<ContainmentOutcome>
    where
        F: FnOnce() -> std::result::Result<(), String>,
    {
        self.contained(ts_event, seq, callback())
    }

    /// Classify an already-computed callback result. Equivalent to `call`
    /// but for call sites where evaluating the callback eagerly (before
    /// containment is chosen) is unavoidable due to borrow constraints.
    pub fn contained(
        &mut self,
        ts_event: u64,
        seq: u64,
        result: std::result::Result<(), String>,
    ) -> Result<ContainmentOutcome> {
        match result {
            Ok(()) => Ok(ContainmentOutcome::Ok),
            Err(message) => self.contain(ts_event, seq, message),
        }
    }

    fn contain(&mut self, ts_event: u64, seq: u64, message: String) -> Result<ContainmentOutcome> {
        self.error_count += 1;
        self.push_context(ContainedError {
            ts_event,
            seq,
            message: message.clone(),
        });

        if self.error_count > self.max_errors {
            return Err(ExecError::ErrorLimitExceeded {
                error_count: self.error_count,
                max_errors: self.max_errors,
            });
        }

        match self.policy {
            ErrorPolicy::FailFast => Err(ExecError::Lifecycle(format!(
                "event {ts_event}:{seq} failed under FAIL_FAST: {message}"
            ))),
            ErrorPolicy::SkipAndLog => {
                self.skip_count += 1;
                tracing::warn!(ts_event, seq, %message, "event skipped under SKIP_AND_LOG");
                Ok(ContainmentOutcome::Skipped)
            }
            ErrorPolicy::Quarantine => {
                self.skip_count += 1;
                tracing::warn!(ts_event, seq, %message, "event quarantined");
                Ok(ContainmentOutcome::Quarantined)
            }
        }
    }

    fn push_context(&mut self, ctx: ContainedError) {
        if self.ring.len() == ERROR_RING_CAPACITY {
            self.ring.pop_front();
        }
        self.ring.push_back(ctx);
    }
}
