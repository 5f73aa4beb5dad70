//! Strategy Runtime: the lifecycle state machine, the per-event dispatch
//! algorithm, order placement, and finalization into a Run Manifest.

use marketreplay_core::canonical::Canonical;
use marketreplay_core::config::EngineConfig;
use marketreplay_core::event::{DecisionRecord, Event, Fill, Side};
use marketreplay_core::hash::{decision_hash, fills_hash, hash_canonical, state_hash};
use marketreplay_core::id::{DecisionId, ReplayRunId};
use marketreplay_core::ordering::{encode_cursor, OrderingTuple};

use crate::backpressure::{BackpressureThresholds, BoundedQueue, FlowSignal};
use crate::checkpoint::CheckpointManager;
use crate::error::{ExecError, Result};
use crate::guard::{ContainmentOutcome, ErrorContainment, OrderingGuard};
use crate::metrics::MetricsRegistry;
use crate::state::StateContainer;

pub use marketreplay_core::manifest::RunManifest;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Created,
    Initializing,
    Ready,
    Running,
    Paused,
    Finalizing,
    Done,
    Failed,
    Canceled,
}

impl LifecycleState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Canceled)
    }
}

fn is_valid_transition(from: LifecycleState, to: LifecycleState) -> bool {
    use LifecycleState::*;
    if from.is_terminal() {
        return false;
    }
    if to == Canceled {
        return true;
    }
    matches!(
        (from, to),
        (Created, Initializing)
            | (Initializing, Ready)
            | (Initializing, Failed)
            | (Ready, Running)
            | (Running, Paused)
            | (Paused, Running)
            | (Running, Finalizing)
            | (Paused, Finalizing)
            | (Running, Failed)
            | (Paused, Failed)
            | (Finalizing, Done)
            | (Finalizing, Failed)
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct CursorInfo {
    pub ts_event: u64,
    pub seq: u64,
}

impl CursorInfo {
    fn from_tuple(tuple: OrderingTuple) -> Self {
        Self {
            ts_event: tuple.ts_event,
            seq: tuple.seq,
        }
    }

    pub fn encoded(&self) -> String {
        encode_cursor(&OrderingTuple::new(self.ts_event, self.seq))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskDecision {
    Allow,
    Reject,
}

pub trait RiskValidator {
    fn validate(&mut self, intent: &OrderIntent) -> (RiskDecision, Option<String>);
}

pub trait ExecutionCollaborator {
    fn execute(&mut self, intent: &OrderIntent, ts_event: u64) -> std::result::Result<Fill, String>;
}

#[derive(Debug, Clone)]
pub struct OrderIntent {
    pub id: String,
    pub side: Side,
    pub qty: f64,
    pub price: Option<f64>,
    /// Bypasses risk validation, e.g. a forced liquidation on kill. Still
    /// produces a Decision Record.
    pub risk_forced: bool,
}

/// Composed once per dispatched event: the deterministic identity, frozen
/// config, and mutable collaborators a strategy (or pre-hook) callback is
/// allowed to touch.
pub struct RuntimeContext<'a> {
    pub run_id: &'a str,
    pub replay_run_id: &'a str,
    pub dataset_identity: &'a str,
    pub strategy_id: &'a str,
    pub config: &'a EngineConfig,
    pub metrics: &'a mut MetricsRegistry,
    pub state: &'a mut StateContainer,
    pub decisions: &'a mut Vec<DecisionRecord>,
    pub fills: &'a mut Vec<Fill>,
    pub execution: Option<&'a mut (dyn ExecutionCollaborator + 'static)>,
    pub risk: Option<&'a mut (dyn RiskValidator + 'static)>,
    pub cursor: CursorInfo,
}

impl<'a> RuntimeContext<'a> {
    /// Validate, record, and (unless rejected) execute an order intent.
    /// Returns `None` for a rejected intent rather than an error — rejection
    /// is an expected outcome, not a failure.
    pub fn place_order(&mut self, intent: OrderIntent) -> Result<Option<Fill>> {
        let mut rejected_reason = None;
        if !intent.risk_forced {
            if let Some(risk) = self.risk.as_deref_mut() {
                if let (RiskDecision::Reject, reason) = risk.validate(&intent) {
                    rejected_reason = Some(reason.unwrap_or_else(|| "rejected by risk validator".into()));
                }
            }
        }

        let decision_id = DecisionId::new(self.decisions.len() as u64);
        let status = if rejected_reason.is_some() { "REJECTED" } else { "ACCEPTED" };
        let side_str = match intent.side {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        };
        let decision_payload = serde_json::json!({
            "intent_id": intent.id,
            "side": side_str,
            "qty": intent.qty,
            "price": intent.price,
            "status": status,
            "reason": rejected_reason,
            "risk_forced": intent.risk_forced,
        });

        let record = DecisionRecord {
            replay_run_id: self.replay_run_id.to_string(),
            cursor: self.cursor.encoded(),
            ts_event: self.cursor.ts_event,
            decision: decision_payload,
        };
        let decision_hash = marketreplay_core::hash::hash_canonical(&record.to_canonical()).to_hex();
        self.decisions.push(record);
        self.metrics.incr("decisions_total", 1);

        tracing::info!(
            actor = "strategy",
            action = "DECISION",
            target_type = "decision",
            target_id = %decision_hash,
            run_id = %self.run_id,
            strategy_id = %self.strategy_id,
            decision_id = %decision_id,
            "audit event"
        );

        if rejected_reason.is_some() {
            self.metrics.incr("decisions_rejected_total", 1);
            return Ok(None);
        }

        let execution = self.execution.as_deref_mut().ok_or_else(|| {
            ExecError::Lifecycle("place_order called with no execution collaborator attached".into())
        })?;
        let fill = execution
            .execute(&intent, self.cursor.ts_event)
            .map_err(ExecError::Lifecycle)?;
        self.fills.push(fill.clone());
        self.metrics.incr("fills_total", 1);
        Ok(Some(fill))
    }
}

pub trait Strategy {
    fn init(&mut self, ctx: &mut RuntimeContext) -> std::result::Result<(), String>;
    fn on_event(&mut self, ctx: &mut RuntimeContext, event: &Event) -> std::result::Result<(), String>;
    fn finalize(&mut self, ctx: &mut RuntimeContext) -> std::result::Result<(), String>;
}

pub trait PreHook {
    fn observe(&mut self, ctx: &mut RuntimeContext, event: &Event) -> std::result::Result<(), String>;
}

pub trait EventObserver {
    fn on_event(
        &mut self,
        event: &Event,
        event_index: u64,
        decision_count: u64,
        state_snapshot: &crate::state::StateSnapshot,
    ) -> std::result::Result<(), String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Continue,
    AwaitingResume,
}

macro_rules! with_ctx {
    ($self:ident, $cursor:expr) => {
        RuntimeContext {
            run_id: &$self.run_id,
            replay_run_id: &$self.replay_run_id,
            dataset_identity: &$self.dataset_identity,
            strategy_id: &$self.strategy_id,
            config: &$self.config,
            metrics: &mut $self.metrics,
            state: &mut $self.state,
            decisions: &mut $self.decisions,
            fills: &mut $self.fills,
            execution: $self.execution.as_deref_mut(),
            risk: $self.risk.as_deref_mut(),
            cursor: $cursor,
        }
    };
}

pub struct Runtime {
    run_id: String,
    replay_run_id: String,
    dataset_identity: String,
    strategy_id: String,
    config: EngineConfig,

    lifecycle: LifecycleState,
    created_at: u64,
    started_at: Option<u64>,
    ended_at: Option<u64>,
    ended_reason: Option<String>,

    strategy: Box<dyn Strategy>,
    state: StateContainer,
    metrics: MetricsRegistry,
    guard: OrderingGuard,
    containment: ErrorContainment,

    decisions: Vec<DecisionRecord>,
    fills: Vec<Fill>,
    execution: Option<Box<dyn ExecutionCollaborator>>,
    risk: Option<Box<dyn RiskValidator>>,
    risk_pre_hook: Option<Box<dyn PreHook>>,
    ml_advisory_hook: Option<Box<dyn PreHook>>,
    event_observer: Option<Box<dyn EventObserver>>,

    event_index: u64,
    first_ts_event: Option<u64>,
    last_cursor: Option<CursorInfo>,
    queue: Option<BoundedQueue<Event>>,
    paused: bool,
}

impl Runtime {
    pub fn new(
        run_id: impl Into<String>,
        dataset_identity: impl Into<String>,
        strategy_id: impl Into<String>,
        seed: u64,
        config: EngineConfig,
        strategy: Box<dyn Strategy>,
        created_at: u64,
    ) -> Self {
        let ordering_mode = crate::guard::OrderingMode::from(config.ordering_mode);
        let containment = ErrorContainment::new(config.error_policy, config.max_errors);
        let dataset_identity = dataset_identity.into();
        let replay_run_id = ReplayRunId::from_hash(&hash_canonical(&Canonical::obj([
            ("seed", Canonical::UInt(seed)),
            ("manifest_id", Canonical::Str(dataset_identity.clone())),
        ])))
        .to_string();
        Self {
            run_id: run_id.into(),
            replay_run_id,
            dataset_identity,
            strategy_id: strategy_id.into(),
            metrics: MetricsRegistry::new("run"),
            config,
            lifecycle: LifecycleState::Created,
            created_at,
            started_at: None,
            ended_at: None,
            ended_reason: None,
            strategy,
            state: StateContainer::new(),
            guard: OrderingGuard::new(ordering_mode),
            containment,
            decisions: Vec::new(),
            fills: Vec::new(),
            execution: None,
            risk: None,
            risk_pre_hook: None,
            ml_advisory_hook: None,
            event_observer: None,
            event_index: 0,
            first_ts_event: None,
            last_cursor: None,
            queue: None,
            paused: false,
        }
    }

    pub fn with_execution(mut self, execution: Box<dyn ExecutionCollaborator>) -> Self {
        self.execution = Some(execution);
        self
    }

    pub fn with_risk(mut self, risk: Box<dyn RiskValidator>) -> Self {
        self.risk = Some(risk);
        self
    }

    pub fn with_risk_pre_hook(mut self, hook: Box<dyn PreHook>) -> Self {
        self.risk_pre_hook = Some(hook);
        self
    }

    pub fn with_ml_advisory_hook(mut self, hook: Box<dyn PreHook>) -> Self {
        self.ml_advisory_hook = Some(hook);
        self
    }

    pub fn with_event_observer(mut self, observer: Box<dyn EventObserver>) -> Self {
        self.event_observer = Some(observer);
        self
    }

    pub fn with_backpressure(mut self, thresholds: BackpressureThresholds) -> Self {
        self.queue = Some(BoundedQueue::new(thresholds));
        self
    }

    /// Feed one event from an externally-supplied stream into the bounded
    /// queue. `Err` means the queue hit `MAX` — the caller must fail the
    /// run with `ended_reason="queue_overflow"` and disconnect upstream.
    pub fn ingest_external_event(&mut self, event: Event) -> std::result::Result<FlowSignal, Event> {
        match self.queue.as_mut() {
            Some(queue) => queue.try_push(event),
            None => Ok(FlowSignal::None),
        }
    }

    /// Pop and dispatch the oldest queued event, if any.
    pub fn drain_one(&mut self) -> Result<Option<(DispatchOutcome, FlowSignal)>> {
        let Some(queue) = self.queue.as_mut() else {
            return Ok(None);
        };
        let (event, signal) = queue.try_pop();
        match event {
            Some(event) => {
                let outcome = self.dispatch_event(event)?;
                Ok(Some((outcome, signal)))
            }
            None => Ok(None),
        }
    }

    pub fn queue_len(&self) -> usize {
        self.queue.as_ref().map(|q| q.len()).unwrap_or(0)
    }

    /// Force a terminal FAILED transition with the given `ended_reason`,
    /// e.g. `"queue_overflow"` after `ingest_external_event` rejects a push.
    pub fn fail(&mut self, reason: &str, now: u64) -> Result<()> {
        self.ended_reason = Some(reason.to_string());
        self.transition(LifecycleState::Failed, now)
    }

    pub fn lifecycle(&self) -> LifecycleState {
        self.lifecycle
    }

    pub fn event_index(&self) -> u64 {
        self.event_index
    }

    pub fn metrics(&self) -> &MetricsRegistry {
        &self.metrics
    }

    fn transition(&mut self, to: LifecycleState, now: u64) -> Result<()> {
        if !is_valid_transition(self.lifecycle, to) {
            return Err(ExecError::Lifecycle(format!(
                "invalid lifecycle transition {:?} -> {:?}",
                self.lifecycle, to
            )));
        }
        tracing::info!(from = ?self.lifecycle, to = ?to, "lifecycle transition");
        self.lifecycle = to;
        if to == LifecycleState::Running && self.started_at.is_none() {
            self.started_at = Some(now);
        }
        if to.is_terminal() && self.ended_at.is_none() {
            self.ended_at = Some(now);
        }
        Ok(())
    }

    /// Invoke the strategy's init callback and transition to READY.
    pub fn initialize(&mut self, now: u64) -> Result<()> {
        self.transition(LifecycleState::Initializing, now)?;
        let cursor = CursorInfo { ts_event: 0, seq: 0 };
        let mut ctx = with_ctx!(self, cursor);
        let result = self.strategy.init(&mut ctx);
        match result {
            Ok(()) => self.transition(LifecycleState::Ready, now),
            Err(message) => {
                self.ended_reason = Some("init_failed".into());
                self.transition(LifecycleState::Failed, now)?;
                Err(ExecError::Lifecycle(message))
            }
        }
    }

    /// READY -> RUNNING, required before the first `dispatch_event`.
    pub fn start(&mut self, now: u64) -> Result<()> {
        self.transition(LifecycleState::Running, now)
    }

    pub fn pause(&mut self, now: u64) -> Result<()> {
        self.transition(LifecycleState::Paused, now)?;
        self.paused = true;
        Ok(())
    }

    pub fn resume(&mut self, now: u64) -> Result<()> {
        self.transition(LifecycleState::Running, now)?;
        self.paused = false;
        Ok(())
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// The eight-step per-event dispatch algorithm.
    pub fn dispatch_event(&mut self, event: Event) -> Result<DispatchOutcome> {
        if self.paused {
            return Ok(DispatchOutcome::AwaitingResume);
        }

        // 1. Ordering guard.
        let tuple = event.ordering_tuple();
        self.guard.check(tuple)?;

        // 2. Cursor info.
        let cursor = CursorInfo::from_tuple(tuple);
        if self.first_ts_event.is_none() {
            self.first_ts_event = Some(cursor.ts_event);
        }
        self.last_cursor = Some(cursor);

        // 3. Optional pre-hooks (risk, ML advisory). Pure observers unless
        // they place orders through the context they're handed.
        if self.risk_pre_hook.is_some() {
            let mut ctx = with_ctx!(self, cursor);
            let mut hook = self.risk_pre_hook.take().unwrap();
            let result = hook.observe(&mut ctx, &event);
            self.risk_pre_hook = Some(hook);
            result.map_err(ExecError::Lifecycle)?;
        }
        if self.ml_advisory_hook.is_some() {
            let mut ctx = with_ctx!(self, cursor);
            let mut hook = self.ml_advisory_hook.take().unwrap();
            let result = hook.observe(&mut ctx, &event);
            self.ml_advisory_hook = Some(hook);
            result.map_err(ExecError::Lifecycle)?;
        }

        // 4. Strategy event callback, wrapped in error containment.
        let callback_result = {
            let mut ctx = with_ctx!(self, cursor);
            self.strategy.on_event(&mut ctx, &event)
        };
        let outcome = self
            .containment
            .contained(event.ts_event, event.seq, callback_result)
            .map_err(|e| {
                self.ended_reason = Some("error_limit_exceeded".into());
                e
            })?;

        // 5. Counters and metrics.
        self.event_index += 1;
        self.metrics.incr("events_total", 1);
        if matches!(outcome, ContainmentOutcome::Skipped | ContainmentOutcome::Quarantined) {
            self.metrics.incr("skipped_events_total", 1);
        }

        // 6. Guard already remembers `tuple` as previous internally.

        // 7. Event observer, errors swallowed.
        if let Some(observer) = self.event_observer.as_deref_mut() {
            let snapshot = self.state.snapshot(event.ts_event);
            if let Err(e) = observer.on_event(&event, self.event_index, self.decisions.len() as u64, &snapshot) {
                tracing::warn!(error = %e, "event observer failed, swallowing");
            }
        }

        Ok(DispatchOutcome::Continue)
    }

    /// Periodic checkpoint save, called by the driver when
    /// `checkpoint_interval` divides the current `event_index`.
    pub fn maybe_checkpoint(&self, storage: &dyn marketreplay_io::Storage, base_dir: &str, now: u64) -> Result<()> {
        if self.config.checkpoint_interval == 0 {
            return Ok(());
        }
        if self.event_index == 0 || self.event_index % self.config.checkpoint_interval != 0 {
            return Ok(());
        }
        let manager = CheckpointManager::new(storage, base_dir, &self.run_id);
        let checkpoint_id = format!("cp_{}", self.event_index);
        manager.save(&self.state, &checkpoint_id, self.event_index, now)
    }

    /// Kill: flush positions via synthetic market orders at the last
    /// observed `ts_event`, then finalize with `ended_reason="kill"`.
    pub fn kill<F>(&mut self, now: u64, mut flush: F) -> Result<()>
    where
        F: FnMut(&mut RuntimeContext) -> std::result::Result<(), String>,
    {
        let cursor = self.last_cursor.unwrap_or(CursorInfo { ts_event: 0, seq: 0 });
        {
            let mut ctx = with_ctx!(self, cursor);
            flush(&mut ctx).map_err(ExecError::Lifecycle)?;
        }
        self.ended_reason = Some("kill".into());
        self.transition(LifecycleState::Finalizing, now)?;
        self.transition(LifecycleState::Done, now)
    }

    /// Finalization: strategy finalize callback, final checkpoint (if a
    /// storage backend is supplied), archive, and Run Manifest computation.
    pub fn finalize(
        &mut self,
        now: u64,
        checkpoint: Option<(&dyn marketreplay_io::Storage, &str)>,
        replay_result: Option<crate::replay::ReplayResult>,
    ) -> Result<marketreplay_core::manifest::RunManifest> {
        self.transition(LifecycleState::Finalizing, now)?;

        let cursor = self.last_cursor.unwrap_or(CursorInfo { ts_event: 0, seq: 0 });
        let finalize_result = {
            let mut ctx = with_ctx!(self, cursor);
            self.strategy.finalize(&mut ctx)
        };
        if let Err(message) = finalize_result {
            self.ended_reason = Some("finalize_failed".into());
            self.transition(LifecycleState::Failed, now)?;
            return Err(ExecError::Lifecycle(message));
        }

        if let Some((storage, base_dir)) = checkpoint {
            let manager = CheckpointManager::new(storage, base_dir, &self.run_id);
            let checkpoint_id = format!("cp_final_{}", self.event_index);
            manager.save(&self.state, &checkpoint_id, self.event_index, now)?;
        }

        let manifest = self.compute_run_manifest(now, replay_result);

        if self.ended_reason.is_none() {
            self.ended_reason = Some("completed".into());
        }
        self.transition(LifecycleState::Done, now)?;

        Ok(manifest)
    }

    fn compute_run_manifest(
        &self,
        now: u64,
        replay_result: Option<crate::replay::ReplayResult>,
    ) -> marketreplay_core::manifest::RunManifest {
        let cursor_canonical = match self.last_cursor {
            Some(c) => Canonical::obj([
                ("ts_event", Canonical::BigInt(c.ts_event as u128)),
                ("seq", Canonical::BigInt(c.seq as u128)),
            ]),
            None => Canonical::Null,
        };
        let execution_state_canonical = Canonical::obj([
            ("fills_count", Canonical::UInt(self.fills.len() as u64)),
            ("decisions_count", Canonical::UInt(self.decisions.len() as u64)),
        ]);
        let strategy_state_canonical =
            marketreplay_core::canonical::json_to_canonical(&self.state.snapshot(now).state);

        let overall_state_hash = state_hash(
            &cursor_canonical,
            &execution_state_canonical,
            &strategy_state_canonical,
        );

        let normalized_fills: Vec<Canonical> = self.fills.iter().map(Fill::normalize).collect();
        let overall_fills_hash = fills_hash(&normalized_fills);

        let normalized_decisions: Vec<Canonical> =
            self.decisions.iter().map(DecisionRecord::to_canonical).collect();
        let overall_decision_hash = decision_hash(&normalized_decisions);

        let config_hash = hash_canonical(&self.config.to_canonical()).to_hex();

        let (stop_reason, emitted_event_count) = match replay_result {
            Some(r) => (r.stop_reason.label().to_string(), r.rows_emitted),
            None => ("END_OF_STREAM".to_string(), self.event_index),
        };

        marketreplay_core::manifest::RunManifest {
            run_id: self.run_id.clone(),
            started_at: self.started_at.unwrap_or(self.created_at),
            ended_at: self.ended_at.unwrap_or(now),
            ended_reason: self.ended_reason.clone().unwrap_or_default(),
            input: marketreplay_core::manifest::RunManifestInput {
                dataset: self.dataset_identity.clone(),
                config_hash,
            },
            output: marketreplay_core::manifest::RunManifestOutput {
                event_count: self.event_index,
                fills_count: self.fills.len() as u64,
                decision_count: self.decisions.len() as u64,
                decision_hash: overall_decision_hash.to_hex(),
                state_hash: overall_state_hash.to_hex(),
                fills_hash: overall_fills_hash.to_hex(),
                last_cursor: self.last_cursor.map(|c| c.encoded()),
            },
            replay: marketreplay_core::manifest::RunManifestReplay {
                replay_run_id: self.replay_run_id.clone(),
                first_ts_event: self.first_ts_event,
                last_ts_event: self.last_cursor.map(|c| c.ts_event),
                stop_reason,
                emitted_event_count,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marketreplay_core::config::{ErrorPolicy, OrderingMode as CoreOrderingMode};

    struct CountingStrategy {
        events_seen: u64,
    }

    impl Strategy for CountingStrategy {
        fn init(&mut self, _ctx: &mut RuntimeContext) -> std::result::Result<(), String> {
            Ok(())
        }

        fn on_event(&mut self, ctx: &mut RuntimeContext, _event: &Event) -> std::result::Result<(), String> {
            self.events_seen += 1;
            ctx.state.increment("event_count", 1.0);
            Ok(())
        }

        fn finalize(&mut self, _ctx: &mut RuntimeContext) -> std::result::Result<(), String> {
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

    fn test_config() -> EngineConfig {
        let mut cfg = EngineConfig::default();
        cfg.error_policy = ErrorPolicy::FailFast;
        cfg.ordering_mode = CoreOrderingMode::Strict;
        cfg
    }

    #[test]
    fn a_minimal_run_reaches_done_with_expected_counts() {
        let strategy = Box::new(CountingStrategy { events_seen: 0 });
        let mut rt = Runtime::new("run_1", "dataset_1", "strategy_1", 0, test_config(), strategy, 0);
        rt.initialize(0).unwrap();
        rt.start(0).unwrap();
        for event in ten_events() {
            rt.dispatch_event(event).unwrap();
        }
        let manifest = rt.finalize(100, None, None).unwrap();
        assert_eq!(manifest.output.event_count, 10);
        assert_eq!(manifest.output.decision_count, 0);
        assert_eq!(manifest.output.fills_count, 0);
        let expected_cursor = CursorInfo { ts_event: 10000, seq: 10 }.encoded();
        assert_eq!(manifest.output.last_cursor, Some(expected_cursor));
        assert_eq!(manifest.replay.first_ts_event, Some(1000));
        assert_eq!(manifest.replay.last_ts_event, Some(10000));
        assert_eq!(manifest.replay.stop_reason, "END_OF_STREAM");
        assert_eq!(manifest.replay.emitted_event_count, 10);
    }

    #[test]
    fn two_independent_runs_over_the_same_input_produce_equal_hashes() {
        let make_and_run = || {
            let strategy = Box::new(CountingStrategy { events_seen: 0 });
            let mut rt = Runtime::new("run_det", "dataset_1", "strategy_1", 0, test_config(), strategy, 0);
            rt.initialize(0).unwrap();
            rt.start(0).unwrap();
            for event in ten_events() {
                rt.dispatch_event(event).unwrap();
            }
            rt.finalize(100, None, None).unwrap()
        };
        let a = make_and_run();
        let b = make_and_run();
        assert_eq!(a.output.state_hash, b.output.state_hash);
        assert_eq!(a.output.fills_hash, b.output.fills_hash);
        assert_eq!(a.output.decision_hash, b.output.decision_hash);
        assert_eq!(a.replay.replay_run_id, b.replay.replay_run_id);
    }

    #[test]
    fn duplicate_event_under_strict_mode_fails_the_run() {
        let strategy = Box::new(CountingStrategy { events_seen: 0 });
        let mut rt = Runtime::new("run_2", "dataset_1", "strategy_1", 0, test_config(), strategy, 0);
        rt.initialize(0).unwrap();
        rt.start(0).unwrap();
        rt.dispatch_event(Event {
            ts_event: 1000,
            seq: 1,
            payload: serde_json::json!({}),
        })
        .unwrap();
        let err = rt
            .dispatch_event(Event {
                ts_event: 1000,
                seq: 1,
                payload: serde_json::json!({}),
            })
            .unwrap_err();
        assert!(matches!(err, ExecError::Core(_)));
    }

    #[test]
    fn pause_then_resume_allows_dispatch_to_continue() {
        let strategy = Box::new(CountingStrategy { events_seen: 0 });
        let mut rt = Runtime::new("run_3", "dataset_1", "strategy_1", 0, test_config(), strategy, 0);
        rt.initialize(0).unwrap();
        rt.start(0).unwrap();
        rt.pause(10).unwrap();
        let outcome = rt
            .dispatch_event(Event {
                ts_event: 1000,
                seq: 1,
                payload: serde_json::json!({}),
            })
            .unwrap();
        assert_eq!(outcome, DispatchOutcome::AwaitingResume);
        rt.resume(20).unwrap();
        let outcome = rt
            .dispatch_event(Event {
                ts_event: 1000,
                seq: 1,
                payload: serde_json::json!({}),
            })
            .unwrap();
        assert_eq!(outcome, DispatchOutcome::Continue);
    }
}
