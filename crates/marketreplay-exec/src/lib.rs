#![forbid(unsafe_code)]
//! Replay Engine, Strategy Runtime, safety collaborators, checkpointing,
//! metrics, and the run archive writer built on top of `marketreplay-core`
//! and `marketreplay-io`.

pub mod archive;
pub mod backpressure;
pub mod checkpoint;
pub mod error;
#[macro_use]
pub mod failpoints;
pub mod guard;
pub mod metrics;
pub mod replay;
pub mod runtime;
pub mod state;

pub use error::{ExecError, Result};
pub use runtime::{
    DispatchOutcome, EventObserver, ExecutionCollaborator, LifecycleState, OrderIntent, PreHook,
    RiskDecision, RiskValidator, RunManifest, Runtime, RuntimeContext, Strategy,
};
