//! # canopy-core
//!
//! Core orchestration for the canopy test runner: run configuration, the
//! engine boundary, block tracking, failure aggregation, hook execution,
//! console reporting, and the run controller that ties them together.
//!
//! The execution engine itself is an external collaborator reached through
//! the [`Engine`] trait; everything here consumes its ordered event stream.

mod config;
mod controller;
mod engine;
mod failures;
mod hooks;
mod reporter;
pub mod testing;
mod tracker;

pub use config::{ConfigError, MaxErrors, RunConfig};
pub use controller::{RunController, RunError, RunOutcome, RunPhase, RunReport};
pub use engine::{Engine, EngineError, JsonlEngine};
pub use failures::{ErrorRecord, FailureLog};
pub use hooks::{
    run_hooks, Hook, HookCompletion, HookDone, HookFailure, HookKind, HookSet, HookSource,
};
pub use reporter::Reporter;
pub use tracker::{BlockTracker, BlockTrackerRegistry};
