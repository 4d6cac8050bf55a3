//! Run orchestration.
//!
//! The controller composes the hook orchestrator, tracker registry,
//! failure log, and reporter into the run state machine:
//! `Idle → SettingUp → Executing → TearingDown → Reporting → Terminated`.
//!
//! All mutable run state lives in one controller instance constructed fresh
//! per run; its own event handlers are the only mutators, and events are
//! processed strictly in emission order.

use crate::config::RunConfig;
use crate::engine::{Engine, EngineError};
use crate::failures::FailureLog;
use crate::hooks::{run_hooks, HookCompletion, HookFailure, HookSet};
use crate::reporter::Reporter;
use crate::tracker::BlockTrackerRegistry;
use canopy_proto::{BlockEvent, BlockKind, BlockPath, EngineEvent, NO_BLOCK_LABEL};
use std::io::Write;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Current phase of the run state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    SettingUp,
    Executing,
    TearingDown,
    Reporting,
    Terminated,
}

/// Why the run terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every test passed and every hook succeeded.
    Passed,
    /// One or more failures were captured during execution.
    TestFailures,
    /// The captured-error count exceeded the configured threshold.
    BailedOut,
    /// A setup hook failed; the engine was never started.
    SetupFailed,
    /// A teardown hook failed after the run.
    TeardownFailed,
}

impl RunOutcome {
    /// Process exit status for this outcome.
    pub fn exit_code(self) -> i32 {
        match self {
            RunOutcome::Passed => 0,
            RunOutcome::TestFailures
            | RunOutcome::BailedOut
            | RunOutcome::SetupFailed
            | RunOutcome::TeardownFailed => 1,
        }
    }

    /// Short reason string for log lines.
    pub fn as_str(self) -> &'static str {
        match self {
            RunOutcome::Passed => "passed",
            RunOutcome::TestFailures => "test_failures",
            RunOutcome::BailedOut => "bailed_out",
            RunOutcome::SetupFailed => "setup_failed",
            RunOutcome::TeardownFailed => "teardown_failed",
        }
    }
}

/// Final report of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub tests_ran: usize,
    pub errors_reported: usize,
}

impl RunReport {
    /// Process exit status: 0 iff the run passed cleanly.
    pub fn exit_code(&self) -> i32 {
        self.outcome.exit_code()
    }
}

/// Errors that prevent the run machinery itself from operating.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("report output error: {0}")]
    Io(#[from] std::io::Error),
}

/// Top-level run orchestrator.
pub struct RunController<E, W: Write> {
    config: RunConfig,
    engine: E,
    hooks: HookSet,
    trackers: BlockTrackerRegistry,
    failures: FailureLog,
    reporter: Reporter<W>,
    phase: RunPhase,
    tests_ran: usize,
}

impl<E: Engine, W: Write> RunController<E, W> {
    /// Creates a controller for one run. All state is instance-local, so
    /// independent runs can coexist in-process.
    pub fn new(config: RunConfig, engine: E, hooks: HookSet, out: W) -> Self {
        let failures = FailureLog::new(config.max_stack_lines);
        let reporter = Reporter::new(out, config.verbose, config.quiet);
        Self {
            config,
            engine,
            hooks,
            trackers: BlockTrackerRegistry::new(),
            failures,
            reporter,
            phase: RunPhase::Idle,
            tests_ran: 0,
        }
    }

    /// Current state-machine phase.
    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// Drives the run to completion: setup hooks, engine execution,
    /// teardown hooks, final report.
    pub async fn run(mut self) -> Result<RunReport, RunError> {
        let timeout = self.config.timeout();

        self.phase = RunPhase::SettingUp;
        let setup = self.hooks.take_setup();
        debug!(hooks = setup.len(), "Running setup hooks");
        match run_hooks(setup, timeout).await {
            Ok(completions) => self.buffer_completions(&completions),
            Err(failure) => {
                // Nothing was set up, so teardown is skipped on this path.
                return self.terminate(RunOutcome::SetupFailed, vec![failure.to_string()]);
            }
        }

        self.phase = RunPhase::Executing;
        let mut events = self.engine.start(&self.config).await?;
        info!(
            pattern = self.config.pattern.as_deref().unwrap_or("*"),
            "Engine started"
        );

        let mut bailed_out = false;
        while let Some(event) = events.recv().await {
            match event {
                EngineEvent::Error(raw) => {
                    self.failures.capture(&raw);
                    if self.failures.should_bail_out(self.config.max_errors) {
                        warn!(
                            captured = self.failures.len(),
                            "Error threshold exceeded, bailing out"
                        );
                        bailed_out = true;
                        break;
                    }
                }
                EngineEvent::BlockStart(block) => self.handle_block_start(&block)?,
                EngineEvent::BlockComplete(block) => self.handle_block_complete(&block)?,
                EngineEvent::End => break,
            }
        }
        // Stop consuming; any engine-internal work still in flight is not
        // cancelled, only ignored.
        drop(events);

        // Teardown is always attempted, including after bail-out: hooks may
        // hold external resources such as listening sockets.
        self.phase = RunPhase::TearingDown;
        let teardown = self.hooks.take_teardown();
        debug!(hooks = teardown.len(), "Running teardown hooks");
        let teardown_failure: Option<HookFailure> = match run_hooks(teardown, timeout).await {
            Ok(completions) => {
                self.buffer_completions(&completions);
                None
            }
            Err(failure) => Some(failure),
        };

        let outcome = if bailed_out {
            RunOutcome::BailedOut
        } else if teardown_failure.is_some() {
            RunOutcome::TeardownFailed
        } else if self.failures.is_empty() {
            RunOutcome::Passed
        } else {
            RunOutcome::TestFailures
        };

        let extra = teardown_failure
            .map(|failure| vec![failure.to_string()])
            .unwrap_or_default();
        self.terminate(outcome, extra)
    }

    /// Buffers one report line per completed hook.
    fn buffer_completions(&mut self, completions: &[HookCompletion]) {
        for completion in completions {
            self.reporter
                .hook_completed(completion.kind, &completion.source, completion.elapsed);
        }
    }

    /// Renders the final report and seals the state machine.
    fn terminate(
        mut self,
        outcome: RunOutcome,
        extra_blocks: Vec<String>,
    ) -> Result<RunReport, RunError> {
        self.phase = RunPhase::Reporting;

        let mut blocks = self.failures.render();
        blocks.extend(extra_blocks);
        self.reporter.finish(
            &blocks,
            self.tests_ran,
            self.failures.len(),
            outcome == RunOutcome::BailedOut,
        )?;

        self.phase = RunPhase::Terminated;
        let report = RunReport {
            outcome,
            tests_ran: self.tests_ran,
            errors_reported: self.failures.len(),
        };
        info!(
            outcome = outcome.as_str(),
            tests_ran = report.tests_ran,
            errors = report.errors_reported,
            exit_code = report.exit_code(),
            "Run terminated"
        );
        Ok(report)
    }

    fn handle_block_start(&mut self, block: &BlockEvent) -> std::io::Result<()> {
        let now = Instant::now();
        let Some(path) = self.observe(block)? else {
            return Ok(());
        };

        match block.kind {
            BlockKind::Before => self.trackers.record_before_start(&path, now),
            BlockKind::After => self.trackers.record_after_start(&path, now),
            BlockKind::Test | BlockKind::PendingTest | BlockKind::Describe => {}
        }
        Ok(())
    }

    fn handle_block_complete(&mut self, block: &BlockEvent) -> std::io::Result<()> {
        let now = Instant::now();
        let path = self.observe(block)?;

        match block.kind {
            BlockKind::Test => self.tests_ran += 1,
            BlockKind::PendingTest => {
                let label = path
                    .as_ref()
                    .map_or(NO_BLOCK_LABEL, BlockPath::as_str)
                    .to_string();
                self.reporter.pending_test(&label, block.test.as_deref());
            }
            BlockKind::Before => {
                if let Some(path) = &path {
                    let elapsed = self.trackers.elapsed_since_before_start(path, now);
                    self.reporter.hook_duration(path.as_str(), "before", elapsed)?;
                }
            }
            BlockKind::After => {
                if let Some(path) = &path {
                    let elapsed = self.trackers.elapsed_since_after_start(path, now);
                    self.reporter.hook_duration(path.as_str(), "after", elapsed)?;
                }
            }
            BlockKind::Describe => {}
        }
        Ok(())
    }

    /// Resolves the tracker for an event, emitting a block header on first
    /// observation. Returns the identity, or `None` for untrackable events.
    fn observe(&mut self, block: &BlockEvent) -> std::io::Result<Option<BlockPath>> {
        let Some((tracker, is_new)) = self.trackers.resolve(block) else {
            debug!("Block event with empty parents, not tracked");
            return Ok(None);
        };
        let path = tracker.path.clone();
        if is_new {
            debug!(block = %path, "Block change");
            self.reporter.block_changed(tracker)?;
        }
        Ok(Some(path))
    }
}
