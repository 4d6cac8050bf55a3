//! Setup/teardown hook orchestration.
//!
//! Hooks run strictly sequentially, each racing its completion signal
//! against a per-hook timeout. The completion signal is single-shot: the
//! first settlement wins and anything after it (a late callback after a
//! timeout, a callback after a synchronous error) is ignored without
//! panicking or double-counting.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Whether a hook runs before or after the engine run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    Setup,
    Teardown,
}

impl HookKind {
    /// Lowercase name used in log lines and error messages.
    pub fn as_str(self) -> &'static str {
        match self {
            HookKind::Setup => "setup",
            HookKind::Teardown => "teardown",
        }
    }
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a hook failed, terminating the current phase.
///
/// `Display` and `Error` are implemented by hand: thiserror would treat
/// the `source` field (the hook's module name, a `String`) as the error's
/// cause, which it is not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookFailure {
    /// The hook signaled failure or errored synchronously.
    Failed {
        kind: HookKind,
        source: String,
        message: String,
    },

    /// The hook did not signal completion within its budget.
    TimedOut {
        kind: HookKind,
        source: String,
        budget_ms: u64,
    },
}

impl fmt::Display for HookFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookFailure::Failed {
                kind,
                source,
                message,
            } => write!(f, "{kind} hook `{source}` failed: {message}"),
            HookFailure::TimedOut {
                kind,
                source,
                budget_ms,
            } => write!(f, "{kind} hook `{source}` timed out after {budget_ms}ms"),
        }
    }
}

impl std::error::Error for HookFailure {}

/// Record of one successfully completed hook, kept for the final report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookCompletion {
    pub kind: HookKind,
    pub source: String,
    pub elapsed: Duration,
}

/// Single-shot completion signal handed to a hook.
///
/// Calling [`HookDone::ok`] settles success, [`HookDone::fail`] settles
/// failure with a cause. Only the first call has any effect; the signal may
/// be cloned into spawned tasks freely.
#[derive(Clone)]
pub struct HookDone {
    tx: Arc<Mutex<Option<oneshot::Sender<Result<(), String>>>>>,
}

impl HookDone {
    fn channel() -> (Self, oneshot::Receiver<Result<(), String>>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                tx: Arc::new(Mutex::new(Some(tx))),
            },
            rx,
        )
    }

    /// Signals successful completion.
    pub fn ok(&self) {
        self.settle(Ok(()));
    }

    /// Signals failure with the causing error.
    pub fn fail(&self, cause: impl Into<String>) {
        self.settle(Err(cause.into()));
    }

    fn settle(&self, result: Result<(), String>) {
        if let Ok(mut guard) = self.tx.lock() {
            if let Some(tx) = guard.take() {
                // The receiver may already be gone (timeout won the race);
                // a failed send is the ignored-late-settlement case.
                let _ = tx.send(result);
            }
        }
    }
}

type HookFn = Box<dyn FnOnce(HookDone) -> Result<(), String> + Send>;

/// One setup or teardown routine with its timeout budget.
///
/// The hook body receives a [`HookDone`] and either settles it (possibly
/// from a spawned task, after async work) or returns `Err` for a
/// synchronous failure, which the orchestrator settles through the same
/// single-shot path.
pub struct Hook {
    pub kind: HookKind,
    pub source: String,
    pub timeout: Option<Duration>,
    run: HookFn,
}

impl Hook {
    /// Creates a hook named after its source module.
    pub fn new<F>(kind: HookKind, source: impl Into<String>, run: F) -> Self
    where
        F: FnOnce(HookDone) -> Result<(), String> + Send + 'static,
    {
        Self {
            kind,
            source: source.into(),
            timeout: None,
            run: Box::new(run),
        }
    }

    /// Overrides the global timeout for this hook only.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hook")
            .field("kind", &self.kind)
            .field("source", &self.source)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Ordered setup and teardown registries; execution order is registration
/// order (discovery order), never concurrent.
#[derive(Debug, Default)]
pub struct HookSet {
    setup: Vec<Hook>,
    teardown: Vec<Hook>,
}

impl HookSet {
    /// Creates an empty hook set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a setup hook.
    pub fn register_setup(&mut self, hook: Hook) {
        debug!(source = %hook.source, "Registered setup hook");
        self.setup.push(hook);
    }

    /// Appends a teardown hook.
    pub fn register_teardown(&mut self, hook: Hook) {
        debug!(source = %hook.source, "Registered teardown hook");
        self.teardown.push(hook);
    }

    /// Takes the setup hooks for execution, in registration order.
    pub fn take_setup(&mut self) -> Vec<Hook> {
        std::mem::take(&mut self.setup)
    }

    /// Takes the teardown hooks for execution, in registration order.
    pub fn take_teardown(&mut self) -> Vec<Hook> {
        std::mem::take(&mut self.teardown)
    }

    /// Number of registered setup hooks.
    pub fn setup_len(&self) -> usize {
        self.setup.len()
    }

    /// Number of registered teardown hooks.
    pub fn teardown_len(&self) -> usize {
        self.teardown.len()
    }
}

/// A source of hook modules, hiding how they are found or parsed.
///
/// Filesystem discovery and dynamic loading live behind this seam; the
/// orchestrator only ever sees the resulting ordered hooks.
pub trait HookSource {
    /// Loads the hooks this source provides, in discovery order.
    fn load(&self) -> Result<HookSet, String>;
}

/// Runs hooks strictly sequentially, stopping at the first failure.
///
/// Each hook must finish (success or failure) before the next begins.
/// `global_timeout` bounds any hook that carries no timeout of its own.
/// On success, returns one [`HookCompletion`] per hook, in execution order.
pub async fn run_hooks(
    hooks: Vec<Hook>,
    global_timeout: Duration,
) -> Result<Vec<HookCompletion>, HookFailure> {
    let mut completions = Vec::with_capacity(hooks.len());
    for hook in hooks {
        completions.push(run_hook(hook, global_timeout).await?);
    }
    Ok(completions)
}

async fn run_hook(hook: Hook, global_timeout: Duration) -> Result<HookCompletion, HookFailure> {
    let Hook {
        kind,
        source,
        timeout,
        run,
    } = hook;
    let budget = timeout.unwrap_or(global_timeout);
    let budget_ms = budget.as_millis() as u64;

    debug!(kind = %kind, source = %source, budget_ms, "Running hook");

    let started = Instant::now();
    let (done, settled) = HookDone::channel();

    // A synchronous error settles through the same one-shot path, so a
    // stray later callback from the hook is ignored like any other late
    // settlement.
    if let Err(cause) = run(done.clone()) {
        done.fail(cause);
    }

    match tokio::time::timeout(budget, settled).await {
        Ok(Ok(Ok(()))) => {
            debug!(kind = %kind, source = %source, "Hook completed");
            Ok(HookCompletion {
                kind,
                source,
                elapsed: started.elapsed(),
            })
        }
        Ok(Ok(Err(message))) => {
            warn!(kind = %kind, source = %source, error = %message, "Hook failed");
            Err(HookFailure::Failed {
                kind,
                source,
                message,
            })
        }
        Ok(Err(_)) => {
            // Every clone of the completion signal was dropped unsettled.
            warn!(kind = %kind, source = %source, "Hook dropped its completion signal");
            Err(HookFailure::Failed {
                kind,
                source,
                message: "hook dropped its completion signal without settling".to_string(),
            })
        }
        Err(_) => {
            warn!(kind = %kind, source = %source, budget_ms, "Hook timed out");
            Err(HookFailure::TimedOut {
                kind,
                source,
                budget_ms,
            })
        }
    }
}
