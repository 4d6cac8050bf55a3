//! Failure aggregation and rendering.
//!
//! Collects `error` events from the engine, enforces the maximum-error
//! bail-out threshold, and renders truncated stack traces in capture order.

use crate::config::MaxErrors;
use canopy_proto::{BlockPath, RawFailure, NO_BLOCK_LABEL};
use tracing::debug;

/// A normalized failure, immutable once captured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    /// Human-readable failure message.
    pub message: String,

    /// Stack lines, truncated from the top (most specific frame first).
    pub stack_lines: Vec<String>,

    /// Failing test name, when the engine attributed one.
    pub test_name: Option<String>,

    /// Block identity label, when the engine attributed one.
    pub block: Option<String>,
}

impl ErrorRecord {
    /// Formats this record as one error block: optional attribution header,
    /// then the truncated stack.
    fn render(&self) -> String {
        let mut lines = Vec::with_capacity(self.stack_lines.len() + 1);

        match (&self.block, &self.test_name) {
            (Some(block), Some(test)) => lines.push(format!("{block} - {test}")),
            (Some(block), None) => lines.push(block.clone()),
            (None, Some(test)) => lines.push(test.clone()),
            (None, None) => {}
        }

        lines.extend(self.stack_lines.iter().cloned());
        lines.join("\n")
    }
}

/// Accumulates failures for the lifetime of one run.
#[derive(Debug)]
pub struct FailureLog {
    records: Vec<ErrorRecord>,
    max_stack_lines: usize,
}

impl FailureLog {
    /// Creates a log that truncates stacks to at most `max_stack_lines`.
    pub fn new(max_stack_lines: usize) -> Self {
        Self {
            records: Vec::new(),
            max_stack_lines,
        }
    }

    /// Normalizes an engine failure into an [`ErrorRecord`] and stores it.
    ///
    /// The stack is truncated to the first `max_stack_lines` lines,
    /// preserving original order; with no stack available the message
    /// itself stands in.
    pub fn capture(&mut self, raw: &RawFailure) -> &ErrorRecord {
        let stack_lines: Vec<String> = match &raw.stack {
            Some(stack) => stack
                .lines()
                .take(self.max_stack_lines)
                .map(ToString::to_string)
                .collect(),
            None => vec![raw.message.clone()],
        };

        let block = raw.parents.as_deref().map(|parents| {
            BlockPath::from_parents(parents)
                .map(|path| path.to_string())
                .unwrap_or_else(|| NO_BLOCK_LABEL.to_string())
        });

        debug!(
            message = %raw.message,
            total = self.records.len() + 1,
            "Captured failure"
        );

        self.records.push(ErrorRecord {
            message: raw.message.clone(),
            stack_lines,
            test_name: raw.test.clone(),
            block,
        });
        self.records
            .last()
            .unwrap_or_else(|| unreachable!("record pushed above"))
    }

    /// Returns true once the captured count strictly exceeds the threshold.
    ///
    /// Reaching the threshold is a run-terminating policy signal, not an
    /// error in itself.
    pub fn should_bail_out(&self, max_errors: MaxErrors) -> bool {
        max_errors.exceeded_by(self.records.len())
    }

    /// Renders one formatted block per record, in capture order (FIFO).
    pub fn render(&self) -> Vec<String> {
        self.records.iter().map(ErrorRecord::render).collect()
    }

    /// Captured records, in capture order.
    pub fn records(&self) -> &[ErrorRecord] {
        &self.records
    }

    /// Number of captured failures.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if nothing has been captured.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
