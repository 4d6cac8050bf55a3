//! Engine lifecycle events.
//!
//! The test-execution engine emits a linear stream of lifecycle events as it
//! executes nested blocks. The wire format is a tagged JSON object per event:
//!
//! ```text
//! {"event":"blockStart","data":{"parents":["suite"],"type":"before"}}
//! {"event":"error","data":{"message":"expected 2 to equal 3","stack":"..."}}
//! {"event":"end"}
//! ```

use serde::{Deserialize, Serialize};

/// Which tracker field a block event touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockKind {
    #[serde(rename = "before")]
    Before,
    #[serde(rename = "after")]
    After,
    #[serde(rename = "test")]
    Test,
    #[serde(rename = "pendingTest")]
    PendingTest,
    #[serde(rename = "describe")]
    Describe,
}

/// A block lifecycle payload carried by `blockStart`/`blockComplete`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockEvent {
    /// Ordered nesting path from the run root to this block.
    pub parents: Vec<String>,

    /// The block flavor.
    #[serde(rename = "type")]
    pub kind: BlockKind,

    /// Leaf test name, present only on `test`/`pendingTest` events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test: Option<String>,
}

impl BlockEvent {
    /// Creates a block event for the given path and kind.
    pub fn new(parents: Vec<String>, kind: BlockKind) -> Self {
        Self {
            parents,
            kind,
            test: None,
        }
    }

    /// Attaches the leaf test name.
    pub fn with_test(mut self, test: impl Into<String>) -> Self {
        self.test = Some(test.into());
        self
    }
}

/// An error-like value surfaced by the engine on test or assertion failure.
///
/// Engines differ in how much context they attach; every field except the
/// message is optional on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFailure {
    /// Human-readable failure message.
    pub message: String,

    /// Multi-line stack trace, most specific frame first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,

    /// Name of the failing test, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test: Option<String>,

    /// Nesting path of the block the failure occurred in, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parents: Option<Vec<String>>,
}

impl RawFailure {
    /// Creates a bare failure with only a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack: None,
            test: None,
            parents: None,
        }
    }

    /// Attaches a stack trace.
    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// Attaches the failing test name.
    pub fn with_test(mut self, test: impl Into<String>) -> Self {
        self.test = Some(test.into());
        self
    }

    /// Attaches the block nesting path.
    pub fn with_parents(mut self, parents: Vec<String>) -> Self {
        self.parents = Some(parents);
        self
    }
}

/// A lifecycle event consumed by the run orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum EngineEvent {
    /// A test or assertion failure.
    #[serde(rename = "error")]
    Error(RawFailure),

    /// A `before`/`after`/`test` block has begun.
    #[serde(rename = "blockStart")]
    BlockStart(BlockEvent),

    /// A block has finished successfully.
    #[serde(rename = "blockComplete")]
    BlockComplete(BlockEvent),

    /// The engine has finished all scheduled blocks.
    #[serde(rename = "end")]
    End,
}
