//! Block identity derivation.
//!
//! The engine emits a flat, ordered stream of events with no parent/child
//! object references. The same logical block is reported through multiple
//! unrelated payload objects over time, so identity must be reconstructed
//! structurally from the ordered `parents` sequence. Two events belong to
//! the same block iff their `parents` sequences are element-wise equal.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator between path segments in the canonical identity string.
const SEPARATOR: &str = " > ";

/// Label used when an error cannot be attributed to any block.
pub const NO_BLOCK_LABEL: &str = "(no block)";

/// Canonical identity of a nested block.
///
/// The identity string doubles as the human-readable label: no separate
/// pretty-name is computed. Segment order matters; this is a path, not a set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockPath(String);

impl BlockPath {
    /// Derives an identity from an ordered list of ancestor names.
    ///
    /// Returns `None` for an empty sequence: such an event has no identity
    /// and must not be tracked, though it remains eligible for error
    /// reporting under [`NO_BLOCK_LABEL`].
    pub fn from_parents(parents: &[String]) -> Option<Self> {
        if parents.is_empty() {
            return None;
        }
        Some(Self(parents.join(SEPARATOR)))
    }

    /// Returns the identity as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlockPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
