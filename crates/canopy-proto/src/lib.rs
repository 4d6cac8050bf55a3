//! # canopy-proto
//!
//! Shared types and error definitions for the Canopy test-run reporter.
//!
//! This crate provides the foundational abstractions used across all Canopy
//! crates, including:
//! - The engine event wire contract (`EngineEvent`, `BlockEvent`, `BlockKind`)
//! - Block identity derivation from ancestor-name paths (`BlockPath`)
//! - The raw failure payload emitted by engines (`RawFailure`)

mod block_path;
mod event;

pub use block_path::{BlockPath, NO_BLOCK_LABEL};
pub use event::{BlockEvent, BlockKind, EngineEvent, RawFailure};
