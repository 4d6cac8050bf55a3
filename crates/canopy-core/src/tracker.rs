//! Block tracker registry.
//!
//! Maps a block identity to its mutable timing/reporting state. Entries are
//! created lazily on first observation and never deleted during a run; they
//! persist for reporting at `end`.

use canopy_proto::{BlockEvent, BlockKind, BlockPath};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::warn;

/// Per-identity mutable record, owned exclusively by the registry.
#[derive(Debug)]
pub struct BlockTracker {
    /// Canonical identity, also the human-readable label.
    pub path: BlockPath,

    /// Block flavor captured at creation time.
    pub kind: BlockKind,

    /// Leaf test name captured at creation time, when present.
    pub test_name: Option<String>,

    /// When this block's `before` started, for duration reporting.
    pub before_started_at: Option<Instant>,

    /// When this block's `after` started, for duration reporting.
    pub after_started_at: Option<Instant>,
}

impl BlockTracker {
    fn from_event(path: BlockPath, event: &BlockEvent) -> Self {
        Self {
            path,
            kind: event.kind,
            test_name: event.test.clone(),
            before_started_at: None,
            after_started_at: None,
        }
    }
}

/// Registry of block trackers, keyed by structural identity.
#[derive(Debug, Default)]
pub struct BlockTrackerRegistry {
    trackers: HashMap<BlockPath, BlockTracker>,
}

impl BlockTrackerRegistry {
    /// Creates a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up the tracker for an event, creating it on first observation.
    ///
    /// Returns the tracker and whether it was newly created; `is_new` is how
    /// the reporter decides to emit a "block started" header (a block
    /// change). Returns `None` for events with an empty `parents` sequence,
    /// which have no identity and are not tracked.
    pub fn resolve(&mut self, event: &BlockEvent) -> Option<(&BlockTracker, bool)> {
        let path = BlockPath::from_parents(&event.parents)?;
        let is_new = !self.trackers.contains_key(&path);
        let tracker = self
            .trackers
            .entry(path.clone())
            .or_insert_with(|| BlockTracker::from_event(path, event));
        Some((&*tracker, is_new))
    }

    /// Records when a block's `before` started.
    ///
    /// The tracker must already exist (created via [`Self::resolve`]);
    /// a miss is a caller bug, logged and ignored rather than crashing.
    pub fn record_before_start(&mut self, path: &BlockPath, at: Instant) {
        match self.trackers.get_mut(path) {
            Some(tracker) => tracker.before_started_at = Some(at),
            None => warn!(block = %path, "record_before_start for unknown block"),
        }
    }

    /// Records when a block's `after` started.
    pub fn record_after_start(&mut self, path: &BlockPath, at: Instant) {
        match self.trackers.get_mut(path) {
            Some(tracker) => tracker.after_started_at = Some(at),
            None => warn!(block = %path, "record_after_start for unknown block"),
        }
    }

    /// Elapsed time since the block's `before` started, for duration lines.
    ///
    /// `None` when the start time was never recorded; the reporter renders
    /// that as an unknown duration instead of crashing.
    pub fn elapsed_since_before_start(&self, path: &BlockPath, now: Instant) -> Option<Duration> {
        self.trackers
            .get(path)?
            .before_started_at
            .map(|started| now.saturating_duration_since(started))
    }

    /// Elapsed time since the block's `after` started.
    pub fn elapsed_since_after_start(&self, path: &BlockPath, now: Instant) -> Option<Duration> {
        self.trackers
            .get(path)?
            .after_started_at
            .map(|started| now.saturating_duration_since(started))
    }

    /// Gets a tracker by identity.
    pub fn get(&self, path: &BlockPath) -> Option<&BlockTracker> {
        self.trackers.get(path)
    }

    /// Returns the number of distinct identities observed.
    pub fn len(&self) -> usize {
        self.trackers.len()
    }

    /// Returns true if no identities have been observed.
    pub fn is_empty(&self) -> bool {
        self.trackers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(parents: &[&str], kind: BlockKind) -> BlockEvent {
        BlockEvent::new(parents.iter().map(ToString::to_string).collect(), kind)
    }

    #[test]
    fn test_one_entry_per_distinct_path() {
        let mut registry = BlockTrackerRegistry::new();

        let (_, is_new) = registry
            .resolve(&event(&["suite", "inner"], BlockKind::Before))
            .unwrap();
        assert!(is_new);

        // Same parents via a structurally equal but unrelated payload.
        let (_, is_new) = registry
            .resolve(&event(&["suite", "inner"], BlockKind::Before))
            .unwrap();
        assert!(!is_new);

        let (_, is_new) = registry
            .resolve(&event(&["suite", "other"], BlockKind::Before))
            .unwrap();
        assert!(is_new);

        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_creation_captures_kind_and_test() {
        let mut registry = BlockTrackerRegistry::new();
        let first = event(&["suite"], BlockKind::Test).with_test("adds");
        let (tracker, _) = registry.resolve(&first).unwrap();
        assert_eq!(tracker.kind, BlockKind::Test);
        assert_eq!(tracker.test_name.as_deref(), Some("adds"));

        // Later events for the same identity do not overwrite creation fields.
        let later = event(&["suite"], BlockKind::After);
        let (tracker, is_new) = registry.resolve(&later).unwrap();
        assert!(!is_new);
        assert_eq!(tracker.kind, BlockKind::Test);
    }

    #[test]
    fn test_empty_parents_not_tracked() {
        let mut registry = BlockTrackerRegistry::new();
        assert!(registry.resolve(&event(&[], BlockKind::Test)).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_before_elapsed() {
        let mut registry = BlockTrackerRegistry::new();
        let ev = event(&["suite"], BlockKind::Before);
        registry.resolve(&ev).unwrap();
        let path = BlockPath::from_parents(&ev.parents).unwrap();

        let start = Instant::now();
        registry.record_before_start(&path, start);

        let elapsed = registry
            .elapsed_since_before_start(&path, start + Duration::from_millis(42))
            .unwrap();
        assert_eq!(elapsed, Duration::from_millis(42));
    }

    #[test]
    fn test_elapsed_unknown_when_never_recorded() {
        let mut registry = BlockTrackerRegistry::new();
        let ev = event(&["suite"], BlockKind::After);
        registry.resolve(&ev).unwrap();
        let path = BlockPath::from_parents(&ev.parents).unwrap();

        assert!(registry
            .elapsed_since_after_start(&path, Instant::now())
            .is_none());
    }

    #[test]
    fn test_record_for_unknown_block_does_not_crash() {
        let mut registry = BlockTrackerRegistry::new();
        let path = BlockPath::from_parents(&["ghost".to_string()]).unwrap();
        registry.record_before_start(&path, Instant::now());
        assert!(registry.is_empty());
    }
}
