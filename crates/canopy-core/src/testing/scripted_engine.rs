//! Engine double that replays a pre-scripted event sequence.

use crate::config::RunConfig;
use crate::engine::{Engine, EngineError};
use async_trait::async_trait;
use canopy_proto::EngineEvent;
use tokio::sync::mpsc::{self, UnboundedReceiver};

/// Replays a fixed event script, in order, then closes the stream.
///
/// Lets scenario tests drive the controller through any lifecycle shape
/// without parsing or I/O.
pub struct ScriptedEngine {
    events: Vec<EngineEvent>,
    started: bool,
}

impl ScriptedEngine {
    /// Creates an engine that will emit `events` in order.
    pub fn new(events: Vec<EngineEvent>) -> Self {
        Self {
            events,
            started: false,
        }
    }

    /// True once `start` has been called.
    pub fn started(&self) -> bool {
        self.started
    }
}

#[async_trait]
impl Engine for ScriptedEngine {
    async fn start(
        &mut self,
        _config: &RunConfig,
    ) -> Result<UnboundedReceiver<EngineEvent>, EngineError> {
        self.started = true;
        let (tx, rx) = mpsc::unbounded_channel();
        for event in self.events.drain(..) {
            // A full buffer is impossible on an unbounded channel; a send
            // error only means the receiver is already gone.
            let _ = tx.send(event);
        }
        Ok(rx)
    }
}
