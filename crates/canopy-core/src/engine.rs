//! Engine boundary.
//!
//! The test-execution engine is an external collaborator: it accepts the
//! run configuration, executes nested blocks, and emits a linear stream of
//! lifecycle events. The orchestrator only sees that stream.

use crate::config::RunConfig;
use async_trait::async_trait;
use canopy_proto::EngineEvent;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{debug, warn};

/// Errors starting or reading from an engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine failed to start: {0}")]
    Start(String),

    #[error("engine I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A test-execution engine.
///
/// `start` hands over the run configuration and returns the ordered event
/// stream. Dropping the receiver stops consumption but cannot cancel
/// engine-internal work already in flight.
#[async_trait]
pub trait Engine: Send {
    async fn start(&mut self, config: &RunConfig) -> Result<UnboundedReceiver<EngineEvent>, EngineError>;
}

/// Engine adapter that reads lifecycle events as JSONL from any async
/// source (stdin, a file, a pipe from the real engine process).
///
/// Malformed lines are logged and skipped; a framing error in one event
/// never aborts the run.
pub struct JsonlEngine<R> {
    input: Option<R>,
}

impl<R> JsonlEngine<R> {
    /// Creates an adapter over the given event source.
    pub fn new(input: R) -> Self {
        Self { input: Some(input) }
    }
}

#[async_trait]
impl<R> Engine for JsonlEngine<R>
where
    R: AsyncRead + Send + Unpin + 'static,
{
    async fn start(&mut self, _config: &RunConfig) -> Result<UnboundedReceiver<EngineEvent>, EngineError> {
        let input = self
            .input
            .take()
            .ok_or_else(|| EngineError::Start("event stream already consumed".to_string()))?;

        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let mut lines = BufReader::new(input).lines();
            let mut line_number = 0u64;

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        line_number += 1;
                        if line.trim().is_empty() {
                            continue;
                        }
                        match serde_json::from_str::<EngineEvent>(&line) {
                            Ok(event) => {
                                if tx.send(event).is_err() {
                                    // Receiver dropped: the run bailed out.
                                    debug!(line_number, "Event receiver gone, stopping reader");
                                    break;
                                }
                            }
                            Err(error) => {
                                warn!(line_number, %error, "Malformed event line, skipping");
                            }
                        }
                    }
                    Ok(None) => break,
                    Err(error) => {
                        warn!(%error, "Event stream read error");
                        break;
                    }
                }
            }
        });

        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canopy_proto::{BlockKind, RawFailure};

    async fn collect(input: &'static str) -> Vec<EngineEvent> {
        let mut engine = JsonlEngine::new(input.as_bytes());
        let mut rx = engine.start(&RunConfig::default()).await.unwrap();
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_reads_events_in_order() {
        let input = concat!(
            r#"{"event":"blockStart","data":{"parents":["suite"],"type":"before"}}"#,
            "\n",
            r#"{"event":"blockComplete","data":{"parents":["suite"],"type":"before"}}"#,
            "\n",
            r#"{"event":"end"}"#,
            "\n",
        );
        let events = collect(input).await;

        assert_eq!(events.len(), 3);
        assert!(matches!(&events[0], EngineEvent::BlockStart(b) if b.kind == BlockKind::Before));
        assert!(matches!(&events[1], EngineEvent::BlockComplete(_)));
        assert_eq!(events[2], EngineEvent::End);
    }

    #[tokio::test]
    async fn test_malformed_lines_skipped() {
        let input = concat!(
            r#"{"event":"error","data":{"message":"boom"}}"#,
            "\n",
            "{not json}\n",
            "\n",
            r#"{"event":"end"}"#,
            "\n",
        );
        let events = collect(input).await;

        assert_eq!(events.len(), 2);
        assert_eq!(
            events[0],
            EngineEvent::Error(RawFailure::new("boom"))
        );
        assert_eq!(events[1], EngineEvent::End);
    }

    #[tokio::test]
    async fn test_second_start_rejected() {
        let mut engine = JsonlEngine::new("".as_bytes());
        let _ = engine.start(&RunConfig::default()).await.unwrap();
        assert!(matches!(
            engine.start(&RunConfig::default()).await,
            Err(EngineError::Start(_))
        ));
    }
}
