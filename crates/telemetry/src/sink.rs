//! Trace sinks.

use crate::model::{TraceEvent, TraceKind};
use std::sync::RwLock;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum TraceError {
    #[error("Trace sink failure: {0}")]
    Sink(String),
}

/// Where trace events go. Implementations must be cheap and non-blocking;
/// anything slow belongs behind an internal buffer.
pub trait TraceSink: Send + Sync {
    fn record(&self, event: TraceEvent) -> Result<(), TraceError>;
}

/// Discards everything — telemetry disabled.
pub struct NoopSink;

impl TraceSink for NoopSink {
    fn record(&self, _event: TraceEvent) -> Result<(), TraceError> {
        Ok(())
    }
}

/// Buffers events in memory. Used by tests and local diagnostics.
pub struct InMemorySink {
    events: RwLock<Vec<TraceEvent>>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self {
            events: RwLock::new(Vec::new()),
        }
    }

    /// All recorded events, in emission order.
    pub fn events(&self) -> Vec<TraceEvent> {
        self.events.read().unwrap().clone()
    }

    /// Events of one kind, in emission order.
    pub fn events_of(&self, kind: TraceKind) -> Vec<TraceEvent> {
        self.events
            .read()
            .unwrap()
            .iter()
            .filter(|e| e.kind == kind)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl TraceSink for InMemorySink {
    fn record(&self, event: TraceEvent) -> Result<(), TraceError> {
        self.events.write().unwrap().push(event);
        Ok(())
    }
}
