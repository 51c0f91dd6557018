//! Fire-and-forget observability for the Palaver pipeline.
//!
//! Trace events are write-only: the pipeline emits them and never reads
//! them back. Sink failures must never affect a turn's outcome — the
//! orchestrator swallows them; sinks themselves should also stay cheap and
//! non-blocking.

pub mod model;
pub mod sink;

pub use model::{TraceEvent, TraceKind};
pub use sink::{InMemorySink, NoopSink, TraceError, TraceSink};
