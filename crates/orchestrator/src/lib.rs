//! # Palaver Orchestrator
//!
//! The end-to-end turn pipeline: given an incoming user message, persist
//! it, assemble bounded context from conversation memory, dispatch a
//! completion to the configured provider, optionally (and non-fatally)
//! augment the draft via an external tool server, persist the result,
//! update memory, and emit trace events.
//!
//! Turns on different conversations run fully in parallel. Within a turn,
//! steps are strictly sequential; only trace emission is fire-and-forget.

pub mod turn;

pub use turn::{TurnOrchestrator, TurnResult};
