//! Error taxonomy for the collaborator boundaries.
//!
//! `PlanningError` and `ClearError` abort a session entirely; an
//! `ExecutionError` covers a single chunk only and the session moves on.
//! In-band per-item failures are not errors at this level - they travel
//! inside a successful `ChunkOutcome`.

use thiserror::Error;

/// Planner failure - the source location is invalid or unreadable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanningError {
    #[error("Invalid source location: {0}")]
    InvalidLocation(String),

    #[error("Source location unreadable: {0}")]
    Unreadable(String),

    #[error("Invalid plan: {0}")]
    InvalidPlan(String),
}

/// Chunk-level transport or unhandled failure. Distinct from the in-band
/// per-item errors a chunk may report while otherwise succeeding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Chunk execution timed out: {0}")]
    Timeout(String),

    #[error("Unhandled executor failure: {0}")]
    Unhandled(String),
}

/// Destination store clear failure. The store is left in whatever state the
/// failed clear returned - not assumed empty.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClearError {
    #[error("Store backend error: {0}")]
    Backend(String),

    #[error("Clear operation denied: {0}")]
    Denied(String),
}
