//! Collaborator contracts for the chunked archive-scan orchestrator.
//!
//! The orchestrator core (`granary_session`) drives three external
//! collaborators it does not control: a planner that sizes the job, an
//! executor that performs the actual import work for one chunk at a time,
//! and a store-maintenance endpoint that can clear the destination store.
//! This crate defines those boundaries and nothing else - wire format and
//! transport are the collaborators' business.

pub mod defaults;
pub mod error;
pub mod traits;
pub mod types;

// Re-export types for convenience
pub use error::{ClearError, ExecutionError, PlanningError};
pub use traits::{ChunkExecutor, ChunkPlanner, StoreMaintenance};
pub use types::{ChunkOutcome, ChunkPlan, ChunkStats, ItemError, SessionStatus, SourceLocation};
