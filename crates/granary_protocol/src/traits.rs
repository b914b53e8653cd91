//! Abstract operations the orchestrator consumes.
//!
//! Implementations live outside this workspace (an HTTP worker, a local
//! import service, a scripted mock in tests). The orchestrator guarantees
//! `execute_chunk` is never called concurrently: there is at most one
//! in-flight chunk request per session, by construction.

use crate::error::{ClearError, ExecutionError, PlanningError};
use crate::types::{ChunkOutcome, ChunkPlan, SourceLocation};
use async_trait::async_trait;
use std::sync::Arc;

/// Sizes the job before any chunk is dispatched.
#[async_trait]
pub trait ChunkPlanner: Send + Sync {
    /// Count the source items and produce the chunking plan.
    async fn plan_scan(&self, source: &SourceLocation) -> Result<ChunkPlan, PlanningError>;
}

/// Performs the actual import work for a single chunk.
///
/// Timeouts are the executor's responsibility: a non-responding backend must
/// eventually surface as an `ExecutionError`, never as an infinite block.
#[async_trait]
pub trait ChunkExecutor: Send + Sync {
    async fn execute_chunk(
        &self,
        source: &SourceLocation,
        chunk_index: u64,
        chunk_size: u32,
    ) -> Result<ChunkOutcome, ExecutionError>;
}

/// Destructive maintenance on the destination store.
#[async_trait]
pub trait StoreMaintenance: Send + Sync {
    /// Remove all existing destination records. Only invoked after explicit
    /// user confirmation (see the reset gate in `granary_session`).
    async fn clear_store(&self) -> Result<(), ClearError>;
}

// Shared handles delegate, so a caller can keep a reference to a
// collaborator after handing it to the orchestrator.

#[async_trait]
impl<T: ChunkPlanner + ?Sized> ChunkPlanner for Arc<T> {
    async fn plan_scan(&self, source: &SourceLocation) -> Result<ChunkPlan, PlanningError> {
        (**self).plan_scan(source).await
    }
}

#[async_trait]
impl<T: ChunkExecutor + ?Sized> ChunkExecutor for Arc<T> {
    async fn execute_chunk(
        &self,
        source: &SourceLocation,
        chunk_index: u64,
        chunk_size: u32,
    ) -> Result<ChunkOutcome, ExecutionError> {
        (**self).execute_chunk(source, chunk_index, chunk_size).await
    }
}

#[async_trait]
impl<T: StoreMaintenance + ?Sized> StoreMaintenance for Arc<T> {
    async fn clear_store(&self) -> Result<(), ClearError> {
        (**self).clear_store().await
    }
}
