//! Scripted trait implementations for exercising the session machinery
//! without a real backend.
//!
//! `ScriptedExecutor` replays a fixed sequence of chunk results and records
//! every call it receives, so tests can assert both what happened and in
//! what order. `StaticPlanner` and `MockStore` are the matching doubles for
//! the other two seams.

use async_trait::async_trait;
use granary_protocol::{
    ChunkExecutor, ChunkOutcome, ChunkPlan, ChunkPlanner, ChunkStats, ClearError, ExecutionError,
    PlanningError, SourceLocation, StoreMaintenance,
};
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Outcome with aggregate counts only and no per-item detail.
/// `processed` is the sum of the three counts.
pub fn outcome_with_counts(imported: u64, skipped: u64, errors: u64) -> ChunkOutcome {
    ChunkOutcome {
        stats: ChunkStats {
            imported,
            skipped,
            errors,
            processed: imported + skipped + errors,
        },
        errors: Vec::new(),
        per_region_counts: BTreeMap::new(),
    }
}

/// Planner returning a fixed plan (or a fixed failure) for every source.
pub struct StaticPlanner {
    result: Result<ChunkPlan, PlanningError>,
}

impl StaticPlanner {
    pub fn new(plan: ChunkPlan) -> Self {
        Self { result: Ok(plan) }
    }

    pub fn failing(error: PlanningError) -> Self {
        Self { result: Err(error) }
    }

    /// Plan for `total_items` items in default-free chunks of `chunk_size`.
    pub fn for_items(total_items: u64, chunk_size: u32) -> Self {
        let plan = ChunkPlan::new(total_items, chunk_size, BTreeMap::new(), 0)
            .unwrap_or_else(|e| panic!("invalid test plan: {e}"));
        Self::new(plan)
    }
}

#[async_trait]
impl ChunkPlanner for StaticPlanner {
    async fn plan_scan(&self, _source: &SourceLocation) -> Result<ChunkPlan, PlanningError> {
        self.result.clone()
    }
}

/// Executor that replays a scripted result per call, in order, recording
/// the chunk index of every call. Exhausting the script yields an
/// `Unhandled` error so a miscounting test fails loudly.
pub struct ScriptedExecutor {
    script: Mutex<VecDeque<Result<ChunkOutcome, ExecutionError>>>,
    recorded: Mutex<Vec<u64>>,
    delay: Option<Duration>,
}

impl ScriptedExecutor {
    pub fn new(script: Vec<Result<ChunkOutcome, ExecutionError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            recorded: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Sleep this long inside every call, to widen cancellation windows.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Chunk indices received so far, in call order.
    pub fn recorded_indices(&self) -> Vec<u64> {
        self.recorded
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.recorded_indices().len()
    }
}

#[async_trait]
impl ChunkExecutor for ScriptedExecutor {
    async fn execute_chunk(
        &self,
        _source: &SourceLocation,
        chunk_index: u64,
        _chunk_size: u32,
    ) -> Result<ChunkOutcome, ExecutionError> {
        self.recorded
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(chunk_index);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = self
            .script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front();
        match next {
            Some(result) => result,
            None => Err(ExecutionError::Unhandled(format!(
                "scripted executor exhausted at chunk {chunk_index}"
            ))),
        }
    }
}

/// Store double that counts clear calls and can be told to fail.
pub struct MockStore {
    fail_with: Option<String>,
    clear_calls: AtomicU64,
}

impl MockStore {
    pub fn new() -> Self {
        Self {
            fail_with: None,
            clear_calls: AtomicU64::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            clear_calls: AtomicU64::new(0),
        }
    }

    pub fn clear_calls(&self) -> u64 {
        self.clear_calls.load(Ordering::SeqCst)
    }
}

impl Default for MockStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StoreMaintenance for MockStore {
    async fn clear_store(&self) -> Result<(), ClearError> {
        self.clear_calls.fetch_add(1, Ordering::SeqCst);
        match &self.fail_with {
            Some(message) => Err(ClearError::Backend(message.clone())),
            None => Ok(()),
        }
    }
}
