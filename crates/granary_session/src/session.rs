//! Per-run session state: status, plan, cumulative statistics, and the
//! error ledger.
//!
//! A `ScanSession` is an owned value created for one run and consumed when
//! the run ends. The constructor establishes every invariant once; no code
//! path repairs partially-initialized state. All mutation happens through
//! the absorb/transition methods, which keep the counters monotonic and the
//! chunk index bounded.

use crate::classify::Classifier;
use crate::ledger::ErrorLedger;
use crate::report::{estimate_remaining, percent_complete, SessionReport, SessionSnapshot};
use chrono::{DateTime, Utc};
use granary_protocol::{ChunkOutcome, ChunkPlan, ChunkStats, ExecutionError, SessionStatus, SourceLocation};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, info};

/// State and aggregates for one scan run.
#[derive(Debug, Clone)]
pub struct ScanSession {
    source: SourceLocation,
    status: SessionStatus,
    plan: Option<ChunkPlan>,
    current_chunk_index: u64,
    cumulative_stats: ChunkStats,
    region_stats: BTreeMap<String, u64>,
    ledger: ErrorLedger,
    started_at: DateTime<Utc>,
    started_instant: Instant,
    destructive_reset_applied: bool,
    failure: Option<String>,
}

impl ScanSession {
    /// Create a fresh session for `source`. Status starts at `Idle`; all
    /// counters and the ledger start empty.
    pub fn new(source: SourceLocation, classifier: Classifier) -> Self {
        Self {
            source,
            status: SessionStatus::Idle,
            plan: None,
            current_chunk_index: 0,
            cumulative_stats: ChunkStats::default(),
            region_stats: BTreeMap::new(),
            ledger: ErrorLedger::new(classifier),
            started_at: Utc::now(),
            started_instant: Instant::now(),
            destructive_reset_applied: false,
            failure: None,
        }
    }

    fn transition(&mut self, to: SessionStatus) {
        info!(source = %self.source, from = %self.status, to = %to, "Session transition");
        self.status = to;
    }

    pub fn await_reset_confirmation(&mut self) {
        self.transition(SessionStatus::AwaitingResetConfirmation);
    }

    pub fn begin_clearing(&mut self) {
        self.transition(SessionStatus::ClearingStore);
    }

    pub fn begin_planning(&mut self) {
        self.transition(SessionStatus::Planning);
    }

    /// Enter `Running` with a freshly fetched plan. The plan is immutable
    /// from here on; the progress clock starts now.
    pub fn begin_running(&mut self, plan: ChunkPlan) {
        self.current_chunk_index = 0;
        self.started_at = Utc::now();
        self.started_instant = Instant::now();
        self.plan = Some(plan);
        self.transition(SessionStatus::Running);
    }

    pub fn mark_completed(&mut self) {
        self.transition(SessionStatus::Completed);
    }

    pub fn mark_cancelled(&mut self) {
        self.transition(SessionStatus::Cancelled);
    }

    pub fn mark_failed(&mut self, failure: String) {
        self.failure = Some(failure);
        self.transition(SessionStatus::Failed);
    }

    pub fn mark_reset_applied(&mut self) {
        self.destructive_reset_applied = true;
    }

    /// Merge a successful chunk response: stats and region counts add up,
    /// in-band errors are recorded, and the reported error count is
    /// reconciled against recorded detail before the index advances.
    pub fn absorb_outcome(&mut self, outcome: ChunkOutcome) {
        let chunk_index = self.current_chunk_index;
        self.cumulative_stats.merge(&outcome.stats);
        for (region, count) in &outcome.per_region_counts {
            *self.region_stats.entry(region.clone()).or_insert(0) += count;
        }
        for error in &outcome.errors {
            self.ledger.record(chunk_index, error);
        }
        self.ledger.reconcile(chunk_index, outcome.stats.errors);
        self.current_chunk_index += 1;
        debug!(
            source = %self.source,
            chunk = chunk_index,
            processed = self.cumulative_stats.processed,
            errors = self.cumulative_stats.errors,
            "Chunk absorbed"
        );
        debug_assert!(self.current_chunk_index <= self.total_chunks());
    }

    /// Absorb a chunk call that itself failed: one synthetic server-error
    /// record, error count up by one, and the index still advances. A failed
    /// chunk is never retried; forward progress wins over completeness.
    pub fn absorb_execution_error(&mut self, error: &ExecutionError) {
        let chunk_index = self.current_chunk_index;
        self.ledger.record_server_error(chunk_index, error);
        self.cumulative_stats.errors = self.cumulative_stats.errors.saturating_add(1);
        self.current_chunk_index += 1;
        debug_assert!(self.current_chunk_index <= self.total_chunks());
    }

    pub fn is_finished(&self) -> bool {
        self.current_chunk_index >= self.total_chunks()
    }

    pub fn total_chunks(&self) -> u64 {
        self.plan.as_ref().map(|p| p.total_chunks).unwrap_or(0)
    }

    pub fn source(&self) -> &SourceLocation {
        &self.source
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn plan(&self) -> Option<&ChunkPlan> {
        self.plan.as_ref()
    }

    pub fn current_chunk_index(&self) -> u64 {
        self.current_chunk_index
    }

    pub fn stats(&self) -> &ChunkStats {
        &self.cumulative_stats
    }

    pub fn region_stats(&self) -> &BTreeMap<String, u64> {
        &self.region_stats
    }

    pub fn ledger(&self) -> &ErrorLedger {
        &self.ledger
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn destructive_reset_applied(&self) -> bool {
        self.destructive_reset_applied
    }

    /// Read-only point-in-time view for progress polling.
    pub fn snapshot(&self) -> SessionSnapshot {
        let total_items = self.plan.as_ref().map(|p| p.total_items).unwrap_or(0);
        let elapsed = self.started_instant.elapsed();
        let eta = estimate_remaining(elapsed, self.cumulative_stats.processed, total_items);
        SessionSnapshot {
            status: self.status,
            source: Some(self.source.clone()),
            current_chunk_index: self.current_chunk_index,
            total_chunks: self.total_chunks(),
            total_items,
            stats: self.cumulative_stats,
            percent_complete: percent_complete(self.cumulative_stats.processed, total_items),
            elapsed_ms: elapsed.as_millis() as u64,
            eta_ms: eta.map(|d| d.as_millis() as u64),
            error_count: self.ledger.len() as u64,
        }
    }

    /// Consume the session into its final report. The structured error
    /// summary is attached only when the ledger is non-empty.
    pub fn into_report(self) -> SessionReport {
        let error_summary = if self.ledger.is_empty() {
            None
        } else {
            Some(self.ledger.summary())
        };
        SessionReport {
            source: self.source,
            status: self.status,
            stats: self.cumulative_stats,
            duration_ms: self.started_instant.elapsed().as_millis() as u64,
            per_region_totals: self.region_stats,
            error_summary,
            failure: self.failure,
            destructive_reset_applied: self.destructive_reset_applied,
        }
    }
}
