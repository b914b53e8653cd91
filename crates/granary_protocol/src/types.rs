//! Boundary payload types shared by the orchestrator and its collaborators.

use crate::error::PlanningError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Canonical Enums (used across all crates)
// ============================================================================

/// Scan session lifecycle status.
/// This is the CANONICAL definition - use this everywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    /// No session in progress
    #[default]
    Idle,
    /// A destructive reset is required and the user has not yet answered
    AwaitingResetConfirmation,
    /// Clearing the destination store before the scan
    ClearingStore,
    /// Fetching the chunk plan from the planner
    Planning,
    /// Dispatching chunks sequentially
    Running,
    /// Cancellation observed; no further chunks dispatched
    Cancelled,
    /// All chunks absorbed
    Completed,
    /// Planning or store clear failed; no recovery for this session
    Failed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Idle => "IDLE",
            SessionStatus::AwaitingResetConfirmation => "AWAITING_RESET_CONFIRMATION",
            SessionStatus::ClearingStore => "CLEARING_STORE",
            SessionStatus::Planning => "PLANNING",
            SessionStatus::Running => "RUNNING",
            SessionStatus::Cancelled => "CANCELLED",
            SessionStatus::Completed => "COMPLETED",
            SessionStatus::Failed => "FAILED",
        }
    }

    /// Terminal states never transition again; a new run builds a fresh session.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionStatus::Cancelled | SessionStatus::Completed | SessionStatus::Failed
        )
    }

    /// A session in an active state blocks the start of a new one.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            SessionStatus::AwaitingResetConfirmation
                | SessionStatus::ClearingStore
                | SessionStatus::Planning
                | SessionStatus::Running
        )
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "IDLE" => Ok(SessionStatus::Idle),
            "AWAITING_RESET_CONFIRMATION" => Ok(SessionStatus::AwaitingResetConfirmation),
            "CLEARING_STORE" => Ok(SessionStatus::ClearingStore),
            "PLANNING" => Ok(SessionStatus::Planning),
            "RUNNING" => Ok(SessionStatus::Running),
            "CANCELLED" => Ok(SessionStatus::Cancelled),
            "COMPLETED" => Ok(SessionStatus::Completed),
            "FAILED" => Ok(SessionStatus::Failed),
            _ => Err(format!("Invalid session status: '{}'", s)),
        }
    }
}

// ============================================================================
// Source identity
// ============================================================================

/// Identifier of what is being scanned (an archive root, a collection id,
/// a remote location - opaque to the orchestrator).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceLocation(String);

impl SourceLocation {
    pub fn new<S: Into<String>>(location: S) -> Self {
        Self(location.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SourceLocation {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ============================================================================
// Chunk plan & per-chunk payloads
// ============================================================================

/// Immutable plan returned once by the planner; never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkPlan {
    /// Total number of source items to import
    pub total_items: u64,
    /// Fixed number of items per chunk
    pub chunk_size: u32,
    /// Number of chunks required to cover all items
    pub total_chunks: u64,
    /// Expected item counts keyed by region
    pub per_region_counts: BTreeMap<String, u64>,
    /// Planner's duration estimate for the whole run
    pub estimated_duration_ms: u64,
}

impl ChunkPlan {
    /// Build a plan, deriving `total_chunks` from the item count.
    pub fn new(
        total_items: u64,
        chunk_size: u32,
        per_region_counts: BTreeMap<String, u64>,
        estimated_duration_ms: u64,
    ) -> Result<Self, PlanningError> {
        if chunk_size == 0 {
            return Err(PlanningError::InvalidPlan(
                "chunk_size must be nonzero".to_string(),
            ));
        }
        let total_chunks = total_items.div_ceil(chunk_size as u64);
        Ok(Self {
            total_items,
            chunk_size,
            total_chunks,
            per_region_counts,
            estimated_duration_ms,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.total_items == 0
    }
}

/// Cumulative or per-chunk import statistics. All counters are additive and
/// non-negative; merging is plain saturating addition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChunkStats {
    pub imported: u64,
    pub skipped: u64,
    pub errors: u64,
    pub processed: u64,
}

impl ChunkStats {
    pub fn merge(&mut self, other: &ChunkStats) {
        self.imported = self.imported.saturating_add(other.imported);
        self.skipped = self.skipped.saturating_add(other.skipped);
        self.errors = self.errors.saturating_add(other.errors);
        self.processed = self.processed.saturating_add(other.processed);
    }
}

/// In-band per-item failure reported inside an otherwise-successful chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemError {
    pub message: String,
    /// File or item identifier; the ledger synthesizes a placeholder when absent
    pub source_item: Option<String>,
    pub region: Option<String>,
}

impl ItemError {
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self {
            message: message.into(),
            source_item: None,
            region: None,
        }
    }

    pub fn with_source_item<S: Into<String>>(mut self, source_item: S) -> Self {
        self.source_item = Some(source_item.into());
        self
    }

    pub fn with_region<S: Into<String>>(mut self, region: S) -> Self {
        self.region = Some(region.into());
        self
    }
}

/// Everything the executor reports for one chunk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkOutcome {
    pub stats: ChunkStats,
    /// Detailed per-item failures; may undercount `stats.errors`, the ledger
    /// reconciles the difference with placeholder records
    pub errors: Vec<ItemError>,
    pub per_region_counts: BTreeMap<String, u64>,
}
