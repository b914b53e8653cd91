//! Read-only derivations of session state: progress percentage, ETA,
//! duration formatting, and the final human-facing report.

use crate::ledger::ErrorSummary;
use granary_protocol::defaults::CANCELLED_BY_USER_MESSAGE;
use granary_protocol::{ChunkStats, SessionStatus, SourceLocation};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Whole percentage of items processed, clamped to 0..=100.
/// An empty plan reports 0%.
pub fn percent_complete(processed: u64, total_items: u64) -> u8 {
    if total_items == 0 {
        return 0;
    }
    let pct = (processed as f64 * 100.0 / total_items as f64).round();
    pct.clamp(0.0, 100.0) as u8
}

/// Remaining-time estimate from the average pace so far.
/// `None` until at least one item has been processed.
pub fn estimate_remaining(
    elapsed: Duration,
    processed: u64,
    total_items: u64,
) -> Option<Duration> {
    if processed == 0 {
        return None;
    }
    let remaining = total_items.saturating_sub(processed);
    let per_item = elapsed.as_secs_f64() / processed as f64;
    Some(Duration::from_secs_f64((per_item * remaining as f64).round()))
}

/// Render a duration at coarse human granularity: seconds under a minute,
/// minutes (plus leftover seconds) under an hour, hours (plus leftover
/// minutes) beyond that.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        let minutes = secs / 60;
        let rem = secs % 60;
        if rem == 0 {
            format!("{}m", minutes)
        } else {
            format!("{}m {}s", minutes, rem)
        }
    } else {
        let hours = secs / 3600;
        let rem_minutes = (secs % 3600) / 60;
        if rem_minutes == 0 {
            format!("{}h", hours)
        } else {
            format!("{}h {}m", hours, rem_minutes)
        }
    }
}

/// Point-in-time view of a session, safe to hand to a polling caller.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub source: Option<SourceLocation>,
    pub current_chunk_index: u64,
    pub total_chunks: u64,
    pub total_items: u64,
    pub stats: ChunkStats,
    pub percent_complete: u8,
    pub elapsed_ms: u64,
    pub eta_ms: Option<u64>,
    pub error_count: u64,
}

impl SessionSnapshot {
    /// Snapshot for the no-session state.
    pub fn idle() -> Self {
        Self {
            status: SessionStatus::Idle,
            source: None,
            current_chunk_index: 0,
            total_chunks: 0,
            total_items: 0,
            stats: ChunkStats::default(),
            percent_complete: 0,
            elapsed_ms: 0,
            eta_ms: None,
            error_count: 0,
        }
    }

    /// ETA for display; the estimate is undefined until progress exists.
    pub fn eta_display(&self) -> String {
        match self.eta_ms {
            Some(ms) => format_duration(Duration::from_millis(ms)),
            None => "calculating…".to_string(),
        }
    }
}

/// What the caller should do once a session ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionAction {
    /// Clean completion with zero errors: refresh the record listing
    AutoRefresh,
    /// Errors were accumulated (or the run did not complete cleanly):
    /// surface the report and wait for explicit acknowledgement
    RequireAcknowledgement,
}

/// Final report for one session run.
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub source: SourceLocation,
    pub status: SessionStatus,
    pub stats: ChunkStats,
    pub duration_ms: u64,
    pub per_region_totals: BTreeMap<String, u64>,
    /// Present only when the ledger is non-empty
    pub error_summary: Option<ErrorSummary>,
    /// Underlying planning/clear failure, verbatim
    pub failure: Option<String>,
    pub destructive_reset_applied: bool,
}

impl SessionReport {
    pub fn completion_action(&self) -> CompletionAction {
        if self.status == SessionStatus::Completed && self.error_summary.is_none() {
            CompletionAction::AutoRefresh
        } else {
            CompletionAction::RequireAcknowledgement
        }
    }
}

impl fmt::Display for SessionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Scan of '{}': {}", self.source, self.status)?;
        writeln!(
            f,
            "  imported {}, skipped {}, errors {}, processed {} in {}",
            self.stats.imported,
            self.stats.skipped,
            self.stats.errors,
            self.stats.processed,
            format_duration(Duration::from_millis(self.duration_ms)),
        )?;
        if let Some(failure) = &self.failure {
            writeln!(f, "  failure: {}", failure)?;
        }
        if self.status == SessionStatus::Cancelled {
            writeln!(f, "  {}", CANCELLED_BY_USER_MESSAGE)?;
        }
        if !self.per_region_totals.is_empty() {
            writeln!(f, "  by region:")?;
            for (region, count) in &self.per_region_totals {
                writeln!(f, "    {}: {}", region, count)?;
            }
        }
        if let Some(summary) = &self.error_summary {
            writeln!(f, "  errors by category:")?;
            for (category, count) in &summary.by_category {
                writeln!(f, "    {}: {}", category, count)?;
            }
            writeln!(f, "  errors by region:")?;
            for (region, count) in &summary.by_region {
                writeln!(f, "    {}: {}", region, count)?;
            }
            writeln!(f, "  error detail:")?;
            for record in &summary.records {
                writeln!(
                    f,
                    "    [{}] {} ({}): {}",
                    record.category, record.source_item, record.region, record.message
                )?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_complete_rounds_and_clamps() {
        assert_eq!(percent_complete(0, 25), 0);
        assert_eq!(percent_complete(10, 25), 40);
        assert_eq!(percent_complete(1, 3), 33);
        assert_eq!(percent_complete(2, 3), 67);
        assert_eq!(percent_complete(25, 25), 100);
        // Over-reporting executor: clamp, never exceed 100
        assert_eq!(percent_complete(30, 25), 100);
    }

    #[test]
    fn test_percent_complete_empty_plan() {
        assert_eq!(percent_complete(0, 0), 0);
    }

    #[test]
    fn test_estimate_remaining_undefined_without_progress() {
        assert_eq!(estimate_remaining(Duration::from_secs(10), 0, 100), None);
    }

    #[test]
    fn test_estimate_remaining_uses_average_pace() {
        // 10 items in 20s -> 2s/item -> 90 remaining -> 180s
        let eta = estimate_remaining(Duration::from_secs(20), 10, 100).unwrap();
        assert_eq!(eta.as_secs(), 180);

        // Done: zero remaining
        let eta = estimate_remaining(Duration::from_secs(20), 100, 100).unwrap();
        assert_eq!(eta.as_secs(), 0);
    }

    #[test]
    fn test_format_duration_boundaries() {
        assert_eq!(format_duration(Duration::from_secs(0)), "0s");
        assert_eq!(format_duration(Duration::from_secs(59)), "59s");
        assert_eq!(format_duration(Duration::from_secs(60)), "1m");
        assert_eq!(format_duration(Duration::from_secs(61)), "1m 1s");
        assert_eq!(format_duration(Duration::from_secs(3599)), "59m 59s");
        assert_eq!(format_duration(Duration::from_secs(3600)), "1h");
        assert_eq!(format_duration(Duration::from_secs(3660)), "1h 1m");
        assert_eq!(format_duration(Duration::from_secs(7345)), "2h 2m");
    }

    #[test]
    fn test_snapshot_eta_display() {
        let mut snapshot = SessionSnapshot::idle();
        assert_eq!(snapshot.eta_display(), "calculating…");
        snapshot.eta_ms = Some(90_000);
        assert_eq!(snapshot.eta_display(), "1m 30s");
    }
}
