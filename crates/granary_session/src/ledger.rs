//! Append-only ledger of classified import errors.
//!
//! The ledger is owned by a session and lives exactly as long as it. Every
//! recorded error is immutable once appended. Chunk-level reported error
//! counts and detailed error entries can disagree (an executor may report
//! `errors: 3` with no detail at all); `reconcile` closes that gap with
//! placeholder records so the displayed count is never understated.

use crate::classify::{Classifier, ErrorCategory};
use chrono::{DateTime, Utc};
use granary_protocol::defaults::{SERVER_ERROR_REGION, UNKNOWN_REGION};
use granary_protocol::{ExecutionError, ItemError};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::warn;

/// One classified error. Immutable once created.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    pub timestamp: DateTime<Utc>,
    pub source_item: String,
    pub message: String,
    pub category: ErrorCategory,
    pub region: String,
    pub chunk_index: u64,
}

/// Structured view of the ledger for the final report.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorSummary {
    pub by_category: BTreeMap<ErrorCategory, u64>,
    pub by_region: BTreeMap<String, u64>,
    pub records: Vec<ErrorRecord>,
}

/// Append-only error collection with category and region counters.
///
/// Invariant: `sum(by_category) == sum(by_region) == records.len()`.
#[derive(Debug, Clone)]
pub struct ErrorLedger {
    classifier: Classifier,
    records: Vec<ErrorRecord>,
    category_counts: BTreeMap<ErrorCategory, u64>,
    region_counts: BTreeMap<String, u64>,
    /// Detail records seen per chunk, for reconciliation
    chunk_counts: BTreeMap<u64, u64>,
}

impl ErrorLedger {
    pub fn new(classifier: Classifier) -> Self {
        Self {
            classifier,
            records: Vec::new(),
            category_counts: BTreeMap::new(),
            region_counts: BTreeMap::new(),
            chunk_counts: BTreeMap::new(),
        }
    }

    /// Record one in-band item error. Never fails: missing or malformed
    /// fields are replaced with placeholders rather than losing the report.
    pub fn record(&mut self, chunk_index: u64, error: &ItemError) {
        let message = if error.message.trim().is_empty() {
            warn!(chunk = chunk_index, "Item error arrived without a message");
            "(no message supplied)".to_string()
        } else {
            error.message.clone()
        };
        let source_item = error
            .source_item
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| format!("chunk {} (unidentified item)", chunk_index));
        let region = error
            .region
            .clone()
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_REGION.to_string());
        let category = self.classifier.classify(&message);
        self.append(ErrorRecord {
            timestamp: Utc::now(),
            source_item,
            message,
            category,
            region,
            chunk_index,
        });
    }

    /// Record the synthetic entry for a chunk call that itself failed.
    /// Tagged with the dedicated server-error category and region.
    pub fn record_server_error(&mut self, chunk_index: u64, error: &ExecutionError) {
        self.append(ErrorRecord {
            timestamp: Utc::now(),
            source_item: format!("chunk {}", chunk_index),
            message: error.to_string(),
            category: ErrorCategory::ServerError,
            region: SERVER_ERROR_REGION.to_string(),
            chunk_index,
        });
    }

    /// Close the gap between a chunk's reported error count and the detail
    /// entries actually recorded for it, by synthesizing placeholder records.
    /// Returns the number of placeholders created.
    pub fn reconcile(&mut self, chunk_index: u64, reported: u64) -> u64 {
        let recorded = self.chunk_counts.get(&chunk_index).copied().unwrap_or(0);
        if reported <= recorded {
            return 0;
        }
        let missing = reported - recorded;
        warn!(
            chunk = chunk_index,
            reported,
            recorded,
            "Chunk under-reported error detail; synthesizing placeholders"
        );
        for i in recorded..reported {
            self.append(ErrorRecord {
                timestamp: Utc::now(),
                source_item: format!("chunk {} item {}", chunk_index, i + 1),
                message: "Error reported without detail".to_string(),
                category: ErrorCategory::General,
                region: UNKNOWN_REGION.to_string(),
                chunk_index,
            });
        }
        missing
    }

    fn append(&mut self, record: ErrorRecord) {
        *self.category_counts.entry(record.category).or_insert(0) += 1;
        *self.region_counts.entry(record.region.clone()).or_insert(0) += 1;
        *self.chunk_counts.entry(record.chunk_index).or_insert(0) += 1;
        self.records.push(record);
    }

    pub fn records(&self) -> &[ErrorRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records_for_chunk(&self, chunk_index: u64) -> u64 {
        self.chunk_counts.get(&chunk_index).copied().unwrap_or(0)
    }

    pub fn category_counts(&self) -> &BTreeMap<ErrorCategory, u64> {
        &self.category_counts
    }

    pub fn region_counts(&self) -> &BTreeMap<String, u64> {
        &self.region_counts
    }

    pub fn summary(&self) -> ErrorSummary {
        ErrorSummary {
            by_category: self.category_counts.clone(),
            by_region: self.region_counts.clone(),
            records: self.records.clone(),
        }
    }
}
