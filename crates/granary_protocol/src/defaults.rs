//! Canonical default values shared across the orchestrator and its callers.

use std::time::Duration;

/// Fixed number of source items per chunk. Bounds peak latency per round-trip
/// and keeps any single batch's memory footprint predictable.
pub const DEFAULT_CHUNK_SIZE: u32 = 10;

/// Cool-down between chunks after a successful response.
pub const SUCCESS_COOLDOWN: Duration = Duration::from_millis(500);

/// Cool-down after a chunk-level failure (longer back-off).
pub const FAILURE_COOLDOWN: Duration = Duration::from_millis(1000);

/// Region label used when an error report carries no region.
pub const UNKNOWN_REGION: &str = "unknown";

/// Region and category label for synthetic records created when the chunk
/// call itself fails (as opposed to in-band per-item errors).
pub const SERVER_ERROR_REGION: &str = "server error";

pub const CANCELLED_BY_USER_MESSAGE: &str = "Cancelled by user";
