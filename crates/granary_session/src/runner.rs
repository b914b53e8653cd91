//! Sequential chunk dispatch.
//!
//! The runner owns the session for the duration of the run and drives the
//! chunk loop: at most one chunk call is in flight at any time, and chunk
//! `i` is fully absorbed before chunk `i + 1` is dispatched. Cancellation
//! is checked at scheduling points only; an in-flight call is always
//! allowed to finish and its response is absorbed normally.

use crate::cancel::CancelToken;
use crate::report::SessionSnapshot;
use crate::session::ScanSession;
use granary_protocol::defaults::{FAILURE_COOLDOWN, SUCCESS_COOLDOWN};
use granary_protocol::ChunkExecutor;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

/// Inter-chunk pacing. The pauses keep the executor from being hammered
/// and give a failed backend room to recover before the next call.
#[derive(Debug, Clone, Copy)]
pub struct DispatchTiming {
    pub success_cooldown: Duration,
    pub failure_cooldown: Duration,
}

impl Default for DispatchTiming {
    fn default() -> Self {
        Self {
            success_cooldown: SUCCESS_COOLDOWN,
            failure_cooldown: FAILURE_COOLDOWN,
        }
    }
}

impl DispatchTiming {
    /// Zero pacing, for tests that drive the loop to completion quickly.
    pub fn immediate() -> Self {
        Self {
            success_cooldown: Duration::ZERO,
            failure_cooldown: Duration::ZERO,
        }
    }
}

/// Drive a `Running` session to a terminal status against `executor`.
///
/// Returns the session in `Completed` or `Cancelled` status. Chunk-level
/// failures are absorbed into the ledger and never abort the run.
pub async fn drive<E: ChunkExecutor>(
    mut session: ScanSession,
    executor: &E,
    timing: DispatchTiming,
    cancel: CancelToken,
    snapshot_tx: &watch::Sender<SessionSnapshot>,
) -> ScanSession {
    loop {
        if cancel.is_cancelled() {
            info!(source = %session.source(), "Cancellation observed; stopping dispatch");
            session.mark_cancelled();
            break;
        }
        if session.is_finished() {
            session.mark_completed();
            break;
        }

        let chunk_index = session.current_chunk_index();
        let chunk_size = session.plan().map(|p| p.chunk_size).unwrap_or(0);
        let cooldown = match executor
            .execute_chunk(session.source(), chunk_index, chunk_size)
            .await
        {
            Ok(outcome) => {
                session.absorb_outcome(outcome);
                timing.success_cooldown
            }
            Err(error) => {
                warn!(
                    source = %session.source(),
                    chunk = chunk_index,
                    %error,
                    "Chunk call failed; recording and moving on"
                );
                session.absorb_execution_error(&error);
                timing.failure_cooldown
            }
        };

        let _ = snapshot_tx.send(session.snapshot());

        // No pause after the last chunk or once cancellation is pending.
        if session.is_finished() || cancel.is_cancelled() {
            continue;
        }
        tokio::time::sleep(cooldown).await;
    }

    let _ = snapshot_tx.send(session.snapshot());
    session
}
