//! Session lifecycle control.
//!
//! `ScanController` is the single entry point callers use: it enforces the
//! one-active-session rule, gates the destructive store reset behind an
//! explicit confirmation round-trip, runs planning, and hands a `Running`
//! session to the dispatch runner on a spawned task. Progress is published
//! through a watch channel so polling never touches the owned session.

use crate::cancel::CancelToken;
use crate::classify::Classifier;
use crate::report::{SessionReport, SessionSnapshot};
use crate::runner::{self, DispatchTiming};
use crate::session::ScanSession;
use granary_protocol::{
    ChunkExecutor, ChunkPlanner, ClearError, PlanningError, SourceLocation, StoreMaintenance,
};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("A scan session is already active")]
    AlreadyActive,

    #[error("No reset confirmation is pending")]
    NoPendingReset,

    #[error("No scan session is active")]
    NotActive,

    #[error(transparent)]
    Planning(#[from] PlanningError),

    #[error(transparent)]
    Clear(#[from] ClearError),

    #[error("Session task failed: {0}")]
    Internal(String),
}

/// Confirmation request handed back when a start asks for a store reset.
/// Nothing destructive has happened yet when the caller sees this.
#[derive(Debug, Clone)]
pub struct ResetPrompt {
    pub source: SourceLocation,
    pub message: String,
}

impl ResetPrompt {
    fn new(source: &SourceLocation) -> Self {
        Self {
            source: source.clone(),
            message: format!(
                "Scanning '{}' with reset will permanently remove all previously \
                 imported records before the scan starts. Confirm to proceed.",
                source
            ),
        }
    }
}

/// Result of a start request.
#[derive(Debug)]
pub enum StartOutcome {
    /// Planning succeeded and chunk dispatch is underway
    Started,
    /// A destructive reset was requested; the caller must confirm or decline
    AwaitingResetConfirmation(ResetPrompt),
}

enum ControllerState {
    Idle,
    AwaitingReset {
        session: ScanSession,
        prompt: ResetPrompt,
    },
    Active {
        handle: JoinHandle<ScanSession>,
        snapshot_rx: watch::Receiver<SessionSnapshot>,
        cancel: CancelToken,
    },
    Finished(ScanSession),
}

/// Orchestrates scan sessions over a planner, an executor, and the
/// destination store. At most one session is active at a time.
pub struct ScanController<P, E, M> {
    planner: Arc<P>,
    executor: Arc<E>,
    store: Arc<M>,
    classifier: Classifier,
    timing: DispatchTiming,
    state: ControllerState,
}

impl<P, E, M> ScanController<P, E, M>
where
    P: ChunkPlanner + 'static,
    E: ChunkExecutor + 'static,
    M: StoreMaintenance + 'static,
{
    pub fn new(planner: P, executor: E, store: M) -> Self {
        Self::with_config(planner, executor, store, Classifier::default(), DispatchTiming::default())
    }

    pub fn with_config(
        planner: P,
        executor: E,
        store: M,
        classifier: Classifier,
        timing: DispatchTiming,
    ) -> Self {
        Self {
            planner: Arc::new(planner),
            executor: Arc::new(executor),
            store: Arc::new(store),
            classifier,
            timing,
            state: ControllerState::Idle,
        }
    }

    /// Begin a scan of `source`. With `reset_store` the destructive path is
    /// armed but not executed: the caller gets a prompt and must call
    /// `confirm_reset` or `decline_reset` before anything else happens.
    pub async fn start(
        &mut self,
        source: SourceLocation,
        reset_store: bool,
    ) -> Result<StartOutcome, SessionError> {
        if self.is_active() {
            return Err(SessionError::AlreadyActive);
        }

        let mut session = ScanSession::new(source, self.classifier.clone());
        if reset_store {
            let prompt = ResetPrompt::new(session.source());
            session.await_reset_confirmation();
            self.state = ControllerState::AwaitingReset {
                session,
                prompt: prompt.clone(),
            };
            return Ok(StartOutcome::AwaitingResetConfirmation(prompt));
        }

        self.launch(session).await?;
        Ok(StartOutcome::Started)
    }

    /// Apply the pending destructive reset, then plan and start the scan.
    /// A clear failure ends the session in `Failed` without any planning.
    pub async fn confirm_reset(&mut self) -> Result<(), SessionError> {
        let mut session = match std::mem::replace(&mut self.state, ControllerState::Idle) {
            ControllerState::AwaitingReset { session, .. } => session,
            other => {
                self.state = other;
                return Err(SessionError::NoPendingReset);
            }
        };

        session.begin_clearing();
        info!(source = %session.source(), "Clearing destination store before scan");
        if let Err(clear_error) = self.store.clear_store().await {
            error!(source = %session.source(), %clear_error, "Store clear failed");
            session.mark_failed(clear_error.to_string());
            self.state = ControllerState::Finished(session);
            return Err(SessionError::Clear(clear_error));
        }
        session.mark_reset_applied();
        self.launch(session).await
    }

    /// Abandon the pending reset. The store is untouched and the controller
    /// returns to idle.
    pub fn decline_reset(&mut self) -> Result<(), SessionError> {
        match std::mem::replace(&mut self.state, ControllerState::Idle) {
            ControllerState::AwaitingReset { mut session, .. } => {
                info!(source = %session.source(), "Reset declined; session discarded");
                session.mark_cancelled();
                Ok(())
            }
            other => {
                self.state = other;
                Err(SessionError::NoPendingReset)
            }
        }
    }

    async fn launch(&mut self, mut session: ScanSession) -> Result<(), SessionError> {
        session.begin_planning();
        let plan = match self.planner.plan_scan(session.source()).await {
            Ok(plan) => plan,
            Err(planning_error) => {
                error!(source = %session.source(), %planning_error, "Planning failed");
                session.mark_failed(planning_error.to_string());
                self.state = ControllerState::Finished(session);
                return Err(SessionError::Planning(planning_error));
            }
        };

        info!(
            source = %session.source(),
            total_items = plan.total_items,
            total_chunks = plan.total_chunks,
            chunk_size = plan.chunk_size,
            "Plan accepted; starting dispatch"
        );
        session.begin_running(plan);

        let (snapshot_tx, snapshot_rx) = watch::channel(session.snapshot());
        let cancel = CancelToken::new();
        let executor = Arc::clone(&self.executor);
        let timing = self.timing;
        let task_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            runner::drive(session, executor.as_ref(), timing, task_cancel, &snapshot_tx).await
        });

        self.state = ControllerState::Active {
            handle,
            snapshot_rx,
            cancel,
        };
        Ok(())
    }

    /// Request cancellation of the active session. Returns whether a session
    /// was there to cancel. The in-flight chunk, if any, still completes.
    pub fn cancel(&mut self) -> bool {
        match &self.state {
            ControllerState::Active { cancel, .. } => {
                cancel.cancel();
                true
            }
            _ => false,
        }
    }

    /// Current progress view. Cheap and safe to call from any polling loop.
    pub fn snapshot(&self) -> SessionSnapshot {
        match &self.state {
            ControllerState::Idle => SessionSnapshot::idle(),
            ControllerState::AwaitingReset { session, .. } => session.snapshot(),
            ControllerState::Active { snapshot_rx, .. } => snapshot_rx.borrow().clone(),
            ControllerState::Finished(session) => session.snapshot(),
        }
    }

    /// Subscribe to progress updates for the active session.
    pub fn watch(&self) -> Option<watch::Receiver<SessionSnapshot>> {
        match &self.state {
            ControllerState::Active { snapshot_rx, .. } => Some(snapshot_rx.clone()),
            _ => None,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(
            self.state,
            ControllerState::AwaitingReset { .. } | ControllerState::Active { .. }
        )
    }

    /// Wait for the session to reach a terminal status and consume it into
    /// the final report. The controller returns to idle afterwards.
    pub async fn wait(&mut self) -> Result<SessionReport, SessionError> {
        match std::mem::replace(&mut self.state, ControllerState::Idle) {
            ControllerState::Active { handle, .. } => {
                let session = handle
                    .await
                    .map_err(|join_error| SessionError::Internal(join_error.to_string()))?;
                Ok(session.into_report())
            }
            ControllerState::Finished(session) => Ok(session.into_report()),
            other => {
                self.state = other;
                Err(SessionError::NotActive)
            }
        }
    }
}
