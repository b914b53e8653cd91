//! Chunked scan session orchestration.
//!
//! The crate owns the run lifecycle end to end: confirmation-gated store
//! resets, planning, sequential chunk dispatch with inter-chunk cool-downs,
//! error classification and ledgering, and progress/ETA reporting. Backends
//! plug in through the `granary_protocol` traits; everything here is
//! backend-agnostic.
//!
//! Typical use:
//!
//! ```ignore
//! let mut controller = ScanController::new(planner, executor, store);
//! controller.start(SourceLocation::from("archives"), false).await?;
//! let report = controller.wait().await?;
//! println!("{report}");
//! ```

pub mod cancel;
pub mod classify;
pub mod control;
pub mod ledger;
pub mod report;
pub mod runner;
pub mod session;

pub use cancel::CancelToken;
pub use classify::{Classifier, ClassifierConfigError, ErrorCategory, SynonymConfig};
pub use control::{ResetPrompt, ScanController, SessionError, StartOutcome};
pub use ledger::{ErrorLedger, ErrorRecord, ErrorSummary};
pub use report::{
    estimate_remaining, format_duration, percent_complete, CompletionAction, SessionReport,
    SessionSnapshot,
};
pub use runner::DispatchTiming;
pub use session::ScanSession;
