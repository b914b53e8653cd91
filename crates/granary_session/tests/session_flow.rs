//! End-to-end session flows against scripted collaborators.

use granary_protocol::{
    ExecutionError, ItemError, PlanningError, SessionStatus, SourceLocation,
};
use granary_session::{
    Classifier, CompletionAction, DispatchTiming, ErrorCategory, ScanController, SessionError,
    StartOutcome,
};
use granary_test_utils::{outcome_with_counts, MockStore, ScriptedExecutor, StaticPlanner};
use std::sync::Arc;
use std::time::Duration;

fn controller<P, E, M>(planner: P, executor: E, store: M) -> ScanController<P, E, M>
where
    P: granary_protocol::ChunkPlanner + 'static,
    E: granary_protocol::ChunkExecutor + 'static,
    M: granary_protocol::StoreMaintenance + 'static,
{
    ScanController::with_config(
        planner,
        executor,
        store,
        Classifier::default(),
        DispatchTiming::immediate(),
    )
}

fn source() -> SourceLocation {
    SourceLocation::from("archives/1902")
}

#[tokio::test]
async fn test_full_scan_accumulates_stats_and_errors() {
    let mut second = outcome_with_counts(8, 0, 2);
    second.errors.push(
        ItemError::new("pdf parsing failed on page 2")
            .with_source_item("acta_1902_014.pdf")
            .with_region("Salto"),
    );
    second.errors.push(
        ItemError::new("database insert failed")
            .with_source_item("acta_1902_015.pdf")
            .with_region("Rivera"),
    );
    let executor = Arc::new(ScriptedExecutor::new(vec![
        Ok(outcome_with_counts(10, 0, 0)),
        Ok(second),
        Ok(outcome_with_counts(5, 0, 0)),
    ]));

    let mut controller = controller(
        StaticPlanner::for_items(25, 10),
        Arc::clone(&executor),
        MockStore::new(),
    );
    let outcome = controller.start(source(), false).await.unwrap();
    assert!(matches!(outcome, StartOutcome::Started));

    let report = controller.wait().await.unwrap();
    assert_eq!(report.status, SessionStatus::Completed);
    assert_eq!(report.stats.imported, 23);
    assert_eq!(report.stats.errors, 2);
    assert_eq!(report.stats.processed, 25);
    assert_eq!(executor.recorded_indices(), vec![0, 1, 2]);

    let summary = report.error_summary.as_ref().unwrap();
    assert_eq!(summary.records.len(), 2);
    assert_eq!(summary.by_category[&ErrorCategory::PdfParsing], 1);
    assert_eq!(summary.by_category[&ErrorCategory::Database], 1);
    assert_eq!(summary.by_region["Salto"], 1);
    assert_eq!(summary.by_region["Rivera"], 1);

    // Errors mean the report must be shown, not auto-dismissed.
    assert_eq!(
        report.completion_action(),
        CompletionAction::RequireAcknowledgement
    );

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.status, SessionStatus::Idle);
}

#[tokio::test]
async fn test_undetailed_errors_get_placeholder_records() {
    let executor = ScriptedExecutor::new(vec![Ok(outcome_with_counts(7, 0, 3))]);
    let mut controller = controller(
        StaticPlanner::for_items(10, 10),
        executor,
        MockStore::new(),
    );

    controller.start(source(), false).await.unwrap();
    let report = controller.wait().await.unwrap();

    assert_eq!(report.stats.errors, 3);
    let summary = report.error_summary.unwrap();
    assert_eq!(summary.records.len(), 3);
    assert_eq!(summary.by_category[&ErrorCategory::General], 3);
    for (i, record) in summary.records.iter().enumerate() {
        assert_eq!(record.source_item, format!("chunk 0 item {}", i + 1));
        assert_eq!(record.region, "unknown");
    }
}

#[tokio::test]
async fn test_failed_chunk_is_recorded_and_scan_continues() {
    let executor = Arc::new(ScriptedExecutor::new(vec![
        Ok(outcome_with_counts(10, 0, 0)),
        Err(ExecutionError::Transport("connection reset".to_string())),
        Ok(outcome_with_counts(10, 0, 0)),
    ]));
    let mut controller = controller(
        StaticPlanner::for_items(30, 10),
        Arc::clone(&executor),
        MockStore::new(),
    );

    controller.start(source(), false).await.unwrap();
    let report = controller.wait().await.unwrap();

    // The failed chunk never stalls the run and is never retried.
    assert_eq!(report.status, SessionStatus::Completed);
    assert_eq!(executor.recorded_indices(), vec![0, 1, 2]);
    assert_eq!(report.stats.errors, 1);

    let summary = report.error_summary.unwrap();
    assert_eq!(summary.records.len(), 1);
    assert_eq!(summary.records[0].category, ErrorCategory::ServerError);
    assert_eq!(summary.records[0].region, "server error");
    assert!(summary.records[0].message.contains("connection reset"));
}

#[tokio::test]
async fn test_cancellation_stops_after_in_flight_chunk() {
    let executor = Arc::new(
        ScriptedExecutor::new(vec![
            Ok(outcome_with_counts(10, 0, 0)),
            Ok(outcome_with_counts(10, 0, 0)),
            Ok(outcome_with_counts(10, 0, 0)),
        ])
        .with_delay(Duration::from_millis(50)),
    );
    let mut controller = controller(
        StaticPlanner::for_items(30, 10),
        Arc::clone(&executor),
        MockStore::new(),
    );

    controller.start(source(), false).await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(controller.cancel());

    let report = controller.wait().await.unwrap();
    assert_eq!(report.status, SessionStatus::Cancelled);
    // The chunk that was in flight finished and was absorbed; nothing new
    // was dispatched afterwards.
    assert!(executor.call_count() <= 1);
    assert_eq!(
        report.completion_action(),
        CompletionAction::RequireAcknowledgement
    );
}

#[tokio::test]
async fn test_reset_prompt_before_anything_destructive() {
    let store = Arc::new(MockStore::new());
    let executor = Arc::new(ScriptedExecutor::new(vec![]));
    let mut controller = controller(
        StaticPlanner::for_items(10, 10),
        Arc::clone(&executor),
        Arc::clone(&store),
    );

    let outcome = controller.start(source(), true).await.unwrap();
    let prompt = match outcome {
        StartOutcome::AwaitingResetConfirmation(prompt) => prompt,
        StartOutcome::Started => panic!("expected a reset prompt"),
    };
    assert!(prompt.message.contains("archives/1902"));
    assert!(prompt.message.contains("permanently remove"));

    // Nothing has been cleared or planned while the prompt is pending.
    assert_eq!(store.clear_calls(), 0);
    assert!(executor.recorded_indices().is_empty());
    assert_eq!(
        controller.snapshot().status,
        SessionStatus::AwaitingResetConfirmation
    );
}

#[tokio::test]
async fn test_decline_reset_leaves_store_untouched() {
    let store = Arc::new(MockStore::new());
    let mut controller = controller(
        StaticPlanner::for_items(10, 10),
        ScriptedExecutor::new(vec![]),
        Arc::clone(&store),
    );

    controller.start(source(), true).await.unwrap();
    controller.decline_reset().unwrap();

    assert_eq!(store.clear_calls(), 0);
    assert!(!controller.is_active());
    assert_eq!(controller.snapshot().status, SessionStatus::Idle);

    // A second decline has nothing to act on.
    assert!(matches!(
        controller.decline_reset(),
        Err(SessionError::NoPendingReset)
    ));
}

#[tokio::test]
async fn test_confirm_reset_clears_once_then_scans() {
    let store = Arc::new(MockStore::new());
    let mut controller = controller(
        StaticPlanner::for_items(10, 10),
        ScriptedExecutor::new(vec![Ok(outcome_with_counts(10, 0, 0))]),
        Arc::clone(&store),
    );

    controller.start(source(), true).await.unwrap();
    controller.confirm_reset().await.unwrap();

    let report = controller.wait().await.unwrap();
    assert_eq!(store.clear_calls(), 1);
    assert_eq!(report.status, SessionStatus::Completed);
    assert!(report.destructive_reset_applied);
    assert_eq!(report.stats.imported, 10);
}

#[tokio::test]
async fn test_clear_failure_fails_session_before_planning() {
    let store = Arc::new(MockStore::failing("tablespace locked"));
    let executor = Arc::new(ScriptedExecutor::new(vec![]));
    let mut controller = controller(
        StaticPlanner::for_items(10, 10),
        Arc::clone(&executor),
        Arc::clone(&store),
    );

    controller.start(source(), true).await.unwrap();
    let error = controller.confirm_reset().await.unwrap_err();
    assert!(matches!(error, SessionError::Clear(_)));

    let report = controller.wait().await.unwrap();
    assert_eq!(report.status, SessionStatus::Failed);
    assert!(report.failure.as_deref().unwrap().contains("tablespace locked"));
    assert!(!report.destructive_reset_applied);
    assert!(executor.recorded_indices().is_empty());
    assert_eq!(report.stats.processed, 0);
}

#[tokio::test]
async fn test_planning_failure_surfaces_verbatim() {
    let mut controller = controller(
        StaticPlanner::failing(PlanningError::Unreadable(
            "archives/1902: directory vanished".to_string(),
        )),
        ScriptedExecutor::new(vec![]),
        MockStore::new(),
    );

    let error = controller.start(source(), false).await.unwrap_err();
    match error {
        SessionError::Planning(PlanningError::Unreadable(message)) => {
            assert_eq!(message, "archives/1902: directory vanished");
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let report = controller.wait().await.unwrap();
    assert_eq!(report.status, SessionStatus::Failed);
    assert!(report
        .failure
        .as_deref()
        .unwrap()
        .contains("directory vanished"));
}

#[tokio::test]
async fn test_empty_source_completes_immediately() {
    let executor = Arc::new(ScriptedExecutor::new(vec![]));
    let mut controller = controller(
        StaticPlanner::for_items(0, 10),
        Arc::clone(&executor),
        MockStore::new(),
    );

    controller.start(source(), false).await.unwrap();
    let report = controller.wait().await.unwrap();

    assert_eq!(report.status, SessionStatus::Completed);
    assert!(executor.recorded_indices().is_empty());
    assert_eq!(report.stats.processed, 0);
    assert!(report.error_summary.is_none());
    assert_eq!(report.completion_action(), CompletionAction::AutoRefresh);
}

#[tokio::test]
async fn test_second_start_rejected_while_active() {
    let executor = ScriptedExecutor::new(vec![Ok(outcome_with_counts(10, 0, 0))])
        .with_delay(Duration::from_millis(50));
    let mut controller = controller(
        StaticPlanner::for_items(10, 10),
        executor,
        MockStore::new(),
    );

    controller.start(source(), false).await.unwrap();
    let rejected = controller.start(SourceLocation::from("other"), false).await;
    assert!(matches!(rejected, Err(SessionError::AlreadyActive)));

    let report = controller.wait().await.unwrap();
    assert_eq!(report.status, SessionStatus::Completed);
}

#[tokio::test]
async fn test_start_rejected_while_awaiting_reset() {
    let mut controller = controller(
        StaticPlanner::for_items(10, 10),
        ScriptedExecutor::new(vec![]),
        MockStore::new(),
    );

    controller.start(source(), true).await.unwrap();
    let rejected = controller.start(SourceLocation::from("other"), false).await;
    assert!(matches!(rejected, Err(SessionError::AlreadyActive)));
    controller.decline_reset().unwrap();
}

#[tokio::test]
async fn test_progress_snapshots_reach_completion() {
    let mut controller = controller(
        StaticPlanner::for_items(20, 10),
        ScriptedExecutor::new(vec![
            Ok(outcome_with_counts(10, 0, 0)),
            Ok(outcome_with_counts(10, 0, 0)),
        ]),
        MockStore::new(),
    );

    controller.start(source(), false).await.unwrap();
    let rx = controller.watch().unwrap();
    let report = controller.wait().await.unwrap();

    assert_eq!(report.status, SessionStatus::Completed);
    let last = rx.borrow();
    assert_eq!(last.status, SessionStatus::Completed);
    assert_eq!(last.percent_complete, 100);
    assert_eq!(last.current_chunk_index, 2);
    assert_eq!(last.total_chunks, 2);
}
