//! End-to-end tests of the parallel-add workflow.
//!
//! Runs complete workflows against the in-memory substrate and store, plus a
//! scripted substrate and a failing store that exercise the trait seams.
//! Covered:
//!
//! - all calculations succeed, some fail, all fail
//! - completion order does not change the aggregate or the report
//! - submission rejection aborts and cancels what was already submitted
//! - barrier timeout cancels outstanding calculations
//! - storage failure publishes nothing
//! - non-`Finished` terminal states count as failures
//! - an aborted step-wise run cannot be resumed

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use tokio::sync::watch;
use uuid::Uuid;

use scatter_gather::store::memory::InMemoryScalarStore;
use scatter_gather::store::{ScalarStore, StoreError, StoredScalar};
use scatter_gather::substrate::memory::InMemorySubstrate;
use scatter_gather::substrate::{ExecutionSubstrate, SubstrateError, TaskHandle};
use scatter_gather::workflow::RunPhase;
use scatter_gather::{
    OrchestrationError, ParallelAddWorkflow, TaskDescription, TaskState, TaskStatus,
    TerminationDecision, WorkflowConfig, WorkflowRun,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const CODE: &str = "add@localhost";

fn config(n: i64) -> WorkflowConfig {
    WorkflowConfig::new(CODE).with_num_calculations(n)
}

fn add_substrate() -> InMemorySubstrate {
    InMemorySubstrate::new().with_arithmetic_add(CODE)
}

fn workflow(substrate: InMemorySubstrate, store: Arc<InMemoryScalarStore>) -> ParallelAddWorkflow {
    ParallelAddWorkflow::new(Arc::new(substrate), store)
}

fn output_values(result: &scatter_gather::WorkflowResult) -> Option<(i64, i64, i64)> {
    let outputs = result.outputs.as_ref()?;
    Some((
        outputs.total_sum().value(),
        outputs.num_successful().value(),
        outputs.num_failed().value(),
    ))
}

/// Substrate whose calculations are already terminal in a scripted state.
struct ScriptedSubstrate {
    states: Vec<TaskState>,
}

#[async_trait]
impl ExecutionSubstrate for ScriptedSubstrate {
    async fn submit(&self, description: TaskDescription) -> Result<TaskHandle, SubstrateError> {
        let index: usize = description
            .task_id
            .trim_start_matches("calc_")
            .parse()
            .map_err(|_| SubstrateError::InvalidDescription {
                message: description.task_id.clone(),
            })?;
        let state = self.states.get(index).cloned().ok_or_else(|| {
            SubstrateError::InvalidDescription {
                message: format!("no script for {}", description.task_id),
            }
        })?;
        let (_tx, rx) = watch::channel(state);
        Ok(TaskHandle::new(description.task_id, Uuid::new_v4(), rx))
    }

    async fn cancel(&self, job_id: Uuid) -> Result<(), SubstrateError> {
        Err(SubstrateError::JobNotFound {
            job_id: job_id.to_string(),
        })
    }
}

/// Store that refuses every write.
struct BrokenStore;

#[async_trait]
impl ScalarStore for BrokenStore {
    async fn store(&self, _value: i64) -> Result<StoredScalar, StoreError> {
        Err(StoreError::Backend {
            message: "disk full".to_string(),
            source: None,
        })
    }

    async fn load(&self, uuid: Uuid) -> Result<StoredScalar, StoreError> {
        Err(StoreError::NotFound { uuid })
    }
}

// ---------------------------------------------------------------------------
// Termination policy
// ---------------------------------------------------------------------------

#[tokio::test]
async fn all_succeed_publishes_outputs() {
    let store = Arc::new(InMemoryScalarStore::new());
    let result = workflow(add_substrate(), Arc::clone(&store))
        .run(&config(4))
        .await
        .unwrap();

    assert_eq!(result.decision, TerminationDecision::AllOk);
    assert_eq!(result.exit_status(), 0);
    assert!(result.is_finished_ok());
    assert_eq!(output_values(&result), Some((56, 4, 0)));
    assert_eq!(store.len(), 3);

    let results: Vec<_> = result.outcomes.iter().map(|o| o.result_value()).collect();
    assert_eq!(results, vec![Some(11), Some(13), Some(15), Some(17)]);

    let last = result.report.messages().last().unwrap();
    assert_eq!(last, "Workflow completed with 4 successful calculations.");
}

#[tokio::test]
async fn one_failure_still_publishes_outputs() {
    let store = Arc::new(InMemoryScalarStore::new());
    let result = workflow(add_substrate().with_failure("calc_2", 1), Arc::clone(&store))
        .run(&config(4))
        .await
        .unwrap();

    assert_eq!(result.decision, TerminationDecision::SomeFailed);
    assert_eq!(result.exit_status(), 400);
    assert_eq!(output_values(&result), Some((41, 3, 1)));
    assert_eq!(result.outcomes[2].exit_status(), Some(1));

    let messages: Vec<_> = result.report.messages().collect();
    assert!(messages.contains(&"Calculation 2: FAILED - Exit status = 1"));
    assert!(messages.contains(&"Summary: 3 successful, 1 failed, total sum = 41"));
    assert!(messages.contains(
        &"Exiting with status 400: Some calculations failed to complete successfully."
    ));
}

#[tokio::test]
async fn all_failures_publish_nothing() {
    let store = Arc::new(InMemoryScalarStore::new());
    let substrate = add_substrate()
        .with_failure("calc_0", 1)
        .with_failure("calc_1", 3);
    let result = workflow(substrate, Arc::clone(&store))
        .run(&config(2))
        .await
        .unwrap();

    assert_eq!(result.decision, TerminationDecision::AllFailed);
    assert_eq!(result.exit_status(), 401);
    assert!(result.outputs.is_none());
    assert!(result.output("total_sum").is_none());
    assert!(store.is_empty());
    assert_eq!(result.aggregate.num_failed, 2);
    assert_eq!(result.aggregate.total_sum, 0);
}

#[tokio::test]
async fn single_calculation() {
    let store = Arc::new(InMemoryScalarStore::new());
    let ok = workflow(add_substrate(), Arc::clone(&store))
        .run(&config(1))
        .await
        .unwrap();
    assert_eq!(ok.exit_status(), 0);
    assert_eq!(output_values(&ok), Some((11, 1, 0)));

    let failed = workflow(add_substrate().with_failure("calc_0", 2), Arc::new(InMemoryScalarStore::new()))
        .run(&config(1))
        .await
        .unwrap();
    assert_eq!(failed.exit_status(), 401);
}

#[tokio::test]
async fn overflowing_calculation_counts_as_failure() {
    let config = config(2).with_base_x(i64::MAX - 1).with_base_y(1);
    let result = workflow(add_substrate(), Arc::new(InMemoryScalarStore::new()))
        .run(&config)
        .await
        .unwrap();
    // calc_0 = (MAX - 1) + 1, calc_1 = MAX + 2 overflows inside the calculation.
    assert_eq!(result.decision, TerminationDecision::SomeFailed);
    assert_eq!(output_values(&result), Some((i64::MAX, 1, 1)));
}

// ---------------------------------------------------------------------------
// Completion order
// ---------------------------------------------------------------------------

#[tokio::test]
async fn completion_order_does_not_change_result() {
    let substrate = add_substrate()
        .with_delay("calc_0", Duration::from_millis(60))
        .with_delay("calc_1", Duration::from_millis(0))
        .with_delay("calc_2", Duration::from_millis(30))
        .with_delay("calc_3", Duration::from_millis(10));
    let reversed = workflow(substrate, Arc::new(InMemoryScalarStore::new()))
        .run(&config(4))
        .await
        .unwrap();
    let in_order = workflow(add_substrate(), Arc::new(InMemoryScalarStore::new()))
        .run(&config(4))
        .await
        .unwrap();

    assert_eq!(output_values(&reversed), output_values(&in_order));
    assert_eq!(reversed.outcomes, in_order.outcomes);
    let lines = |r: &scatter_gather::WorkflowResult| -> Vec<String> {
        r.report
            .messages()
            .filter(|m| m.starts_with("Calculation "))
            .map(str::to_string)
            .collect()
    };
    assert_eq!(lines(&reversed), lines(&in_order));
}

// ---------------------------------------------------------------------------
// Fatal errors
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_code_aborts_before_anything_runs() {
    let store = Arc::new(InMemoryScalarStore::new());
    let substrate = Arc::new(InMemorySubstrate::new().with_arithmetic_add("mul@localhost"));
    let workflow = ParallelAddWorkflow::new(substrate.clone(), store.clone());

    let err = workflow.run(&config(3)).await.unwrap_err();
    match err {
        OrchestrationError::SubmissionRejected { task_id, source } => {
            assert_eq!(task_id, "calc_0");
            assert!(matches!(source, SubstrateError::UnknownCode { .. }));
        },
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(substrate.submitted_count(), 0);
    assert!(store.is_empty());
}

#[tokio::test]
async fn rejection_cancels_already_submitted() {
    let store = Arc::new(InMemoryScalarStore::new());
    let substrate = Arc::new(
        add_substrate()
            .with_hang("calc_0")
            .with_hang("calc_1")
            .with_rejection("calc_2"),
    );
    let workflow = ParallelAddWorkflow::new(substrate.clone(), store.clone());

    let err = workflow.run(&config(4)).await.unwrap_err();
    assert_eq!(err.category(), "submission");
    assert!(!err.is_pre_submission());

    substrate.drain().await;
    let statuses: Vec<_> = substrate
        .task_states()
        .into_iter()
        .map(|(task_id, state)| (task_id, state.status))
        .collect();
    assert_eq!(
        statuses,
        vec![
            ("calc_0".to_string(), TaskStatus::Killed),
            ("calc_1".to_string(), TaskStatus::Killed),
        ]
    );
    assert!(store.is_empty());
}

#[tokio::test]
async fn barrier_timeout_cancels_outstanding() {
    let substrate = add_substrate().with_hang("calc_1");
    let mut run = WorkflowRun::new(&config(3)).unwrap();
    run.submit_calculations(&substrate).await.unwrap();

    let err = run
        .await_calculations(&substrate, Some(Duration::from_millis(50)))
        .await
        .unwrap_err();
    match err {
        OrchestrationError::BarrierTimeout { pending, .. } => assert_eq!(pending, 1),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(run.phase(), RunPhase::Aborted);
    assert!(run.inspect_calculations().is_err());

    substrate.drain().await;
    let states = substrate.task_states();
    assert_eq!(states[1].1.status, TaskStatus::Killed);
    assert!(states[0].1.status == TaskStatus::Finished);
}

#[tokio::test]
async fn generous_barrier_timeout_does_not_fire() {
    let substrate = add_substrate().with_delay("calc_1", Duration::from_millis(80));
    let result = workflow(substrate, Arc::new(InMemoryScalarStore::new()))
        .run(&config(2).with_barrier_timeout(Duration::from_secs(5)))
        .await
        .unwrap();
    assert_eq!(result.exit_status(), 0);
}

#[tokio::test]
async fn storage_failure_publishes_nothing() {
    let workflow = ParallelAddWorkflow::new(Arc::new(add_substrate()), Arc::new(BrokenStore));
    let err = workflow.run(&config(2)).await.unwrap_err();
    match err {
        OrchestrationError::Store { output, .. } => assert_eq!(output, "total_sum"),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn partial_storage_failure_publishes_nothing() {
    let store = Arc::new(InMemoryScalarStore::new().with_capacity_limit(2));
    let err = workflow(add_substrate(), Arc::clone(&store))
        .run(&config(2))
        .await
        .unwrap_err();
    assert_eq!(err.category(), "storage");
    assert!(err.to_string().contains("num_failed"));
}

#[tokio::test]
async fn invalid_inputs_submit_nothing() {
    let substrate = Arc::new(add_substrate());
    let workflow = ParallelAddWorkflow::new(substrate.clone(), Arc::new(InMemoryScalarStore::new()));

    for bad in [config(0), config(-3), WorkflowConfig::new("  "), WorkflowConfig::new("add")] {
        let err = workflow.run(&bad).await.unwrap_err();
        assert!(err.is_pre_submission(), "{err}");
    }
    let err = workflow
        .run(&config(3).with_base_y(i64::MAX - 1))
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestrationError::InvalidArgument { ref argument, .. } if argument == "base_y"));
    assert_eq!(substrate.submitted_count(), 0);
}

// ---------------------------------------------------------------------------
// Aborted runs
// ---------------------------------------------------------------------------

fn assert_out_of_order(err: OrchestrationError, expected_step: &str) {
    match err {
        OrchestrationError::StepOutOfOrder { step, phase } => {
            assert_eq!(step, expected_step);
            assert_eq!(phase, "aborted");
        },
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn timed_out_run_cannot_be_resumed() {
    let substrate = add_substrate().with_hang("calc_1");
    let store = InMemoryScalarStore::new();
    let mut run = WorkflowRun::new(&config(3)).unwrap();
    run.submit_calculations(&substrate).await.unwrap();

    let err = run
        .await_calculations(&substrate, Some(Duration::from_millis(50)))
        .await
        .unwrap_err();
    assert_eq!(err.category(), "barrier");
    assert_eq!(run.phase(), RunPhase::Aborted);
    assert!(run.phase().is_terminal());

    // The killed calculation is terminal now; waiting again must not
    // open the barrier.
    substrate.drain().await;
    let err = run.await_calculations(&substrate, None).await.unwrap_err();
    assert_out_of_order(err, "await_calculations");
    assert_out_of_order(run.inspect_calculations().unwrap_err(), "inspect_calculations");
    assert_out_of_order(run.results(&store).await.unwrap_err(), "results");

    assert!(run.decision().is_none());
    assert!(run.outcomes().is_empty());
    assert!(store.is_empty());
}

#[tokio::test]
async fn rejected_run_cannot_be_resubmitted() {
    let substrate = add_substrate()
        .with_hang("calc_0")
        .with_hang("calc_1")
        .with_rejection("calc_2");
    let mut run = WorkflowRun::new(&config(4)).unwrap();

    let err = run.submit_calculations(&substrate).await.unwrap_err();
    assert_eq!(err.category(), "submission");
    assert_eq!(run.phase(), RunPhase::Aborted);
    assert_eq!(substrate.submitted_count(), 2);

    let err = run.submit_calculations(&substrate).await.unwrap_err();
    assert_out_of_order(err, "submit_calculations");
    assert_eq!(substrate.submitted_count(), 2);
    assert!(run.pending().is_empty());
}

#[tokio::test]
async fn failed_results_step_cannot_be_retried() {
    let substrate = add_substrate();
    let store = InMemoryScalarStore::new().with_capacity_limit(1);
    let mut run = WorkflowRun::new(&config(2)).unwrap();
    run.submit_calculations(&substrate).await.unwrap();
    run.await_calculations(&substrate, None).await.unwrap();
    assert_eq!(run.inspect_calculations().unwrap(), TerminationDecision::AllOk);

    let err = run.results(&store).await.unwrap_err();
    assert_eq!(err.category(), "storage");
    assert_eq!(run.phase(), RunPhase::Aborted);
    assert_eq!(store.len(), 1);

    assert_out_of_order(run.results(&store).await.unwrap_err(), "results");
    assert_eq!(store.len(), 1);
}

// ---------------------------------------------------------------------------
// Other terminal states
// ---------------------------------------------------------------------------

#[tokio::test]
async fn excepted_and_killed_count_as_failures() {
    let substrate = ScriptedSubstrate {
        states: vec![
            TaskState::finished_ok(11),
            TaskState::excepted(None),
            TaskState::killed(),
            TaskState::finished_ok(17),
        ],
    };
    let workflow = ParallelAddWorkflow::new(Arc::new(substrate), Arc::new(InMemoryScalarStore::new()));
    let result = workflow.run(&config(4)).await.unwrap();

    assert_eq!(result.decision, TerminationDecision::SomeFailed);
    assert_eq!(output_values(&result), Some((28, 2, 2)));
    let exits: Vec<_> = result.outcomes.iter().map(|o| o.exit_status()).collect();
    assert_eq!(exits, vec![None, Some(-1), Some(130), None]);
}

#[tokio::test]
async fn runs_are_independent() {
    let substrate = Arc::new(add_substrate());
    let store = Arc::new(InMemoryScalarStore::new());
    let workflow = ParallelAddWorkflow::new(substrate.clone(), store.clone());

    let config_a = config(3);
    let config_b = config(3);
    let (a, b) = tokio::join!(workflow.run(&config_a), workflow.run(&config_b));
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_ne!(a.run_id, b.run_id);
    assert_eq!(output_values(&a), output_values(&b));
    assert_eq!(substrate.submitted_count(), 6);
    assert_eq!(store.len(), 6);
}
