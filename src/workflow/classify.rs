//! Result classifier.
//!
//! Visits every resolved calculation in ascending index order, independent
//! of the order they finished in, so the report and the accumulation order
//! of `total_sum` are reproducible. A failed calculation never stops the
//! walk.

use crate::constants::EXIT_STATUS_UNKNOWN;
use crate::error::OrchestrationError;
use crate::types::outcome::{Aggregate, OutcomeKind, TaskOutcome};
use crate::types::task::TaskNode;

use super::barrier::ResolvedTask;
use super::report::ProcessReport;

/// Output of the classification step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// One outcome per calculation, in index order.
    pub outcomes: Vec<TaskOutcome>,
    /// Counts and sum over `outcomes`.
    pub aggregate: Aggregate,
}

/// Classifies one terminal calculation.
///
/// Finished ok with a result is a success. Everything else is a failure; a
/// failure without an exit status, or a clean finish that produced no
/// result, is recorded with [`EXIT_STATUS_UNKNOWN`].
pub fn classify_task<N: TaskNode>(index: usize, node: &N) -> TaskOutcome {
    let kind = match (node.is_finished_ok(), node.result_value()) {
        (true, Some(result_value)) => OutcomeKind::Succeeded { result_value },
        (true, None) => {
            tracing::warn!(index, "calculation finished ok without a result");
            OutcomeKind::Failed {
                exit_status: EXIT_STATUS_UNKNOWN,
            }
        },
        (false, _) => OutcomeKind::Failed {
            exit_status: node.exit_status().unwrap_or(EXIT_STATUS_UNKNOWN),
        },
    };
    TaskOutcome::new(index, kind)
}

/// Classifies all resolved calculations and builds the aggregate.
///
/// # Errors
///
/// [`OrchestrationError::AggregateOverflow`] if the successful results do
/// not fit in `i64`.
pub fn classify_all(
    resolved: &[ResolvedTask],
    report: &mut ProcessReport,
) -> Result<Classification, OrchestrationError> {
    report.report("Inspecting calculation results...");

    let mut ordered: Vec<&ResolvedTask> = resolved.iter().collect();
    ordered.sort_by_key(|task| task.index);

    let mut aggregate = Aggregate::default();
    let mut outcomes = Vec::with_capacity(ordered.len());
    for task in ordered {
        let outcome = classify_task(task.index, &task.state);
        match outcome.kind {
            OutcomeKind::Succeeded { result_value } => {
                report.report(format!(
                    "Calculation {}: SUCCESS - Result = {result_value}",
                    task.index
                ));
            },
            OutcomeKind::Failed { exit_status } => {
                tracing::warn!(
                    task_id = %task.task_id,
                    status = %task.state.status,
                    exit_status,
                    "calculation failed"
                );
                report.report(format!(
                    "Calculation {}: FAILED - Exit status = {exit_status}",
                    task.index
                ));
            },
        }
        aggregate.record(&outcome)?;
        outcomes.push(outcome);
    }

    report.report(format!(
        "Summary: {} successful, {} failed, total sum = {}",
        aggregate.num_successful, aggregate.num_failed, aggregate.total_sum
    ));
    Ok(Classification {
        outcomes,
        aggregate,
    })
}
