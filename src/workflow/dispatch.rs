//! Submission dispatcher.
//!
//! Submits one description per spec, strictly in ascending index order, and
//! records the returned handles keyed by task id. A rejection aborts the
//! whole dispatch; calculations already accepted are cancelled best-effort
//! so they do not keep running unmonitored.

use indexmap::IndexMap;

use crate::error::OrchestrationError;
use crate::substrate::{ExecutionSubstrate, TaskHandle};
use crate::types::code::CodeRef;
use crate::types::task::{TaskDescription, TaskSpec};

use super::report::ProcessReport;

/// A submitted calculation awaiting the completion barrier.
#[derive(Debug)]
pub struct PendingTask {
    /// The inputs it was submitted with.
    pub spec: TaskSpec,
    /// Its handle.
    pub handle: TaskHandle,
}

/// Pending calculations in submission order, keyed by task id.
pub type PendingSet = IndexMap<String, PendingTask>;

/// Submits every spec and returns the pending set.
///
/// # Errors
///
/// [`OrchestrationError::SubmissionRejected`] for the first rejected spec.
/// Nothing is returned for the calculations submitted before it; they are
/// cancelled.
pub async fn submit_all(
    substrate: &dyn ExecutionSubstrate,
    code: &CodeRef,
    specs: &[TaskSpec],
    report: &mut ProcessReport,
) -> Result<PendingSet, OrchestrationError> {
    report.report(format!(
        "Submitting {} calculations of {code} in parallel...",
        specs.len()
    ));

    let mut pending = PendingSet::with_capacity(specs.len());
    for spec in specs {
        let description = TaskDescription::new(code.clone(), spec);
        let task_id = description.task_id.clone();

        match substrate.submit(description).await {
            Ok(handle) => {
                tracing::debug!(
                    task_id = %task_id,
                    job_id = %handle.job_id(),
                    x = spec.x,
                    y = spec.y,
                    "calculation submitted"
                );
                pending.insert(
                    task_id,
                    PendingTask {
                        spec: *spec,
                        handle,
                    },
                );
            },
            Err(source) => {
                tracing::error!(task_id = %task_id, error = %source, "submission rejected");
                let cancelled =
                    cancel_outstanding(substrate, pending.values().map(|p| &p.handle)).await;
                report.report(format!(
                    "Submission of {task_id} rejected: {source}. Cancelled {cancelled} of {} submitted calculations.",
                    pending.len()
                ));
                return Err(OrchestrationError::SubmissionRejected { task_id, source });
            },
        }
    }

    report.report(format!("Successfully submitted {} calculations.", pending.len()));
    Ok(pending)
}

/// Cancels every non-terminal handle, ignoring individual failures. Returns
/// how many cancellations the substrate accepted.
pub(crate) async fn cancel_outstanding<'a>(
    substrate: &dyn ExecutionSubstrate,
    handles: impl IntoIterator<Item = &'a TaskHandle>,
) -> usize {
    let mut cancelled = 0;
    for handle in handles {
        if handle.is_terminal() {
            continue;
        }
        match substrate.cancel(handle.job_id()).await {
            Ok(()) => cancelled += 1,
            Err(e) => tracing::debug!(
                task_id = %handle.task_id(),
                job_id = %handle.job_id(),
                error = %e,
                "best-effort cancel failed"
            ),
        }
    }
    cancelled
}
