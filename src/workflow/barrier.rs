//! Completion barrier.
//!
//! Joins every pending handle. Nothing is returned until all of them are
//! terminal, whatever order they finish in. The resolved list comes back in
//! submission order.

use std::time::Duration;

use futures::future::join_all;

use crate::error::OrchestrationError;
use crate::substrate::ExecutionSubstrate;
use crate::types::task::TaskState;

use super::dispatch::{cancel_outstanding, PendingSet};

/// Final state of one calculation, captured at the barrier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTask {
    /// Submission index.
    pub index: usize,
    /// Identifier (`calc_<index>`).
    pub task_id: String,
    /// Terminal state reported by the substrate.
    pub state: TaskState,
}

/// Waits for every pending calculation to turn terminal.
///
/// With `timeout == None` this waits indefinitely; a calculation that never
/// terminates stalls the caller.
///
/// # Errors
///
/// [`OrchestrationError::BarrierTimeout`] if `timeout` elapses first. The
/// outstanding calculations are cancelled best-effort before returning.
pub async fn await_all(
    substrate: &dyn ExecutionSubstrate,
    pending: &mut PendingSet,
    timeout: Option<Duration>,
) -> Result<Vec<ResolvedTask>, OrchestrationError> {
    let waits = join_all(pending.values_mut().map(|task| async move {
        let state = task.handle.wait().await;
        tracing::trace!(task_id = %task.handle.task_id(), status = %state.status, "calculation terminal");
        ResolvedTask {
            index: task.spec.index,
            task_id: task.handle.task_id().to_string(),
            state,
        }
    }));

    let Some(limit) = timeout else {
        return Ok(waits.await);
    };

    let timed = tokio::time::timeout(limit, waits).await;
    match timed {
        Ok(resolved) => Ok(resolved),
        Err(_) => {
            let outstanding = pending.values().filter(|p| !p.handle.is_terminal()).count();
            tracing::warn!(waited = ?limit, outstanding, "completion barrier timed out");
            cancel_outstanding(substrate, pending.values().map(|p| &p.handle)).await;
            Err(OrchestrationError::BarrierTimeout {
                waited: limit,
                pending: outstanding,
            })
        },
    }
}
