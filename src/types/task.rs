//! Calculation task types: inputs, descriptions, and the substrate-side
//! process lifecycle.
//!
//! [`TaskSpec`] is what the factory derives from an index.
//! [`TaskDescription`] is what gets submitted. [`TaskState`] is what the
//! substrate reports back, read through the [`TaskNode`] status interface.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{task_id_for, EXIT_STATUS_KILLED, EXIT_STATUS_OK};
use crate::substrate::SubstrateError;
use crate::types::code::CodeRef;

/// Inputs of one calculation. Immutable once built by the factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskSpec {
    /// Position in the fan-out, `0..N`.
    pub index: usize,
    /// First operand, `base_x + index`.
    pub x: i64,
    /// Second operand, `base_y + index`.
    pub y: i64,
}

impl TaskSpec {
    /// The identifier this calculation is tracked under (`calc_<index>`).
    pub fn task_id(&self) -> String {
        task_id_for(self.index)
    }
}

/// What the dispatcher hands to the execution substrate.
///
/// # Examples
///
/// ```
/// use scatter_gather::{CodeRef, TaskDescription, TaskSpec};
///
/// let code: CodeRef = "add@localhost".parse().unwrap();
/// let spec = TaskSpec { index: 2, x: 3, y: 12 };
/// let description = TaskDescription::new(code, &spec);
/// assert_eq!(description.task_id, "calc_2");
/// assert_eq!((description.x, description.y), (3, 12));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDescription {
    /// Orchestrator-side identifier (`calc_<index>`).
    pub task_id: String,
    /// Executable to run.
    pub code: CodeRef,
    /// First operand.
    pub x: i64,
    /// Second operand.
    pub y: i64,
}

impl TaskDescription {
    /// Builds the description for `spec` against `code`.
    pub fn new(code: CodeRef, spec: &TaskSpec) -> Self {
        Self {
            task_id: spec.task_id(),
            code,
            x: spec.x,
            y: spec.y,
        }
    }
}

/// Process state of a submitted calculation.
///
/// # State Machine
///
/// ```text
/// Created  -> Waiting, Running, Excepted, Killed
/// Waiting  -> Running, Excepted, Killed
/// Running  -> Finished, Excepted, Killed
/// Finished -> (terminal)
/// Excepted -> (terminal)
/// Killed   -> (terminal)
/// ```
///
/// A calculation is *finished ok* only when it is `Finished` with exit
/// status 0; `Finished` with any other status is a failure.
///
/// # Examples
///
/// ```
/// use scatter_gather::TaskStatus;
///
/// assert!(TaskStatus::Running.can_transition_to(&TaskStatus::Finished));
/// assert!(!TaskStatus::Created.can_transition_to(&TaskStatus::Finished));
/// assert!(TaskStatus::Killed.is_terminal());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Accepted by the substrate, not yet scheduled.
    Created,
    /// Queued, waiting for a free slot.
    Waiting,
    /// Executing.
    Running,
    /// Ran to completion and reported an exit status (terminal).
    Finished,
    /// Raised before it could report an exit status (terminal).
    Excepted,
    /// Cancelled before completion (terminal).
    Killed,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Waiting => write!(f, "waiting"),
            Self::Running => write!(f, "running"),
            Self::Finished => write!(f, "finished"),
            Self::Excepted => write!(f, "excepted"),
            Self::Killed => write!(f, "killed"),
        }
    }
}

impl TaskStatus {
    /// Returns `true` for `Finished`, `Excepted`, and `Killed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Excepted | Self::Killed)
    }

    /// Returns `true` if moving from this status to `next` is allowed.
    ///
    /// Self-transitions and any transition out of a terminal state are
    /// rejected.
    pub fn can_transition_to(&self, next: &Self) -> bool {
        if self == next {
            return false;
        }

        match self {
            Self::Created => matches!(
                next,
                Self::Waiting | Self::Running | Self::Excepted | Self::Killed
            ),
            Self::Waiting => matches!(next, Self::Running | Self::Excepted | Self::Killed),
            Self::Running => matches!(next, Self::Finished | Self::Excepted | Self::Killed),
            Self::Finished | Self::Excepted | Self::Killed => false,
        }
    }

    /// Validates a transition for the job identified by `job_id`.
    ///
    /// # Errors
    ///
    /// Returns [`SubstrateError::InvalidTransition`] when
    /// [`can_transition_to`](Self::can_transition_to) is `false`.
    pub fn validate_transition(&self, job_id: &str, next: &Self) -> Result<(), SubstrateError> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(SubstrateError::InvalidTransition {
                job_id: job_id.to_string(),
                from: *self,
                to: *next,
            })
        }
    }
}

/// Status interface of a submitted calculation.
///
/// This is the read side the classifier consumes. `result_value` is only
/// meaningful when [`is_finished_ok`](TaskNode::is_finished_ok) is `true`;
/// `exit_status` only when it is `false`.
pub trait TaskNode {
    /// Current process status.
    fn status(&self) -> TaskStatus;

    /// Numeric result, if the calculation produced one.
    fn result_value(&self) -> Option<i64>;

    /// Exit status, if the calculation reported one.
    fn exit_status(&self) -> Option<i32>;

    /// Returns `true` once the calculation can no longer change.
    fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }

    /// Returns `true` if the calculation finished with exit status 0.
    fn is_finished_ok(&self) -> bool {
        self.status() == TaskStatus::Finished && self.exit_status() == Some(EXIT_STATUS_OK)
    }
}

/// Snapshot of a calculation as reported by the substrate.
///
/// # Examples
///
/// ```
/// use scatter_gather::{TaskNode, TaskState, TaskStatus};
///
/// let ok = TaskState::finished_ok(17);
/// assert!(ok.is_finished_ok());
/// assert_eq!(ok.result_value(), Some(17));
///
/// let failed = TaskState::finished_with(1);
/// assert!(failed.is_terminal());
/// assert!(!failed.is_finished_ok());
/// assert_eq!(failed.exit_status(), Some(1));
///
/// assert_eq!(TaskState::created().status, TaskStatus::Created);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskState {
    /// Process status.
    pub status: TaskStatus,
    /// Exit status, set once the process reports one.
    pub exit_status: Option<i32>,
    /// Numeric result, set only on a clean finish.
    pub result: Option<i64>,
    /// When this snapshot was produced.
    pub updated_at: DateTime<Utc>,
}

impl TaskState {
    fn with(status: TaskStatus, exit_status: Option<i32>, result: Option<i64>) -> Self {
        Self {
            status,
            exit_status,
            result,
            updated_at: Utc::now(),
        }
    }

    /// Freshly accepted by the substrate.
    pub fn created() -> Self {
        Self::with(TaskStatus::Created, None, None)
    }

    /// Queued behind other work.
    pub fn waiting() -> Self {
        Self::with(TaskStatus::Waiting, None, None)
    }

    /// Executing.
    pub fn running() -> Self {
        Self::with(TaskStatus::Running, None, None)
    }

    /// Finished cleanly with `result`.
    pub fn finished_ok(result: i64) -> Self {
        Self::with(TaskStatus::Finished, Some(EXIT_STATUS_OK), Some(result))
    }

    /// Finished with a non-zero `exit_status` and no result.
    pub fn finished_with(exit_status: i32) -> Self {
        Self::with(TaskStatus::Finished, Some(exit_status), None)
    }

    /// Raised before reporting; `exit_status` is `None` when unknown.
    pub fn excepted(exit_status: Option<i32>) -> Self {
        Self::with(TaskStatus::Excepted, exit_status, None)
    }

    /// Cancelled before completion.
    pub fn killed() -> Self {
        Self::with(TaskStatus::Killed, Some(EXIT_STATUS_KILLED), None)
    }
}

impl TaskNode for TaskState {
    fn status(&self) -> TaskStatus {
        self.status
    }

    fn result_value(&self) -> Option<i64> {
        self.result
    }

    fn exit_status(&self) -> Option<i32> {
        self.exit_status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [TaskStatus; 6] = [
        TaskStatus::Created,
        TaskStatus::Waiting,
        TaskStatus::Running,
        TaskStatus::Finished,
        TaskStatus::Excepted,
        TaskStatus::Killed,
    ];

    #[test]
    fn terminal_states_reject_everything() {
        for from in ALL.iter().filter(|s| s.is_terminal()) {
            for to in &ALL {
                assert!(!from.can_transition_to(to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn no_self_transitions() {
        for status in &ALL {
            assert!(!status.can_transition_to(status));
        }
    }

    #[test]
    fn every_live_state_can_be_killed() {
        for from in ALL.iter().filter(|s| !s.is_terminal()) {
            assert!(from.can_transition_to(&TaskStatus::Killed));
            assert!(from.can_transition_to(&TaskStatus::Excepted));
        }
    }

    #[test]
    fn finish_requires_running() {
        assert!(!TaskStatus::Created.can_transition_to(&TaskStatus::Finished));
        assert!(!TaskStatus::Waiting.can_transition_to(&TaskStatus::Finished));
        assert!(TaskStatus::Running.can_transition_to(&TaskStatus::Finished));
    }

    #[test]
    fn validate_transition_reports_context() {
        let err = TaskStatus::Finished
            .validate_transition("job-1", &TaskStatus::Running)
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("job-1"));
        assert!(msg.contains("finished"));
        assert!(msg.contains("running"));
    }

    #[test]
    fn finished_with_zero_status_but_no_result_is_still_finished_ok() {
        let state = TaskState {
            status: TaskStatus::Finished,
            exit_status: Some(0),
            result: None,
            updated_at: Utc::now(),
        };
        assert!(state.is_finished_ok());
        assert_eq!(state.result_value(), None);
    }

    #[test]
    fn killed_and_excepted_are_failures() {
        assert!(!TaskState::killed().is_finished_ok());
        assert_eq!(TaskState::killed().exit_status(), Some(EXIT_STATUS_KILLED));
        assert!(!TaskState::excepted(None).is_finished_ok());
        assert_eq!(TaskState::excepted(None).exit_status(), None);
    }

    #[test]
    fn spec_task_id_uses_index() {
        let spec = TaskSpec {
            index: 7,
            x: 8,
            y: 17,
        };
        assert_eq!(spec.task_id(), "calc_7");
    }
}
