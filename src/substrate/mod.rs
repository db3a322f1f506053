//! Execution substrate interface.
//!
//! The substrate is the external scheduler that actually runs calculations.
//! The orchestrator only needs two calls from it:
//!
//! - [`submit`](ExecutionSubstrate::submit) -- accept a [`TaskDescription`]
//!   and return a [`TaskHandle`] immediately, without waiting for the
//!   calculation to start or finish.
//! - [`cancel`](ExecutionSubstrate::cancel) -- best-effort kill of a
//!   submitted calculation, used when a run aborts with work in flight.
//!
//! Status flows back through the handle: each handle watches the
//! calculation's [`TaskState`] and resolves once it turns terminal.
//!
//! # Implementations
//!
//! - [`InMemorySubstrate`](memory::InMemorySubstrate) -- runs registered
//!   calculations on the tokio runtime. Used by tests and the demo runner.

pub mod memory;

use async_trait::async_trait;
use tokio::sync::watch;
use uuid::Uuid;

use crate::constants::EXIT_STATUS_UNKNOWN;
use crate::types::task::{TaskDescription, TaskNode, TaskState, TaskStatus};

/// Errors reported by an execution substrate.
#[derive(Debug, thiserror::Error)]
pub enum SubstrateError {
    /// No executable is registered under the requested reference.
    #[error("unknown code: {code}")]
    UnknownCode {
        /// The reference that could not be resolved.
        code: String,
    },

    /// The description was refused for another reason.
    #[error("invalid task description: {message}")]
    InvalidDescription {
        /// Why it was refused.
        message: String,
    },

    /// No job with this identifier exists.
    #[error("job not found: {job_id}")]
    JobNotFound {
        /// The job identifier that was looked up.
        job_id: String,
    },

    /// A state change was rejected by the process state machine.
    #[error("invalid transition from {from} to {to} for job {job_id}")]
    InvalidTransition {
        /// The job being transitioned.
        job_id: String,
        /// Its current status.
        from: TaskStatus,
        /// The rejected target status.
        to: TaskStatus,
    },

    /// Scheduler or transport failure.
    #[error("substrate backend error: {message}")]
    Backend {
        /// Human-readable description.
        message: String,
        /// The underlying error, if available.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

/// Handle to one submitted calculation.
///
/// Created by the substrate at submit time and owned by the orchestration
/// run that submitted it. The handle never drives the calculation; it only
/// observes state changes published by the substrate.
#[derive(Debug)]
pub struct TaskHandle {
    task_id: String,
    job_id: Uuid,
    state: watch::Receiver<TaskState>,
}

impl TaskHandle {
    /// Wraps a state receiver published by a substrate.
    pub fn new(task_id: impl Into<String>, job_id: Uuid, state: watch::Receiver<TaskState>) -> Self {
        Self {
            task_id: task_id.into(),
            job_id,
            state,
        }
    }

    /// Orchestrator-side identifier (`calc_<index>`).
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// Substrate-assigned job identifier.
    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    /// The most recently published state.
    pub fn state(&self) -> TaskState {
        self.state.borrow().clone()
    }

    /// Returns `true` if the calculation has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.state.borrow().is_terminal()
    }

    /// Waits until the calculation is terminal and returns its final state.
    ///
    /// If the substrate drops the publishing side before the calculation
    /// turns terminal, the calculation is reported as `Excepted` with an
    /// unknown exit status rather than waiting forever.
    pub async fn wait(&mut self) -> TaskState {
        match self.state.wait_for(|state| state.is_terminal()).await {
            Ok(state) => state.clone(),
            Err(_) => {
                tracing::warn!(
                    task_id = %self.task_id,
                    job_id = %self.job_id,
                    "substrate dropped task state before it turned terminal"
                );
                TaskState::excepted(Some(EXIT_STATUS_UNKNOWN))
            },
        }
    }
}

/// Contract for submitting calculations to an external scheduler.
///
/// Implementations must be `Send + Sync`; the orchestrator shares them
/// through `Arc<dyn ExecutionSubstrate>`.
#[async_trait]
pub trait ExecutionSubstrate: Send + Sync {
    /// Submits a calculation and returns its handle without waiting for it
    /// to run.
    ///
    /// # Errors
    ///
    /// - [`SubstrateError::UnknownCode`] if the executable reference cannot
    ///   be resolved.
    /// - [`SubstrateError::InvalidDescription`] for any other malformed input.
    /// - [`SubstrateError::Backend`] on scheduler failures.
    async fn submit(&self, description: TaskDescription) -> Result<TaskHandle, SubstrateError>;

    /// Kills a submitted calculation that has not yet terminated.
    ///
    /// # Errors
    ///
    /// - [`SubstrateError::JobNotFound`] if the job is unknown.
    /// - [`SubstrateError::InvalidTransition`] if it is already terminal.
    async fn cancel(&self, job_id: Uuid) -> Result<(), SubstrateError>;
}
