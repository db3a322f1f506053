//! In-memory execution substrate.
//!
//! [`InMemorySubstrate`] runs registered calculations as tokio tasks. Each
//! submission gets a fresh job id, a `watch` channel publishing its
//! [`TaskState`], and a [`CancellationToken`] so [`cancel`] can kill it.
//! Spawned jobs are tracked by a [`TaskTracker`] so callers can
//! [`drain`](InMemorySubstrate::drain) outstanding work.
//!
//! Per-task delays and injected exit statuses make it possible to script
//! completion order and failures, which is what the test suite and the demo
//! runner use it for.
//!
//! [`cancel`]: ExecutionSubstrate::cancel
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//! use scatter_gather::substrate::memory::InMemorySubstrate;
//!
//! let substrate = InMemorySubstrate::new()
//!     .with_arithmetic_add("add@localhost")
//!     .with_default_delay(Duration::from_millis(5))
//!     .with_failure("calc_2", 1);
//! assert_eq!(substrate.submitted_count(), 0);
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use uuid::Uuid;

use crate::types::task::{TaskDescription, TaskState};

use super::{ExecutionSubstrate, SubstrateError, TaskHandle};

/// A registered calculation: operands in, result or non-zero exit status out.
pub type Calculation = Arc<dyn Fn(&TaskDescription) -> Result<i64, i32> + Send + Sync>;

/// Bookkeeping for one submitted job.
#[derive(Debug)]
struct JobEntry {
    task_id: String,
    state: Arc<watch::Sender<TaskState>>,
    cancel: CancellationToken,
}

/// Thread-safe substrate running calculations on the current tokio runtime.
pub struct InMemorySubstrate {
    codes: DashMap<String, Calculation>,
    jobs: DashMap<Uuid, JobEntry>,
    delays: DashMap<String, Duration>,
    failures: DashMap<String, i32>,
    hung: DashMap<String, ()>,
    rejected: DashMap<String, ()>,
    default_delay: Duration,
    tracker: TaskTracker,
}

impl std::fmt::Debug for InMemorySubstrate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemorySubstrate")
            .field("codes", &self.codes.len())
            .field("jobs", &self.jobs.len())
            .field("default_delay", &self.default_delay)
            .finish_non_exhaustive()
    }
}

impl InMemorySubstrate {
    /// Creates a substrate with no registered codes.
    pub fn new() -> Self {
        Self {
            codes: DashMap::new(),
            jobs: DashMap::new(),
            delays: DashMap::new(),
            failures: DashMap::new(),
            hung: DashMap::new(),
            rejected: DashMap::new(),
            default_delay: Duration::ZERO,
            tracker: TaskTracker::new(),
        }
    }

    /// Registers `calculation` under the executable reference `code`.
    pub fn with_code(self, code: impl Into<String>, calculation: Calculation) -> Self {
        self.codes.insert(code.into(), calculation);
        self
    }

    /// Registers the arithmetic-add calculation (`x + y`) under `code`.
    ///
    /// Overflowing sums finish with exit status 1.
    pub fn with_arithmetic_add(self, code: impl Into<String>) -> Self {
        self.with_code(
            code,
            Arc::new(|description: &TaskDescription| {
                description.x.checked_add(description.y).ok_or(1)
            }),
        )
    }

    /// Delay applied to every job without a per-task delay.
    pub fn with_default_delay(mut self, delay: Duration) -> Self {
        self.default_delay = delay;
        self
    }

    /// Delays the job for `task_id` by `delay` before it computes.
    pub fn with_delay(self, task_id: impl Into<String>, delay: Duration) -> Self {
        self.delays.insert(task_id.into(), delay);
        self
    }

    /// Makes the job for `task_id` finish with `exit_status` instead of
    /// running its calculation.
    pub fn with_failure(self, task_id: impl Into<String>, exit_status: i32) -> Self {
        self.failures.insert(task_id.into(), exit_status);
        self
    }

    /// Makes the job for `task_id` run until it is cancelled.
    pub fn with_hang(self, task_id: impl Into<String>) -> Self {
        self.hung.insert(task_id.into(), ());
        self
    }

    /// Makes submission of `task_id` fail with
    /// [`SubstrateError::InvalidDescription`].
    pub fn with_rejection(self, task_id: impl Into<String>) -> Self {
        self.rejected.insert(task_id.into(), ());
        self
    }

    /// Number of jobs accepted so far.
    pub fn submitted_count(&self) -> usize {
        self.jobs.len()
    }

    /// Current state of a job, if it exists.
    pub fn job_state(&self, job_id: Uuid) -> Option<TaskState> {
        self.jobs.get(&job_id).map(|entry| entry.state.borrow().clone())
    }

    /// Orchestrator-side task ids of every accepted job, in no particular order.
    pub fn submitted_task_ids(&self) -> Vec<String> {
        self.jobs.iter().map(|entry| entry.task_id.clone()).collect()
    }

    /// `(task_id, state)` of every accepted job, sorted by task id.
    pub fn task_states(&self) -> Vec<(String, TaskState)> {
        let mut states: Vec<_> = self
            .jobs
            .iter()
            .map(|entry| (entry.task_id.clone(), entry.state.borrow().clone()))
            .collect();
        states.sort_by(|a, b| a.0.cmp(&b.0));
        states
    }

    /// Waits for every spawned job to exit.
    pub async fn drain(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }
}

impl Default for InMemorySubstrate {
    fn default() -> Self {
        Self::new()
    }
}

/// Applies `next` if the state machine allows it. The check and the write
/// happen under the channel's write lock, so a job finishing and a job being
/// killed cannot both win.
fn transition(
    job_id: Uuid,
    state: &watch::Sender<TaskState>,
    next: TaskState,
) -> Result<(), SubstrateError> {
    let mut outcome = Ok(());
    state.send_if_modified(|current| {
        match current
            .status
            .validate_transition(&job_id.to_string(), &next.status)
        {
            Ok(()) => {
                *current = next;
                true
            },
            Err(e) => {
                outcome = Err(e);
                false
            },
        }
    });
    outcome
}

struct JobPlan {
    job_id: Uuid,
    description: TaskDescription,
    calculation: Calculation,
    delay: Duration,
    injected_failure: Option<i32>,
    hang: bool,
}

async fn run_job(plan: JobPlan, state: Arc<watch::Sender<TaskState>>, cancel: CancellationToken) {
    let JobPlan {
        job_id,
        description,
        calculation,
        delay,
        injected_failure,
        hang,
    } = plan;

    if transition(job_id, &state, TaskState::running()).is_err() {
        // Killed before it started.
        return;
    }

    tokio::select! {
        () = cancel.cancelled() => return,
        () = tokio::time::sleep(delay) => {},
    }
    if hang {
        cancel.cancelled().await;
        return;
    }

    let final_state = match injected_failure {
        Some(exit_status) => TaskState::finished_with(exit_status),
        None => match calculation(&description) {
            Ok(result) => TaskState::finished_ok(result),
            Err(exit_status) => TaskState::finished_with(exit_status),
        },
    };

    if let Err(e) = transition(job_id, &state, final_state) {
        tracing::debug!(job_id = %job_id, error = %e, "job finished after it was killed");
    }
}

#[async_trait]
impl ExecutionSubstrate for InMemorySubstrate {
    async fn submit(&self, description: TaskDescription) -> Result<TaskHandle, SubstrateError> {
        let code = description.code.to_string();
        let calculation = self
            .codes
            .get(&code)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(SubstrateError::UnknownCode { code })?;

        let task_id = description.task_id.clone();
        if self.rejected.contains_key(&task_id) {
            return Err(SubstrateError::InvalidDescription {
                message: format!("{task_id} refused by substrate"),
            });
        }
        let job_id = Uuid::new_v4();
        let (tx, rx) = watch::channel(TaskState::created());
        let tx = Arc::new(tx);
        let cancel = CancellationToken::new();

        self.jobs.insert(
            job_id,
            JobEntry {
                task_id: task_id.clone(),
                state: Arc::clone(&tx),
                cancel: cancel.clone(),
            },
        );

        let plan = JobPlan {
            job_id,
            delay: self
                .delays
                .get(&task_id)
                .map_or(self.default_delay, |d| *d.value()),
            injected_failure: self.failures.get(&task_id).map(|f| *f.value()),
            hang: self.hung.contains_key(&task_id),
            description,
            calculation,
        };
        // Queued until the runtime polls the job.
        transition(job_id, &tx, TaskState::waiting())?;
        self.tracker.spawn(run_job(plan, tx, cancel));

        tracing::debug!(task_id = %task_id, job_id = %job_id, "job accepted");
        Ok(TaskHandle::new(task_id, job_id, rx))
    }

    async fn cancel(&self, job_id: Uuid) -> Result<(), SubstrateError> {
        let entry = self.jobs.get(&job_id).ok_or_else(|| SubstrateError::JobNotFound {
            job_id: job_id.to_string(),
        })?;
        transition(job_id, &entry.state, TaskState::killed())?;
        entry.cancel.cancel();
        tracing::debug!(task_id = %entry.task_id, job_id = %job_id, "job killed");
        Ok(())
    }
}
