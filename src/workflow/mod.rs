//! The parallel-add workflow.
//!
//! A run moves through four steps, each exposed as a method on
//! [`WorkflowRun`] so callers can drive it one step at a time:
//!
//! 1. [`submit_calculations`](WorkflowRun::submit_calculations): fan out one
//!    calculation per index.
//! 2. [`await_calculations`](WorkflowRun::await_calculations): the
//!    completion barrier.
//! 3. [`inspect_calculations`](WorkflowRun::inspect_calculations): classify,
//!    aggregate and decide.
//! 4. [`results`](WorkflowRun::results): store, then publish, the three
//!    aggregate outputs.
//!
//! [`ParallelAddWorkflow::run`] drives all four and returns a
//! [`WorkflowResult`].
//!
//! # Run lifecycle
//!
//! ```text
//! Created --submit--> Submitted --await--> Resolved --inspect--> Inspected --results--> Finished
//!                                                         |
//!                                                         +-- AllFailed --> Finished (no outputs)
//! ```
//!
//! A fatal error in any step moves the run to `Aborted`, which is terminal:
//! every later step fails with `StepOutOfOrder`, so an aborted run can never
//! be resumed into publishing outputs.

pub mod barrier;
pub mod classify;
pub mod dispatch;
pub mod materialize;
pub mod policy;
pub mod report;

pub use barrier::ResolvedTask;
pub use classify::Classification;
pub use materialize::{MaterializedOutputs, Outputs};
pub use policy::TerminationDecision;
pub use report::{ProcessReport, ReportEntry};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::WorkflowConfig;
use crate::error::OrchestrationError;
use crate::factory::build_task_specs;
use crate::store::{ScalarStore, StoredScalar};
use crate::substrate::ExecutionSubstrate;
use crate::types::code::CodeRef;
use crate::types::outcome::{Aggregate, TaskOutcome};
use crate::types::task::TaskSpec;

use dispatch::PendingSet;

/// Where a [`WorkflowRun`] is in its step sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    /// Specs built, nothing submitted.
    Created,
    /// Every calculation accepted by the substrate.
    Submitted,
    /// Every calculation terminal.
    Resolved,
    /// Outcomes classified and a decision made.
    Inspected,
    /// Done. Outputs published unless every calculation failed.
    Finished,
    /// A step failed fatally. No outputs.
    Aborted,
}

impl RunPhase {
    /// Returns `true` for `Finished` and `Aborted`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Aborted)
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Submitted => write!(f, "submitted"),
            Self::Resolved => write!(f, "resolved"),
            Self::Inspected => write!(f, "inspected"),
            Self::Finished => write!(f, "finished"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

/// One parallel-add run, driven step by step.
///
/// Owns the pending set, the outcomes and the report. Nothing here is shared
/// with the running calculations; they only ever see their own description.
#[derive(Debug)]
pub struct WorkflowRun {
    run_id: Uuid,
    code: CodeRef,
    specs: Vec<TaskSpec>,
    phase: RunPhase,
    pending: PendingSet,
    resolved: Vec<ResolvedTask>,
    outcomes: Vec<TaskOutcome>,
    aggregate: Aggregate,
    decision: Option<TerminationDecision>,
    report: ProcessReport,
}

impl WorkflowRun {
    /// Validates `config` and prepares the calculation specs.
    ///
    /// # Errors
    ///
    /// [`OrchestrationError::InvalidArgument`] for a non-positive count, a
    /// malformed code reference or operands that overflow. Nothing has been
    /// submitted when this fails.
    pub fn new(config: &WorkflowConfig) -> Result<Self, OrchestrationError> {
        config.validate()?;
        let code = config.code_ref()?;
        let specs = build_task_specs(config.num_calculations, config.base_x, config.base_y)?;
        let run_id = Uuid::new_v4();
        tracing::debug!(
            run_id = %run_id,
            code = %code,
            num_calculations = specs.len(),
            "workflow run created"
        );
        Ok(Self {
            run_id,
            code,
            pending: PendingSet::with_capacity(specs.len()),
            specs,
            phase: RunPhase::Created,
            resolved: Vec::new(),
            outcomes: Vec::new(),
            aggregate: Aggregate::default(),
            decision: None,
            report: ProcessReport::default(),
        })
    }

    /// Unique id of this run.
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// The executable reference every calculation runs.
    pub fn code(&self) -> &CodeRef {
        &self.code
    }

    /// Calculation specs in index order.
    pub fn specs(&self) -> &[TaskSpec] {
        &self.specs
    }

    /// Current phase.
    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// Calculations submitted and not yet resolved.
    pub fn pending(&self) -> &PendingSet {
        &self.pending
    }

    /// Classified outcomes, in index order. Empty before inspection.
    pub fn outcomes(&self) -> &[TaskOutcome] {
        &self.outcomes
    }

    /// Aggregate over the outcomes. Zero before inspection.
    pub fn aggregate(&self) -> Aggregate {
        self.aggregate
    }

    /// The decision, once inspection has run.
    pub fn decision(&self) -> Option<TerminationDecision> {
        self.decision
    }

    /// The run's report so far.
    pub fn report(&self) -> &ProcessReport {
        &self.report
    }

    fn expect_phase(&self, step: &'static str, expected: RunPhase) -> Result<(), OrchestrationError> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(OrchestrationError::StepOutOfOrder {
                step,
                phase: self.phase.to_string(),
            })
        }
    }

    /// Moves the run to `Aborted` if `result` is a fatal error.
    fn abort_on_err<T>(
        &mut self,
        step: &'static str,
        result: Result<T, OrchestrationError>,
    ) -> Result<T, OrchestrationError> {
        if let Err(e) = &result {
            tracing::error!(step, phase = %self.phase, error = %e, "workflow run aborted");
            self.phase = RunPhase::Aborted;
        }
        result
    }

    /// Submits every calculation.
    ///
    /// # Errors
    ///
    /// - [`OrchestrationError::StepOutOfOrder`] unless the run is `Created`.
    /// - [`OrchestrationError::SubmissionRejected`] if the substrate refuses
    ///   a calculation. Those already accepted are cancelled and the run
    ///   is `Aborted`.
    pub async fn submit_calculations(
        &mut self,
        substrate: &dyn ExecutionSubstrate,
    ) -> Result<(), OrchestrationError> {
        self.expect_phase("submit_calculations", RunPhase::Created)?;
        let submitted = dispatch::submit_all(substrate, &self.code, &self.specs, &mut self.report).await;
        self.pending = self.abort_on_err("submit_calculations", submitted)?;
        self.phase = RunPhase::Submitted;
        Ok(())
    }

    /// Blocks until every submitted calculation is terminal.
    ///
    /// # Errors
    ///
    /// - [`OrchestrationError::StepOutOfOrder`] unless the run is `Submitted`.
    /// - [`OrchestrationError::BarrierTimeout`] if `timeout` elapses first.
    ///   The run is `Aborted`.
    pub async fn await_calculations(
        &mut self,
        substrate: &dyn ExecutionSubstrate,
        timeout: Option<Duration>,
    ) -> Result<(), OrchestrationError> {
        self.expect_phase("await_calculations", RunPhase::Submitted)?;
        let resolved = barrier::await_all(substrate, &mut self.pending, timeout).await;
        self.resolved = self.abort_on_err("await_calculations", resolved)?;
        self.pending.clear();
        self.phase = RunPhase::Resolved;
        tracing::debug!(resolved = self.resolved.len(), "completion barrier opened");
        Ok(())
    }

    /// Classifies every resolved calculation and applies the partial-failure
    /// policy.
    ///
    /// # Errors
    ///
    /// - [`OrchestrationError::StepOutOfOrder`] unless the run is `Resolved`.
    /// - [`OrchestrationError::AggregateOverflow`] if `total_sum` overflows.
    ///   The run is `Aborted`.
    pub fn inspect_calculations(&mut self) -> Result<TerminationDecision, OrchestrationError> {
        self.expect_phase("inspect_calculations", RunPhase::Resolved)?;
        let classified = classify::classify_all(&self.resolved, &mut self.report);
        let Classification {
            outcomes,
            aggregate,
        } = self.abort_on_err("inspect_calculations", classified)?;

        let decision = TerminationDecision::evaluate(aggregate.num_failed, aggregate.total());
        self.outcomes = outcomes;
        self.aggregate = aggregate;
        self.decision = Some(decision);

        if !decision.is_finished_ok() {
            self.report.report(format!(
                "Exiting with status {}: {}",
                decision.exit_status(),
                decision.message()
            ));
        }

        if decision.produces_outputs() {
            self.phase = RunPhase::Inspected;
        } else {
            self.phase = RunPhase::Finished;
        }
        Ok(decision)
    }

    /// Stores and publishes `total_sum`, `num_successful` and `num_failed`.
    ///
    /// # Errors
    ///
    /// - [`OrchestrationError::StepOutOfOrder`] unless the run is
    ///   `Inspected`. In particular, a run whose calculations all failed has
    ///   no outputs.
    /// - [`OrchestrationError::Store`] if any output cannot be stored. The
    ///   run is `Aborted`; nothing is published and the step cannot be
    ///   retried.
    pub async fn results(&mut self, store: &dyn ScalarStore) -> Result<Outputs, OrchestrationError> {
        self.expect_phase("results", RunPhase::Inspected)?;
        let materialized = materialize::materialize(&self.aggregate, store).await;
        let outputs = self.abort_on_err("results", materialized)?.publish();
        self.report.report(format!(
            "Workflow completed with {} successful calculations.",
            self.aggregate.num_successful
        ));
        self.phase = RunPhase::Finished;
        Ok(outputs)
    }

    fn into_result(self, outputs: Option<Outputs>) -> WorkflowResult {
        let decision = self.decision.unwrap_or(TerminationDecision::AllFailed);
        WorkflowResult {
            run_id: self.run_id,
            decision,
            outputs,
            aggregate: self.aggregate,
            outcomes: self.outcomes,
            report: self.report,
        }
    }
}

/// Everything a finished run hands back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowResult {
    /// Unique id of the run.
    pub run_id: Uuid,
    /// Decision of the partial-failure policy.
    pub decision: TerminationDecision,
    /// Published outputs; `None` when every calculation failed.
    pub outputs: Option<Outputs>,
    /// Counts and sum.
    pub aggregate: Aggregate,
    /// Per-calculation outcomes, in index order.
    pub outcomes: Vec<TaskOutcome>,
    /// The run's report.
    pub report: ProcessReport,
}

impl WorkflowResult {
    /// Exit status of the run: 0, 400 or 401.
    pub fn exit_status(&self) -> u32 {
        self.decision.exit_status()
    }

    /// Returns `true` for plain success.
    pub fn is_finished_ok(&self) -> bool {
        self.decision.is_finished_ok()
    }

    /// A published output by name.
    pub fn output(&self, name: &str) -> Option<&StoredScalar> {
        self.outputs.as_ref().and_then(|outputs| outputs.get(name))
    }
}

/// Runs complete parallel-add workflows against a substrate and a store.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use scatter_gather::workflow::ParallelAddWorkflow;
/// use scatter_gather::store::memory::InMemoryScalarStore;
/// use scatter_gather::substrate::memory::InMemorySubstrate;
/// use scatter_gather::WorkflowConfig;
///
/// # #[tokio::main]
/// # async fn main() {
/// let workflow = ParallelAddWorkflow::new(
///     Arc::new(InMemorySubstrate::new().with_arithmetic_add("add@localhost")),
///     Arc::new(InMemoryScalarStore::new()),
/// );
/// let config = WorkflowConfig::new("add@localhost").with_num_calculations(4);
/// let result = workflow.run(&config).await.unwrap();
/// assert_eq!(result.exit_status(), 0);
/// assert_eq!(result.output("total_sum").map(|s| s.value()), Some(56));
/// # }
/// ```
#[derive(Clone)]
pub struct ParallelAddWorkflow {
    substrate: Arc<dyn ExecutionSubstrate>,
    store: Arc<dyn ScalarStore>,
}

impl fmt::Debug for ParallelAddWorkflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParallelAddWorkflow").finish_non_exhaustive()
    }
}

impl ParallelAddWorkflow {
    /// Creates a workflow over `substrate` and `store`.
    pub fn new(substrate: Arc<dyn ExecutionSubstrate>, store: Arc<dyn ScalarStore>) -> Self {
        Self { substrate, store }
    }

    /// Runs one workflow to completion.
    ///
    /// Per-calculation failures are not errors: they show up in the
    /// returned [`WorkflowResult`] as a 400 or 401 decision.
    ///
    /// # Errors
    ///
    /// Any fatal [`OrchestrationError`]. No outputs are published when one
    /// is returned.
    pub async fn run(&self, config: &WorkflowConfig) -> Result<WorkflowResult, OrchestrationError> {
        let mut run = WorkflowRun::new(config)?;
        let span = tracing::info_span!(
            "parallel_add",
            run_id = %run.run_id(),
            code = %run.code(),
            num_calculations = run.specs().len()
        );
        let timeout = config.barrier_timeout();
        async move {
            run.submit_calculations(self.substrate.as_ref()).await?;
            run.await_calculations(self.substrate.as_ref(), timeout).await?;
            let decision = run.inspect_calculations()?;
            let outputs = if decision.produces_outputs() {
                Some(run.results(self.store.as_ref()).await?)
            } else {
                None
            };
            tracing::info!(decision = %decision, "workflow finished");
            Ok::<_, OrchestrationError>(run.into_result(outputs))
        }
        .instrument(span)
        .await
    }
}
