//! Classified outcomes and the aggregate built from them.

use serde::{Deserialize, Serialize};

use crate::error::OrchestrationError;

/// How one calculation ended, as seen by the classifier.
///
/// The two variants make the outcome invariant structural: a success always
/// carries a result and never an exit status, a failure the reverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum OutcomeKind {
    /// Finished ok with a numeric result.
    Succeeded {
        /// The calculation's `sum` output.
        result_value: i64,
    },
    /// Reached any other terminal state.
    Failed {
        /// Exit status, for diagnostics only.
        exit_status: i32,
    },
}

/// Read-only classification of one resolved calculation.
///
/// # Examples
///
/// ```
/// use scatter_gather::{OutcomeKind, TaskOutcome};
///
/// let ok = TaskOutcome::new(0, OutcomeKind::Succeeded { result_value: 11 });
/// assert!(ok.succeeded());
/// assert_eq!(ok.result_value(), Some(11));
/// assert_eq!(ok.exit_status(), None);
///
/// let failed = TaskOutcome::new(2, OutcomeKind::Failed { exit_status: 1 });
/// assert_eq!(failed.task_id, "calc_2");
/// assert_eq!(failed.result_value(), None);
/// assert_eq!(failed.exit_status(), Some(1));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOutcome {
    /// Identifier (`calc_<index>`).
    pub task_id: String,
    /// Submission index.
    pub index: usize,
    /// Success with a value, or failure with an exit status.
    #[serde(flatten)]
    pub kind: OutcomeKind,
}

impl TaskOutcome {
    /// Builds the outcome for calculation `index`.
    pub fn new(index: usize, kind: OutcomeKind) -> Self {
        Self {
            task_id: crate::constants::task_id_for(index),
            index,
            kind,
        }
    }

    /// Returns `true` if the calculation finished ok.
    pub fn succeeded(&self) -> bool {
        matches!(self.kind, OutcomeKind::Succeeded { .. })
    }

    /// The result, present only on success.
    pub fn result_value(&self) -> Option<i64> {
        match self.kind {
            OutcomeKind::Succeeded { result_value } => Some(result_value),
            OutcomeKind::Failed { .. } => None,
        }
    }

    /// The exit status, present only on failure.
    pub fn exit_status(&self) -> Option<i32> {
        match self.kind {
            OutcomeKind::Succeeded { .. } => None,
            OutcomeKind::Failed { exit_status } => Some(exit_status),
        }
    }
}

/// Accumulator of the classification step.
///
/// After every outcome has been recorded, `num_successful + num_failed`
/// equals the number of calculations and `total_sum` is the sum of the
/// successful results.
///
/// # Examples
///
/// ```
/// use scatter_gather::{Aggregate, OutcomeKind, TaskOutcome};
///
/// let mut aggregate = Aggregate::default();
/// aggregate.record(&TaskOutcome::new(0, OutcomeKind::Succeeded { result_value: 11 })).unwrap();
/// aggregate.record(&TaskOutcome::new(1, OutcomeKind::Failed { exit_status: 1 })).unwrap();
/// assert_eq!(aggregate.total_sum, 11);
/// assert_eq!(aggregate.total(), 2);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregate {
    /// Sum of successful results.
    pub total_sum: i64,
    /// Calculations that finished ok.
    pub num_successful: i64,
    /// Calculations that did not.
    pub num_failed: i64,
}

impl Aggregate {
    /// Folds one outcome into the accumulator.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestrationError::AggregateOverflow`] if adding the
    /// result would overflow `total_sum`. The accumulator is left unchanged.
    pub fn record(&mut self, outcome: &TaskOutcome) -> Result<(), OrchestrationError> {
        match outcome.kind {
            OutcomeKind::Succeeded { result_value } => {
                self.total_sum = self.total_sum.checked_add(result_value).ok_or_else(|| {
                    OrchestrationError::AggregateOverflow {
                        task_id: outcome.task_id.clone(),
                    }
                })?;
                self.num_successful += 1;
            },
            OutcomeKind::Failed { .. } => self.num_failed += 1,
        }
        Ok(())
    }

    /// Number of calculations recorded so far.
    pub fn total(&self) -> i64 {
        self.num_successful + self.num_failed
    }
}
