//! Error types for parallel-add orchestration.
//!
//! [`OrchestrationError`] covers the failures that abort a run as a whole.
//! Per-calculation failures are never errors: they are counted by the
//! classifier and reported through the run's
//! [`TerminationDecision`](crate::workflow::TerminationDecision).

use std::time::Duration;

use crate::store::StoreError;
use crate::substrate::SubstrateError;

/// Errors that abort an orchestration run.
///
/// Every variant is fatal: a run that returns one of these never exposes
/// outputs. Use [`category`](OrchestrationError::category) to branch on the
/// failure class without matching every variant.
///
/// # Examples
///
/// ```
/// use scatter_gather::OrchestrationError;
///
/// let err = OrchestrationError::invalid_argument("num_calculations", "must be positive, got 0");
/// assert_eq!(err.category(), "configuration");
/// assert!(err.is_pre_submission());
/// assert!(err.to_string().contains("num_calculations"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum OrchestrationError {
    /// A workflow input is missing or out of range. Raised before anything is
    /// submitted.
    #[error("invalid argument `{argument}`: {message}")]
    InvalidArgument {
        /// Name of the offending input.
        argument: String,
        /// What is wrong with it.
        message: String,
    },

    /// The execution substrate refused a calculation at submit time.
    #[error("submission of {task_id} rejected: {source}")]
    SubmissionRejected {
        /// Identifier of the calculation that was refused.
        task_id: String,
        /// The substrate's reason.
        #[source]
        source: SubstrateError,
    },

    /// The completion barrier did not open within the configured timeout.
    #[error("completion barrier timed out after {waited:?} with {pending} calculation(s) outstanding")]
    BarrierTimeout {
        /// How long the barrier waited.
        waited: Duration,
        /// Calculations still non-terminal when the timeout fired.
        pending: usize,
    },

    /// Summing the successful results overflowed the integer range.
    #[error("total_sum overflowed while adding the result of {task_id}")]
    AggregateOverflow {
        /// The calculation whose result could not be added.
        task_id: String,
    },

    /// The storage collaborator failed to persist an output.
    #[error("failed to store output `{output}`: {source}")]
    Store {
        /// Name of the output being stored.
        output: &'static str,
        /// The underlying storage failure.
        #[source]
        source: StoreError,
    },

    /// A run step was invoked out of sequence.
    #[error("step `{step}` cannot run while the workflow is {phase}")]
    StepOutOfOrder {
        /// The step that was attempted.
        step: &'static str,
        /// The phase the run was in.
        phase: String,
    },

    /// TOML parse failure in a workflow config file.
    #[error("failed to parse workflow config TOML: {source}")]
    ConfigParse {
        #[from]
        source: toml::de::Error,
    },

    /// The workflow config file could not be read.
    #[error("failed to read workflow config '{path}': {source}")]
    ConfigIo {
        source: std::io::Error,
        path: String,
    },
}

impl OrchestrationError {
    /// Shorthand for [`OrchestrationError::InvalidArgument`].
    pub fn invalid_argument(argument: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            argument: argument.into(),
            message: message.into(),
        }
    }

    /// Returns the failure class as a static string.
    ///
    /// Categories: `"configuration"`, `"submission"`, `"barrier"`,
    /// `"aggregation"`, `"storage"`, `"sequencing"`.
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidArgument { .. } | Self::ConfigParse { .. } | Self::ConfigIo { .. } => {
                "configuration"
            },
            Self::SubmissionRejected { .. } => "submission",
            Self::BarrierTimeout { .. } => "barrier",
            Self::AggregateOverflow { .. } => "aggregation",
            Self::Store { .. } => "storage",
            Self::StepOutOfOrder { .. } => "sequencing",
        }
    }

    /// Returns `true` if the error was raised before any calculation was
    /// submitted.
    pub fn is_pre_submission(&self) -> bool {
        self.category() == "configuration"
    }
}
