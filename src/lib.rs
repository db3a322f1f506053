//! Scatter-gather orchestration of homogeneous calculations.
//!
//! This crate fans out N independent `x + y` calculations to an execution
//! substrate, waits on a completion barrier until every one of them is
//! terminal, classifies the results, and applies a partial-failure policy:
//!
//! - every calculation succeeded: exit status 0, outputs published
//! - some failed: exit status 400 (`ERROR_SOME_CALCULATIONS_FAILED`),
//!   outputs still published
//! - all failed: exit status 401 (`ERROR_ALL_CALCULATIONS_FAILED`), no
//!   outputs
//!
//! The outputs (`total_sum`, `num_successful`, `num_failed`) are persisted
//! through a [`ScalarStore`](store::ScalarStore) before they become visible.
//!
//! # Module Organization
//!
//! - [`workflow`] - The run driver: dispatch, barrier, classify, policy,
//!   materialize, report
//! - [`substrate`] - Execution substrate trait, task handles, in-memory
//!   substrate
//! - [`store`] - Scalar store trait and in-memory store
//! - [`types`] - Code references, task specs and states, outcomes
//! - [`config`] - TOML workflow configuration
//! - [`factory`] - Derives calculation operands from an index
//! - [`error`] - [`OrchestrationError`]
//! - [`constants`] - Defaults, output names and exit codes
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use scatter_gather::store::memory::InMemoryScalarStore;
//! use scatter_gather::substrate::memory::InMemorySubstrate;
//! use scatter_gather::workflow::ParallelAddWorkflow;
//! use scatter_gather::{TerminationDecision, WorkflowConfig};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), scatter_gather::OrchestrationError> {
//! let substrate = InMemorySubstrate::new()
//!     .with_arithmetic_add("add@localhost")
//!     .with_failure("calc_2", 1);
//! let workflow = ParallelAddWorkflow::new(Arc::new(substrate), Arc::new(InMemoryScalarStore::new()));
//!
//! let result = workflow.run(&WorkflowConfig::new("add@localhost").with_num_calculations(4)).await?;
//! assert_eq!(result.decision, TerminationDecision::SomeFailed);
//! assert_eq!(result.exit_status(), 400);
//! assert_eq!(result.output("total_sum").map(|s| s.value()), Some(41));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod factory;
pub mod store;
pub mod substrate;
pub mod types;
pub mod workflow;

#[cfg(feature = "logging")]
pub mod logging;

// Re-exports for ergonomic access
pub use config::WorkflowConfig;
pub use error::OrchestrationError;
pub use types::*;
pub use workflow::{ParallelAddWorkflow, TerminationDecision, WorkflowResult, WorkflowRun};

#[cfg(feature = "logging")]
pub use logging::init_logging;
