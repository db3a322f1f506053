//! Data model of a parallel-add run.
//!
//! Inputs ([`TaskSpec`], [`TaskDescription`], [`CodeRef`]), the substrate's
//! view of a calculation ([`TaskStatus`], [`TaskState`], [`TaskNode`]), and
//! the classifier's view ([`TaskOutcome`], [`Aggregate`]).

pub mod code;
pub mod outcome;
pub mod task;

pub use code::CodeRef;
pub use outcome::{Aggregate, OutcomeKind, TaskOutcome};
pub use task::{TaskDescription, TaskNode, TaskSpec, TaskState, TaskStatus};
