//! Partial-failure policy.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{
    EXIT_CODE_ALL_CALCULATIONS_FAILED, EXIT_CODE_OK, EXIT_CODE_SOME_CALCULATIONS_FAILED,
};

/// Terminal outcome of a run.
///
/// Each variant carries a fixed exit status, label and message. The exit
/// statuses are stable literals that callers branch on.
///
/// | Decision     | Exit status | Outputs |
/// |--------------|-------------|---------|
/// | `AllOk`      | 0           | yes     |
/// | `SomeFailed` | 400         | yes     |
/// | `AllFailed`  | 401         | no      |
///
/// # Examples
///
/// ```
/// use scatter_gather::TerminationDecision;
///
/// let decision = TerminationDecision::evaluate(1, 4);
/// assert_eq!(decision, TerminationDecision::SomeFailed);
/// assert_eq!(decision.exit_status(), 400);
/// assert_eq!(decision.label(), Some("ERROR_SOME_CALCULATIONS_FAILED"));
/// assert!(decision.produces_outputs());
///
/// assert_eq!(TerminationDecision::evaluate(2, 2).exit_status(), 401);
/// assert!(TerminationDecision::evaluate(0, 2).is_finished_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TerminationDecision {
    /// No calculation failed.
    AllOk,
    /// At least one calculation failed and at least one succeeded.
    SomeFailed,
    /// Every calculation failed.
    AllFailed,
}

impl TerminationDecision {
    /// Maps `(num_failed, total)` to a decision.
    ///
    /// Checked in this order: `num_failed == total` is `AllFailed`, then any
    /// failure is `SomeFailed`, otherwise `AllOk`. The degenerate `total == 0`
    /// therefore maps to `AllFailed`.
    pub fn evaluate(num_failed: i64, total: i64) -> Self {
        if num_failed == total {
            Self::AllFailed
        } else if num_failed > 0 {
            Self::SomeFailed
        } else {
            Self::AllOk
        }
    }

    /// Exit status of the run: 0, 400 or 401.
    pub fn exit_status(&self) -> u32 {
        match self {
            Self::AllOk => EXIT_CODE_OK,
            Self::SomeFailed => EXIT_CODE_SOME_CALCULATIONS_FAILED,
            Self::AllFailed => EXIT_CODE_ALL_CALCULATIONS_FAILED,
        }
    }

    /// Symbolic name of the exit code. Plain success has none.
    pub fn label(&self) -> Option<&'static str> {
        match self {
            Self::AllOk => None,
            Self::SomeFailed => Some("ERROR_SOME_CALCULATIONS_FAILED"),
            Self::AllFailed => Some("ERROR_ALL_CALCULATIONS_FAILED"),
        }
    }

    /// Human-readable description.
    pub fn message(&self) -> &'static str {
        match self {
            Self::AllOk => "All calculations completed successfully.",
            Self::SomeFailed => "Some calculations failed to complete successfully.",
            Self::AllFailed => "All calculations failed to complete successfully.",
        }
    }

    /// Returns `true` when the run ends in plain success.
    pub fn is_finished_ok(&self) -> bool {
        matches!(self, Self::AllOk)
    }

    /// Returns `true` when outputs are materialized: everything but `AllFailed`.
    pub fn produces_outputs(&self) -> bool {
        !matches!(self, Self::AllFailed)
    }
}

impl fmt::Display for TerminationDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.label() {
            Some(label) => write!(f, "{} {label}", self.exit_status()),
            None => write!(f, "{} OK", self.exit_status()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(0, 4 => TerminationDecision::AllOk ; "none failed")]
    #[test_case(1, 4 => TerminationDecision::SomeFailed ; "one failed")]
    #[test_case(3, 4 => TerminationDecision::SomeFailed ; "all but one failed")]
    #[test_case(4, 4 => TerminationDecision::AllFailed ; "all failed")]
    #[test_case(1, 1 => TerminationDecision::AllFailed ; "single calculation failed")]
    #[test_case(0, 1 => TerminationDecision::AllOk ; "single calculation ok")]
    #[test_case(0, 0 => TerminationDecision::AllFailed ; "empty run")]
    fn evaluate(num_failed: i64, total: i64) -> TerminationDecision {
        TerminationDecision::evaluate(num_failed, total)
    }

    #[test]
    fn exit_statuses_are_stable() {
        assert_eq!(TerminationDecision::AllOk.exit_status(), 0);
        assert_eq!(TerminationDecision::SomeFailed.exit_status(), 400);
        assert_eq!(TerminationDecision::AllFailed.exit_status(), 401);
    }

    #[test]
    fn only_all_failed_suppresses_outputs() {
        assert!(TerminationDecision::AllOk.produces_outputs());
        assert!(TerminationDecision::SomeFailed.produces_outputs());
        assert!(!TerminationDecision::AllFailed.produces_outputs());
    }

    #[test]
    fn display_and_serde() {
        assert_eq!(TerminationDecision::AllOk.to_string(), "0 OK");
        assert_eq!(
            TerminationDecision::AllFailed.to_string(),
            "401 ERROR_ALL_CALCULATIONS_FAILED"
        );
        assert_eq!(
            serde_json::to_value(TerminationDecision::SomeFailed).unwrap(),
            "SOME_FAILED"
        );
    }
}
