//! Default inputs, task identifier format, and output names for the
//! parallel-add workflow.

/// Number of calculations submitted when the caller does not specify one.
pub const DEFAULT_NUM_CALCULATIONS: i64 = 5;

/// Base value for the `x` operand. Calculation `i` receives `base_x + i`.
pub const DEFAULT_BASE_X: i64 = 1;

/// Base value for the `y` operand. Calculation `i` receives `base_y + i`.
pub const DEFAULT_BASE_Y: i64 = 10;

/// Prefix of the per-calculation task identifier (`calc_0`, `calc_1`, ...).
pub const TASK_ID_PREFIX: &str = "calc_";

/// Exit status a substrate reports for a calculation that finished cleanly.
pub const EXIT_STATUS_OK: i32 = 0;

/// Exit status recorded when a failed calculation carries no status of its own
/// (for example a task that raised before reporting one).
pub const EXIT_STATUS_UNKNOWN: i32 = -1;

/// Exit status assigned to a calculation killed through [`cancel`].
///
/// [`cancel`]: crate::substrate::ExecutionSubstrate::cancel
pub const EXIT_STATUS_KILLED: i32 = 130;

/// Output name for the sum over all successful calculation results.
pub const OUTPUT_TOTAL_SUM: &str = "total_sum";

/// Output name for the count of calculations that finished ok.
pub const OUTPUT_NUM_SUCCESSFUL: &str = "num_successful";

/// Output name for the count of calculations that did not finish ok.
pub const OUTPUT_NUM_FAILED: &str = "num_failed";

/// Builds the task identifier for calculation `index`.
///
/// # Examples
///
/// ```
/// use scatter_gather::constants::task_id_for;
///
/// assert_eq!(task_id_for(0), "calc_0");
/// assert_eq!(task_id_for(12), "calc_12");
/// ```
pub fn task_id_for(index: usize) -> String {
    format!("{TASK_ID_PREFIX}{index}")
}

/// Terminal exit status of a run where every calculation finished ok.
pub const EXIT_CODE_OK: u32 = 0;

/// Terminal exit status of a run where some, but not all, calculations failed.
pub const EXIT_CODE_SOME_CALCULATIONS_FAILED: u32 = 400;

/// Terminal exit status of a run where every calculation failed.
pub const EXIT_CODE_ALL_CALCULATIONS_FAILED: u32 = 401;
