//! Task factory: derives per-calculation operands from an index.

use crate::error::OrchestrationError;
use crate::types::task::TaskSpec;

/// Builds `num_calculations` specs with `x = base_x + i`, `y = base_y + i`,
/// in index order.
///
/// # Errors
///
/// [`OrchestrationError::InvalidArgument`] if `num_calculations <= 0`, if it
/// does not fit in `usize`, or if an operand would overflow `i64`.
///
/// # Examples
///
/// ```
/// use scatter_gather::factory::build_task_specs;
///
/// let specs = build_task_specs(3, 1, 10).unwrap();
/// let operands: Vec<_> = specs.iter().map(|s| (s.x, s.y)).collect();
/// assert_eq!(operands, vec![(1, 10), (2, 11), (3, 12)]);
///
/// assert!(build_task_specs(0, 1, 10).is_err());
/// ```
pub fn build_task_specs(
    num_calculations: i64,
    base_x: i64,
    base_y: i64,
) -> Result<Vec<TaskSpec>, OrchestrationError> {
    if num_calculations <= 0 {
        return Err(OrchestrationError::invalid_argument(
            "num_calculations",
            format!("must be positive, got {num_calculations}"),
        ));
    }
    let count = usize::try_from(num_calculations).map_err(|_| {
        OrchestrationError::invalid_argument(
            "num_calculations",
            format!("{num_calculations} exceeds the platform limit"),
        )
    })?;

    (0..count)
        .map(|index| {
            // index < num_calculations <= i64::MAX, so the cast is lossless.
            let offset = index as i64;
            let x = base_x.checked_add(offset).ok_or_else(|| overflow("base_x", index))?;
            let y = base_y.checked_add(offset).ok_or_else(|| overflow("base_y", index))?;
            Ok(TaskSpec { index, x, y })
        })
        .collect()
}

fn overflow(argument: &str, index: usize) -> OrchestrationError {
    OrchestrationError::invalid_argument(
        argument,
        format!("operand for calculation {index} overflows i64"),
    )
}
