//! TOML-based workflow configuration.
//!
//! # Example TOML
//!
//! ```toml
//! code = "add@localhost"
//! num_calculations = 4
//! base_x = 1
//! base_y = 10
//!
//! # Optional, in milliseconds. No timeout when absent.
//! barrier_timeout_ms = 600000
//! ```
//!
//! Every field except `code` has a default (5 calculations, `base_x = 1`,
//! `base_y = 10`, no barrier timeout).

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_BASE_X, DEFAULT_BASE_Y, DEFAULT_NUM_CALCULATIONS};
use crate::error::OrchestrationError;
use crate::types::code::CodeRef;

/// Inputs of one parallel-add run.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use scatter_gather::WorkflowConfig;
///
/// let config = WorkflowConfig::new("add@localhost")
///     .with_num_calculations(4)
///     .with_barrier_timeout(Duration::from_secs(30));
/// assert!(config.validate().is_ok());
/// assert_eq!(config.base_x, 1);
/// assert_eq!(config.base_y, 10);
/// ```
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct WorkflowConfig {
    /// Executable reference (`label@computer`) every calculation runs.
    #[serde(default)]
    pub code: String,

    /// Number of calculations to submit in parallel.
    #[serde(default = "default_num_calculations")]
    pub num_calculations: i64,

    /// Base value for `x`, incremented per calculation.
    #[serde(default = "default_base_x")]
    pub base_x: i64,

    /// Base value for `y`, incremented per calculation.
    #[serde(default = "default_base_y")]
    pub base_y: i64,

    /// Upper bound on the completion barrier, in milliseconds. `None` waits
    /// indefinitely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub barrier_timeout_ms: Option<u64>,
}

fn default_num_calculations() -> i64 {
    DEFAULT_NUM_CALCULATIONS
}

fn default_base_x() -> i64 {
    DEFAULT_BASE_X
}

fn default_base_y() -> i64 {
    DEFAULT_BASE_Y
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            code: String::new(),
            num_calculations: DEFAULT_NUM_CALCULATIONS,
            base_x: DEFAULT_BASE_X,
            base_y: DEFAULT_BASE_Y,
            barrier_timeout_ms: None,
        }
    }
}

impl WorkflowConfig {
    /// Creates a config for `code` with default counts and operands.
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            ..Self::default()
        }
    }

    /// Sets the number of calculations.
    pub fn with_num_calculations(mut self, n: i64) -> Self {
        self.num_calculations = n;
        self
    }

    /// Sets the `x` base value.
    pub fn with_base_x(mut self, base_x: i64) -> Self {
        self.base_x = base_x;
        self
    }

    /// Sets the `y` base value.
    pub fn with_base_y(mut self, base_y: i64) -> Self {
        self.base_y = base_y;
        self
    }

    /// Bounds the completion barrier. Sub-millisecond remainders round up,
    /// so the barrier never fires before `timeout` has elapsed.
    pub fn with_barrier_timeout(mut self, timeout: Duration) -> Self {
        let millis = timeout.as_nanos().div_ceil(1_000_000).max(1);
        self.barrier_timeout_ms = Some(u64::try_from(millis).unwrap_or(u64::MAX));
        self
    }

    /// Parse a TOML string into a validated [`WorkflowConfig`].
    pub fn from_toml(content: &str) -> Result<Self, OrchestrationError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a [`WorkflowConfig`] from a file path.
    ///
    /// Returns [`OrchestrationError::ConfigIo`] if the file cannot be read,
    /// [`OrchestrationError::ConfigParse`] if the TOML is malformed, or
    /// [`OrchestrationError::InvalidArgument`] if validation fails.
    pub fn load(path: &Path) -> Result<Self, OrchestrationError> {
        let content =
            std::fs::read_to_string(path).map_err(|source| OrchestrationError::ConfigIo {
                source,
                path: path.display().to_string(),
            })?;
        Self::from_toml(&content)
    }

    /// The parsed executable reference.
    ///
    /// # Errors
    ///
    /// [`OrchestrationError::InvalidArgument`] if `code` is empty or not of
    /// the form `label@computer`.
    pub fn code_ref(&self) -> Result<CodeRef, OrchestrationError> {
        self.code.parse()
    }

    /// The barrier timeout, if one is configured.
    pub fn barrier_timeout(&self) -> Option<Duration> {
        self.barrier_timeout_ms.map(Duration::from_millis)
    }

    /// Validate that the config is semantically correct.
    ///
    /// Checks:
    /// - `num_calculations` is positive
    /// - `code` is a well-formed executable reference
    /// - `barrier_timeout_ms`, when set, is positive
    pub fn validate(&self) -> Result<(), OrchestrationError> {
        if self.num_calculations <= 0 {
            return Err(OrchestrationError::invalid_argument(
                "num_calculations",
                format!("must be positive, got {}", self.num_calculations),
            ));
        }

        self.code_ref()?;

        if self.barrier_timeout_ms == Some(0) {
            return Err(OrchestrationError::invalid_argument(
                "barrier_timeout_ms",
                "must be positive when set",
            ));
        }

        Ok(())
    }
}
