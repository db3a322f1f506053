//! Executable references.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::OrchestrationError;

/// Reference to an installed executable, written `label@computer`.
///
/// Every calculation description carries one. The orchestrator only checks
/// that the reference is well formed; whether the code actually exists is
/// for the substrate to decide at submit time.
///
/// # Examples
///
/// ```
/// use scatter_gather::CodeRef;
///
/// let code: CodeRef = "add@localhost".parse().unwrap();
/// assert_eq!(code.label(), "add");
/// assert_eq!(code.computer(), "localhost");
/// assert_eq!(code.to_string(), "add@localhost");
///
/// assert!("add".parse::<CodeRef>().is_err());
/// assert!("@localhost".parse::<CodeRef>().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CodeRef {
    label: String,
    computer: String,
}

impl CodeRef {
    /// Creates a reference from its two parts.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestrationError::InvalidArgument`] if either part is empty
    /// or contains `@` or whitespace.
    pub fn new(label: impl Into<String>, computer: impl Into<String>) -> Result<Self, OrchestrationError> {
        let label = label.into();
        let computer = computer.into();
        validate_part("label", &label)?;
        validate_part("computer", &computer)?;
        Ok(Self { label, computer })
    }

    /// The code label (`add` in `add@localhost`).
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The computer the code is installed on (`localhost` in `add@localhost`).
    pub fn computer(&self) -> &str {
        &self.computer
    }
}

fn validate_part(part: &str, value: &str) -> Result<(), OrchestrationError> {
    if value.is_empty() {
        return Err(OrchestrationError::invalid_argument(
            "code",
            format!("executable reference has an empty {part}"),
        ));
    }
    if value.contains('@') || value.chars().any(char::is_whitespace) {
        return Err(OrchestrationError::invalid_argument(
            "code",
            format!("executable reference {part} `{value}` contains '@' or whitespace"),
        ));
    }
    Ok(())
}

impl FromStr for CodeRef {
    type Err = OrchestrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(OrchestrationError::invalid_argument(
                "code",
                "missing executable reference",
            ));
        }
        let (label, computer) = trimmed.split_once('@').ok_or_else(|| {
            OrchestrationError::invalid_argument(
                "code",
                format!("expected `label@computer`, got `{trimmed}`"),
            )
        })?;
        Self::new(label, computer)
    }
}

impl TryFrom<String> for CodeRef {
    type Error = OrchestrationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CodeRef> for String {
    fn from(code: CodeRef) -> Self {
        code.to_string()
    }
}

impl fmt::Display for CodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.label, self.computer)
    }
}
