//! Process report: the human-readable log of a run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One report line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportEntry {
    /// When the line was reported.
    pub at: DateTime<Utc>,
    /// The line itself.
    pub message: String,
}

/// Ordered report lines of a run. Every line is also emitted as a `tracing`
/// info event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessReport {
    entries: Vec<ReportEntry>,
}

impl ProcessReport {
    /// Appends a line.
    pub fn report(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!(target: "scatter_gather::report", "{message}");
        self.entries.push(ReportEntry {
            at: Utc::now(),
            message,
        });
    }

    /// All lines, oldest first.
    pub fn entries(&self) -> &[ReportEntry] {
        &self.entries
    }

    /// Message text of all lines, oldest first.
    pub fn messages(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.message.as_str())
    }

    /// Number of lines.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing has been reported.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_order() {
        let mut report = ProcessReport::default();
        report.report("first");
        report.report(String::from("second"));
        assert_eq!(report.messages().collect::<Vec<_>>(), ["first", "second"]);
        assert!(report.entries()[0].at <= report.entries()[1].at);
    }
}
