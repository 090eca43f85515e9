//! Severity-tagged diagnostics sink.
//!
//! A multi-day collection must not fail wholesale because of one bad hour out
//! of thousands, so the readers degrade individual signals and report what
//! happened here instead of returning errors. Messages are forwarded to the
//! `log` facade and additionally recorded on the sink itself, so tests (and
//! batch tooling) can audit data completeness without touching global logger
//! state.

use std::cell::RefCell;

/// Severity of a recorded diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "INFO"),
            Severity::Warning => write!(f, "WARNING"),
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

/// One recorded degradation event.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
}

/// Collection-scoped diagnostics sink with a configurable recording
/// threshold. Single-threaded by design, like the rest of the pipeline.
#[derive(Debug)]
pub struct Diagnostics {
    threshold: Severity,
    records: RefCell<Vec<Diagnostic>>,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new(Severity::Warning)
    }
}

impl Diagnostics {
    /// Create a sink recording everything at or above `threshold`.
    pub fn new(threshold: Severity) -> Self {
        Self {
            threshold,
            records: RefCell::new(Vec::new()),
        }
    }

    pub fn info(&self, message: impl Into<String>) {
        self.push(Severity::Info, message.into());
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.push(Severity::Warning, message.into());
    }

    pub fn error(&self, message: impl Into<String>) {
        self.push(Severity::Error, message.into());
    }

    fn push(&self, severity: Severity, message: String) {
        match severity {
            Severity::Info => log::info!("{message}"),
            Severity::Warning => log::warn!("{message}"),
            Severity::Error => log::error!("{message}"),
        }
        if severity >= self.threshold {
            self.records.borrow_mut().push(Diagnostic { severity, message });
        }
    }

    /// Snapshot of everything recorded so far.
    pub fn records(&self) -> Vec<Diagnostic> {
        self.records.borrow().clone()
    }

    /// Drain the recorded diagnostics.
    pub fn take_records(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.records.borrow_mut())
    }

    /// True if anything at error severity was recorded. Indicates the
    /// accuracy of the collected data may be compromised.
    pub fn has_errors(&self) -> bool {
        self.records
            .borrow()
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    pub fn clear(&self) {
        self.records.borrow_mut().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_filters_records() {
        let sink = Diagnostics::new(Severity::Warning);
        sink.info("routine");
        sink.warn("missing header file");
        sink.error("negative record count");

        let records = sink.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].severity, Severity::Warning);
        assert!(sink.has_errors());
    }

    #[test]
    fn test_take_records_drains() {
        let sink = Diagnostics::default();
        sink.warn("once");
        assert_eq!(sink.take_records().len(), 1);
        assert!(sink.records().is_empty());
    }
}
