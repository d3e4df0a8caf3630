//! User-facing error formatting.
//!
//! One [`ErrorReporter`] is built at startup from the configured debug flag
//! and handed to every component that reports failures.

use crate::error::{AgentError, ToolError};

#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorReporter {
    debug: bool,
}

impl ErrorReporter {
    pub fn new(debug: bool) -> Self {
        Self { debug }
    }

    pub fn debug_enabled(&self) -> bool {
        self.debug
    }

    /// Line shown to the user when a tool call fails.
    pub fn tool_failure(&self, tool_name: &str, err: &ToolError) -> String {
        if self.debug {
            tracing::debug!(tool = %tool_name, error = ?err, "Tool error");
        }
        match err {
            ToolError::InvalidArguments { reason, .. } => {
                format!("{tool_name} validation failed: {reason}")
            }
            other => format!("{tool_name} failed: {other}"),
        }
    }

    /// Line shown to the user when a turn ends early. `None` for a
    /// user-requested cancellation, which is not reported as a failure.
    pub fn turn_failure(&self, err: &AgentError) -> Option<String> {
        if matches!(err, AgentError::Cancelled) {
            return None;
        }
        if self.debug {
            tracing::debug!(error = ?err, "Turn ended with error");
        }
        Some(format!("Operation failed: {err}"))
    }

    /// Failures of operations outside the loop (commands, background tasks).
    pub fn system_failure(&self, operation: &str, err: &dyn std::error::Error) -> String {
        if self.debug {
            let mut source = err.source();
            while let Some(cause) = source {
                tracing::debug!(operation, cause = %cause, "Caused by");
                source = cause.source();
            }
        }
        format!("{operation} failed: {err}")
    }

    /// Warnings are only surfaced in debug mode.
    pub fn warn(&self, component: &str, operation: &str, err: &dyn std::error::Error) {
        if self.debug {
            tracing::warn!(component, operation, error = %err, "Warning");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_failures_are_labelled() {
        let reporter = ErrorReporter::new(false);
        let err = ToolError::invalid("read_file", "missing required parameter 'path'");
        assert_eq!(
            reporter.tool_failure("read_file", &err),
            "read_file validation failed: missing required parameter 'path'"
        );
    }

    #[test]
    fn cancellation_is_silent() {
        let reporter = ErrorReporter::new(true);
        assert!(reporter.turn_failure(&AgentError::Cancelled).is_none());
        let line = reporter.turn_failure(&AgentError::IterationLimit(5)).unwrap();
        assert!(line.contains("maximum iterations"));
    }

    #[test]
    fn reporters_are_independent() {
        assert!(ErrorReporter::new(true).debug_enabled());
        assert!(!ErrorReporter::default().debug_enabled());
    }
}
