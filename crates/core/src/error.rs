//! Error types for the parrot domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use std::path::PathBuf;

use thiserror::Error;

/// The top-level error type for all parrot operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Live context errors ---
    #[error("Context error: {0}")]
    Context(#[from] ContextError),

    // --- Agent loop errors ---
    #[error(transparent)]
    Agent(#[from] AgentError),

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures talking to a language-model backend.
///
/// `Cancelled` is kept apart from every transport cause so callers can treat a
/// user-requested stop as a normal outcome.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Malformed stream payload: {0}")]
    Protocol(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request cancelled")]
    Cancelled,
}

impl ProviderError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Failures of a single tool call.
///
/// The variants map onto the dispatch pipeline: lookup, argument parsing,
/// schema validation, then the side effect itself.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    /// The assembled argument string is not valid JSON.
    #[error("Malformed arguments for {tool_name}: {reason}")]
    MalformedArguments { tool_name: String, reason: String },

    /// Parameters were rejected before execution.
    #[error("Invalid arguments for {tool_name}: {reason}")]
    InvalidArguments { tool_name: String, reason: String },

    /// The side effect failed (filesystem, subprocess, context store).
    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },
}

impl ToolError {
    pub fn invalid(tool_name: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidArguments {
            tool_name: tool_name.into(),
            reason: reason.to_string(),
        }
    }

    pub fn execution(tool_name: impl Into<String>, reason: impl ToString) -> Self {
        Self::ExecutionFailed {
            tool_name: tool_name.into(),
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ContextError {
    #[error("path cannot be empty")]
    EmptyPath,

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("file {} not found in live context", .0.display())]
    FileNotTracked(PathBuf),

    #[error("directory {} not found in live context", .0.display())]
    DirectoryNotTracked(PathBuf),

    #[error("start line {start} exceeds file length {total}")]
    StartLineOutOfRange { start: usize, total: usize },

    #[error("end line {end} is before start line {start}")]
    EndBeforeStart { end: i64, start: usize },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Reasons a conversation turn ends without a final answer.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("AI response error: {0}")]
    Stream(ProviderError),

    #[error("Cancelled by user")]
    Cancelled,

    #[error("tool execution failed after {count} consecutive attempts: {last_error}")]
    TooManyFailures { count: u32, last_error: String },

    #[error("reached maximum iterations ({0})")]
    IterationLimit(u32),
}

impl From<ProviderError> for AgentError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Cancelled => Self::Cancelled,
            other => Self::Stream(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn tool_error_displays_correctly() {
        let err = Error::Tool(ToolError::execution("edit_file", "old_str not found in file"));
        assert!(err.to_string().contains("edit_file"));
        assert!(err.to_string().contains("old_str not found"));
    }

    #[test]
    fn cancellation_maps_to_agent_cancelled() {
        assert!(matches!(
            AgentError::from(ProviderError::Cancelled),
            AgentError::Cancelled
        ));
        assert!(matches!(
            AgentError::from(ProviderError::Network("reset".into())),
            AgentError::Stream(_)
        ));
    }

    #[test]
    fn context_error_messages() {
        let err = ContextError::StartLineOutOfRange { start: 10, total: 3 };
        assert_eq!(err.to_string(), "start line 10 exceeds file length 3");

        let err = ContextError::EndBeforeStart { end: 2, start: 5 };
        assert_eq!(err.to_string(), "end line 2 is before start line 5");
    }
}
