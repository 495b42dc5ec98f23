// Error types and user-facing error messages
//
// Components return anyhow::Result internally. The typed errors here sit at
// the seams where callers branch on the failure kind: the degradation chain
// (timeout vs. model vs. parse) and the handoff queues (missing ticket vs.
// wrong state).

use anyhow::{Context, Result};
use thiserror::Error;

/// Failure of a single classification strategy
///
/// Never escapes the degradation chain; every variant is logged and the
/// next strategy is tried.
#[derive(Debug, Error)]
pub enum ClassificationError {
    #[error("strategy {strategy} timed out after {timeout_ms}ms")]
    Timeout { strategy: String, timeout_ms: u64 },

    #[error("model call failed: {0}")]
    Model(String),

    #[error("could not parse model output: {0}")]
    Parse(String),

    #[error("strategy {0} panicked")]
    Panicked(String),
}

impl ClassificationError {
    /// Short label used in logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            ClassificationError::Timeout { .. } => "timeout",
            ClassificationError::Model(_) => "model",
            ClassificationError::Parse(_) => "parse",
            ClassificationError::Panicked(_) => "panic",
        }
    }
}

impl From<anyhow::Error> for ClassificationError {
    fn from(err: anyhow::Error) -> Self {
        ClassificationError::Model(format!("{:#}", err))
    }
}

/// Errors from handoff queue transitions
#[derive(Debug, Error)]
pub enum HandoffError {
    #[error("handoff ticket not found: {0}")]
    TicketNotFound(String),

    #[error("handoff ticket {ticket_id} is {actual}, expected {expected}")]
    InvalidState {
        ticket_id: String,
        actual: String,
        expected: String,
    },
}

/// Wrap an error with user-friendly context
pub trait UserFriendlyError {
    /// Add user-friendly context to this error
    fn user_context(self, message: &str) -> Self;

    /// Add user-friendly context with a suggestion
    fn user_context_with_suggestion(self, problem: &str, suggestion: &str) -> Self;
}

impl<T> UserFriendlyError for Result<T> {
    fn user_context(self, message: &str) -> Self {
        self.with_context(|| message.to_string())
    }

    fn user_context_with_suggestion(self, problem: &str, suggestion: &str) -> Self {
        self.with_context(|| format!("{}\n\nSuggestion: {}", problem, suggestion))
    }
}

/// Warning shown when no model API key is configured
pub fn missing_api_key_warning() -> String {
    "No Claude API key configured.\n\n\
    Classification will run on rules only (clear cases, hybrid keywords, absolute fallback).\n\
    Crisis detection is unaffected.\n\n\
    To enable model classification, either:\n\
    • set ANTHROPIC_API_KEY in the environment, or\n\
    • add `api_key = \"sk-ant-...\"` under [model] in ~/.amani/config.toml"
        .to_string()
}

/// Format a config parse failure with the file location
pub fn config_parse_error(path: &std::path::Path, err: &dyn std::fmt::Display) -> String {
    format!(
        "Failed to parse config file {}\n\n\
        {}\n\n\
        Check the TOML syntax, or remove the file to run with defaults.",
        path.display(),
        err
    )
}

/// Format a bind failure with helpful suggestions
pub fn bind_failed_error(address: &str) -> String {
    format!(
        "Could not bind to {}\n\n\
        Possible causes:\n\
        • Another amani instance is already running\n\
        • The port is in use by another program\n\
        • The address is not valid on this host\n\n\
        Try:\n\
        amani serve --bind 127.0.0.1:8001",
        address
    )
}
