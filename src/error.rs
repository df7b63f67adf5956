//! Failure taxonomy for the bootstrap pipeline.
//!
//! Four kinds of failure leave the accessor/reconciler layers: a bounded
//! operation running out of time, a missing profile row, the backend call
//! itself failing, and missing configuration. Only the first and third are
//! ever retried; missing configuration fails immediately because retrying
//! cannot fix it, and a missing row is handled as a soft "no user" state.

use serde::Serialize;

/// What went wrong during a bootstrap operation.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    /// A bounded operation did not settle within its budget.
    #[error("operation timed out after {limit_ms}ms")]
    Timeout { limit_ms: u64 },
    /// No profile row matched the session's email.
    #[error("no profile found for {email}")]
    NotFound { email: String },
    /// The backend call itself failed.
    #[error(transparent)]
    Transport(#[from] anyhow::Error),
    /// Required configuration is missing or invalid.
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Coarse classification driving retry policy and user-facing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    Timeout,
    Transport,
    Configuration,
}

impl ErrorClass {
    /// Classify a bootstrap failure.
    ///
    /// Transport errors are re-inspected: backend client libraries report
    /// missing configuration and timed-out I/O as plain errors, so the
    /// chain text decides. Configuration markers win over timeout markers,
    /// which win over the transport fallback.
    pub fn of(err: &BootstrapError) -> Self {
        match err {
            BootstrapError::Timeout { .. } => ErrorClass::Timeout,
            BootstrapError::Configuration(_) => ErrorClass::Configuration,
            BootstrapError::NotFound { .. } => ErrorClass::Transport,
            BootstrapError::Transport(e) => classify_text(&format!("{e:#}")),
        }
    }

    /// Whether the retry budget applies to this class.
    pub fn is_retryable(self) -> bool {
        !matches!(self, ErrorClass::Configuration)
    }

    /// Message shown in the error view.
    pub fn user_message(self) -> &'static str {
        match self {
            ErrorClass::Timeout => {
                "The service took too long to respond. Check your connection and try again."
            }
            ErrorClass::Transport => {
                "Could not reach the service. Check your connection and try again."
            }
            ErrorClass::Configuration => {
                "The application is not configured correctly. Contact your administrator."
            }
        }
    }
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorClass::Timeout => write!(f, "timeout"),
            ErrorClass::Transport => write!(f, "transport"),
            ErrorClass::Configuration => write!(f, "configuration"),
        }
    }
}

/// Pattern-match error text into a class. Highest-confidence markers first.
fn classify_text(text: &str) -> ErrorClass {
    let lower = text.to_lowercase();

    // Missing configuration is never retryable — detect it first.
    if lower.contains("environment variable")
        || lower.contains("env var")
        || lower.contains("not configured")
        || lower.contains("missing configuration")
        || lower.contains("api key")
    {
        return ErrorClass::Configuration;
    }

    if lower.contains("timed out") || lower.contains("timeout") || lower.contains("deadline") {
        return ErrorClass::Timeout;
    }

    ErrorClass::Transport
}
