//! Client error types
//!
//! `TransportError` describes one failed attempt and decides retryability.
//! `WriteError` and `QueryError` are what callers see once the retry
//! machine gives up.

use serde::Serialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single request attempt
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("Request timed out before any response data")]
    Timeout,

    #[error("Request timed out after {bytes} bytes of response")]
    PartialTimeout { bytes: usize },

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Throttled by server")]
    Throttled { retry_after: Option<Duration> },

    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("Authentication rejected ({status}): {message}")]
    Unauthorized { status: u16, message: String },

    #[error("Request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Query statement failed: {0}")]
    Statement(String),

    #[error("Could not decode response: {0}")]
    Decode(String),

    #[error("Client is closed")]
    Closed,

    #[error("Invalid client configuration: {0}")]
    InvalidConfig(String),
}

impl TransportError {
    /// Whether the same request may succeed if sent again
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TransportError::Timeout
                | TransportError::Connect(_)
                | TransportError::Throttled { .. }
                | TransportError::Server { .. }
        )
    }

    /// Delay requested by the server, if any
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            TransportError::Throttled { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Classify a non-success HTTP status
    pub fn from_status(status: u16, message: String, retry_after: Option<Duration>) -> Self {
        match status {
            429 => TransportError::Throttled { retry_after },
            401 | 403 => TransportError::Unauthorized { status, message },
            500..=599 => TransportError::Server { status, message },
            _ => TransportError::Rejected { status, message },
        }
    }
}

/// Why the retry machine stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The failure can never succeed on retry
    Terminal,
    /// Every failure was transient but the retry budget ran out
    BudgetExhausted,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Terminal => write!(f, "terminal"),
            FailureKind::BudgetExhausted => write!(f, "retry budget exhausted"),
        }
    }
}

/// A write that did not complete
///
/// Chunks before the failing one were acknowledged; `succeeded` counts
/// their points so callers can resume or report.
#[derive(Error, Debug, Clone, PartialEq)]
#[error(
    "Write failed after {attempts} attempts ({kind}): {succeeded} of {attempted} points written: {source}"
)]
pub struct WriteError {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub attempts: u32,
    pub kind: FailureKind,
    #[source]
    pub source: TransportError,
}

/// Longest query prefix kept in errors
pub const QUERY_FRAGMENT_LEN: usize = 120;

/// A query that did not complete
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Query failed after {attempts} attempts ({kind}): {source} [query: {fragment}]")]
pub struct QueryError {
    /// Start of the failing query text
    pub fragment: String,
    pub attempts: u32,
    pub kind: FailureKind,
    #[source]
    pub source: TransportError,
}
