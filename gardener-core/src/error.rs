//! Error types for Gardener core.

use std::{error::Error, fmt, io};

/// Route the caller should navigate to after credentials are rejected.
pub const LOGIN_ROUTE: &str = "/login";

/// Error type for Gardener client operations.
#[derive(Debug)]
pub enum GardenerError {
    /// An underlying I/O error.
    Io(io::Error),
    /// The request never produced an HTTP response (connection refused, DNS, TLS).
    Transport(String),
    /// The backend answered with a non-success status.
    Http {
        /// HTTP status code.
        status: u16,
        /// Response body or reason phrase.
        message: String,
    },
    /// The backend rejected the stored credentials; the session was cleared.
    Unauthorized {
        /// Route to redirect the user to.
        redirect: &'static str,
    },
    /// A poll loop exhausted its attempt budget without a terminal result.
    Timeout {
        /// Operation that was being polled.
        operation: &'static str,
        /// Number of status requests issued.
        attempts: u32,
    },
    /// A response body did not match the expected contract.
    Decode(String),
    /// A referenced record does not exist.
    NotFound(String),
    /// Caller-supplied input was rejected before any request was issued.
    InvalidInput(String),
    /// The backend workflow reported a terminal failure.
    WorkflowFailed(String),
    /// The operation was cancelled by its owner.
    Cancelled,
}

impl GardenerError {
    /// Build the error returned after a 401 response.
    pub fn unauthorized() -> Self {
        Self::Unauthorized {
            redirect: LOGIN_ROUTE,
        }
    }

    /// Whether this error is a poll timeout rather than a network failure.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Whether polling should stop immediately instead of retrying.
    pub fn is_fatal_for_polling(&self) -> bool {
        matches!(
            self,
            Self::Unauthorized { .. } | Self::Cancelled | Self::InvalidInput(_)
        )
    }
}

impl fmt::Display for GardenerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "io error: {err}"),
            Self::Transport(message) => write!(f, "request failed: {message}"),
            Self::Http { status, message } => write!(f, "backend error ({status}): {message}"),
            Self::Unauthorized { redirect } => {
                write!(f, "not authenticated; sign in again at {redirect}")
            }
            Self::Timeout {
                operation,
                attempts,
            } => write!(f, "{operation} timed out after {attempts} attempts"),
            Self::Decode(message) => write!(f, "unexpected response: {message}"),
            Self::NotFound(message) => write!(f, "not found: {message}"),
            Self::InvalidInput(message) => write!(f, "invalid input: {message}"),
            Self::WorkflowFailed(message) => write!(f, "workflow failed: {message}"),
            Self::Cancelled => write!(f, "operation cancelled"),
        }
    }
}

impl Error for GardenerError {}

impl From<io::Error> for GardenerError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for GardenerError {
    fn from(value: serde_json::Error) -> Self {
        Self::Decode(value.to_string())
    }
}

/// Convenience result type for Gardener core.
pub type Result<T> = std::result::Result<T, GardenerError>;
