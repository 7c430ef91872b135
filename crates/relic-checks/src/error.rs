//! Error types for the relic-checks crate.

use thiserror::Error;

/// A failure reaching the monitoring provider.
///
/// Collaborators convert their transport errors into this type. It only
/// carries a message so the core stays independent of any HTTP stack.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct FetchError {
    message: String,
}

impl FetchError {
    /// Creates a new fetch error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the underlying message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Errors that can occur while preparing or polling a check.
///
/// A violated condition is not an error: it is reported through
/// [`CheckResult::error`](crate::CheckResult::error).
#[derive(Debug, Error)]
pub enum CheckError {
    /// The provider could not be reached for this poll.
    #[error("{title} {source}")]
    Fetch {
        /// User-facing summary of what failed.
        title: &'static str,
        /// The underlying transport failure.
        source: FetchError,
    },

    /// The check configuration is invalid.
    #[error("invalid check configuration: {reason}")]
    InvalidConfig {
        /// The reason the configuration is invalid.
        reason: String,
    },
}

impl CheckError {
    /// Returns the user-facing title of this error.
    #[must_use]
    pub fn title(&self) -> String {
        match self {
            Self::Fetch { title, .. } => (*title).to_string(),
            Self::InvalidConfig { reason } => format!("Invalid configuration: {reason}"),
        }
    }
}

/// Result type for check operations.
pub type Result<T> = std::result::Result<T, CheckError>;
