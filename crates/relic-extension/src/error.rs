//! Error types for the extension server.

use std::net::SocketAddr;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use relic_checks::{CheckError, FetchError};
use thiserror::Error;
use uuid::Uuid;

use crate::actions::types::ActionKitError;

/// Result type alias for extension operations.
pub type ExtensionResult<T> = Result<T, ExtensionError>;

/// Errors that can occur in the extension server.
#[derive(Debug, Error)]
pub enum ExtensionError {
    /// The extension configuration is invalid.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// The reason the configuration is invalid.
        reason: String,
    },

    /// A request could not be understood.
    #[error("{title}")]
    BadRequest {
        /// User-facing summary.
        title: String,
        /// Underlying cause, if any.
        detail: Option<String>,
    },

    /// No action with this id is registered.
    #[error("unknown action '{0}'")]
    UnknownAction(String),

    /// No discovery with this target type is registered.
    #[error("unknown discovery '{0}'")]
    UnknownDiscovery(String),

    /// No event listener is registered under this name.
    #[error("unknown event listener '{0}'")]
    UnknownEventListener(String),

    /// No running execution has this id.
    #[error("execution {0} not found")]
    ExecutionNotFound(Uuid),

    /// New Relic could not be reached.
    #[error("{title}")]
    Upstream {
        /// User-facing summary of what failed.
        title: &'static str,
        /// The underlying failure.
        source: FetchError,
    },

    /// Failed to bind to the specified address.
    #[error("failed to bind to {0}: {1}")]
    BindFailed(SocketAddr, std::io::Error),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ExtensionError {
    /// Creates a bad-request error with a cause.
    pub fn bad_request(title: impl Into<String>, detail: impl ToString) -> Self {
        Self::BadRequest {
            title: title.into(),
            detail: Some(detail.to_string()),
        }
    }

    /// HTTP status this error is reported with.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidConfig { .. } | Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::UnknownAction(_)
            | Self::UnknownDiscovery(_)
            | Self::UnknownEventListener(_)
            | Self::ExecutionNotFound(_) => StatusCode::NOT_FOUND,
            Self::Upstream { .. } | Self::BindFailed(_, _) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// The action-kit error body for this error.
    #[must_use]
    pub fn to_body(&self) -> ActionKitError {
        let detail = match self {
            Self::BadRequest { detail, .. } => detail.clone(),
            Self::Upstream { source, .. } => Some(source.to_string()),
            _ => None,
        };
        ActionKitError {
            title: self.to_string(),
            detail,
            status: None,
        }
    }
}

impl From<CheckError> for ExtensionError {
    fn from(err: CheckError) -> Self {
        match err {
            CheckError::Fetch { title, source } => Self::Upstream { title, source },
            CheckError::InvalidConfig { reason } => Self::InvalidConfig { reason },
        }
    }
}

impl IntoResponse for ExtensionError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let json = serde_json::to_string(&self.to_body()).unwrap_or_else(|_| {
            r#"{"title":"failed to serialize error"}"#.to_string()
        });

        (status, [("content-type", "application/json")], json).into_response()
    }
}
