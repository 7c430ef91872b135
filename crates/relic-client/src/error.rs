//! Error types for the relic-client crate.

use relic_checks::FetchError;
use thiserror::Error;

/// Errors that can occur when talking to New Relic.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request could not be sent or its body not read.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a status other than 200.
    #[error("unexpected response code {status}")]
    UnexpectedStatus {
        /// HTTP status code.
        status: u16,
        /// Response body, for diagnostics.
        body: String,
    },

    /// The body parsed but does not have the expected shape.
    #[error("unexpected response body")]
    UnexpectedBody {
        /// Response body, for diagnostics.
        body: String,
    },

    /// The API answered with an empty body.
    #[error("empty response body")]
    EmptyBody,

    /// A request or response body could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The client configuration is invalid.
    #[error("invalid client configuration: {reason}")]
    InvalidConfig {
        /// The reason the configuration is invalid.
        reason: String,
    },
}

impl From<ClientError> for FetchError {
    fn from(err: ClientError) -> Self {
        Self::new(err.to_string())
    }
}

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ClientError::UnexpectedStatus {
            status: 401,
            body: "{}".to_string(),
        };
        assert_eq!(err.to_string(), "unexpected response code 401");
        assert_eq!(ClientError::EmptyBody.to_string(), "empty response body");
    }

    #[test]
    fn converts_into_fetch_error() {
        let err = ClientError::UnexpectedBody {
            body: "{\"data\":{}}".to_string(),
        };
        let fetch: FetchError = err.into();
        assert_eq!(fetch.message(), "unexpected response body");
    }
}
