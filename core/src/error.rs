//! Error types for the assets client.
//!
//! # Design
//! Connection-level failures never show up here: the client downgrades them
//! to a synthetic 204 envelope. What remains is a missing endpoint, an
//! upstream 4xx (message + status), and everything else, which carries the
//! JSON diagnostic bundle as its message and the original failure as its
//! `source`.

use thiserror::Error;

/// Result type alias for client operations.
pub type ApiResult<T> = Result<T, ApiError>;

/// Errors returned by `AssetsClient` operations.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The client was constructed without an endpoint.
    #[error("{0}")]
    Configuration(String),

    /// The service answered with a status in 400–499.
    #[error("{message}")]
    UpstreamClient { message: String, status: u16 },

    /// Any other failed exchange. `payload` is the serialized `ErrorEnvelope`.
    #[error("{payload}")]
    UpstreamServer {
        payload: String,
        #[source]
        source: UpstreamFailure,
    },

    /// The request payload could not be encoded as JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl ApiError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Numeric code attached to the error: the upstream status for 4xx
    /// failures, 0 for everything else.
    pub fn code(&self) -> u16 {
        match self {
            ApiError::UpstreamClient { status, .. } => *status,
            _ => 0,
        }
    }
}

/// The failure an `ApiError::UpstreamServer` wraps.
#[derive(Debug, Error)]
pub enum UpstreamFailure {
    /// The service answered, but with a status outside the success and
    /// client-error ranges.
    #[error("Server error: `{method} {url}` resulted in a `{status}` response")]
    Status {
        method: &'static str,
        url: String,
        status: u16,
    },

    /// The exchange broke after the connection was established.
    #[error("{0}")]
    Transport(String),
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn client_error_code_is_upstream_status() {
        let err = ApiError::UpstreamClient {
            message: "not found".to_string(),
            status: 404,
        };
        assert_eq!(err.code(), 404);
        assert_eq!(err.to_string(), "not found");
    }

    #[test]
    fn server_error_keeps_cause() {
        let err = ApiError::UpstreamServer {
            payload: "{}".to_string(),
            source: UpstreamFailure::Status {
                method: "GET",
                url: "http://assets/assets/collections".to_string(),
                status: 502,
            },
        };
        assert_eq!(err.code(), 0);
        assert_eq!(err.to_string(), "{}");
        let cause = err.source().unwrap().to_string();
        assert!(cause.contains("502"), "{cause}");
    }
}
