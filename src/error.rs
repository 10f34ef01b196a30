//! Error types for the Splicer client.
//!
//! Three layers map to the failure taxonomy of the stream protocol:
//!
//! - [`DecodeError`]: a single frame's payload could not be decoded. Always
//!   recovered locally - the frame is skipped and the read loop continues.
//! - [`ClientError`]: HTTP-level failures, including the typed rate-limit
//!   rejection from the token endpoint and error events raised by the
//!   stream itself.
//! - [`SessionError`]: what the session controller surfaces to callers.

use thiserror::Error;

/// Errors that can occur while decoding a single protocol frame.
///
/// These are never fatal to a stream: the decoder's caller logs the error
/// and moves on to the next frame.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DecodeError {
    /// The data payload was not valid JSON
    #[error("invalid JSON for event '{kind}': {detail}")]
    InvalidJson { kind: String, detail: String },
    /// The payload parsed but did not have the shape the event kind requires
    #[error("unexpected payload shape for event '{kind}': {detail}")]
    UnexpectedShape { kind: String, detail: String },
}

/// Errors from the HTTP client (token issuance, stream transport, cancel).
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed at the transport level
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// The token endpoint rejected the request with a 429
    #[error("rate limited: {message}")]
    RateLimited {
        message: String,
        retry_after_secs: Option<u64>,
    },
    /// Server returned a non-success status
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },
    /// The stream emitted an `error` event
    #[error("stream error: {0}")]
    Stream(String),
    /// JSON (de)serialization failed outside of frame decoding
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ClientError {
    /// True for the typed rate-limit rejection from the token endpoint.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ClientError::RateLimited { .. })
    }
}

/// Errors surfaced by the session controller to its caller.
///
/// Carried inside `SessionUpdate::Failed` so consumers can distinguish a
/// rate-limit rejection (retryable later) from a broken stream or a store
/// failure. Cancellation deliberately has no variant here: an aborted
/// session is a silent, non-error termination.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    /// Token issuance was rejected before any stream opened
    #[error("rate limited: {message}")]
    RateLimited { message: String },
    /// The stream emitted an error event or the transport failed mid-stream
    #[error("stream failed: {message}")]
    StreamFailed { message: String },
    /// Persisting the finished message failed
    #[error("persistence failed: {message}")]
    StoreFailed { message: String },
}

impl From<crate::store::StoreError> for SessionError {
    fn from(err: crate::store::StoreError) -> Self {
        SessionError::StoreFailed {
            message: err.to_string(),
        }
    }
}

impl From<ClientError> for SessionError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::RateLimited { message, .. } => SessionError::RateLimited { message },
            other => SessionError::StreamFailed {
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_error_display() {
        let err = DecodeError::InvalidJson {
            kind: "updates".to_string(),
            detail: "expected value".to_string(),
        };
        assert!(err.to_string().contains("invalid JSON"));
        assert!(err.to_string().contains("updates"));
        assert!(err.to_string().contains("expected value"));
    }

    #[test]
    fn test_client_error_is_rate_limited() {
        let err = ClientError::RateLimited {
            message: "at capacity".to_string(),
            retry_after_secs: Some(30),
        };
        assert!(err.is_rate_limited());

        let err = ClientError::Server {
            status: 500,
            message: "oops".to_string(),
        };
        assert!(!err.is_rate_limited());
    }

    #[test]
    fn test_rate_limit_maps_to_session_rate_limit() {
        let err = ClientError::RateLimited {
            message: "at capacity".to_string(),
            retry_after_secs: None,
        };
        let session_err: SessionError = err.into();
        assert!(matches!(session_err, SessionError::RateLimited { .. }));
    }

    #[test]
    fn test_server_error_maps_to_stream_failed() {
        let err = ClientError::Server {
            status: 502,
            message: "bad gateway".to_string(),
        };
        let session_err: SessionError = err.into();
        match session_err {
            SessionError::StreamFailed { message } => {
                assert!(message.contains("502"));
            }
            _ => panic!("Expected StreamFailed"),
        }
    }
}
