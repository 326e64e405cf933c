//! Relay failure taxonomy and its mapping onto HTTP responses

use hyper::{Method, StatusCode};
use std::error::Error as StdError;
use thiserror::Error;

use super::types::ErrorEnvelope;

/// Message returned to the caller when the upstream exceeds its time bound
pub const TIMEOUT_MESSAGE: &str = "Request timeout - API is slow";

#[derive(Debug, Error)]
pub enum RelayError {
    /// Upstream answered with a non-2xx status; its body is propagated verbatim
    #[error("upstream rejected request with status {status}")]
    UpstreamRejected { status: StatusCode, body: String },

    #[error("{}", TIMEOUT_MESSAGE)]
    UpstreamTimeout,

    /// Connection refused, DNS failure, or an unreadable success body
    #[error("{0}")]
    UpstreamUnreachable(String),

    /// The inbound request could not be turned into an upstream call
    #[error("{0}")]
    MalformedLocalRequest(String),

    /// Inbound body exceeded `http.max_body_size`; the upstream is not called
    #[error("Request body too large (max: {limit} bytes)")]
    PayloadTooLarge { limit: u64 },

    #[error("Method {0} not allowed on the chat endpoint")]
    MethodNotAllowed(Method),

    #[error("failed to build upstream client: {0}")]
    ClientBuild(String),
}

impl RelayError {
    /// Classify a transport error raised by the upstream call
    pub fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::UpstreamTimeout
        } else {
            Self::UpstreamUnreachable(describe_chain(err))
        }
    }

    /// Status code returned to the caller
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::UpstreamRejected { status, .. } => *status,
            Self::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::UpstreamUnreachable(_)
            | Self::MalformedLocalRequest(_)
            | Self::ClientBuild(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Body returned to the caller
    pub fn envelope(&self) -> ErrorEnvelope {
        match self {
            Self::UpstreamRejected { status, body } => {
                ErrorEnvelope::with_status(body.clone(), status.as_u16())
            }
            other => ErrorEnvelope::new(other.to_string()),
        }
    }
}

/// Join an error with every cause beneath it, e.g.
/// `error sending request: client error (Connect): Connection refused`
fn describe_chain(err: &dyn StdError) -> String {
    let mut description = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !description.ends_with(&text) {
            description.push_str(": ");
            description.push_str(&text);
        }
        source = cause.source();
    }
    description
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_keeps_upstream_status_and_body() {
        let err = RelayError::UpstreamRejected {
            status: StatusCode::FORBIDDEN,
            body: r#"{"error":"bad key"}"#.to_string(),
        };
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            serde_json::to_string(&err.envelope()).unwrap(),
            r#"{"error":{"message":"{\"error\":\"bad key\"}","status":403}}"#
        );
    }

    #[test]
    fn test_timeout_maps_to_504() {
        let err = RelayError::UpstreamTimeout;
        assert_eq!(err.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            serde_json::to_string(&err.envelope()).unwrap(),
            r#"{"error":{"message":"Request timeout - API is slow"}}"#
        );
    }

    #[test]
    fn test_transport_and_local_failures_map_to_500() {
        let unreachable = RelayError::UpstreamUnreachable("connection refused".to_string());
        assert_eq!(unreachable.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(unreachable.envelope().error.message, "connection refused");
        assert_eq!(unreachable.envelope().error.status, None);

        let local = RelayError::MalformedLocalRequest("expected value at line 1".to_string());
        assert_eq!(local.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(local.envelope().error.message, "expected value at line 1");
    }

    #[test]
    fn test_local_rejections_keep_their_status() {
        let too_large = RelayError::PayloadTooLarge { limit: 16 };
        assert_eq!(too_large.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(
            serde_json::to_string(&too_large.envelope()).unwrap(),
            r#"{"error":{"message":"Request body too large (max: 16 bytes)"}}"#
        );

        let wrong_method = RelayError::MethodNotAllowed(Method::GET);
        assert_eq!(wrong_method.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(
            wrong_method.envelope().error.message,
            "Method GET not allowed on the chat endpoint"
        );
    }

    #[derive(Debug, Error)]
    #[error("error sending request")]
    struct SendFailed(#[source] std::io::Error);

    #[test]
    fn test_description_includes_every_cause() {
        let err = SendFailed(std::io::Error::from(std::io::ErrorKind::ConnectionRefused));
        assert_eq!(describe_chain(&err), "error sending request: connection refused");
    }
}
