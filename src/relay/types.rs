//! Wire types for the relay: inbound request, upstream payload, error envelope

use hyper::body::Bytes;
use serde::Serialize;
use serde_json::Value;

use super::error::RelayError;
use crate::config::UpstreamConfig;

/// Inbound chat request. `messages` is opaque and forwarded as-is.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub messages: Value,
}

impl ChatRequest {
    /// Parse an inbound body. The body must be a JSON object; a missing
    /// `messages` field becomes an empty array.
    pub fn from_body(body: &Bytes) -> Result<Self, RelayError> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| RelayError::MalformedLocalRequest(e.to_string()))?;

        let Value::Object(mut fields) = value else {
            return Err(RelayError::MalformedLocalRequest(
                "request body must be a JSON object".to_string(),
            ));
        };

        let messages = fields
            .remove("messages")
            .unwrap_or_else(|| Value::Array(Vec::new()));

        Ok(Self { messages })
    }
}

/// Body sent to the upstream chat-completion API
#[derive(Debug, Serialize)]
pub struct UpstreamPayload<'a> {
    pub model: &'a str,
    pub messages: &'a Value,
    pub temperature: f64,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
}

impl<'a> UpstreamPayload<'a> {
    pub fn new(config: &'a UpstreamConfig, request: &'a ChatRequest) -> Self {
        Self {
            model: &config.model,
            messages: &request.messages,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            top_p: config.top_p,
        }
    }
}

/// `{"error": {"message": ..., "status": ...}}`
#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorEnvelope {
    pub const fn new(message: String) -> Self {
        Self {
            error: ErrorDetail {
                message,
                status: None,
            },
        }
    }

    pub const fn with_status(message: String, status: u16) -> Self {
        Self {
            error: ErrorDetail {
                message,
                status: Some(status),
            },
        }
    }
}
