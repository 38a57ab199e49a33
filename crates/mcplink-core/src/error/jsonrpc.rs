//! Wire representation of a JSON-RPC error object.

use serde::{Deserialize, Serialize};

use super::codes;
use super::types::McpError;

/// A JSON-RPC error object as carried in a response's `error` member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Error code.
    pub code: i32,
    /// Error message.
    pub message: String,
    /// Additional error data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl JsonRpcError {
    /// Create an error object with an arbitrary code.
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Create an "invalid params" error (-32602).
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(codes::INVALID_PARAMS, message)
    }

    /// Create an "internal error" (-32603).
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(codes::INTERNAL_ERROR, message)
    }

    /// Create a "method not found" error (-32601).
    pub fn method_not_found(message: impl Into<String>) -> Self {
        Self::new(codes::METHOD_NOT_FOUND, message)
    }

    /// Create a "parse error" (-32700).
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::new(codes::PARSE_ERROR, message)
    }
}

impl std::fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

impl From<&McpError> for JsonRpcError {
    fn from(err: &McpError) -> Self {
        let data = match err {
            McpError::MethodNotFound { method, .. } => {
                Some(serde_json::json!({ "method": method }))
            }
            McpError::InvalidParams(details) => {
                Some(serde_json::json!({ "method": details.method }))
            }
            McpError::Transport(details) => Some(serde_json::json!({
                "kind": details.kind,
                "context": details.context,
            })),
            McpError::Rpc(inner) => inner.data.clone(),
            McpError::Classified(classified) => serde_json::to_value(classified.as_ref()).ok(),
            McpError::WithContext { source, .. } => {
                let inner: Self = source.as_ref().into();
                inner.data
            }
            _ => None,
        };

        Self {
            code: err.code(),
            message: err.to_string(),
            data,
        }
    }
}

impl From<McpError> for JsonRpcError {
    fn from(err: McpError) -> Self {
        Self::from(&err)
    }
}
