//! Building, serializing and validating protocol messages.
//!
//! [`MessageCodec`] is the single place where outbound messages get their
//! ids and inbound text is checked before anything else looks at it.
//! Inbound validation works on the raw JSON object rather than trusting the
//! untagged [`Message`] deserializer, so that a frame is accepted only if it
//! is unambiguously a request, a response or a notification.

use std::borrow::Cow;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;

use crate::error::{JsonRpcError, McpError};
use crate::protocol::{JSONRPC_VERSION, Message, Notification, Request, RequestId, Response};

/// Default upper bound on a single serialized message (16 MiB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Creates and checks JSON-RPC messages.
#[derive(Debug)]
pub struct MessageCodec {
    next_id: AtomicU64,
    max_message_size: usize,
}

impl Default for MessageCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MESSAGE_SIZE)
    }
}

impl MessageCodec {
    /// Create a codec that rejects payloads above `max_message_size` bytes.
    #[must_use]
    pub const fn new(max_message_size: usize) -> Self {
        Self {
            next_id: AtomicU64::new(1),
            max_message_size,
        }
    }

    /// The configured size limit.
    #[must_use]
    pub const fn max_message_size(&self) -> usize {
        self.max_message_size
    }

    /// Reserve the next numeric request id.
    pub fn next_id(&self) -> RequestId {
        RequestId::Number(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Build a request, assigning a fresh id when `id` is `None`.
    pub fn create_request(
        &self,
        method: impl Into<Cow<'static, str>>,
        params: Option<Value>,
        id: Option<RequestId>,
    ) -> Request {
        let id = id.unwrap_or_else(|| self.next_id());
        let request = Request::new(method, id);
        match params {
            Some(params) => request.params(params),
            None => request,
        }
    }

    /// Build a response. Exactly one of `result` and `error` must be given.
    pub fn create_response(
        &self,
        id: RequestId,
        result: Option<Value>,
        error: Option<JsonRpcError>,
    ) -> Result<Response, McpError> {
        match (result, error) {
            (Some(result), None) => Ok(Response::success(id, result)),
            (None, Some(error)) => Ok(Response::error(id, error)),
            (Some(_), Some(_)) => Err(McpError::invalid_request(
                "response must not carry both result and error",
            )),
            (None, None) => Err(McpError::invalid_request(
                "response must carry either result or error",
            )),
        }
    }

    /// Build a notification.
    pub fn create_notification(
        &self,
        method: impl Into<Cow<'static, str>>,
        params: Option<Value>,
    ) -> Notification {
        let notification = Notification::new(method);
        match params {
            Some(params) => notification.params(params),
            None => notification,
        }
    }

    /// Serialize a message to wire text and check it against the size limit.
    pub fn serialize(&self, message: &Message) -> Result<String, McpError> {
        let text = serde_json::to_string(message)?;
        self.validate_size(&text)?;
        Ok(text)
    }

    /// Reject payloads above the configured size limit.
    pub fn validate_size(&self, text: &str) -> Result<(), McpError> {
        if text.len() > self.max_message_size {
            return Err(McpError::message_too_large(
                text.len(),
                self.max_message_size,
            ));
        }
        Ok(())
    }

    /// Parse and validate wire text.
    pub fn deserialize(&self, text: &str) -> Result<Message, McpError> {
        self.validate_size(text)?;
        let value: Value = serde_json::from_str(text)
            .map_err(|e| McpError::parse_with_source("malformed JSON", e))?;
        Self::from_value(value)
    }

    /// Validate an already-parsed JSON value as a single message.
    pub fn from_value(value: Value) -> Result<Message, McpError> {
        let Value::Object(ref object) = value else {
            return Err(McpError::parse("message is not a JSON object"));
        };

        match object.get("jsonrpc") {
            Some(Value::String(v)) if v == JSONRPC_VERSION => {}
            Some(other) => {
                return Err(McpError::parse(format!(
                    "unsupported jsonrpc version {other}"
                )));
            }
            None => return Err(McpError::parse("missing jsonrpc version tag")),
        }

        let has_id = object.contains_key("id");
        let has_result = object.contains_key("result");
        let has_error = object.contains_key("error");

        if let Some(method) = object.get("method") {
            if !method.is_string() {
                return Err(McpError::parse("method must be a string"));
            }
            if has_result || has_error {
                return Err(McpError::parse(
                    "request must not carry result or error members",
                ));
            }
            return if has_id {
                let request: Request = serde_json::from_value(value)
                    .map_err(|e| McpError::parse_with_source("invalid request", e))?;
                Ok(Message::Request(request))
            } else {
                let notification: Notification = serde_json::from_value(value)
                    .map_err(|e| McpError::parse_with_source("invalid notification", e))?;
                Ok(Message::Notification(notification))
            };
        }

        if !has_id {
            return Err(McpError::parse("message has neither method nor id"));
        }
        if has_result == has_error {
            return Err(McpError::parse(
                "response must carry exactly one of result or error",
            ));
        }

        let mut response: Response = serde_json::from_value(value)
            .map_err(|e| McpError::parse_with_source("invalid response", e))?;
        // `"result": null` deserializes to None; keep it distinguishable from absence.
        if has_result && response.result.is_none() {
            response.result = Some(Value::Null);
        }
        Ok(Message::Response(response))
    }

    /// Parse a body that may hold a single message or a batch array.
    pub fn deserialize_batch(&self, text: &str) -> Result<Vec<Message>, McpError> {
        self.validate_size(text)?;
        let value: Value = serde_json::from_str(text)
            .map_err(|e| McpError::parse_with_source("malformed JSON", e))?;
        match value {
            Value::Array(items) => items.into_iter().map(Self::from_value).collect(),
            single => Ok(vec![Self::from_value(single)?]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_auto_ids_increase() {
        let codec = MessageCodec::default();
        let a = codec.create_request("ping", None, None);
        let b = codec.create_request("ping", None, None);
        assert_eq!(a.id, RequestId::Number(1));
        assert_eq!(b.id, RequestId::Number(2));

        let explicit = codec.create_request("ping", None, Some(RequestId::string("x")));
        assert_eq!(explicit.id, RequestId::string("x"));
    }

    #[test]
    fn test_create_response_requires_exactly_one() {
        let codec = MessageCodec::default();
        assert!(
            codec
                .create_response(1u64.into(), Some(json!({})), None)
                .is_ok()
        );
        assert!(
            codec
                .create_response(1u64.into(), None, Some(JsonRpcError::internal_error("x")))
                .is_ok()
        );
        assert!(codec.create_response(1u64.into(), None, None).is_err());
        assert!(
            codec
                .create_response(
                    1u64.into(),
                    Some(json!({})),
                    Some(JsonRpcError::internal_error("x"))
                )
                .is_err()
        );
    }

    #[test]
    fn test_round_trip_preserves_messages() {
        let codec = MessageCodec::default();
        let messages: Vec<Message> = vec![
            codec
                .create_request("tools/call", Some(json!({"name": "echo"})), None)
                .into(),
            codec
                .create_notification("notifications/initialized", None)
                .into(),
            Response::success(3u64, json!({"tools": []})).into(),
            Response::error("abc", JsonRpcError::method_not_found("nope")).into(),
            Response::success(4u64, Value::Null).into(),
        ];

        for message in messages {
            let text = codec.serialize(&message).unwrap();
            let parsed = codec.deserialize(&text).unwrap();
            assert_eq!(parsed, message);
        }
    }

    #[test]
    fn test_rejects_wrong_version() {
        let codec = MessageCodec::default();
        let err = codec
            .deserialize(r#"{"jsonrpc":"1.0","id":1,"method":"x"}"#)
            .unwrap_err();
        assert!(matches!(err, McpError::Parse { .. }));

        let err = codec.deserialize(r#"{"id":1,"method":"x"}"#).unwrap_err();
        assert!(matches!(err, McpError::Parse { .. }));
    }

    #[test]
    fn test_rejects_ambiguous_response() {
        let codec = MessageCodec::default();
        assert!(codec.deserialize(r#"{"jsonrpc":"2.0","id":1}"#).is_err());
        assert!(
            codec
                .deserialize(
                    r#"{"jsonrpc":"2.0","id":1,"result":{},"error":{"code":1,"message":"m"}}"#
                )
                .is_err()
        );
        assert!(codec.deserialize(r#"{"jsonrpc":"2.0"}"#).is_err());
        assert!(codec.deserialize("not json").is_err());
        assert!(codec.deserialize("[1,2]").is_err());
    }

    #[test]
    fn test_size_limit() {
        let codec = MessageCodec::new(32);
        let message: Message = codec
            .create_request("tools/call", Some(json!({"payload": "x".repeat(64)})), None)
            .into();
        let err = codec.serialize(&message).unwrap_err();
        assert!(matches!(err, McpError::MessageTooLarge { max: 32, .. }));
    }

    #[test]
    fn test_batch_body() {
        let codec = MessageCodec::default();
        let batch = codec
            .deserialize_batch(
                r#"[{"jsonrpc":"2.0","id":1,"result":{}},{"jsonrpc":"2.0","method":"n"}]"#,
            )
            .unwrap();
        assert_eq!(batch.len(), 2);
        assert!(batch[0].is_response());
        assert!(batch[1].is_notification());

        let single = codec
            .deserialize_batch(r#"{"jsonrpc":"2.0","id":1,"result":{}}"#)
            .unwrap();
        assert_eq!(single.len(), 1);
    }
}
