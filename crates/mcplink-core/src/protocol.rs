//! JSON-RPC 2.0 frames exchanged with an MCP server.
//!
//! A frame is a [`Request`] (expects a [`Response`] carrying the same id), a
//! [`Response`] (exactly one of `result` / `error`) or a [`Notification`]
//! (no id, no reply). Validation of inbound text and id assignment live in
//! [`crate::codec`]; the types here are plain serde structs.
//!
//! ```rust
//! use mcplink_core::protocol::{Message, Request, RequestId, methods};
//!
//! let msg: Message = Request::new(methods::PING, RequestId::Number(1)).into();
//! assert_eq!(msg.method(), Some("ping"));
//! assert_eq!(msg.kind(), "request");
//! ```

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::JsonRpcError;

/// Value of the `jsonrpc` member on every frame.
pub const JSONRPC_VERSION: &str = "2.0";

/// Method names the client sends or reacts to.
pub mod methods {
    /// Opens the session.
    pub const INITIALIZE: &str = "initialize";
    /// Confirms the session after `initialize` succeeded.
    pub const INITIALIZED: &str = "notifications/initialized";
    /// Liveness probe, sent by either side.
    pub const PING: &str = "ping";
    /// Server asks for the client's roots.
    pub const ROOTS_LIST: &str = "roots/list";
    /// Tool catalog page.
    pub const TOOLS_LIST: &str = "tools/list";
    /// Tool invocation.
    pub const TOOLS_CALL: &str = "tools/call";
    /// Resource catalog page.
    pub const RESOURCES_LIST: &str = "resources/list";
    /// Resource contents.
    pub const RESOURCES_READ: &str = "resources/read";
    /// Start update notifications for a resource.
    pub const RESOURCES_SUBSCRIBE: &str = "resources/subscribe";
    /// Stop update notifications for a resource.
    pub const RESOURCES_UNSUBSCRIBE: &str = "resources/unsubscribe";
    /// Prompt catalog page.
    pub const PROMPTS_LIST: &str = "prompts/list";
    /// Rendered prompt.
    pub const PROMPTS_GET: &str = "prompts/get";
    /// A subscribed resource changed.
    pub const RESOURCE_UPDATED: &str = "notifications/resources/updated";
    /// Progress of a long-running request.
    pub const PROGRESS: &str = "notifications/progress";
    /// Server log line.
    pub const LOG_MESSAGE: &str = "notifications/message";
    /// The peer gave up on a request.
    pub const CANCELLED: &str = "notifications/cancelled";
}

/// Request identifier, numeric or string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// Numeric id; the codec assigns these.
    Number(u64),
    /// String id; servers may use these for their own requests.
    String(String),
}

impl RequestId {
    /// A numeric id.
    #[must_use]
    pub const fn number(id: u64) -> Self {
        Self::Number(id)
    }

    /// A string id.
    #[must_use]
    pub fn string(id: impl Into<String>) -> Self {
        Self::String(id.into())
    }
}

impl From<u64> for RequestId {
    fn from(id: u64) -> Self {
        Self::Number(id)
    }
}

impl From<&str> for RequestId {
    fn from(id: &str) -> Self {
        Self::String(id.to_string())
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => n.fmt(f),
            Self::String(s) => s.fmt(f),
        }
    }
}

fn version() -> Cow<'static, str> {
    Cow::Borrowed(JSONRPC_VERSION)
}

/// A method call awaiting a [`Response`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Always `"2.0"`.
    #[serde(default = "version")]
    pub jsonrpc: Cow<'static, str>,
    /// Correlates the response.
    pub id: RequestId,
    /// Method name.
    pub method: Cow<'static, str>,
    /// Parameters object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Request {
    /// A request without parameters.
    #[must_use]
    pub fn new(method: impl Into<Cow<'static, str>>, id: impl Into<RequestId>) -> Self {
        Self {
            jsonrpc: version(),
            id: id.into(),
            method: method.into(),
            params: None,
        }
    }

    /// Attach parameters.
    #[must_use]
    pub fn params(mut self, params: Value) -> Self {
        self.params = Some(params);
        self
    }

    /// Method name.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }
}

/// Reply to a [`Request`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Always `"2.0"`.
    #[serde(default = "version")]
    pub jsonrpc: Cow<'static, str>,
    /// Id of the request being answered.
    pub id: RequestId,
    /// Present on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Present on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl Response {
    /// A successful reply.
    #[must_use]
    pub fn success(id: impl Into<RequestId>, result: Value) -> Self {
        Self {
            jsonrpc: version(),
            id: id.into(),
            result: Some(result),
            error: None,
        }
    }

    /// A failed reply.
    #[must_use]
    pub fn error(id: impl Into<RequestId>, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: version(),
            id: id.into(),
            result: None,
            error: Some(error),
        }
    }

    /// Carries a result and no error.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.result.is_some() && self.error.is_none()
    }

    /// Carries an error.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// The result, or the error object.
    ///
    /// A reply with neither member yields an internal error.
    pub fn into_result(self) -> Result<Value, JsonRpcError> {
        match (self.result, self.error) {
            (_, Some(error)) => Err(error),
            (Some(result), None) => Ok(result),
            (None, None) => Err(JsonRpcError::internal_error(
                "response carried neither result nor error",
            )),
        }
    }
}

/// Which catalog a `*/list_changed` notification refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListChanged {
    /// `notifications/tools/list_changed`
    Tools,
    /// `notifications/resources/list_changed`
    Resources,
    /// `notifications/prompts/list_changed`
    Prompts,
}

/// A one-way message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Always `"2.0"`.
    #[serde(default = "version")]
    pub jsonrpc: Cow<'static, str>,
    /// Method name.
    pub method: Cow<'static, str>,
    /// Parameters object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Notification {
    /// A notification without parameters.
    #[must_use]
    pub fn new(method: impl Into<Cow<'static, str>>) -> Self {
        Self {
            jsonrpc: version(),
            method: method.into(),
            params: None,
        }
    }

    /// Attach parameters.
    #[must_use]
    pub fn params(mut self, params: Value) -> Self {
        self.params = Some(params);
        self
    }

    /// Method name.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// The catalog this notification invalidates, if it is a list change.
    #[must_use]
    pub fn list_changed(&self) -> Option<ListChanged> {
        match self.method() {
            "notifications/tools/list_changed" => Some(ListChanged::Tools),
            "notifications/resources/list_changed" => Some(ListChanged::Resources),
            "notifications/prompts/list_changed" => Some(ListChanged::Prompts),
            _ => None,
        }
    }

    /// A string member of `params`.
    #[must_use]
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.params.as_ref()?.get(key)?.as_str()
    }
}

/// Any frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Message {
    /// A method call.
    Request(Request),
    /// A reply.
    Response(Response),
    /// A one-way message.
    Notification(Notification),
}

impl Message {
    /// Method name of requests and notifications.
    #[must_use]
    pub fn method(&self) -> Option<&str> {
        match self {
            Self::Request(r) => Some(r.method()),
            Self::Notification(n) => Some(n.method()),
            Self::Response(_) => None,
        }
    }

    /// `request`, `response` or `notification`, for log fields.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Request(_) => "request",
            Self::Response(_) => "response",
            Self::Notification(_) => "notification",
        }
    }

    /// Id of requests and responses.
    #[must_use]
    pub const fn id(&self) -> Option<&RequestId> {
        match self {
            Self::Request(r) => Some(&r.id),
            Self::Response(r) => Some(&r.id),
            Self::Notification(_) => None,
        }
    }

    /// Whether this is a request.
    #[must_use]
    pub const fn is_request(&self) -> bool {
        matches!(self, Self::Request(_))
    }

    /// Whether this is a response.
    #[must_use]
    pub const fn is_response(&self) -> bool {
        matches!(self, Self::Response(_))
    }

    /// Whether this is a notification.
    #[must_use]
    pub const fn is_notification(&self) -> bool {
        matches!(self, Self::Notification(_))
    }

    /// The response, if this is one.
    #[must_use]
    pub const fn as_response(&self) -> Option<&Response> {
        match self {
            Self::Response(r) => Some(r),
            _ => None,
        }
    }
}

impl From<Request> for Message {
    fn from(r: Request) -> Self {
        Self::Request(r)
    }
}

impl From<Response> for Message {
    fn from(r: Response) -> Self {
        Self::Response(r)
    }
}

impl From<Notification> for Message {
    fn from(n: Notification) -> Self {
        Self::Notification(n)
    }
}
