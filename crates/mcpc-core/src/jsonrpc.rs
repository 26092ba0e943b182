//! JSON-RPC 2.0 envelope types shared by every transport and the session engine.
//!
//! These types model exactly the wire shape spec.md §3/§6 describe: a
//! request always carries `jsonrpc: "2.0"`; a notification is a request
//! with no `id`; a response carries exactly one of `result`/`error`; a
//! batch is an ordered JSON array whose responses are matched back to
//! requests by `id`, not by array position.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// The literal JSON-RPC version string.
pub const JSONRPC_VERSION: &str = "2.0";

/// Zero-sized marker that (de)serializes as the literal string `"2.0"`,
/// rejecting any other value on the way in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JsonRpcVersion;

impl Serialize for JsonRpcVersion {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(JSONRPC_VERSION)
    }
}

impl<'de> Deserialize<'de> for JsonRpcVersion {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let version = String::deserialize(deserializer)?;
        if version == JSONRPC_VERSION {
            Ok(JsonRpcVersion)
        } else {
            Err(serde::de::Error::custom(format!(
                "invalid jsonrpc version: expected \"2.0\", got \"{version}\""
            )))
        }
    }
}

/// A request/response identifier. User-supplied batch ids may be either
/// shape (spec §4.5 batching); session-engine-allocated ids are always
/// [`RequestId::Number`], drawn from the per-session atomic counter and
/// never reused (spec §3 pending request slot invariant).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    String(String),
    Number(i64),
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{s}"),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

/// A JSON-RPC request. Absence of `id` (represented at the call site by
/// constructing a [`JsonRpcNotification`] instead) makes it a notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: JsonRpcVersion,
    pub id: RequestId,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    #[must_use]
    pub fn new(id: RequestId, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JsonRpcVersion,
            id,
            method: method.into(),
            params,
        }
    }
}

/// A JSON-RPC notification: a request shape with no `id` field at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: JsonRpcVersion,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    #[must_use]
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JsonRpcVersion,
            method: method.into(),
            params,
        }
    }
}

/// A JSON-RPC error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    #[must_use]
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

impl fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for JsonRpcError {}

/// Standard and MCP-specific JSON-RPC error codes (spec §6, §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonRpcErrorCode {
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,
    UserRejected,
}

impl JsonRpcErrorCode {
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::InternalError => -32603,
            Self::UserRejected => -1,
        }
    }

    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ParseError => "Parse error",
            Self::InvalidRequest => "Invalid Request",
            Self::MethodNotFound => "Method not found",
            Self::InvalidParams => "Invalid params",
            Self::InternalError => "Internal error",
            Self::UserRejected => "User rejected",
        }
    }
}

impl From<JsonRpcErrorCode> for JsonRpcError {
    fn from(code: JsonRpcErrorCode) -> Self {
        JsonRpcError::new(code.code(), code.message())
    }
}

/// The `result`/`error` payload of a response. Exactly one side is
/// present on the wire; both-or-neither is a protocol violation that
/// callers should treat as [`crate::error::ErrorKind::Protocol`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcResponsePayload {
    Success { result: Value },
    Error { error: JsonRpcError },
}

/// Response id: a parse error has no request to correlate to, so `id`
/// may be `null` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseId {
    Id(RequestId),
    Null(Option<()>),
}

impl ResponseId {
    #[must_use]
    pub fn as_request_id(&self) -> Option<&RequestId> {
        match self {
            Self::Id(id) => Some(id),
            Self::Null(_) => None,
        }
    }
}

impl From<RequestId> for ResponseId {
    fn from(id: RequestId) -> Self {
        Self::Id(id)
    }
}

/// A JSON-RPC response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: JsonRpcVersion,
    pub id: ResponseId,
    #[serde(flatten)]
    pub payload: JsonRpcResponsePayload,
}

impl JsonRpcResponse {
    #[must_use]
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: JsonRpcVersion,
            id: ResponseId::Id(id),
            payload: JsonRpcResponsePayload::Success { result },
        }
    }

    #[must_use]
    pub fn error(id: RequestId, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JsonRpcVersion,
            id: ResponseId::Id(id),
            payload: JsonRpcResponsePayload::Error { error },
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.payload, JsonRpcResponsePayload::Success { .. })
    }

    #[must_use]
    pub fn into_result(self) -> Result<Value, JsonRpcError> {
        match self.payload {
            JsonRpcResponsePayload::Success { result } => Ok(result),
            JsonRpcResponsePayload::Error { error } => Err(error),
        }
    }
}

/// An ordered JSON-RPC batch. Per spec §3, the response array is matched
/// to requests by `id`, never by array index.
pub type JsonRpcBatch<T> = Vec<T>;

/// The union of shapes that may arrive on any transport: a single
/// request, notification, response, or a batch of any of those. Used to
/// classify an inbound frame before it is routed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcMessage {
    Batch(Vec<JsonRpcMessage>),
    Response(JsonRpcResponse),
    Request(JsonRpcRequest),
    Notification(JsonRpcNotification),
}

impl JsonRpcMessage {
    #[must_use]
    pub fn is_batch(&self) -> bool {
        matches!(self, Self::Batch(_))
    }

    /// `method` if this frame is a request or notification.
    #[must_use]
    pub fn method(&self) -> Option<&str> {
        match self {
            Self::Request(r) => Some(&r.method),
            Self::Notification(n) => Some(&n.method),
            _ => None,
        }
    }
}

pub mod utils {
    use super::*;

    /// Parse a raw JSON-RPC frame (request, notification, response, or batch).
    ///
    /// # Errors
    /// Returns the underlying `serde_json` error if `raw` is not valid JSON
    /// or does not match any known JSON-RPC shape.
    pub fn parse_message(raw: &str) -> Result<JsonRpcMessage, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Serialize any JSON-RPC message to a compact JSON string.
    ///
    /// # Errors
    /// Returns the underlying `serde_json` error if serialization fails.
    pub fn serialize_message<T: Serialize>(message: &T) -> Result<String, serde_json::Error> {
        serde_json::to_string(message)
    }

    /// `true` if the raw JSON value is a top-level array (a batch).
    #[must_use]
    pub fn is_batch(value: &Value) -> bool {
        value.is_array()
    }

    /// Best-effort extraction of a `method` field from a raw JSON value,
    /// without committing to a full parse. Used by transports deciding
    /// whether an inbound frame should be filtered as non-JSON-RPC
    /// (spec §4.2: `jsonrpc == "2.0"` and method-or-id present).
    #[must_use]
    pub fn extract_method(value: &Value) -> Option<&str> {
        value.get("method").and_then(Value::as_str)
    }

    /// `true` if the raw JSON value looks like a minimally valid JSON-RPC
    /// frame: an object carrying `jsonrpc == "2.0"` and either `method` or
    /// `id`.
    #[must_use]
    pub fn looks_like_jsonrpc(value: &Value) -> bool {
        let Some(obj) = value.as_object() else {
            return value.is_array();
        };
        let version_ok = obj.get("jsonrpc").and_then(Value::as_str) == Some(JSONRPC_VERSION);
        version_ok && (obj.contains_key("method") || obj.contains_key("id"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_round_trips() {
        let req = JsonRpcRequest::new(RequestId::Number(1), "ping", None);
        let raw = serde_json::to_string(&req).unwrap();
        assert!(raw.contains("\"jsonrpc\":\"2.0\""));
        let back: JsonRpcRequest = serde_json::from_str(&raw).unwrap();
        assert_eq!(back.method, "ping");
        assert_eq!(back.id, RequestId::Number(1));
    }

    #[test]
    fn notification_has_no_id_field() {
        let note = JsonRpcNotification::new("notifications/initialized", None);
        let raw = serde_json::to_string(&note).unwrap();
        assert!(!raw.contains("\"id\""));
    }

    #[test]
    fn response_payload_is_exclusive() {
        let ok = JsonRpcResponse::success(RequestId::Number(1), json!({"a": 1}));
        let raw = serde_json::to_string(&ok).unwrap();
        assert!(raw.contains("result"));
        assert!(!raw.contains("error"));

        let err = JsonRpcResponse::error(RequestId::Number(1), JsonRpcErrorCode::MethodNotFound.into());
        let raw = serde_json::to_string(&err).unwrap();
        assert!(raw.contains("error"));
        assert!(!raw.contains("result"));
    }

    #[test]
    fn batch_message_parses_as_batch() {
        let raw = r#"[{"jsonrpc":"2.0","id":1,"method":"a"},{"jsonrpc":"2.0","id":2,"method":"b"}]"#;
        let msg = utils::parse_message(raw).unwrap();
        assert!(msg.is_batch());
    }

    #[test]
    fn string_and_numeric_ids_both_parse() {
        let raw_str = r#"{"jsonrpc":"2.0","id":"abc","result":1}"#;
        let raw_num = r#"{"jsonrpc":"2.0","id":1,"result":1}"#;
        let r1: JsonRpcResponse = serde_json::from_str(raw_str).unwrap();
        let r2: JsonRpcResponse = serde_json::from_str(raw_num).unwrap();
        assert_eq!(r1.id, ResponseId::Id(RequestId::String("abc".into())));
        assert_eq!(r2.id, ResponseId::Id(RequestId::Number(1)));
    }

    #[test]
    fn invalid_jsonrpc_version_rejected() {
        let raw = r#"{"jsonrpc":"1.0","id":1,"method":"x"}"#;
        assert!(utils::parse_message(raw).is_err());
    }

    #[test]
    fn looks_like_jsonrpc_filters_garbage() {
        assert!(utils::looks_like_jsonrpc(&json!({"jsonrpc":"2.0","method":"x"})));
        assert!(utils::looks_like_jsonrpc(&json!({"jsonrpc":"2.0","id":1})));
        assert!(!utils::looks_like_jsonrpc(&json!({"hello":"world"})));
        assert!(!utils::looks_like_jsonrpc(&json!({"jsonrpc":"1.0","method":"x"})));
    }
}
