//! Unified error handling for the MCP client.
//!
//! [`McpError`] is the single error type returned by every layer of the
//! client: transports, the session engine, the roots manager, sampling,
//! and the server registry. It carries a classification (`ErrorKind`)
//! that maps to JSON-RPC error codes and HTTP status codes, plus optional
//! context for diagnostics.

use std::fmt;

/// Result type alias for MCP client operations.
pub type McpResult<T> = std::result::Result<T, McpError>;

/// Unified error type for the MCP client.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct McpError {
    /// Error classification.
    pub kind: ErrorKind,
    /// Human-readable error message.
    pub message: String,
    /// Source location (file:line), never serialized to peers.
    #[serde(skip_serializing)]
    pub source_location: Option<String>,
    /// Additional context (boxed to keep `McpError` small).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Box<ErrorContext>>,
}

/// Additional error context.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ErrorContext {
    /// Operation being performed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    /// Component where the error occurred.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
    /// Request id for tracing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Error classification for programmatic handling.
///
/// Kinds are behavioral, not a 1:1 mirror of JSON-RPC codes: several kinds
/// map to the same wire code, but callers branch on `kind` to decide
/// whether an error is retryable, fatal to the session, or safe to
/// surface verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    // === JSON-RPC standard ===
    /// Parse error (-32700).
    ParseError,
    /// Invalid request (-32600).
    InvalidRequest,
    /// Method not found (-32601).
    MethodNotFound,
    /// Invalid params (-32602).
    InvalidParams,
    /// Internal error (-32603).
    Internal,

    // === MCP-specific ===
    /// User rejected the request (-1).
    UserRejected,
    /// Capability not supported by the negotiated protocol version.
    CapabilityNotSupported,
    /// Protocol version mismatch or unknown version string.
    ProtocolVersionMismatch,

    // === Client-specific (spec 7) ===
    /// Transport could not be opened. Not retried at this layer.
    Connection,
    /// Malformed frame, missing/unknown protocol version — fatal to the session.
    Protocol,
    /// Transport I/O failure on an already-open transport (broken pipe, reset).
    /// May be retried by the sampling subsystem's retry layer.
    Transport,
    /// Regular or max deadline expired.
    Timeout,
    /// Caller-side cancellation (context/deadline).
    Cancelled,
    /// Server registry: duplicate name, closed registry, spawn/kill failure.
    Registry,

    // === General ===
    /// Authentication failed.
    Authentication,
    /// Permission denied.
    PermissionDenied,
    /// Rate limited.
    RateLimited,
    /// Configuration error.
    Configuration,
    /// Serialization error.
    Serialization,
}

impl McpError {
    /// Create a new error with kind and message.
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source_location: None,
            context: None,
        }
    }

    #[must_use]
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidParams, message)
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    #[must_use]
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ParseError, message)
    }

    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidRequest, message)
    }

    #[must_use]
    pub fn method_not_found(method: impl Into<String>) -> Self {
        let method = method.into();
        Self::new(ErrorKind::MethodNotFound, format!("Method not found: {method}"))
    }

    #[must_use]
    pub fn capability_not_supported(capability: impl Into<String>) -> Self {
        let cap = capability.into();
        Self::new(
            ErrorKind::CapabilityNotSupported,
            format!("Capability not supported: {cap}"),
        )
    }

    #[must_use]
    pub fn protocol_version_mismatch(found: impl Into<String>) -> Self {
        let found = found.into();
        Self::new(
            ErrorKind::ProtocolVersionMismatch,
            format!("Unknown or unsupported protocol version: {found}"),
        )
    }

    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Connection, message)
    }

    #[must_use]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Protocol, message)
    }

    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transport, message)
    }

    #[must_use]
    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Cancelled, message)
    }

    #[must_use]
    pub fn registry(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Registry, message)
    }

    #[must_use]
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Authentication, message)
    }

    #[must_use]
    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::PermissionDenied, message)
    }

    #[must_use]
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RateLimited, message)
    }

    #[must_use]
    pub fn user_rejected(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UserRejected, message)
    }

    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Serialization, message)
    }

    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    /// Build an error from a JSON-RPC error code and message, as received
    /// on the wire (see spec §4.5 server-initiated dispatch error mapping).
    #[must_use]
    pub fn from_rpc_code(code: i32, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::from_i32(code), message)
    }

    #[must_use]
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.context_mut().operation = Some(operation.into());
        self
    }

    #[must_use]
    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.context_mut().component = Some(component.into());
        self
    }

    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.context_mut().request_id = Some(request_id.into());
        self
    }

    #[must_use]
    pub fn with_source_location(mut self, location: impl Into<String>) -> Self {
        self.source_location = Some(location.into());
        self
    }

    fn context_mut(&mut self) -> &mut ErrorContext {
        self.context.get_or_insert_with(|| Box::new(ErrorContext::default()))
    }

    /// Whether the sampling subsystem's retry layer may retry this error.
    ///
    /// Context, deadline-exceeded, and registry errors are never retried;
    /// transport I/O and timeouts may be.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self.kind, ErrorKind::Transport | ErrorKind::Timeout)
    }

    /// Whether this error condition is expected to clear on its own.
    #[must_use]
    pub const fn is_temporary(&self) -> bool {
        matches!(self.kind, ErrorKind::Timeout | ErrorKind::RateLimited | ErrorKind::Transport)
    }

    /// Whether this error should tear down the owning session.
    #[must_use]
    pub const fn is_fatal_to_session(&self) -> bool {
        matches!(self.kind, ErrorKind::Protocol | ErrorKind::Connection)
    }

    /// JSON-RPC error code for this error, per spec §6.
    #[must_use]
    pub const fn jsonrpc_code(&self) -> i32 {
        match self.kind {
            ErrorKind::ParseError => -32700,
            ErrorKind::InvalidRequest => -32600,
            ErrorKind::MethodNotFound => -32601,
            ErrorKind::InvalidParams | ErrorKind::Serialization => -32602,
            ErrorKind::Internal
            | ErrorKind::Protocol
            | ErrorKind::Connection
            | ErrorKind::Transport
            | ErrorKind::Registry
            | ErrorKind::Configuration => -32603,
            ErrorKind::UserRejected => -1,
            ErrorKind::CapabilityNotSupported => -32006,
            ErrorKind::ProtocolVersionMismatch => -32007,
            ErrorKind::Authentication => -32008,
            ErrorKind::RateLimited => -32009,
            ErrorKind::PermissionDenied => -32011,
            ErrorKind::Timeout => -32012,
            ErrorKind::Cancelled => -32017,
        }
    }

    /// HTTP status equivalent, for the SSE transport's response mapping.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self.kind {
            ErrorKind::InvalidParams
            | ErrorKind::InvalidRequest
            | ErrorKind::UserRejected
            | ErrorKind::ParseError => 400,
            ErrorKind::Authentication => 401,
            ErrorKind::PermissionDenied => 403,
            ErrorKind::MethodNotFound => 404,
            ErrorKind::Timeout => 408,
            ErrorKind::RateLimited => 429,
            ErrorKind::Cancelled => 499,
            ErrorKind::Internal
            | ErrorKind::Configuration
            | ErrorKind::Serialization
            | ErrorKind::CapabilityNotSupported
            | ErrorKind::ProtocolVersionMismatch
            | ErrorKind::Protocol
            | ErrorKind::Registry => 500,
            ErrorKind::Transport | ErrorKind::Connection => 503,
        }
    }
}

impl ErrorKind {
    /// Classify a JSON-RPC error code into a kind.
    #[must_use]
    pub fn from_i32(code: i32) -> Self {
        match code {
            -1 => Self::UserRejected,
            -32006 => Self::CapabilityNotSupported,
            -32007 => Self::ProtocolVersionMismatch,
            -32008 => Self::Authentication,
            -32009 => Self::RateLimited,
            -32600 => Self::InvalidRequest,
            -32601 => Self::MethodNotFound,
            -32602 => Self::InvalidParams,
            -32700 => Self::ParseError,
            _ => Self::Internal,
        }
    }

    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::ParseError => "Parse error",
            Self::InvalidRequest => "Invalid request",
            Self::MethodNotFound => "Method not found",
            Self::InvalidParams => "Invalid parameters",
            Self::Internal => "Internal error",
            Self::UserRejected => "User rejected request",
            Self::CapabilityNotSupported => "Capability not supported",
            Self::ProtocolVersionMismatch => "Protocol version mismatch",
            Self::Connection => "Connection failed",
            Self::Protocol => "Protocol error",
            Self::Transport => "Transport I/O error",
            Self::Timeout => "Operation timed out",
            Self::Cancelled => "Operation cancelled",
            Self::Registry => "Server registry error",
            Self::Authentication => "Authentication failed",
            Self::PermissionDenied => "Permission denied",
            Self::RateLimited => "Rate limit exceeded",
            Self::Configuration => "Configuration error",
            Self::Serialization => "Serialization error",
        }
    }
}

impl fmt::Display for McpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ctx) = &self.context {
            if let Some(op) = &ctx.operation {
                write!(f, " (operation: {op})")?;
            }
            if let Some(comp) = &ctx.component {
                write!(f, " (component: {comp})")?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

impl std::error::Error for McpError {}

impl From<serde_json::Error> for McpError {
    fn from(err: serde_json::Error) -> Self {
        let kind = if err.is_syntax() || err.is_eof() {
            ErrorKind::ParseError
        } else if err.is_data() {
            ErrorKind::InvalidParams
        } else {
            ErrorKind::Serialization
        };
        Self::new(kind, format!("JSON error: {err}"))
    }
}

impl From<std::io::Error> for McpError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind as IoKind;
        let kind = match err.kind() {
            IoKind::PermissionDenied => ErrorKind::PermissionDenied,
            IoKind::ConnectionRefused
            | IoKind::ConnectionReset
            | IoKind::ConnectionAborted
            | IoKind::NotConnected
            | IoKind::BrokenPipe => ErrorKind::Transport,
            IoKind::TimedOut => ErrorKind::Timeout,
            _ => ErrorKind::Internal,
        };
        Self::new(kind, format!("IO error: {err}"))
    }
}

/// Convenience macro for creating errors tagged with their source location.
#[macro_export]
macro_rules! mcp_err {
    ($kind:expr, $msg:expr) => {
        $crate::error::McpError::new($kind, $msg)
            .with_source_location(concat!(file!(), ":", line!()))
    };
    ($kind:expr, $fmt:expr, $($arg:tt)*) => {
        $crate::error::McpError::new($kind, format!($fmt, $($arg)*))
            .with_source_location(concat!(file!(), ":", line!()))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_creation() {
        let err = McpError::invalid_params("missing field");
        assert_eq!(err.kind, ErrorKind::InvalidParams);
        assert!(err.message.contains("missing field"));
    }

    #[test]
    fn error_context() {
        let err = McpError::internal("test")
            .with_operation("test_op")
            .with_component("test_comp")
            .with_request_id("req-123");

        let ctx = err.context.unwrap();
        assert_eq!(ctx.operation.as_deref(), Some("test_op"));
        assert_eq!(ctx.component.as_deref(), Some("test_comp"));
        assert_eq!(ctx.request_id.as_deref(), Some("req-123"));
    }

    #[test]
    fn jsonrpc_codes() {
        assert_eq!(McpError::invalid_params("x").jsonrpc_code(), -32602);
        assert_eq!(McpError::internal("x").jsonrpc_code(), -32603);
        assert_eq!(McpError::user_rejected("x").jsonrpc_code(), -1);
    }

    #[test]
    fn retryable_classification() {
        assert!(McpError::timeout("x").is_retryable());
        assert!(McpError::transport("x").is_retryable());
        assert!(!McpError::cancelled("x").is_retryable());
        assert!(!McpError::registry("x").is_retryable());
    }

    #[test]
    fn fatal_to_session() {
        assert!(McpError::protocol("bad version").is_fatal_to_session());
        assert!(McpError::connection("refused").is_fatal_to_session());
        assert!(!McpError::timeout("x").is_fatal_to_session());
    }

    #[test]
    fn error_size_reasonable() {
        assert!(
            std::mem::size_of::<McpError>() <= 128,
            "McpError size: {} bytes (should be <=128)",
            std::mem::size_of::<McpError>()
        );
    }
}
