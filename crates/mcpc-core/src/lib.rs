//! Core types and primitives for the MCP client.
//!
//! This crate has no knowledge of transports or the session engine; it
//! provides the vocabulary everything else is built from:
//!
//! - [`error`] — the unified [`error::McpError`] type and its
//!   classification, shared across every crate in the workspace.
//! - [`jsonrpc`] — the JSON-RPC 2.0 envelope (request/notification/
//!   response/batch) that every transport speaks.
//! - [`version`] — the ordered MCP protocol version list and the
//!   content-type/streaming/transport gates it controls.
//! - [`events`] — the client event bus.

pub mod error;
pub mod events;
pub mod jsonrpc;
pub mod version;

pub use error::{ErrorKind, McpError, McpResult};
pub use events::{Event, EventBus};
pub use jsonrpc::{
    JsonRpcBatch, JsonRpcError, JsonRpcErrorCode, JsonRpcMessage, JsonRpcNotification,
    JsonRpcRequest, JsonRpcResponse, JsonRpcResponsePayload, JsonRpcVersion, RequestId, ResponseId,
};
pub use version::ProtocolVersion;
