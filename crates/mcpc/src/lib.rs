//! # mcpc - Model Context Protocol client SDK
//!
//! A thin facade over the `mcpc-*` crate family: re-exports the pieces
//! an application embedding an MCP client actually reaches for, so a
//! downstream `Cargo.toml` needs only this one dependency.
//!
//! - [`core`] - errors, the JSON-RPC envelope, protocol version
//!   negotiation, and the event bus.
//! - [`protocol`] - MCP domain types (capabilities, content, roots,
//!   sampling, discovery, the initialize handshake).
//! - [`transport`] - the `Transport` trait and its stdio/SSE/in-process
//!   implementations.
//! - [`client`] - the session engine, roots manager, sampling, discovery
//!   helpers, and the server registry, plus the [`Client`] facade type
//!   that ties them together.
//!
//! ```no_run
//! use mcpc::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example() -> McpResult<()> {
//! let transport = Arc::new(StdioTransport::new());
//! let client = Client::new(
//!     transport,
//!     Implementation::new("my-app", "0.1.0"),
//!     ClientCapabilities::default(),
//!     None,
//! );
//! client.initialize().await?;
//! let tools = client.list_tools().await?;
//! # let _ = tools;
//! # Ok(())
//! # }
//! ```

pub use mcpc_core as core;
pub use mcpc_protocol as protocol;
pub use mcpc_transport as transport;

pub use mcpc_client as client;
pub use mcpc_client::Client;

/// The common set of imports an embedding application needs to drive a
/// session end to end.
pub mod prelude {
    pub use mcpc_client::{
        ApplyConfigReport, Client, InboundSamplingDispatcher, ListChangedNotifier, NegotiatedSession,
        RegistryConfig, RequestOptions, RootsManager, SamplingHandler, SamplingOptions, ServerConfig,
        ServerRegistry, ServerRequestHandler, Session,
    };
    pub use mcpc_core::{ErrorKind, Event, EventBus, McpError, McpResult};
    pub use mcpc_protocol::capabilities::ClientCapabilities;
    pub use mcpc_protocol::initialization::Implementation;
    pub use mcpc_protocol::roots::Root;
    pub use mcpc_transport::{InProcessClientTransport, SseConfig, SseTransport, StdioTransport, Transport};
}
