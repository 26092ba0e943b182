//! Client-side session engine, roots manager, sampling, discovery, and
//! server registry for the Model Context Protocol (spec §1): the parts
//! of a conforming client that sit above a [`mcpc_transport::Transport`]
//! and below application code.
//!
//! [`Client`] ties the session engine, roots actor, and sampling
//! handler into one handle; [`registry::ServerRegistry`] is a separate,
//! independently usable supervisor for launching and tracking a fleet
//! of child-process servers. Grounded on `turbomcp-client/src/client/mod.rs`'s
//! role as the crate's composition root, generalized from the teacher's
//! single monolithic `Client` into the smaller pieces spec §2 names as
//! components F–J, wired together here rather than in one struct.

pub mod discovery;
pub mod registry;
pub mod roots;
pub mod sampling;
pub mod session;

pub use mcpc_core::error::{ErrorKind, McpError, McpResult};
pub use mcpc_core::events::{Event, EventBus};
pub use registry::{ApplyConfigReport, RegistryConfig, ServerConfig, ServerRegistry, TrackedProcess};
pub use roots::{ListChangedNotifier, RootsManager};
pub use sampling::{InboundSamplingDispatcher, SamplingHandler, SamplingOptions};
pub use session::{BatchItem, NegotiatedSession, RequestOptions, ServerRequestHandler, Session};

use std::sync::Arc;

use mcpc_core::version::ProtocolVersion;
use mcpc_protocol::capabilities::ClientCapabilities;
use mcpc_protocol::discovery::{Prompt, Resource, Tool};
use mcpc_protocol::initialization::Implementation;
use mcpc_protocol::roots::Root;
use mcpc_protocol::sampling::{CreateMessageResult, SamplingMessage};
use mcpc_transport::Transport;
use tokio::task::JoinHandle;

/// A single MCP connection: the session engine plus its roots actor,
/// bound together so the session can answer `roots/list` from live
/// state and the application can mutate roots through one handle.
pub struct Client<T: Transport + 'static> {
    session: Arc<Session<T>>,
    roots: RootsManager,
    _roots_task: JoinHandle<()>,
}

impl<T: Transport + 'static> Client<T> {
    /// Builds a client over an already-constructed transport. The
    /// transport is not connected yet; [`Client::initialize`] connects
    /// it as its first step (spec §4.5).
    #[must_use]
    pub fn new(transport: Arc<T>, client_info: Implementation, client_capabilities: ClientCapabilities, pinned_version: Option<ProtocolVersion>) -> Self {
        let roots_state: Arc<std::sync::Mutex<Vec<Root>>> = Arc::new(std::sync::Mutex::new(Vec::new()));
        let snapshot_state = roots_state.clone();
        let roots_snapshot: Arc<dyn Fn() -> Vec<Root> + Send + Sync> =
            Arc::new(move || snapshot_state.lock().expect("roots snapshot mutex poisoned").clone());

        let session = Arc::new(Session::new(transport, client_info, client_capabilities, pinned_version, roots_snapshot));

        // `notifier` needs a handle back to the manager it belongs to
        // (to refresh the snapshot mirror), but that handle only exists
        // once `RootsManager::spawn` returns below. A `OnceLock` breaks
        // the cycle: nothing can invoke the notifier until after an
        // `add`/`remove` call, which cannot happen before `spawn`
        // returns and the lock is filled.
        let manager_handle: Arc<std::sync::OnceLock<RootsManager>> = Arc::new(std::sync::OnceLock::new());
        let notifying_session = session.clone();
        let notifier_manager = manager_handle.clone();
        let notifier: ListChangedNotifier = Arc::new(move || {
            let session = notifying_session.clone();
            let manager = notifier_manager.clone();
            let mirror = roots_state.clone();
            tokio::spawn(async move {
                if let Some(manager) = manager.get() {
                    if let Ok(current) = manager.get().await {
                        *mirror.lock().expect("roots snapshot mutex poisoned") = current;
                    }
                }
                session.notify_roots_list_changed().await;
            });
        });
        let (roots, roots_task) = RootsManager::spawn(notifier);
        let _ = manager_handle.set(roots.clone());

        Self { session, roots, _roots_task: roots_task }
    }

    #[must_use]
    pub fn session(&self) -> &Arc<Session<T>> {
        &self.session
    }

    #[must_use]
    pub fn roots(&self) -> &RootsManager {
        &self.roots
    }

    /// Runs the `initialize` handshake (spec §4.5).
    ///
    /// # Errors
    /// Propagates transport, protocol-version, and capability errors.
    pub async fn initialize(&self) -> McpResult<NegotiatedSession> {
        self.session.initialize().await
    }

    /// Installs the handler invoked for server-initiated `sampling/createMessage`.
    pub async fn set_sampling_handler(&self, handler: Arc<dyn SamplingHandler>) {
        let dispatcher = Arc::new(InboundSamplingDispatcher::new(handler));
        self.session
            .set_server_request_handler(Arc::new(SamplingRequestBridge { dispatcher, session: self.session.clone() }))
            .await;
    }

    /// Sends an outbound `sampling/createMessage` request to the server
    /// (spec §4.7).
    ///
    /// # Errors
    /// Returns a validation error for malformed input, or the final
    /// transport/protocol error after retries are exhausted.
    pub async fn request_sampling(&self, messages: Vec<SamplingMessage>, options: SamplingOptions) -> McpResult<CreateMessageResult> {
        sampling::request_sampling(&self.session, messages, options).await
    }

    /// Pages through `tools/list` to completion (spec §4.8).
    ///
    /// # Errors
    /// Returns the first transport/protocol error encountered.
    pub async fn list_tools(&self) -> McpResult<Vec<Tool>> {
        discovery::list_tools(&self.session).await
    }

    /// Pages through `resources/list` to completion (spec §4.8).
    ///
    /// # Errors
    /// Returns the first transport/protocol error encountered.
    pub async fn list_resources(&self) -> McpResult<Vec<Resource>> {
        discovery::list_resources(&self.session).await
    }

    /// Pages through `prompts/list` to completion (spec §4.8).
    ///
    /// # Errors
    /// Returns the first transport/protocol error encountered.
    pub async fn list_prompts(&self) -> McpResult<Vec<Prompt>> {
        discovery::list_prompts(&self.session).await
    }

    /// Closes the session (best-effort `shutdown`, then disconnects the
    /// transport). The roots actor stops when `self` is dropped.
    pub async fn close(&self) {
        self.session.close().await;
    }
}

/// Adapts an installed [`SamplingHandler`] into a [`ServerRequestHandler`]
/// the session engine dispatches inbound `sampling/createMessage` calls
/// to. Reads the session's negotiated version fresh on every dispatch
/// rather than snapshotting it at install time, since a handler may be
/// installed before `initialize` completes (spec §4.7 version gating
/// must reflect whatever version is actually live at dispatch time).
struct SamplingRequestBridge<T: Transport + 'static> {
    dispatcher: Arc<InboundSamplingDispatcher>,
    session: Arc<Session<T>>,
}

#[async_trait::async_trait]
impl<T: Transport + 'static> ServerRequestHandler for SamplingRequestBridge<T> {
    async fn handle(&self, method: &str, params: Option<serde_json::Value>) -> Result<serde_json::Value, mcpc_core::jsonrpc::JsonRpcError> {
        if method != "sampling/createMessage" {
            return Err(mcpc_core::jsonrpc::JsonRpcError::new(-32601, format!("Method not found: {method}")));
        }
        let negotiated = self.session.negotiated_version_or_proposed();
        self.dispatcher.dispatch(params, negotiated).await
    }
}
