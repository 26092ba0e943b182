//! Session engine (spec §4.5, component F): id allocation, request
//! dispatch with progress-aware timeouts, batching, the `initialize`
//! handshake, server-initiated message dispatch, and close.
//!
//! Grounded on `turbomcp-client/src/client/{core,protocol}.rs` for the
//! overall request-building and initialize-handshake idiom, but
//! considerably simpler in one respect: `mcpc_transport::Transport::send`
//! already returns the correlated response (it owns the pending table
//! internally), so this engine never runs its own dispatcher/receiver
//! loop the way the teacher's `MessageDispatcher` does — it builds an
//! envelope, calls `transport.send(..)`, and parses the single `Bytes`
//! that comes back.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use bytes::Bytes;
use mcpc_core::error::{ErrorKind, McpError, McpResult};
use mcpc_core::events::{Event, EventBus};
use mcpc_core::jsonrpc::{
    JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, JsonRpcResponsePayload,
    RequestId,
};
use mcpc_core::version::{propose, ProtocolVersion};
use mcpc_protocol::capabilities::ClientCapabilities;
use mcpc_protocol::initialization::{Implementation, InitializeRequest, InitializeResult, InitializedNotification};
use mcpc_protocol::roots::{ListRootsResult, Root};
use mcpc_transport::Transport;
use tokio::sync::Mutex as TokioMutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// Default regular deadline for `send_request` (spec §4.5).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// A progress notification extends the regular deadline only if it
/// arrived within this window of the timer firing.
const PROGRESS_GRACE_WINDOW: Duration = Duration::from_secs(60);

/// Per-call overrides for `send_request`.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub timeout: Option<Duration>,
    pub max_timeout: Option<Duration>,
}

/// One element of a batch call.
#[derive(Debug, Clone)]
pub struct BatchItem {
    pub method: String,
    pub params: Option<serde_json::Value>,
    pub id: RequestId,
}

/// Installed by the owning `Client` to answer server-initiated requests.
/// The session engine dispatches `roots/list` itself (it owns the roots
/// manager's current snapshot via `roots_snapshot`); everything else is
/// handed to this trait.
#[async_trait::async_trait]
pub trait ServerRequestHandler: Send + Sync {
    async fn handle(&self, method: &str, params: Option<serde_json::Value>) -> Result<serde_json::Value, JsonRpcError>;
}

/// Tracks the most recent progress notification per request id, so a
/// regular-deadline timer fire can check whether to extend rather than
/// fail outright.
#[derive(Default)]
struct ProgressTracker {
    last_seen: StdMutex<HashMap<RequestId, Instant>>,
}

impl ProgressTracker {
    fn record(&self, id: RequestId) {
        self.last_seen
            .lock()
            .expect("progress tracker mutex poisoned")
            .insert(id, Instant::now());
    }

    fn recently_progressed(&self, id: &RequestId) -> bool {
        self.last_seen
            .lock()
            .expect("progress tracker mutex poisoned")
            .get(id)
            .is_some_and(|seen| seen.elapsed() < PROGRESS_GRACE_WINDOW)
    }

    fn forget(&self, id: &RequestId) {
        self.last_seen.lock().expect("progress tracker mutex poisoned").remove(id);
    }
}

/// Snapshot of negotiated state recorded after a successful `initialize`.
#[derive(Debug, Clone)]
pub struct NegotiatedSession {
    pub protocol_version: ProtocolVersion,
    pub server_info: Implementation,
    pub server_capabilities: mcpc_protocol::capabilities::ServerCapabilities,
    pub instructions: Option<String>,
}

/// The session engine: owns id allocation, the transport, the event bus,
/// and the negotiated-version record. One instance per connected session.
pub struct Session<T: Transport> {
    transport: Arc<T>,
    next_id: AtomicI64,
    events: EventBus,
    progress: ProgressTracker,
    negotiated: StdMutex<Option<NegotiatedSession>>,
    initialized: StdMutex<bool>,
    pinned_version: Option<ProtocolVersion>,
    client_info: Implementation,
    client_capabilities: ClientCapabilities,
    roots_snapshot: Arc<dyn Fn() -> Vec<Root> + Send + Sync>,
    server_request_handler: TokioMutex<Option<Arc<dyn ServerRequestHandler>>>,
    cancellation: CancellationToken,
    roots_list_changed: std::sync::atomic::AtomicBool,
}

impl<T: Transport + 'static> Session<T> {
    #[must_use]
    pub fn new(
        transport: Arc<T>,
        client_info: Implementation,
        client_capabilities: ClientCapabilities,
        pinned_version: Option<ProtocolVersion>,
        roots_snapshot: Arc<dyn Fn() -> Vec<Root> + Send + Sync>,
    ) -> Self {
        let roots_list_changed = client_capabilities
            .roots
            .as_ref()
            .and_then(|r| r.list_changed)
            .unwrap_or(false);
        Self {
            transport,
            next_id: AtomicI64::new(1),
            events: EventBus::new(),
            progress: ProgressTracker::default(),
            negotiated: StdMutex::new(None),
            initialized: StdMutex::new(false),
            pinned_version,
            client_info,
            client_capabilities,
            roots_snapshot,
            server_request_handler: TokioMutex::new(None),
            cancellation: CancellationToken::new(),
            roots_list_changed: std::sync::atomic::AtomicBool::new(roots_list_changed),
        }
    }

    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// The cancellation token scoped to this session's lifetime. Cancelled
    /// by [`Session::close`]; callers can select against
    /// [`CancellationToken::cancelled`] to abandon in-flight work.
    #[must_use]
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }

    #[must_use]
    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    #[must_use]
    pub fn negotiated(&self) -> Option<NegotiatedSession> {
        self.negotiated.lock().expect("negotiated mutex poisoned").clone()
    }

    fn is_initialized(&self) -> bool {
        *self.initialized.lock().expect("initialized mutex poisoned")
    }

    /// Register the handler for server-initiated requests other than
    /// `roots/list` (answered directly from `roots_snapshot`). Sampling
    /// is typically installed here by `mcpc-client::sampling`.
    pub async fn set_server_request_handler(&self, handler: Arc<dyn ServerRequestHandler>) {
        *self.server_request_handler.lock().await = Some(handler);
    }

    fn next_request_id(&self) -> RequestId {
        RequestId::Number(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    fn negotiated_protocol_version(&self) -> ProtocolVersion {
        self.negotiated()
            .map(|n| n.protocol_version)
            .unwrap_or_else(|| propose(self.pinned_version))
    }

    /// Send a single request and wait for its correlated response,
    /// following the 8-step algorithm in spec §4.5.
    ///
    /// # Errors
    /// Returns the transport error, a deadline/cancellation error, or the
    /// server's JSON-RPC error surfaced verbatim.
    pub async fn send_request(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
        options: RequestOptions,
    ) -> McpResult<serde_json::Value> {
        if !self.transport.is_connected().await {
            self.transport.connect().await?;
        }

        let id = self.next_request_id();
        let request = JsonRpcRequest::new(id.clone(), method, params.clone());
        let bytes = Bytes::from(serde_json::to_vec(&request)?);

        let timeout = options.timeout.unwrap_or(DEFAULT_TIMEOUT);
        let max_timeout = options.max_timeout.unwrap_or(timeout * 2);
        let max_deadline = Instant::now() + max_timeout;
        let mut regular_deadline = Instant::now() + timeout;

        let result = loop {
            match tokio::time::timeout_at(
                regular_deadline.min(max_deadline),
                self.transport.send_with_deadline(bytes.clone(), max_deadline),
            )
            .await
            {
                Ok(Ok(response_bytes)) => break self.parse_response(&id, &response_bytes),
                Ok(Err(e)) => break Err(McpError::from(e)),
                Err(_elapsed) => {
                    if regular_deadline >= max_deadline {
                        break Err(McpError::timeout(format!("request {method} timed out")));
                    }
                    if self.progress.recently_progressed(&id) {
                        regular_deadline = (Instant::now() + timeout).min(max_deadline);
                        continue;
                    }
                    break Err(McpError::timeout(format!("request {method} timed out")));
                }
            }
        };

        self.progress.forget(&id);

        match &result {
            Ok(value) => {
                self.events.publish(Event::ToolExecuted {
                    method: method.to_string(),
                    request: serde_json::to_value(&request).unwrap_or_default(),
                    response: value.clone(),
                });
            }
            Err(e) => {
                if e.kind == ErrorKind::Timeout {
                    self.emit_cancelled_notification(&id, "request timed out").await;
                }
                self.events.publish(Event::RequestFailed {
                    method: method.to_string(),
                    request: serde_json::to_value(&request).unwrap_or_default(),
                    error: e.to_string(),
                });
                if matches!(e.kind, ErrorKind::Timeout | ErrorKind::Transport) {
                    self.events.publish(Event::ClientError {
                        message: format!("{method} failed: {e}"),
                    });
                }
            }
        }

        result
    }

    fn parse_response(&self, id: &RequestId, bytes: &Bytes) -> McpResult<serde_json::Value> {
        let response: JsonRpcResponse = serde_json::from_slice(bytes)?;
        match response.id.as_request_id() {
            Some(response_id) if response_id == id => {}
            _ => {
                return Err(McpError::protocol("response id did not match request id"));
            }
        }
        match response.payload {
            JsonRpcResponsePayload::Success { result } => Ok(result),
            JsonRpcResponsePayload::Error { error } => {
                Err(McpError::from_rpc_code(error.code, error.message))
            }
        }
    }

    async fn emit_cancelled_notification(&self, id: &RequestId, reason: &str) {
        let params = serde_json::json!({ "requestId": id, "reason": reason });
        let notification = JsonRpcNotification::new("notifications/cancelled", Some(params));
        if let Ok(bytes) = serde_json::to_vec(&notification) {
            let _ = self.transport.send(Bytes::from(bytes)).await;
        }
    }

    /// Record an inbound progress notification keyed by request id, so
    /// a still-pending `send_request` call can extend its deadline.
    pub fn record_progress(&self, id: RequestId) {
        self.progress.record(id);
    }

    /// Emit `notifications/roots/list_changed` (spec §4.6): declares the
    /// roots capability's `listChanged` flag true if a mutation hasn't
    /// already done so, then fires the notification only if that flag
    /// is set and a transport is actually attached.
    pub async fn notify_roots_list_changed(&self) {
        self.roots_list_changed.store(true, Ordering::SeqCst);
        if self.roots_list_changed.load(Ordering::SeqCst) && self.transport.is_connected().await {
            self.notify("notifications/roots/list_changed", None).await;
        }
    }

    /// Send a notification (fire-and-forget, best effort).
    pub async fn notify(&self, method: &str, params: Option<serde_json::Value>) {
        let notification = JsonRpcNotification::new(method, params);
        match serde_json::to_vec(&notification) {
            Ok(bytes) => {
                if let Err(e) = self.transport.send(Bytes::from(bytes)).await {
                    warn!("best-effort notification '{method}' failed: {e}");
                }
            }
            Err(e) => warn!("failed to serialize notification '{method}': {e}"),
        }
    }

    /// Send an ordered batch of requests/notifications (spec §4.5
    /// batching). All-notification batches return an empty list.
    /// Responses are matched back to items by id, not array position.
    ///
    /// # Errors
    /// Returns an error if the transport send or response parse fails.
    pub async fn send_batch(&self, items: Vec<BatchItem>) -> McpResult<Vec<(RequestId, McpResult<serde_json::Value>)>> {
        if items.is_empty() {
            return Ok(Vec::new());
        }
        let envelope: Vec<serde_json::Value> = items
            .iter()
            .map(|item| {
                serde_json::json!({
                    "jsonrpc": "2.0",
                    "id": item.id,
                    "method": item.method,
                    "params": item.params,
                })
            })
            .collect();
        let bytes = Bytes::from(serde_json::to_vec(&envelope)?);
        if !self.transport.is_connected().await {
            self.transport.connect().await?;
        }
        let response_bytes = self.transport.send(bytes).await?;
        if response_bytes.is_empty() {
            // An all-notification batch returns nothing to correlate.
            return Ok(Vec::new());
        }
        let responses: Vec<JsonRpcResponse> = serde_json::from_slice(&response_bytes)?;
        let mut by_id: HashMap<RequestId, JsonRpcResponse> = responses
            .into_iter()
            .filter_map(|r| r.id.as_request_id().cloned().map(|id| (id, r)))
            .collect();
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            let result = match by_id.remove(&item.id) {
                Some(response) => match response.payload {
                    JsonRpcResponsePayload::Success { result } => Ok(result),
                    JsonRpcResponsePayload::Error { error } => {
                        Err(McpError::from_rpc_code(error.code, error.message))
                    }
                },
                None => Err(McpError::protocol(format!("no response for batched id {}", item.id))),
            };
            out.push((item.id, result));
        }
        Ok(out)
    }

    /// Perform the `initialize` handshake (spec §4.5). On failure, the
    /// transport is disconnected before the error is returned.
    ///
    /// # Errors
    /// Returns the underlying transport or protocol error.
    pub async fn initialize(&self) -> McpResult<NegotiatedSession> {
        self.events.publish(Event::ClientInitializing);
        let proposed = propose(self.pinned_version);
        let request = InitializeRequest {
            protocol_version: proposed.as_str().to_string(),
            capabilities: self.client_capabilities.clone(),
            client_info: self.client_info.clone(),
        };
        let params = serde_json::to_value(&request)?;

        let result = self.send_request("initialize", Some(params), RequestOptions::default()).await;
        let result = match result {
            Ok(value) => value,
            Err(e) => {
                let _ = self.transport.disconnect().await;
                return Err(e);
            }
        };

        let init_result: InitializeResult = match serde_json::from_value(result) {
            Ok(r) => r,
            Err(e) => {
                let _ = self.transport.disconnect().await;
                return Err(McpError::protocol(format!("malformed initialize response: {e}")));
            }
        };

        let Some(version) = ProtocolVersion::parse(&init_result.protocol_version) else {
            let _ = self.transport.disconnect().await;
            return Err(McpError::protocol_version_mismatch(init_result.protocol_version));
        };

        let negotiated = NegotiatedSession {
            protocol_version: version,
            server_info: init_result.server_info,
            server_capabilities: init_result.capabilities,
            instructions: init_result.instructions,
        };
        *self.negotiated.lock().expect("negotiated mutex poisoned") = Some(negotiated.clone());
        *self.initialized.lock().expect("initialized mutex poisoned") = true;

        let _ = InitializedNotification {};
        self.notify("notifications/initialized", None).await;
        self.events.publish(Event::ClientInitialized);
        Ok(negotiated)
    }

    /// Dispatch an inbound frame from the transport's notification
    /// handler (spec §4.5 server-initiated message dispatch). Requests
    /// (id + method) are answered by posting a response back over the
    /// same transport; notifications are routed by method name.
    pub async fn dispatch_inbound(&self, bytes: &Bytes) {
        let Ok(value) = serde_json::from_slice::<serde_json::Value>(bytes) else {
            debug!("session: dropping non-JSON inbound frame");
            return;
        };
        let method = value.get("method").and_then(serde_json::Value::as_str);
        let id = value.get("id").cloned();
        let params = value.get("params").cloned();

        match (id, method) {
            (Some(id_value), Some(method)) => {
                self.handle_server_request(id_value, method, params).await;
            }
            (None, Some(method)) => {
                self.handle_server_notification(method, params).await;
            }
            _ => trace!("session: inbound frame has neither id nor method"),
        }
    }

    async fn handle_server_request(&self, id_value: serde_json::Value, method: &str, params: Option<serde_json::Value>) {
        let id: RequestId = match serde_json::from_value(id_value) {
            Ok(id) => id,
            Err(_) => return,
        };

        let result = if method == "roots/list" {
            let roots = (self.roots_snapshot)();
            serde_json::to_value(ListRootsResult::new(roots)).map_err(|e| {
                JsonRpcError::new(-32603, format!("failed to encode roots list: {e}"))
            })
        } else {
            let handler = self.server_request_handler.lock().await.clone();
            match handler {
                Some(handler) => handler.handle(method, params).await,
                None => Err(JsonRpcError::new(-32601, format!("Method not found: {method}"))),
            }
        };

        let response = match result {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(error) => JsonRpcResponse::error(id, error),
        };
        if let Ok(bytes) = serde_json::to_vec(&response) {
            let _ = self.transport.send(Bytes::from(bytes)).await;
        }
    }

    async fn handle_server_notification(&self, method: &str, params: Option<serde_json::Value>) {
        if method == "notifications/progress" {
            if let Some(id) = params
                .as_ref()
                .and_then(|p| p.get("requestId"))
                .and_then(|v| serde_json::from_value::<RequestId>(v.clone()).ok())
            {
                self.record_progress(id);
            }
            return;
        }
        trace!("session: unhandled server notification '{method}'");
    }

    /// Close the session (spec §4.5 close sequence): best-effort
    /// `shutdown`, disconnect, emit `disconnected`. The caller is
    /// responsible for tearing down any attached server-registry entry.
    pub async fn close(&self) {
        if self.is_initialized() {
            let _ = self
                .send_request("shutdown", None, RequestOptions { timeout: Some(Duration::from_secs(5)), ..Default::default() })
                .await;
        }
        let _ = self.transport.disconnect().await;
        self.cancellation.cancel();
        self.events.publish(Event::ClientDisconnected);
    }

    #[must_use]
    pub fn negotiated_version_or_proposed(&self) -> ProtocolVersion {
        self.negotiated_protocol_version()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcpc_transport::{pair, InProcessHandler, DEFAULT_CHANNEL_CAPACITY};
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    fn echo_ok_handler() -> InProcessHandler {
        Arc::new(|bytes: Bytes| {
            Box::pin(async move {
                let value: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
                let id = value.get("id")?.clone();
                let method = value.get("method")?.as_str()?.to_string();
                let result = match method.as_str() {
                    "initialize" => serde_json::json!({
                        "protocolVersion": "2024-11-05",
                        "capabilities": {},
                        "serverInfo": {"name": "test-server", "version": "0.1.0"}
                    }),
                    _ => serde_json::json!({"ok": true}),
                };
                let response = serde_json::json!({"jsonrpc": "2.0", "id": id, "result": result});
                Some(Bytes::from(serde_json::to_vec(&response).ok()?))
            })
        })
    }

    fn test_client_info() -> Implementation {
        Implementation::new("mcpc-test", "0.1.0")
    }

    #[tokio::test]
    async fn ids_are_monotonically_increasing() {
        let (_server, client) = pair(echo_ok_handler(), DEFAULT_CHANNEL_CAPACITY);
        let transport = Arc::new(client);
        transport.connect().await.unwrap();
        let session = Session::new(
            transport,
            test_client_info(),
            ClientCapabilities::default(),
            None,
            Arc::new(Vec::new),
        );
        let first = session.next_request_id();
        let second = session.next_request_id();
        assert!(matches!((first, second), (RequestId::Number(a), RequestId::Number(b)) if a < b));
    }

    #[tokio::test]
    async fn initialize_round_trips_and_publishes_events() {
        let (_server, client) = pair(echo_ok_handler(), DEFAULT_CHANNEL_CAPACITY);
        let transport = Arc::new(client);
        transport.connect().await.unwrap();
        let session = Session::new(
            transport,
            test_client_info(),
            ClientCapabilities::default(),
            Some(ProtocolVersion::V2024_11_05),
            Arc::new(Vec::new),
        );
        let mut events = session.events().subscribe();
        let negotiated = session.initialize().await.unwrap();
        assert_eq!(negotiated.protocol_version, ProtocolVersion::V2024_11_05);
        assert_eq!(negotiated.server_info.name, "test-server");

        assert_eq!(events.recv().await.unwrap().topic(), "client_initializing");
        assert_eq!(events.recv().await.unwrap().topic(), "tool_executed");
        assert_eq!(events.recv().await.unwrap().topic(), "client_initialized");
    }

    #[tokio::test]
    async fn send_request_publishes_tool_executed_on_success() {
        let (_server, client) = pair(echo_ok_handler(), DEFAULT_CHANNEL_CAPACITY);
        let transport = Arc::new(client);
        transport.connect().await.unwrap();
        let session = Session::new(
            transport,
            test_client_info(),
            ClientCapabilities::default(),
            None,
            Arc::new(Vec::new),
        );
        let mut events = session.events().subscribe();
        let result = session.send_request("tools/call", None, RequestOptions::default()).await.unwrap();
        assert_eq!(result, serde_json::json!({"ok": true}));
        assert_eq!(events.recv().await.unwrap().topic(), "tool_executed");
    }

    #[tokio::test]
    async fn dispatch_inbound_answers_roots_list_from_snapshot() {
        let (server, client) = pair(echo_ok_handler(), DEFAULT_CHANNEL_CAPACITY);
        let transport = Arc::new(client);
        transport.connect().await.unwrap();
        let roots = vec![Root::new("file:///tmp", None)];
        let session = Arc::new(Session::new(
            transport.clone(),
            test_client_info(),
            ClientCapabilities::default(),
            None,
            Arc::new(move || roots.clone()),
        ));

        let received = Arc::new(AtomicUsize::new(0));
        let received_clone = received.clone();
        let session_clone = session.clone();
        transport.register_notification_handler(Arc::new(move |_method, bytes| {
            let session = session_clone.clone();
            let received = received_clone.clone();
            tokio::spawn(async move {
                session.dispatch_inbound(&bytes).await;
                received.fetch_add(1, AtomicOrdering::SeqCst);
            });
        }));

        server.push(Bytes::from_static(br#"{"jsonrpc":"2.0","id":99,"method":"roots/list"}"#));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(received.load(AtomicOrdering::SeqCst), 1);
    }

    fn silent_handler() -> InProcessHandler {
        Arc::new(|_bytes: Bytes| Box::pin(async move { None }))
    }

    #[tokio::test]
    async fn timed_out_request_publishes_client_error() {
        let (_server, client) = pair(silent_handler(), DEFAULT_CHANNEL_CAPACITY);
        let transport = Arc::new(client);
        transport.connect().await.unwrap();
        let session = Session::new(
            transport,
            test_client_info(),
            ClientCapabilities::default(),
            None,
            Arc::new(Vec::new),
        );
        let mut events = session.events().subscribe();
        let options = RequestOptions { timeout: Some(Duration::from_millis(20)), max_timeout: Some(Duration::from_millis(20)) };
        let result = session.send_request("tools/call", None, options).await;
        assert!(result.is_err());
        assert_eq!(events.recv().await.unwrap().topic(), "request_failed");
        assert_eq!(events.recv().await.unwrap().topic(), "client_error");
    }

    #[tokio::test]
    async fn close_cancels_the_session_token() {
        let (_server, client) = pair(echo_ok_handler(), DEFAULT_CHANNEL_CAPACITY);
        let transport = Arc::new(client);
        transport.connect().await.unwrap();
        let session = Session::new(
            transport,
            test_client_info(),
            ClientCapabilities::default(),
            None,
            Arc::new(Vec::new),
        );
        assert!(!session.cancellation_token().is_cancelled());
        session.close().await;
        assert!(session.cancellation_token().is_cancelled());
    }

    #[tokio::test]
    async fn roots_list_changed_notification_is_gated_on_the_capability_flag() {
        let (_server, client) = pair(echo_ok_handler(), DEFAULT_CHANNEL_CAPACITY);
        let transport = Arc::new(client);
        transport.connect().await.unwrap();
        let session = Session::new(
            transport,
            test_client_info(),
            ClientCapabilities { roots: None, ..Default::default() },
            None,
            Arc::new(Vec::new),
        );
        assert!(!session.roots_list_changed.load(AtomicOrdering::SeqCst));
        session.notify_roots_list_changed().await;
        assert!(session.roots_list_changed.load(AtomicOrdering::SeqCst));
    }
}
