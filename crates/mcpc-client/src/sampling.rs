//! Sampling subsystem (spec §4.7, component H): both directions.
//!
//! The inbound `SamplingHandler` trait is adapted from the teacher's
//! `turbomcp-client/src/sampling.rs` (same shape: an async trait the
//! embedding application implements to answer `sampling/createMessage`
//! requests), but drops the teacher's bundled OpenAI/Anthropic HTTP
//! backend — the spec describes an "installed sampling handler" as a
//! pure collaborator interface (§6), not a concrete LLM integration, so
//! `ProductionSamplingHandler` has no counterpart here (see DESIGN.md).
//!
//! The outbound `request_sampling` path (retry/backoff, content-type
//! gating, streaming preconditions) has no direct teacher counterpart;
//! it is built from spec §4.7's text directly, borrowing only the
//! *style* of the teacher's `handle_with_retries` backoff loop.

use std::sync::Arc;
use std::time::Duration;

use mcpc_core::error::{McpError, McpResult};
use mcpc_core::jsonrpc::JsonRpcError;
use mcpc_core::version::ProtocolVersion;
use mcpc_protocol::content::content_type_of;
use mcpc_protocol::sampling::{
    CreateMessageRequest, CreateMessageResult, ModelPreferences, Role, SamplingMessage,
    StreamingOptions, MAX_CHUNK_SIZE, MIN_CHUNK_SIZE,
};
use mcpc_transport::Transport;
use tracing::warn;

use crate::session::{RequestOptions, Session};

/// Error substrings the retry loop matches against, by prefix (spec
/// §4.7 step 5, §9 open question 2). This is the fragile predicate the
/// spec explicitly retains "to preserve the spirit" of the source
/// behavior; do not strengthen it without revisiting that decision.
const RETRYABLE_PREFIXES: &[&str] = &["timeout", "temporary", "connection", "reset", "broken pipe"];

/// Outbound sampling request parameters, mirroring `CreateMessageRequest`
/// plus the retry/version knobs spec §4.7 describes as call options
/// rather than wire fields.
#[derive(Debug, Clone)]
pub struct SamplingOptions {
    pub protocol_version: Option<ProtocolVersion>,
    pub model_preferences: Option<ModelPreferences>,
    pub system_prompt: Option<String>,
    pub max_tokens: u32,
    pub stop_sequences: Option<Vec<String>>,
    pub streaming: Option<StreamingOptions>,
    pub max_retries: u32,
    pub retry_interval: Duration,
    pub retry_multiplier: u32,
    pub max_interval: Duration,
}

impl Default for SamplingOptions {
    fn default() -> Self {
        Self {
            protocol_version: None,
            model_preferences: None,
            system_prompt: None,
            max_tokens: 1024,
            stop_sequences: None,
            streaming: None,
            max_retries: 3,
            retry_interval: Duration::from_millis(200),
            retry_multiplier: 1,
            max_interval: Duration::from_secs(5),
        }
    }
}

/// Installed by the embedding application to answer both directions of
/// sampling: generating a completion for an outbound request made by
/// this client's own code, and answering a server-initiated
/// `sampling/createMessage` request.
#[async_trait::async_trait]
pub trait SamplingHandler: Send + Sync {
    async fn create_message(&self, request: CreateMessageRequest) -> Result<CreateMessageResult, McpError>;
}

fn is_retryable_message(message: &str) -> bool {
    let lowered = message.to_ascii_lowercase();
    RETRYABLE_PREFIXES.iter().any(|prefix| lowered.starts_with(prefix))
}

fn validate_message_content_types(messages: &[SamplingMessage], version: ProtocolVersion) -> McpResult<()> {
    for (index, message) in messages.iter().enumerate() {
        let content_type = content_type_of(&message.content);
        if !version.supports_content_type(content_type) {
            return Err(McpError::invalid_params(format!(
                "message {index} content type '{content_type}' not supported in protocol version '{version}'"
            )));
        }
        if !message.role.is_standard() {
            warn!("sampling message {index} has non-standard role '{}'; transmitting anyway", message.role.0);
        }
    }
    Ok(())
}

/// Validates a request before it is sent (spec §4.7 steps 1-3): at
/// least one message, streaming preconditions, per-message content-type
/// gating. Never touches the transport.
///
/// # Errors
/// Returns `ErrorKind::InvalidParams` for any violated precondition.
pub fn validate_request(
    messages: &[SamplingMessage],
    streaming: Option<&StreamingOptions>,
    version: ProtocolVersion,
    has_chunk_handler: bool,
) -> McpResult<()> {
    if messages.is_empty() {
        return Err(McpError::invalid_params("sampling request must contain at least one message"));
    }
    if let Some(options) = streaming {
        if !version.supports_streaming_sampling() {
            return Err(McpError::invalid_params(format!(
                "streaming sampling requires protocol version 2025-03-26 or newer, negotiated version is '{version}'"
            )));
        }
        if !has_chunk_handler {
            return Err(McpError::invalid_params("streaming sampling requires a chunk handler"));
        }
        if let Some(size) = options.chunk_size {
            if !(MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&size) {
                return Err(McpError::invalid_params(format!(
                    "chunk size {size} out of range {MIN_CHUNK_SIZE}..={MAX_CHUNK_SIZE}"
                )));
            }
        }
    }
    validate_message_content_types(messages, version)
}

/// Sends a `sampling/createMessage` request with retry-on-transient-error
/// (spec §4.7 steps 4-6). Streaming chunk delivery itself is deferred
/// (spec §9 open question 1): a request with `streaming` set still only
/// returns the final, non-streamed result.
///
/// # Errors
/// Returns a validation error before anything is sent, or the final
/// transport/protocol error after retries are exhausted.
pub async fn request_sampling<T: Transport + 'static>(
    session: &Session<T>,
    messages: Vec<SamplingMessage>,
    options: SamplingOptions,
) -> McpResult<CreateMessageResult> {
    let version = options.protocol_version.unwrap_or_else(|| session.negotiated_version_or_proposed());
    validate_request(&messages, options.streaming.as_ref(), version, true)?;

    if options.streaming.is_some() {
        return Err(McpError::new(
            mcpc_core::error::ErrorKind::CapabilityNotSupported,
            "streaming sampling chunk delivery is not yet implemented",
        ));
    }

    let request = CreateMessageRequest {
        messages,
        model_preferences: options.model_preferences.clone(),
        system_prompt: options.system_prompt.clone(),
        max_tokens: options.max_tokens,
        stop_sequences: options.stop_sequences.clone(),
        streaming: options.streaming.clone(),
        meta: None,
    };
    let params = serde_json::to_value(&request)?;

    let mut attempt = 0u32;
    loop {
        attempt += 1;
        let result = session
            .send_request("sampling/createMessage", Some(params.clone()), RequestOptions::default())
            .await;

        match result {
            Ok(value) => {
                let parsed: CreateMessageResult = serde_json::from_value(value)?;
                let response_type = content_type_of(&parsed.content);
                if !version.supports_content_type(response_type) {
                    return Err(McpError::protocol(format!(
                        "sampling response content type '{response_type}' not supported in protocol version '{version}'"
                    )));
                }
                return Ok(parsed);
            }
            Err(e) => {
                let retryable = e.kind != mcpc_core::error::ErrorKind::Cancelled
                    && e.kind != mcpc_core::error::ErrorKind::Timeout
                    && is_retryable_message(&e.message);
                if attempt >= options.max_retries || !retryable {
                    return Err(e);
                }
                let backoff = options.retry_interval * attempt * options.retry_multiplier.max(1);
                let backoff = backoff.min(options.max_interval);
                tokio::time::sleep(backoff).await;
            }
        }
    }
}

/// Inbound handler adapter: decodes a server-initiated `sampling/
/// createMessage` request's params, validates content types, invokes
/// the installed handler, and maps the result to a JSON-RPC response.
pub struct InboundSamplingDispatcher {
    handler: Arc<dyn SamplingHandler>,
}

impl InboundSamplingDispatcher {
    #[must_use]
    pub fn new(handler: Arc<dyn SamplingHandler>) -> Self {
        Self { handler }
    }

    /// # Errors
    /// Returns a `JsonRpcError` mapped from validation or handler
    /// failure, per spec §4.5's dispatch table (`-32700`/`-32600`/`-1`).
    pub async fn dispatch(
        &self,
        params: Option<serde_json::Value>,
        negotiated_version: ProtocolVersion,
    ) -> Result<serde_json::Value, JsonRpcError> {
        let params = params.ok_or_else(|| JsonRpcError::new(-32600, "sampling/createMessage requires params"))?;
        let request: CreateMessageRequest = serde_json::from_value(params)
            .map_err(|e| JsonRpcError::new(-32700, format!("failed to parse sampling request: {e}")))?;

        validate_message_content_types(&request.messages, negotiated_version)
            .map_err(|e| JsonRpcError::new(-32600, e.message))?;

        let result = self
            .handler
            .create_message(request)
            .await
            .map_err(|e| JsonRpcError::new(-1, e.message))?;

        let response_type = content_type_of(&result.content);
        if !negotiated_version.supports_content_type(response_type) {
            return Err(JsonRpcError::new(
                -1,
                format!("handler response content type '{response_type}' not supported in protocol version '{negotiated_version}'"),
            ));
        }

        serde_json::to_value(&result).map_err(|e| JsonRpcError::new(-32603, format!("failed to encode sampling result: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcpc_protocol::content::{ContentBlock, TextContent};

    fn text_message(role: &str) -> SamplingMessage {
        SamplingMessage { role: Role(role.to_string()), content: ContentBlock::Text(TextContent::new("hi")) }
    }

    fn audio_message() -> SamplingMessage {
        SamplingMessage {
            role: Role::user(),
            content: ContentBlock::Audio(mcpc_protocol::content::AudioContent {
                data: "base64".to_string(),
                mime_type: "audio/wav".to_string(),
                annotations: None,
                meta: None,
            }),
        }
    }

    #[test]
    fn audio_content_rejected_pre_2025_03_26() {
        let err = validate_request(&[audio_message()], None, ProtocolVersion::V2024_11_05, false).unwrap_err();
        assert_eq!(
            err.message,
            "message 0 content type 'audio' not supported in protocol version '2024-11-05'"
        );
    }

    #[test]
    fn audio_content_accepted_from_2025_03_26() {
        assert!(validate_request(&[audio_message()], None, ProtocolVersion::V2025_03_26, false).is_ok());
    }

    #[test]
    fn empty_messages_rejected() {
        assert!(validate_request(&[], None, ProtocolVersion::V2024_11_05, false).is_err());
    }

    #[test]
    fn streaming_requires_2025_03_26_and_a_chunk_handler() {
        let streaming = StreamingOptions { chunk_size: None };
        let err = validate_request(&[text_message("user")], Some(&streaming), ProtocolVersion::V2024_11_05, true).unwrap_err();
        assert!(err.message.contains("2025-03-26"));

        let err = validate_request(&[text_message("user")], Some(&streaming), ProtocolVersion::V2025_03_26, false).unwrap_err();
        assert!(err.message.contains("chunk handler"));
    }

    #[test]
    fn chunk_size_out_of_range_rejected() {
        let streaming = StreamingOptions { chunk_size: Some(5) };
        let err = validate_request(&[text_message("user")], Some(&streaming), ProtocolVersion::V2025_03_26, true).unwrap_err();
        assert!(err.message.contains("out of range"));
    }

    #[test]
    fn retryable_predicate_matches_only_prefix() {
        assert!(is_retryable_message("timeout while waiting"));
        assert!(!is_retryable_message("request failed due to timeout"));
        assert!(is_retryable_message("Connection refused"));
    }

    #[tokio::test]
    async fn inbound_dispatcher_maps_parse_failure_to_dash_32700() {
        struct EchoHandler;
        #[async_trait::async_trait]
        impl SamplingHandler for EchoHandler {
            async fn create_message(&self, _request: CreateMessageRequest) -> Result<CreateMessageResult, McpError> {
                unreachable!()
            }
        }
        let dispatcher = InboundSamplingDispatcher::new(Arc::new(EchoHandler));
        let err = dispatcher.dispatch(None, ProtocolVersion::V2024_11_05).await.unwrap_err();
        assert_eq!(err.code, -32600);
    }
}
