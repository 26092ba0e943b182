//! Wire-level MCP message types.
//!
//! Everything here is a plain, serde-(de)serializable data shape with no
//! session, transport, or actor-model logic attached — that lives in
//! `mcpc-client`. This crate only answers "what does the JSON look like".
//!
//! - [`initialization`] — the `initialize` handshake.
//! - [`capabilities`] — client/server capability negotiation structs.
//! - [`content`] — content blocks carried in sampling messages and
//!   resource reads.
//! - [`sampling`] — `sampling/createMessage` request/result types.
//! - [`roots`] — root wire types (`roots/list`, list-changed notification).
//! - [`discovery`] — paginated `tools/list`, `resources/list`,
//!   `prompts/list` result shapes.

pub mod capabilities;
pub mod content;
pub mod discovery;
pub mod initialization;
pub mod roots;
pub mod sampling;

pub use capabilities::{
    ClientCapabilities, CompletionCapabilities, LoggingCapabilities, PromptsCapabilities,
    ResourcesCapabilities, RootsCapabilities, SamplingCapabilities, ServerCapabilities,
    ToolsCapabilities,
};
pub use content::{
    Annotations, AudioContent, BlobResourceContents, ContentBlock, ImageContent, ResourceContent,
    TextContent, TextResourceContents, content_type_of,
};
pub use discovery::{
    ListParams, ListPromptsResult, ListResourcesResult, ListToolsResult, Prompt, PromptArgument,
    Resource, Tool,
};
pub use initialization::{Implementation, InitializeRequest, InitializeResult, InitializedNotification};
pub use roots::{ListRootsRequest, ListRootsResult, Root, RootsListChangedNotification};
pub use sampling::{
    CreateMessageRequest, CreateMessageResult, ModelHint, ModelPreferences, Role, SamplingMessage,
    StopReason, StreamingOptions, MAX_CHUNK_SIZE, MIN_CHUNK_SIZE,
};
