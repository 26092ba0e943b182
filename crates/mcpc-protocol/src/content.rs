//! Content blocks carried in sampling messages (spec §3, §4.7).
//!
//! A message's content type is version-gated: text is always permitted,
//! image from `2024-11-05`, audio from `2025-03-26` (see
//! [`mcpc_core::version::ProtocolVersion`]).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub type Uri = String;
pub type MimeType = String;
pub type Base64String = String;

/// Common annotation structure attached to content and resources.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Annotations {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audience: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<f64>,
    #[serde(rename = "lastModified", skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
}

/// A content block's wire-level type discriminant, used for the
/// version-gating check independent of a fully parsed [`ContentBlock`].
#[must_use]
pub fn content_type_of(block: &ContentBlock) -> &'static str {
    match block {
        ContentBlock::Text(_) => "text",
        ContentBlock::Image(_) => "image",
        ContentBlock::Audio(_) => "audio",
    }
}

/// A sampling message's content. MCP defines more content shapes
/// (resource links, embedded resources) for tool/resource results;
/// sampling messages (the only place content crosses this client's
/// transport per spec §4.7) are restricted to text/image/audio.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    #[serde(rename = "text")]
    Text(TextContent),
    #[serde(rename = "image")]
    Image(ImageContent),
    #[serde(rename = "audio")]
    Audio(AudioContent),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextContent {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Annotations>,
    #[serde(rename = "_meta", skip_serializing_if = "Option::is_none")]
    pub meta: Option<HashMap<String, serde_json::Value>>,
}

impl TextContent {
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), annotations: None, meta: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageContent {
    pub data: Base64String,
    #[serde(rename = "mimeType")]
    pub mime_type: MimeType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Annotations>,
    #[serde(rename = "_meta", skip_serializing_if = "Option::is_none")]
    pub meta: Option<HashMap<String, serde_json::Value>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioContent {
    pub data: Base64String,
    #[serde(rename = "mimeType")]
    pub mime_type: MimeType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Annotations>,
    #[serde(rename = "_meta", skip_serializing_if = "Option::is_none")]
    pub meta: Option<HashMap<String, serde_json::Value>>,
}

/// Resource contents (read via `resources/read`, spec §4.8 discovery).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResourceContent {
    Text(TextResourceContents),
    Blob(BlobResourceContents),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextResourceContents {
    pub uri: Uri,
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<MimeType>,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobResourceContents {
    pub uri: Uri,
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<MimeType>,
    pub blob: Base64String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_block_tags_round_trip() {
        let block = ContentBlock::Text(TextContent::new("hi"));
        let raw = serde_json::to_string(&block).unwrap();
        assert!(raw.contains("\"type\":\"text\""));
        assert_eq!(content_type_of(&block), "text");
    }
}
