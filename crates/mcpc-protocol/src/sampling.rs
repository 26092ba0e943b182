//! `sampling/createMessage` request/result types (spec §4.7).

use crate::content::ContentBlock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A message role. Per spec §4.7, roles SHOULD be exactly `"user"` or
/// `"assistant"` — other values generate a warning at the call site but
/// are still transmitted, so this is a permissive string wrapper rather
/// than a closed enum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(pub String);

impl Role {
    pub const USER: &'static str = "user";
    pub const ASSISTANT: &'static str = "assistant";

    #[must_use]
    pub fn user() -> Self {
        Self(Self::USER.to_string())
    }

    #[must_use]
    pub fn assistant() -> Self {
        Self(Self::ASSISTANT.to_string())
    }

    /// `false` for any role other than `"user"`/`"assistant"`.
    #[must_use]
    pub fn is_standard(&self) -> bool {
        self.0 == Self::USER || self.0 == Self::ASSISTANT
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingMessage {
    pub role: Role,
    pub content: ContentBlock,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ModelHint {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ModelPreferences {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hints: Option<Vec<ModelHint>>,
    #[serde(rename = "costPriority", skip_serializing_if = "Option::is_none")]
    pub cost_priority: Option<f32>,
    #[serde(rename = "speedPriority", skip_serializing_if = "Option::is_none")]
    pub speed_priority: Option<f32>,
    #[serde(rename = "intelligencePriority", skip_serializing_if = "Option::is_none")]
    pub intelligence_priority: Option<f32>,
}

/// Streaming is only valid from protocol version `2025-03-26` onward
/// (spec §4.7). `chunk_size`, if set, must be `10..=1000`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingOptions {
    #[serde(rename = "chunkSize", skip_serializing_if = "Option::is_none")]
    pub chunk_size: Option<u32>,
}

pub const MIN_CHUNK_SIZE: u32 = 10;
pub const MAX_CHUNK_SIZE: u32 = 1000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMessageRequest {
    pub messages: Vec<SamplingMessage>,
    #[serde(rename = "modelPreferences", skip_serializing_if = "Option::is_none")]
    pub model_preferences: Option<ModelPreferences>,
    #[serde(rename = "systemPrompt", skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(rename = "maxTokens")]
    pub max_tokens: u32,
    #[serde(rename = "stopSequences", skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub streaming: Option<StreamingOptions>,
    #[serde(rename = "_meta", skip_serializing_if = "Option::is_none")]
    pub meta: Option<HashMap<String, serde_json::Value>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StopReason {
    EndTurn,
    StopSequence,
    MaxTokens,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMessageResult {
    pub role: Role,
    pub content: ContentBlock,
    pub model: String,
    #[serde(rename = "stopReason", skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<StopReason>,
    #[serde(rename = "_meta", skip_serializing_if = "Option::is_none")]
    pub meta: Option<HashMap<String, serde_json::Value>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nonstandard_role_is_flagged_but_still_constructible() {
        let role = Role("tool".to_string());
        assert!(!role.is_standard());
    }

    #[test]
    fn standard_roles_are_recognized() {
        assert!(Role::user().is_standard());
        assert!(Role::assistant().is_standard());
    }
}
