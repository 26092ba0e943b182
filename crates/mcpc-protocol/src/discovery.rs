//! `tools/list`, `resources/list`, `prompts/list` paginated result shapes
//! (spec §4.8).
//!
//! Per spec, a missing or mistyped optional field (a schema that's a
//! string instead of an object, a missing `description`) must not fail
//! the whole list — it defaults to empty and discovery continues. Each
//! entry type therefore implements `Deserialize` by hand over a raw
//! [`serde_json::Value`] rather than deriving, so one malformed entry
//! degrades gracefully instead of aborting the page.

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

fn lenient_string(v: Option<&Value>) -> Option<String> {
    v.and_then(Value::as_str).map(str::to_string)
}

fn lenient_object(v: Option<&Value>) -> Option<Value> {
    v.filter(|val| val.is_object()).cloned()
}

#[derive(Debug, Clone, Serialize)]
pub struct Tool {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "inputSchema", skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Value>,
}

impl<'de> Deserialize<'de> for Tool {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Value::deserialize(deserializer)?;
        let obj = raw.as_object().ok_or_else(|| DeError::custom("tool entry must be an object"))?;
        let name = obj
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| DeError::custom("tool entry missing string name"))?
            .to_string();
        Ok(Tool {
            name,
            description: lenient_string(obj.get("description")),
            input_schema: lenient_object(obj.get("inputSchema")),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListToolsResult {
    pub tools: Vec<Tool>,
    #[serde(rename = "nextCursor", default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Resource {
    pub uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl<'de> Deserialize<'de> for Resource {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Value::deserialize(deserializer)?;
        let obj = raw.as_object().ok_or_else(|| DeError::custom("resource entry must be an object"))?;
        let uri = obj
            .get("uri")
            .and_then(Value::as_str)
            .ok_or_else(|| DeError::custom("resource entry missing string uri"))?
            .to_string();
        Ok(Resource {
            uri,
            name: lenient_string(obj.get("name")),
            description: lenient_string(obj.get("description")),
            mime_type: lenient_string(obj.get("mimeType")),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResourcesResult {
    pub resources: Vec<Resource>,
    #[serde(rename = "nextCursor", default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptArgument {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Prompt {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Vec<PromptArgument>>,
}

impl<'de> Deserialize<'de> for Prompt {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Value::deserialize(deserializer)?;
        let obj = raw.as_object().ok_or_else(|| DeError::custom("prompt entry must be an object"))?;
        let name = obj
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| DeError::custom("prompt entry missing string name"))?
            .to_string();
        // A malformed `arguments` array (not an array, or entries that
        // fail to parse individually) degrades to `None` rather than
        // failing the whole prompt entry.
        let arguments = obj
            .get("arguments")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| serde_json::from_value::<PromptArgument>(v.clone()).ok())
                    .collect::<Vec<_>>()
            })
            .filter(|v| !v.is_empty());
        Ok(Prompt {
            name,
            description: lenient_string(obj.get("description")),
            arguments,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListPromptsResult {
    pub prompts: Vec<Prompt>,
    #[serde(rename = "nextCursor", default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// A page request: no params on the first page, `{cursor}` thereafter.
#[derive(Debug, Clone, Serialize, Default)]
pub struct ListParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_with_malformed_schema_defaults_schema_to_none() {
        let raw = serde_json::json!({"name": "echo", "inputSchema": "not-an-object"});
        let tool: Tool = serde_json::from_value(raw).unwrap();
        assert_eq!(tool.name, "echo");
        assert!(tool.input_schema.is_none());
    }

    #[test]
    fn tool_with_missing_description_defaults_to_none() {
        let raw = serde_json::json!({"name": "echo"});
        let tool: Tool = serde_json::from_value(raw).unwrap();
        assert!(tool.description.is_none());
    }

    #[test]
    fn list_tools_pagination_cursor_round_trips() {
        let raw = serde_json::json!({"tools": [], "nextCursor": "page2"});
        let page: ListToolsResult = serde_json::from_value(raw).unwrap();
        assert_eq!(page.next_cursor.as_deref(), Some("page2"));
    }

    #[test]
    fn resource_missing_uri_errors() {
        let raw = serde_json::json!({"name": "only-a-name"});
        assert!(serde_json::from_value::<Resource>(raw).is_err());
    }

    #[test]
    fn prompt_with_bad_arguments_shape_degrades_to_none() {
        let raw = serde_json::json!({"name": "p", "arguments": "oops"});
        let prompt: Prompt = serde_json::from_value(raw).unwrap();
        assert!(prompt.arguments.is_none());
    }
}
