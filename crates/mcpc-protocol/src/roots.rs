//! Root wire types (spec §3, §4.6). The owning actor and canonicalization
//! logic live in `mcpc-client::roots`; this module is the plain data shape
//! exchanged over JSON-RPC.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A filesystem root exposed to the server. `uri` is always a `file://`
/// URI after canonicalization (spec §3 Root data model invariant).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Root {
    pub uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Root {
    #[must_use]
    pub fn new(uri: impl Into<String>, name: Option<String>) -> Self {
        Self { uri: uri.into(), name }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListRootsRequest {
    #[serde(rename = "_meta", skip_serializing_if = "Option::is_none")]
    pub meta: Option<HashMap<String, serde_json::Value>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListRootsResult {
    pub roots: Vec<Root>,
    #[serde(rename = "_meta", skip_serializing_if = "Option::is_none")]
    pub meta: Option<HashMap<String, serde_json::Value>>,
}

impl ListRootsResult {
    #[must_use]
    pub fn new(roots: Vec<Root>) -> Self {
        Self { roots, meta: None }
    }
}

/// Empty body notification sent whenever the root list mutates (spec
/// §4.6). Carries no payload of its own; the receiver re-fetches via
/// `roots/list`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RootsListChangedNotification {}
