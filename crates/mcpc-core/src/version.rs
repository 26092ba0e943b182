//! MCP protocol version ordering, parsing, and content/transport gating.
//!
//! Spec §3 defines an ordered list of protocol versions, most preferred
//! first, oldest last: `draft`, `2025-03-26`, `2024-11-05`. The version
//! negotiated during `initialize` gates which content types may appear
//! in a sampling message, whether streaming sampling is permitted,
//! which SSE endpoint shape a transport speaks, and which HTTP status a
//! notification response carries.

use std::fmt;

/// A recognized MCP protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ProtocolVersion {
    /// The in-development protocol revision; treated as newest for gating.
    #[serde(rename = "draft")]
    Draft,
    #[serde(rename = "2025-03-26")]
    V2025_03_26,
    #[serde(rename = "2024-11-05")]
    V2024_11_05,
}

/// All recognized versions, most preferred first (spec §3, §6).
pub const ALL_VERSIONS: [ProtocolVersion; 3] = [
    ProtocolVersion::Draft,
    ProtocolVersion::V2025_03_26,
    ProtocolVersion::V2024_11_05,
];

impl ProtocolVersion {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::V2025_03_26 => "2025-03-26",
            Self::V2024_11_05 => "2024-11-05",
        }
    }

    /// Parse a version string. Any string outside [`ALL_VERSIONS`] is
    /// invalid per spec §6.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        ALL_VERSIONS.iter().copied().find(|v| v.as_str() == s)
    }

    /// Recency rank used for gating comparisons; higher is newer. `Draft`
    /// ranks above the newest dated release so draft-gated features
    /// (none currently) and 2025-03-26+ gates both admit it.
    const fn recency_rank(self) -> u8 {
        match self {
            Self::V2024_11_05 => 0,
            Self::V2025_03_26 => 1,
            Self::Draft => 2,
        }
    }

    /// `true` if this version is at least as recent as `floor`.
    #[must_use]
    pub const fn at_least(self, floor: Self) -> bool {
        self.recency_rank() >= floor.recency_rank()
    }

    /// Text content is permitted in every version.
    #[must_use]
    pub const fn supports_text_content(self) -> bool {
        true
    }

    /// Image content sampling was introduced in 2024-11-05.
    #[must_use]
    pub const fn supports_image_content(self) -> bool {
        self.at_least(Self::V2024_11_05)
    }

    /// Audio content sampling was introduced in 2025-03-26.
    #[must_use]
    pub const fn supports_audio_content(self) -> bool {
        self.at_least(Self::V2025_03_26)
    }

    /// Whether a given content-type string is permitted in this version.
    /// Unknown content types are rejected regardless of version.
    #[must_use]
    pub fn supports_content_type(self, content_type: &str) -> bool {
        match content_type {
            "text" => self.supports_text_content(),
            "image" => self.supports_image_content(),
            "audio" => self.supports_audio_content(),
            _ => false,
        }
    }

    /// Streaming sampling responses are only defined from 2025-03-26.
    #[must_use]
    pub const fn supports_streaming_sampling(self) -> bool {
        self.at_least(Self::V2025_03_26)
    }

    /// `true` if this version speaks the unified single-`/mcp`-endpoint
    /// SSE transport; `false` means the legacy two-endpoint (`/sse` +
    /// discovered POST endpoint) shape.
    #[must_use]
    pub const fn uses_unified_sse_endpoint(self) -> bool {
        self.at_least(Self::V2025_03_26)
    }

    /// HTTP status a server returns for a notification POST (spec §4.3,
    /// open question 4): 200 for the legacy protocol, 202 for 2025-03-26+.
    #[must_use]
    pub const fn notification_http_status(self) -> u16 {
        if self.at_least(Self::V2025_03_26) { 202 } else { 200 }
    }

    /// `true` if the unified SSE transport emits a legacy `endpoint`
    /// discovery event on connect. Only the legacy protocol does.
    #[must_use]
    pub const fn emits_endpoint_event(self) -> bool {
        !self.uses_unified_sse_endpoint()
    }

    /// `true` if this version's unified transport carries an
    /// `Mcp-Session-Id` header.
    #[must_use]
    pub const fn uses_session_id_header(self) -> bool {
        self.at_least(Self::V2025_03_26)
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Choose the version the client proposes in `initialize`: the
/// caller-pinned version if given, otherwise the most preferred entry
/// in [`ALL_VERSIONS`] (spec §4.5 initialization handshake).
#[must_use]
pub fn propose(pinned: Option<ProtocolVersion>) -> ProtocolVersion {
    pinned.unwrap_or(ALL_VERSIONS[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_known_versions() {
        assert_eq!(ProtocolVersion::parse("draft"), Some(ProtocolVersion::Draft));
        assert_eq!(ProtocolVersion::parse("2025-03-26"), Some(ProtocolVersion::V2025_03_26));
        assert_eq!(ProtocolVersion::parse("2024-11-05"), Some(ProtocolVersion::V2024_11_05));
        assert_eq!(ProtocolVersion::parse("bogus"), None);
    }

    #[test]
    fn content_type_gating_matches_spec() {
        let v24 = ProtocolVersion::V2024_11_05;
        let v25 = ProtocolVersion::V2025_03_26;
        assert!(v24.supports_content_type("text"));
        assert!(v24.supports_content_type("image"));
        assert!(!v24.supports_content_type("audio"));
        assert!(v25.supports_content_type("audio"));
        assert!(!v24.supports_content_type("video"));
    }

    #[test]
    fn streaming_gated_to_2025_03_26_and_newer() {
        assert!(!ProtocolVersion::V2024_11_05.supports_streaming_sampling());
        assert!(ProtocolVersion::V2025_03_26.supports_streaming_sampling());
        assert!(ProtocolVersion::Draft.supports_streaming_sampling());
    }

    #[test]
    fn notification_status_matches_version() {
        assert_eq!(ProtocolVersion::V2024_11_05.notification_http_status(), 200);
        assert_eq!(ProtocolVersion::V2025_03_26.notification_http_status(), 202);
        assert_eq!(ProtocolVersion::Draft.notification_http_status(), 202);
    }

    #[test]
    fn sse_endpoint_shape_matches_version() {
        assert!(!ProtocolVersion::V2024_11_05.uses_unified_sse_endpoint());
        assert!(ProtocolVersion::V2024_11_05.emits_endpoint_event());
        assert!(ProtocolVersion::V2025_03_26.uses_unified_sse_endpoint());
        assert!(!ProtocolVersion::V2025_03_26.emits_endpoint_event());
    }

    #[test]
    fn propose_defaults_to_most_preferred() {
        assert_eq!(propose(None), ProtocolVersion::Draft);
        assert_eq!(propose(Some(ProtocolVersion::V2024_11_05)), ProtocolVersion::V2024_11_05);
    }
}
