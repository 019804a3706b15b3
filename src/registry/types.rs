//! Catalog registry types

use serde::{Deserialize, Serialize};

/// Transport specification for a server entry.
///
/// Opaque to the router; only the transport layer interprets it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransportSpec {
    /// MCP-over-HTTP endpoint
    Http { url: String },
    /// Server-Sent Events endpoint
    Sse { url: String },
    /// Local subprocess speaking MCP over stdio
    Stdio {
        command: String,
        #[serde(default)]
        args: Vec<String>,
    },
}

/// Static catalog record for a tool server.
///
/// Entries are immutable after construction; `handle` is unique within
/// the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerEntry {
    /// Unique opaque identifier (e.g. `org/name` or a local stdio ID)
    pub handle: String,
    /// Human-readable name
    pub display_name: String,
    /// Free-form category tag
    pub category: String,
    /// Prose description; part of the embedding text
    pub description: String,
    /// Short keywords joined into the embedding text
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Transport specification consumed by the transport layer
    pub transport: TransportSpec,
}

impl ServerEntry {
    /// Text embedded for semantic search over this entry
    pub fn embed_text(&self) -> String {
        format!(
            "{}. {} keywords: {}",
            self.display_name,
            self.description,
            self.keywords.join(" ")
        )
    }
}

/// One semantic search result returned to the discovery caller
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveryMatch {
    /// Catalog handle of the matched server
    pub handle: String,
    /// Entry description, surfaced to the agent
    pub description: String,
    /// Cosine similarity against the best-matching query
    pub score: f64,
}
