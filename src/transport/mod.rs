//! Transport layer interface
//!
//! The router opens server bindings through the [`Transport`] trait and
//! never interprets a [`TransportSpec`] itself. An HTTP connector ships
//! in-tree; SSE and stdio connectors are external integrations.

pub mod http;

use crate::agent::AgentTool;
use crate::error::Result;
use crate::registry::TransportSpec;
use async_trait::async_trait;

pub use http::HttpTransport;

/// A live connection to a tool server plus the tools it exposes
#[async_trait]
pub trait ServerBinding: Send + Sync + std::fmt::Debug {
    /// Tool descriptors with invocation closures bound to this connection
    fn tools(&self) -> Vec<AgentTool>;

    /// Release the connection. Called exactly once, after the binding has
    /// been removed from the cache.
    async fn close(&self);
}

/// Opens server bindings from transport specifications
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a binding for `handle`. Failures map to a transport-open error.
    async fn open(&self, handle: &str, spec: &TransportSpec) -> Result<Box<dyn ServerBinding>>;
}
