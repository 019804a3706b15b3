//! Discovery port and the `discover_tools` meta-tool
//!
//! The meta-tool holds a narrow [`DiscoveryPort`] rather than the full
//! router surface: semantic search with cache exclusion and health
//! filtering, opening bindings for the top results, and quarantining
//! handles whose bindings fail to open.

use crate::agent::{AgentTool, ToolInvokeFn};
use crate::cache::ToolCache;
use crate::error::RouterError;
use crate::health::HealthTracker;
use crate::metrics::{Outcome, UsageMetrics};
use crate::registry::{CatalogRegistry, DiscoveryMatch};
use crate::transport::Transport;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Name under which the meta-tool is exposed to the agent
pub const DISCOVER_TOOLS_NAME: &str = "discover_tools";

/// Narrow interface the `discover_tools` meta-tool operates through
#[async_trait]
pub trait DiscoveryPort: Send + Sync {
    /// Search the catalog for the queries, open bindings for the top
    /// results, and return what the agent may now use. Failures are
    /// absorbed: an embedding outage yields an empty list and a failed
    /// binding open drops that handle from the result.
    async fn discover(&self, queries: Vec<String>) -> Vec<DiscoveryMatch>;
}

/// Production discovery port wired to the router's components
pub struct RouterDiscovery {
    registry: Arc<CatalogRegistry>,
    cache: Arc<ToolCache>,
    health: Arc<HealthTracker>,
    metrics: Arc<UsageMetrics>,
    transport: Arc<dyn Transport>,
    /// Max bindings opened per discovery call
    binding_k: usize,
}

impl RouterDiscovery {
    pub fn new(
        registry: Arc<CatalogRegistry>,
        cache: Arc<ToolCache>,
        health: Arc<HealthTracker>,
        metrics: Arc<UsageMetrics>,
        transport: Arc<dyn Transport>,
        binding_k: usize,
    ) -> Self {
        Self {
            registry,
            cache,
            health,
            metrics,
            transport,
            binding_k,
        }
    }
}

#[async_trait]
impl DiscoveryPort for RouterDiscovery {
    async fn discover(&self, queries: Vec<String>) -> Vec<DiscoveryMatch> {
        debug!("discover_tools called with {} quer(ies)", queries.len());

        let excluded: HashSet<String> = self.cache.contents().await.into_iter().collect();
        let health = self.health.clone();
        let healthy = move |handle: &str| health.is_healthy(handle);

        let results = match self.registry.search(&queries, &excluded, &healthy).await {
            Ok(results) => results,
            Err(e) => {
                // Discovery is best-effort mid-turn; the agent just sees
                // an empty result and answers without new tools.
                warn!("Discovery search failed: {}", e);
                return Vec::new();
            }
        };

        info!("Discovery matched {} catalog entr(ies)", results.len());

        let mut returned = Vec::with_capacity(results.len());
        for (rank, matched) in results.into_iter().enumerate() {
            if rank >= self.binding_k {
                returned.push(matched);
                continue;
            }

            let Some(entry) = self.registry.entry(&matched.handle) else {
                continue;
            };

            match self.transport.open(&matched.handle, &entry.transport).await {
                Ok(binding) => {
                    info!(
                        "Discovery opened binding for '{}' (score {:.3})",
                        matched.handle, matched.score
                    );
                    self.cache.insert(matched.handle.clone(), binding).await;
                    returned.push(matched);
                }
                Err(e) => {
                    warn!("Failed to open binding for '{}': {}", matched.handle, e);
                    self.health.mark_fail(&matched.handle);
                    self.metrics.log(&matched.handle, Outcome::Failure);
                }
            }
        }

        returned
    }
}

/// Build the `discover_tools` meta-tool over a discovery port
pub fn discovery_meta_tool(port: Arc<dyn DiscoveryPort>) -> AgentTool {
    let invoke: ToolInvokeFn = Arc::new(move |args: Value| {
        let port = port.clone();
        Box::pin(async move {
            let queries: Vec<String> = args
                .get("queries")
                .and_then(|v| serde_json::from_value(v.clone()).ok())
                .ok_or_else(|| {
                    RouterError::tool_invocation(
                        DISCOVER_TOOLS_NAME.to_string(),
                        "expected a 'queries' array of strings".to_string(),
                    )
                })?;

            let matches = port.discover(queries).await;
            Ok(json!(matches))
        })
    });

    AgentTool {
        name: DISCOVER_TOOLS_NAME.to_string(),
        description: "Search for tool servers that provide the capabilities described in the \
                      queries. Each query should be a short natural-language description of a \
                      capability you need; pass multiple queries when the task needs different \
                      capabilities. Matching servers are connected automatically."
            .to_string(),
        schema: json!({
            "type": "object",
            "properties": {
                "queries": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Short capability descriptions, e.g. [\"stock market data\", \"text translation\"]"
                }
            },
            "required": ["queries"]
        }),
        handle: None,
        invoke,
    }
}
