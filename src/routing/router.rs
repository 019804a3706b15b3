//! Smart router: the turn orchestrator
//!
//! Owns the tool cache, health tracker, usage metrics, per-session
//! histories, and a reference to the catalog registry and agent executor.
//! Executes a single user turn end to end: toolset assembly, the optional
//! keyword nudge, the agent run, and post-run bookkeeping.
//!
//! The resilience property that matters most lives in the failure path:
//! a failed turn evicts and quarantines only the servers that turn itself
//! introduced through discovery, and rolls history back so the turn never
//! happened. Previously known-good servers are left untouched.

use crate::agent::{AgentExecutor, AgentRequest};
use crate::cache::ToolCache;
use crate::config::RouterConfig;
use crate::embedding::EmbeddingProvider;
use crate::error::{Result, RouterError};
use crate::health::{HealthSnapshot, HealthTracker};
use crate::history::{ConversationHistory, Role};
use crate::metrics::{Outcome, UsageMetrics};
use crate::registry::{CatalogRegistry, SearchParams};
use crate::routing::discovery::{discovery_meta_tool, DiscoveryPort, RouterDiscovery};
use crate::routing::nudge;
use crate::transport::Transport;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const AGENT_INSTRUCTIONS: &str = "\
You are a helpful assistant with access to external tool servers.

{status}

When a request needs a capability you do not have, call discover_tools \
with two or three short natural-language queries describing the \
capability before telling the user you cannot help. After discovering, \
use the newly available tools to answer. Answer directly from your own \
knowledge only for general facts and reasoning that need no real-time \
data.";

/// Provider-agnostic agent router with LRU tool caching
pub struct SmartRouter {
    config: RouterConfig,
    registry: Arc<CatalogRegistry>,
    cache: Arc<ToolCache>,
    health: Arc<HealthTracker>,
    metrics: Arc<UsageMetrics>,
    transport: Arc<dyn Transport>,
    executor: Arc<dyn AgentExecutor>,
    discovery: Arc<RouterDiscovery>,
    sessions: Mutex<HashMap<String, Arc<Mutex<ConversationHistory>>>>,
    initialized: Mutex<bool>,
}

impl SmartRouter {
    /// Construct a router over the given collaborators. Validates the
    /// configuration; no I/O happens until `initialize`.
    pub fn new(
        config: RouterConfig,
        provider: Arc<dyn EmbeddingProvider>,
        transport: Arc<dyn Transport>,
        executor: Arc<dyn AgentExecutor>,
    ) -> Result<Self> {
        config.validate()?;

        let registry = Arc::new(CatalogRegistry::new(
            config.catalog.clone(),
            provider,
            SearchParams {
                similarity_threshold: config.similarity_threshold,
                relative_score_cutoff: config.relative_score_cutoff,
                top_k: config.search_top_k,
            },
        )?);
        let cache = Arc::new(ToolCache::new(config.max_cache_size));
        let health = Arc::new(HealthTracker::new(Duration::from_secs(
            config.health_cooldown_seconds,
        )));
        let metrics = Arc::new(UsageMetrics::new(config.metrics_file()));
        let discovery = Arc::new(RouterDiscovery::new(
            registry.clone(),
            cache.clone(),
            health.clone(),
            metrics.clone(),
            transport.clone(),
            config.discover_binding_k,
        ));

        Ok(Self {
            config,
            registry,
            cache,
            health,
            metrics,
            transport,
            executor,
            discovery,
            sessions: Mutex::new(HashMap::new()),
            initialized: Mutex::new(false),
        })
    }

    /// Startup: embed the catalog, load usage metrics, preload the
    /// top-ranked bindings. A second call after a successful first one is
    /// a no-op.
    pub async fn initialize(&self) -> Result<()> {
        let mut initialized = self.initialized.lock().await;
        if *initialized {
            return Ok(());
        }

        // An embedding failure here is fatal: discovery would be
        // meaningless without catalog vectors.
        let embedded = self.registry.initialize().await?;
        info!("Registry ready with {} embedded entr(ies)", embedded);

        if let Err(e) = self.metrics.load() {
            warn!("Failed to load usage metrics: {}", e);
        }

        self.preload().await;

        *initialized = true;
        Ok(())
    }

    /// Release all cached bindings and close persistent files
    pub async fn shutdown(&self) {
        self.cache.release_all().await;
        self.metrics.close();
        info!("Router shut down");
    }

    /// Process a single user turn for a session
    pub async fn handle_turn(&self, session_id: &str, user_text: &str) -> Result<String> {
        self.handle_turn_with_deadline(session_id, user_text, None)
            .await
    }

    /// Process a single user turn with an optional deadline. Expiry is
    /// treated exactly like an agent failure: history rewinds, newly
    /// discovered servers are evicted and quarantined, and a recoverable
    /// error is surfaced.
    pub async fn handle_turn_with_deadline(
        &self,
        session_id: &str,
        user_text: &str,
        deadline: Option<Duration>,
    ) -> Result<String> {
        let session = self.session(session_id).await;
        // Holding the session lock for the whole turn serializes turns
        // within a session; other sessions proceed concurrently.
        let mut history = session.lock().await;

        let pre = history.checkpoint();
        history.append(Role::User, user_text);

        self.run_nudge(user_text).await;

        // Snapshot after the nudge: like preloads, nudge-opened servers
        // proved they can connect and are not evicted if this turn fails.
        let pre_handles: HashSet<String> = self.cache.contents().await.into_iter().collect();

        let mut tools = self.cache.all_tools().await;
        let port: Arc<dyn DiscoveryPort> = self.discovery.clone();
        tools.push(discovery_meta_tool(port));

        let instructions = self.build_instructions().await;
        debug!(
            "Running turn for session '{}' with {} tool(s), max_steps={}",
            session_id,
            tools.len(),
            self.config.max_steps
        );

        let run = self.executor.run(AgentRequest {
            messages: history.messages(),
            instructions,
            tools,
            max_steps: self.config.max_steps,
        });

        let outcome = match deadline {
            Some(limit) => match tokio::time::timeout(limit, run).await {
                Ok(result) => result,
                Err(_) => Err(RouterError::agent(
                    format!("turn deadline of {:?} expired", limit),
                    true,
                )),
            },
            None => run.await,
        };

        match outcome {
            Ok(outcome) => {
                history.append(Role::Assistant, outcome.final_text.clone());
                history.trim();

                let touched = match outcome.touched_handles {
                    Some(handles) => handles,
                    // The executor cannot report which tools it called;
                    // fall back to all cached handles and accept the
                    // precision loss.
                    None => self.cache.contents().await,
                };

                for handle in &touched {
                    self.cache.touch(handle).await;
                    self.health.mark_ok(handle);
                    self.metrics.log(handle, Outcome::Success);
                }

                debug!(
                    "Turn succeeded for session '{}', {} handle(s) touched",
                    session_id,
                    touched.len()
                );
                Ok(outcome.final_text)
            }
            Err(e) => {
                history.rollback(pre);

                let new_handles: Vec<String> = self
                    .cache
                    .contents()
                    .await
                    .into_iter()
                    .filter(|h| !pre_handles.contains(h))
                    .collect();

                for handle in &new_handles {
                    warn!("Quarantining '{}' introduced by the failed turn", handle);
                    self.cache.evict(handle).await;
                    self.health.mark_fail(handle);
                    self.metrics.log(handle, Outcome::Failure);
                }

                Err(wrap_agent_error(e))
            }
        }
    }

    /// Cached handles, MRU first, for UI panels and tests
    pub async fn cache_contents(&self) -> Vec<String> {
        self.cache.contents().await
    }

    /// Read-only health view for observability taps
    pub fn health_snapshot(&self) -> Vec<HealthSnapshot> {
        self.health.snapshot()
    }

    /// Lifetime success count a handle has accumulated
    pub fn success_count(&self, handle: &str) -> u64 {
        self.metrics.success_count(handle)
    }

    async fn session(&self, session_id: &str) -> Arc<Mutex<ConversationHistory>> {
        let mut sessions = self.sessions.lock().await;
        sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                Arc::new(Mutex::new(ConversationHistory::new(
                    self.config.max_history_turns,
                )))
            })
            .clone()
    }

    /// Open bindings for the top-ranked handles from usage history.
    /// Best-effort: a failed open is logged, the handle keeps its clean
    /// health record, and preloading moves on.
    async fn preload(&self) {
        if self.config.preload_count == 0 {
            return;
        }

        let ranked = self
            .metrics
            .rank_top(self.registry.len(), &self.registry.handles());
        let mut opened = 0usize;

        for handle in ranked {
            if opened >= self.config.preload_count {
                break;
            }
            let Some(entry) = self.registry.entry(&handle) else {
                continue;
            };
            match self.transport.open(&handle, &entry.transport).await {
                Ok(binding) => {
                    self.cache.insert(handle.clone(), binding).await;
                    opened += 1;
                    info!("Preloaded '{}' from usage history", handle);
                }
                Err(e) => {
                    warn!("Preload of '{}' failed: {}", handle, e);
                }
            }
        }

        if opened > 0 {
            info!("Preloaded {} binding(s) from usage history", opened);
        }
    }

    /// Synthesize discovery calls for categories the user text mentions
    /// but the cache does not cover yet. Runs before the agent so weaker
    /// models start the turn with the right tools already connected.
    async fn run_nudge(&self, user_text: &str) {
        if self.config.keyword_nudge.is_empty() {
            return;
        }

        let cached_categories: HashSet<String> = self
            .cache
            .contents()
            .await
            .iter()
            .filter_map(|h| self.registry.entry(h))
            .map(|e| e.category.clone())
            .collect();

        for category in nudge::matched_categories(user_text, &self.config.keyword_nudge) {
            if cached_categories.contains(category) {
                continue;
            }
            let rule = &self.config.keyword_nudge[category];
            info!("Keyword nudge triggered for category '{}'", category);
            let matches = self.discovery.discover(rule.queries.clone()).await;
            debug!(
                "Nudge discovery for '{}' returned {} match(es)",
                category,
                matches.len()
            );
        }
    }

    /// Generate agent instructions reflecting current cache state
    async fn build_instructions(&self) -> String {
        let cached = self.cache.contents().await;
        let status = if cached.is_empty() {
            "You have no tool servers connected yet.".to_string()
        } else {
            let mut lines = vec!["Connected tool servers:".to_string()];
            for handle in &cached {
                if let Some(entry) = self.registry.entry(handle) {
                    let keywords = if entry.keywords.is_empty() {
                        String::new()
                    } else {
                        format!(" (covers: {})", entry.keywords.join(", "))
                    };
                    lines.push(format!(
                        "  - {}: {}{}",
                        entry.display_name, entry.description, keywords
                    ));
                } else {
                    lines.push(format!("  - {}", handle));
                }
            }
            lines.push(String::new());
            lines.push(
                "These servers only handle their listed capabilities. For anything else, \
                 call discover_tools."
                    .to_string(),
            );
            lines.join("\n")
        };

        AGENT_INSTRUCTIONS.replace("{status}", &status)
    }
}

/// Wrap any turn-level error into the stable agent-executor kind while
/// preserving recoverability
fn wrap_agent_error(error: RouterError) -> RouterError {
    match error {
        e @ RouterError::Agent { .. } => e,
        other => {
            let recoverable = other.is_recoverable();
            RouterError::agent(other.to_string(), recoverable)
        }
    }
}
