//! End-to-end router scenarios with scripted collaborators
//!
//! The embedding provider, transport, and agent executor are test doubles
//! so every turn is deterministic: the executor follows a per-turn script
//! (answer, discover-then-answer, fail, hang) against the real router.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tempfile::TempDir;

use toolgate::agent::{AgentExecutor, AgentOutcome, AgentRequest, AgentTool};
use toolgate::embedding::EmbeddingProvider;
use toolgate::error::{Result, RouterError};
use toolgate::history::Message;
use toolgate::registry::{ServerEntry, TransportSpec};
use toolgate::routing::DISCOVER_TOOLS_NAME;
use toolgate::transport::{ServerBinding, Transport};
use toolgate::{NudgeRule, RouterConfig, SmartRouter};

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------

/// Embeds along three fixed axes (finance, news, weather) so similarity
/// scores are exact
struct KeywordEmbeddings;

#[async_trait]
impl EmbeddingProvider for KeywordEmbeddings {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let text = text.to_lowercase();
                let mut vector = vec![0.0f32; 3];
                if text.contains("stock") || text.contains("ticker") {
                    vector[0] = 1.0;
                }
                if text.contains("news") || text.contains("headline") {
                    vector[1] = 1.0;
                }
                if text.contains("weather") || text.contains("forecast") {
                    vector[2] = 1.0;
                }
                vector
            })
            .collect())
    }
}

/// Provider that always rejects the batch
struct FailingEmbeddings;

#[async_trait]
impl EmbeddingProvider for FailingEmbeddings {
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(RouterError::embedding("provider rejected the batch"))
    }
}

/// Transport double with per-handle scripted failures and close counting
#[derive(Default)]
struct MockTransport {
    /// Remaining failures per handle; open fails while the count is > 0
    fail_remaining: StdMutex<HashMap<String, usize>>,
    opens: StdMutex<HashMap<String, usize>>,
    closes: Arc<StdMutex<HashMap<String, usize>>>,
}

impl MockTransport {
    fn fail_times(&self, handle: &str, times: usize) {
        self.fail_remaining
            .lock()
            .unwrap()
            .insert(handle.to_string(), times);
    }

    fn open_count(&self, handle: &str) -> usize {
        *self.opens.lock().unwrap().get(handle).unwrap_or(&0)
    }

    fn close_count(&self, handle: &str) -> usize {
        *self.closes.lock().unwrap().get(handle).unwrap_or(&0)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn open(&self, handle: &str, _spec: &TransportSpec) -> Result<Box<dyn ServerBinding>> {
        *self
            .opens
            .lock()
            .unwrap()
            .entry(handle.to_string())
            .or_insert(0) += 1;

        {
            let mut failures = self.fail_remaining.lock().unwrap();
            if let Some(remaining) = failures.get_mut(handle) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(RouterError::transport_open(
                        handle.to_string(),
                        "connection refused".to_string(),
                    ));
                }
            }
        }

        Ok(Box::new(MockBinding {
            handle: handle.to_string(),
            closes: self.closes.clone(),
        }))
    }
}

#[derive(Debug)]
struct MockBinding {
    handle: String,
    closes: Arc<StdMutex<HashMap<String, usize>>>,
}

#[async_trait]
impl ServerBinding for MockBinding {
    fn tools(&self) -> Vec<AgentTool> {
        let name = format!("{}_tool", self.handle.replace(['/', '-'], "_"));
        vec![AgentTool {
            name,
            description: format!("tool exposed by {}", self.handle),
            schema: json!({"type": "object"}),
            handle: Some(self.handle.clone()),
            invoke: Arc::new(|_args: Value| Box::pin(async { Ok(json!("ok")) })),
        }]
    }

    async fn close(&self) {
        *self
            .closes
            .lock()
            .unwrap()
            .entry(self.handle.clone())
            .or_insert(0) += 1;
    }
}

/// One scripted executor behavior per turn
enum Step {
    /// Return a final text, reporting the given touched handles
    Answer {
        text: String,
        touched: Option<Vec<String>>,
    },
    /// Call discover_tools with the queries, touch whatever connects,
    /// then answer
    Discover { queries: Vec<String>, text: String },
    /// Call discover_tools, then raise
    DiscoverThenFail { queries: Vec<String>, message: String },
    /// Raise without touching anything
    Fail { message: String, recoverable: bool },
    /// Never return (exercises the deadline path)
    Hang,
}

#[derive(Default)]
struct ScriptedExecutor {
    steps: StdMutex<VecDeque<Step>>,
    last_messages: StdMutex<Vec<Message>>,
    last_tool_names: StdMutex<Vec<String>>,
}

impl ScriptedExecutor {
    fn with_steps(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            steps: StdMutex::new(steps.into()),
            ..Default::default()
        })
    }

    fn push(&self, step: Step) {
        self.steps.lock().unwrap().push_back(step);
    }

    fn last_messages(&self) -> Vec<Message> {
        self.last_messages.lock().unwrap().clone()
    }

    fn last_tool_names(&self) -> Vec<String> {
        self.last_tool_names.lock().unwrap().clone()
    }
}

async fn invoke_discover(request: &AgentRequest, queries: &[String]) -> Result<Vec<String>> {
    let tool = request
        .tools
        .iter()
        .find(|t| t.name == DISCOVER_TOOLS_NAME)
        .expect("discover_tools must always be exposed");
    let result = (tool.invoke)(json!({ "queries": queries })).await?;
    Ok(result
        .as_array()
        .map(|matches| {
            matches
                .iter()
                .filter_map(|m| m["handle"].as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default())
}

#[async_trait]
impl AgentExecutor for ScriptedExecutor {
    async fn run(&self, request: AgentRequest) -> Result<AgentOutcome> {
        *self.last_messages.lock().unwrap() = request.messages.clone();
        *self.last_tool_names.lock().unwrap() =
            request.tools.iter().map(|t| t.name.clone()).collect();

        let step = { self.steps.lock().unwrap().pop_front() };
        match step.unwrap_or(Step::Answer {
            text: "ok".to_string(),
            touched: Some(vec![]),
        }) {
            Step::Answer { text, touched } => Ok(AgentOutcome {
                final_text: text,
                touched_handles: touched,
            }),
            Step::Discover { queries, text } => {
                let connected = invoke_discover(&request, &queries).await?;
                Ok(AgentOutcome {
                    final_text: text,
                    touched_handles: Some(connected),
                })
            }
            Step::DiscoverThenFail { queries, message } => {
                let _ = invoke_discover(&request, &queries).await?;
                Err(RouterError::agent(message, true))
            }
            Step::Fail {
                message,
                recoverable,
            } => Err(RouterError::agent(message, recoverable)),
            Step::Hang => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(AgentOutcome {
                    final_text: "too late".to_string(),
                    touched_handles: None,
                })
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn entry(handle: &str, name: &str, desc: &str, category: &str, keywords: &[&str]) -> ServerEntry {
    ServerEntry {
        handle: handle.to_string(),
        display_name: name.to_string(),
        category: category.to_string(),
        description: desc.to_string(),
        keywords: keywords.iter().map(|k| k.to_string()).collect(),
        transport: TransportSpec::Http {
            url: format!("https://mcp.example.com/{}", handle),
        },
    }
}

fn catalog() -> Vec<ServerEntry> {
    vec![
        entry(
            "fin-quotes",
            "Finance Quotes",
            "Real-time stock quotes and ticker data",
            "finance",
            &["stock", "ticker"],
        ),
        entry(
            "news-wire",
            "News Wire",
            "Breaking news headlines",
            "news",
            &["news"],
        ),
        entry(
            "weather-api",
            "Weather API",
            "Current weather and forecast data",
            "weather",
            &["weather", "forecast"],
        ),
    ]
}

fn base_config(dir: &TempDir, catalog: Vec<ServerEntry>) -> RouterConfig {
    RouterConfig {
        data_dir: dir.path().to_path_buf(),
        catalog,
        max_cache_size: 2,
        preload_count: 0,
        ..Default::default()
    }
}

fn build_router(
    config: RouterConfig,
    transport: Arc<MockTransport>,
    executor: Arc<ScriptedExecutor>,
) -> SmartRouter {
    SmartRouter::new(config, Arc::new(KeywordEmbeddings), transport, executor).unwrap()
}

fn queries(items: &[&str]) -> Vec<String> {
    items.iter().map(|q| q.to_string()).collect()
}

fn metrics_lines(dir: &TempDir) -> Vec<String> {
    let path = dir.path().join("usage_metrics.jsonl");
    if !path.exists() {
        return Vec::new();
    }
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(String::from)
        .collect()
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_cold_start_single_discovery() {
    let dir = TempDir::new().unwrap();
    let transport = Arc::new(MockTransport::default());
    let executor = ScriptedExecutor::with_steps(vec![Step::Discover {
        queries: queries(&["stock price", "ticker"]),
        text: "MSFT is trading at $403.12".to_string(),
    }]);

    let router = build_router(
        base_config(&dir, catalog()),
        transport.clone(),
        executor.clone(),
    );
    router.initialize().await.unwrap();

    let reply = router
        .handle_turn("s1", "What is MSFT trading at?")
        .await
        .unwrap();
    assert!(reply.contains("MSFT"));

    assert_eq!(router.cache_contents().await, vec!["fin-quotes".to_string()]);
    assert_eq!(router.success_count("fin-quotes"), 1);
    // Healthy: no record survives a successful turn.
    assert!(router.health_snapshot().is_empty());

    let lines = metrics_lines(&dir);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("fin-quotes"));
    assert!(lines[0].contains("success"));
}

#[tokio::test]
async fn test_warm_reuse_skips_discovery() {
    let dir = TempDir::new().unwrap();
    let transport = Arc::new(MockTransport::default());
    let executor = ScriptedExecutor::with_steps(vec![
        Step::Discover {
            queries: queries(&["stock price"]),
            text: "MSFT is at $403".to_string(),
        },
        Step::Answer {
            text: "AAPL is at $212".to_string(),
            touched: Some(vec!["fin-quotes".to_string()]),
        },
    ]);

    let router = build_router(
        base_config(&dir, catalog()),
        transport.clone(),
        executor.clone(),
    );
    router.initialize().await.unwrap();

    router
        .handle_turn("s1", "What is MSFT trading at?")
        .await
        .unwrap();
    router.handle_turn("s1", "What about AAPL?").await.unwrap();

    // Same single cached server, one binding open, two success events.
    assert_eq!(router.cache_contents().await, vec!["fin-quotes".to_string()]);
    assert_eq!(transport.open_count("fin-quotes"), 1);
    assert_eq!(router.success_count("fin-quotes"), 2);
}

#[tokio::test]
async fn test_discovery_open_failure_quarantines_handle() {
    let dir = TempDir::new().unwrap();
    let transport = Arc::new(MockTransport::default());
    transport.fail_times("weather-api", usize::MAX >> 1);
    let executor = ScriptedExecutor::with_steps(vec![Step::DiscoverThenFail {
        queries: queries(&["weather forecast"]),
        message: "no tool could answer".to_string(),
    }]);

    let router = build_router(
        base_config(&dir, catalog()),
        transport.clone(),
        executor.clone(),
    );
    router.initialize().await.unwrap();

    let err = router
        .handle_turn("s1", "Will it rain in Oslo tomorrow?")
        .await
        .unwrap_err();
    assert!(err.is_recoverable());

    assert!(router.cache_contents().await.is_empty());
    let snapshot = router.health_snapshot();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].handle, "weather-api");
    assert!(snapshot[0].cooldown_remaining > Duration::ZERO);

    let lines = metrics_lines(&dir);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("weather-api"));
    assert!(lines[0].contains("failure"));

    // History rewound: the next turn starts from a clean slate.
    router.handle_turn("s1", "hello").await.unwrap();
    let messages = executor.last_messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].content, "hello");
}

#[tokio::test]
async fn test_cross_session_learning_drives_preload() {
    let dir = TempDir::new().unwrap();

    {
        let transport = Arc::new(MockTransport::default());
        let executor = ScriptedExecutor::with_steps(vec![]);
        for i in 0..13 {
            let handle = if i < 10 { "fin-quotes" } else { "news-wire" };
            executor.push(Step::Answer {
                text: "done".to_string(),
                touched: Some(vec![handle.to_string()]),
            });
        }

        let router = build_router(
            base_config(&dir, catalog()),
            transport.clone(),
            executor.clone(),
        );
        router.initialize().await.unwrap();

        for i in 0..13 {
            let session = if i % 2 == 0 { "alice" } else { "bob" };
            router.handle_turn(session, "another question").await.unwrap();
        }
        router.shutdown().await;
    }

    // Restart: the most-used handle is preloaded.
    let transport = Arc::new(MockTransport::default());
    let executor = ScriptedExecutor::with_steps(vec![]);
    let mut config = base_config(&dir, catalog());
    config.preload_count = 1;

    let router = build_router(config, transport.clone(), executor);
    router.initialize().await.unwrap();

    assert_eq!(router.cache_contents().await, vec!["fin-quotes".to_string()]);
    assert_eq!(transport.open_count("fin-quotes"), 1);
    assert_eq!(transport.open_count("news-wire"), 0);
}

#[tokio::test]
async fn test_lru_eviction_closes_connection_once() {
    let dir = TempDir::new().unwrap();
    let transport = Arc::new(MockTransport::default());
    let executor = ScriptedExecutor::with_steps(vec![
        Step::Discover {
            queries: queries(&["stock price"]),
            text: "fin ready".to_string(),
        },
        Step::Discover {
            queries: queries(&["news headlines"]),
            text: "news ready".to_string(),
        },
        Step::Answer {
            text: "fin again".to_string(),
            touched: Some(vec!["fin-quotes".to_string()]),
        },
        Step::Discover {
            queries: queries(&["weather forecast"]),
            text: "weather ready".to_string(),
        },
    ]);

    let router = build_router(
        base_config(&dir, catalog()),
        transport.clone(),
        executor.clone(),
    );
    router.initialize().await.unwrap();

    router.handle_turn("s1", "price of MSFT?").await.unwrap();
    router.handle_turn("s1", "any headlines?").await.unwrap();
    router.handle_turn("s1", "MSFT again?").await.unwrap();
    // Cache is [fin-quotes, news-wire] (MRU first); discovering a third
    // server evicts news-wire.
    router.handle_turn("s1", "rain tomorrow?").await.unwrap();

    assert_eq!(
        router.cache_contents().await,
        vec!["weather-api".to_string(), "fin-quotes".to_string()]
    );
    assert_eq!(transport.close_count("news-wire"), 1);
    assert_eq!(transport.close_count("fin-quotes"), 0);
}

#[tokio::test]
async fn test_cooldown_expiry_allows_rediscovery() {
    let dir = TempDir::new().unwrap();
    let transport = Arc::new(MockTransport::default());
    transport.fail_times("weather-api", 1);
    let executor = ScriptedExecutor::with_steps(vec![
        Step::DiscoverThenFail {
            queries: queries(&["weather forecast"]),
            message: "server never came up".to_string(),
        },
        Step::Discover {
            queries: queries(&["weather forecast"]),
            text: "still nothing".to_string(),
        },
        Step::Discover {
            queries: queries(&["weather forecast"]),
            text: "sunny, 22 degrees".to_string(),
        },
    ]);

    let mut config = base_config(&dir, catalog());
    config.health_cooldown_seconds = 1;

    let router = build_router(config, transport.clone(), executor.clone());
    router.initialize().await.unwrap();

    router.handle_turn("s1", "weather in Oslo?").await.unwrap_err();
    assert!(!router.health_snapshot().is_empty());

    // Inside the cooldown the handle is hidden from discovery.
    router.handle_turn("s1", "weather in Oslo?").await.unwrap();
    assert!(router.cache_contents().await.is_empty());

    tokio::time::sleep(Duration::from_millis(1100)).await;

    // Cooldown elapsed: discovery returns the handle and the open succeeds.
    let reply = router.handle_turn("s1", "weather in Oslo?").await.unwrap();
    assert!(reply.contains("sunny"));
    assert_eq!(
        router.cache_contents().await,
        vec!["weather-api".to_string()]
    );
}

#[tokio::test]
async fn test_failed_turn_evicts_only_newly_discovered() {
    let dir = TempDir::new().unwrap();
    let transport = Arc::new(MockTransport::default());
    let executor = ScriptedExecutor::with_steps(vec![
        Step::Discover {
            queries: queries(&["stock price"]),
            text: "fin ready".to_string(),
        },
        Step::DiscoverThenFail {
            queries: queries(&["news headlines"]),
            message: "agent exploded mid-turn".to_string(),
        },
    ]);

    let router = build_router(
        base_config(&dir, catalog()),
        transport.clone(),
        executor.clone(),
    );
    router.initialize().await.unwrap();

    router.handle_turn("s1", "price of MSFT?").await.unwrap();
    let err = router.handle_turn("s1", "headlines?").await.unwrap_err();
    assert!(err.is_recoverable());

    // Only the handle this turn introduced is evicted and quarantined.
    assert_eq!(router.cache_contents().await, vec!["fin-quotes".to_string()]);
    let snapshot = router.health_snapshot();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].handle, "news-wire");
    assert_eq!(transport.close_count("news-wire"), 1);
    assert_eq!(transport.close_count("fin-quotes"), 0);
}

#[tokio::test]
async fn test_failed_turn_preserves_earlier_history() {
    let dir = TempDir::new().unwrap();
    let transport = Arc::new(MockTransport::default());
    let executor = ScriptedExecutor::with_steps(vec![
        Step::Answer {
            text: "first answer".to_string(),
            touched: Some(vec![]),
        },
        Step::Fail {
            message: "model rate limited".to_string(),
            recoverable: true,
        },
        Step::Answer {
            text: "third answer".to_string(),
            touched: Some(vec![]),
        },
    ]);

    let router = build_router(
        base_config(&dir, catalog()),
        transport.clone(),
        executor.clone(),
    );
    router.initialize().await.unwrap();

    router.handle_turn("s1", "first question").await.unwrap();
    router.handle_turn("s1", "doomed question").await.unwrap_err();
    router.handle_turn("s1", "third question").await.unwrap();

    let contents: Vec<String> = executor
        .last_messages()
        .into_iter()
        .map(|m| m.content)
        .collect();
    assert_eq!(
        contents,
        vec![
            "first question".to_string(),
            "first answer".to_string(),
            "third question".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_deadline_expiry_is_recoverable_failure() {
    let dir = TempDir::new().unwrap();
    let transport = Arc::new(MockTransport::default());
    let executor = ScriptedExecutor::with_steps(vec![Step::Hang]);

    let router = build_router(
        base_config(&dir, catalog()),
        transport.clone(),
        executor.clone(),
    );
    router.initialize().await.unwrap();

    let err = router
        .handle_turn_with_deadline("s1", "slow question", Some(Duration::from_millis(50)))
        .await
        .unwrap_err();
    assert!(err.is_recoverable());

    // The turn never happened as far as history is concerned.
    router.handle_turn("s1", "fast question").await.unwrap();
    let messages = executor.last_messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].content, "fast question");
}

#[tokio::test]
async fn test_keyword_nudge_connects_tools_before_agent() {
    let dir = TempDir::new().unwrap();
    let transport = Arc::new(MockTransport::default());
    let executor = ScriptedExecutor::with_steps(vec![
        Step::Answer {
            text: "answered with nudged tools".to_string(),
            touched: Some(vec![]),
        },
        Step::Answer {
            text: "still there".to_string(),
            touched: Some(vec![]),
        },
    ]);

    let mut config = base_config(&dir, catalog());
    config.keyword_nudge.insert(
        "finance".to_string(),
        NudgeRule {
            keywords: vec!["stock".to_string()],
            queries: queries(&["stock ticker data"]),
        },
    );

    let router = build_router(config, transport.clone(), executor.clone());
    router.initialize().await.unwrap();

    router
        .handle_turn("s1", "what's the stock doing?")
        .await
        .unwrap();

    // The binding was opened before the agent ran and its tool exposed.
    assert_eq!(router.cache_contents().await, vec!["fin-quotes".to_string()]);
    assert!(executor
        .last_tool_names()
        .contains(&"fin_quotes_tool".to_string()));

    // The category is now covered; the nudge does not re-open.
    router
        .handle_turn("s1", "stock once more?")
        .await
        .unwrap();
    assert_eq!(transport.open_count("fin-quotes"), 1);
}

#[tokio::test]
async fn test_zero_catalog_turn_still_succeeds() {
    let dir = TempDir::new().unwrap();
    let transport = Arc::new(MockTransport::default());
    let executor = ScriptedExecutor::with_steps(vec![Step::Discover {
        queries: queries(&["anything at all"]),
        text: "answered without tools".to_string(),
    }]);

    let router = build_router(base_config(&dir, vec![]), transport, executor.clone());
    router.initialize().await.unwrap();

    let reply = router.handle_turn("s1", "help me").await.unwrap();
    assert_eq!(reply, "answered without tools");
    assert!(router.cache_contents().await.is_empty());
}

#[tokio::test]
async fn test_unicode_and_long_messages_pass_through() {
    let dir = TempDir::new().unwrap();
    let transport = Arc::new(MockTransport::default());
    let executor = ScriptedExecutor::with_steps(vec![Step::Answer {
        text: "received".to_string(),
        touched: Some(vec![]),
    }]);

    let router = build_router(base_config(&dir, catalog()), transport, executor.clone());
    router.initialize().await.unwrap();

    let long_text = format!("héllo wörld 你好 🌍 {}", "x".repeat(5000));
    router.handle_turn("s1", &long_text).await.unwrap();

    let messages = executor.last_messages();
    assert_eq!(messages[0].content, long_text);
}

#[tokio::test]
async fn test_executor_without_touch_report_falls_back_to_cache() {
    let dir = TempDir::new().unwrap();
    let transport = Arc::new(MockTransport::default());
    let executor = ScriptedExecutor::with_steps(vec![
        Step::Discover {
            queries: queries(&["stock price"]),
            text: "fin ready".to_string(),
        },
        Step::Answer {
            text: "used something, cannot say what".to_string(),
            touched: None,
        },
    ]);

    let router = build_router(base_config(&dir, catalog()), transport, executor.clone());
    router.initialize().await.unwrap();

    router.handle_turn("s1", "price of MSFT?").await.unwrap();
    router.handle_turn("s1", "and again?").await.unwrap();

    // All cached handles are credited when the executor cannot report.
    assert_eq!(router.success_count("fin-quotes"), 2);
}

#[tokio::test]
async fn test_embedding_failure_at_startup_is_fatal() {
    let dir = TempDir::new().unwrap();
    let transport = Arc::new(MockTransport::default());
    let executor = ScriptedExecutor::with_steps(vec![]);

    let router = SmartRouter::new(
        base_config(&dir, catalog()),
        Arc::new(FailingEmbeddings),
        transport,
        executor,
    )
    .unwrap();

    assert!(router.initialize().await.is_err());
}

#[tokio::test]
async fn test_initialize_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let transport = Arc::new(MockTransport::default());
    let executor = ScriptedExecutor::with_steps(vec![]);

    let mut config = base_config(&dir, catalog());
    config.preload_count = 0;

    let router = build_router(config, transport.clone(), executor);
    router.initialize().await.unwrap();
    router.initialize().await.unwrap();
}

#[tokio::test]
async fn test_preload_stops_at_what_it_can_open() {
    let dir = TempDir::new().unwrap();

    {
        let transport = Arc::new(MockTransport::default());
        let executor = ScriptedExecutor::with_steps(vec![
            Step::Answer {
                text: "a".to_string(),
                touched: Some(vec!["fin-quotes".to_string()]),
            },
            Step::Answer {
                text: "b".to_string(),
                touched: Some(vec!["news-wire".to_string()]),
            },
        ]);
        let router = build_router(base_config(&dir, catalog()), transport, executor);
        router.initialize().await.unwrap();
        router.handle_turn("s1", "one").await.unwrap();
        router.handle_turn("s1", "two").await.unwrap();
        router.shutdown().await;
    }

    // preload_count exceeds what usage history can supply; the cache just
    // ends up smaller, and a failing handle keeps a clean health record.
    let transport = Arc::new(MockTransport::default());
    transport.fail_times("news-wire", usize::MAX >> 1);
    let mut config = base_config(&dir, catalog());
    config.max_cache_size = 8;
    config.preload_count = 5;

    let router = build_router(config, transport.clone(), ScriptedExecutor::with_steps(vec![]));
    router.initialize().await.unwrap();

    assert_eq!(router.cache_contents().await, vec!["fin-quotes".to_string()]);
    assert!(router.health_snapshot().is_empty());
}
