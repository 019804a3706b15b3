//! Toolgate - Self-improving tool router for LLM agents
//!
//! Given a natural-language user turn, the router decides which tool
//! servers the agent may use, lets the agent expand that set mid-turn via
//! the `discover_tools` meta-tool (semantic search over a registered
//! catalog), and learns across sessions which servers to keep warm, which
//! to quarantine, and which to preload at startup. The core behaves
//! identically from a terminal REPL or a long-running service with many
//! concurrent sessions.

pub mod agent;
pub mod cache;
pub mod config;
pub mod embedding;
pub mod error;
pub mod health;
pub mod history;
pub mod metrics;
pub mod registry;
pub mod routing;
pub mod transport;

pub use config::{NudgeRule, RouterConfig};
pub use error::{Result, RouterError};
pub use routing::SmartRouter;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "toolgate.yaml";
