//! Configuration management for the tool router

use crate::error::{Result, RouterError};
use crate::registry::ServerEntry;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

// Default functions for serde
fn default_execution_model() -> String {
    "gpt-4.1-mini".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_similarity_threshold() -> f64 {
    0.35
}

fn default_relative_score_cutoff() -> f64 {
    0.7
}

fn default_discover_binding_k() -> usize {
    1
}

fn default_max_cache_size() -> usize {
    10
}

fn default_preload_count() -> usize {
    5
}

fn default_max_history_turns() -> usize {
    20
}

fn default_max_steps() -> u32 {
    20
}

fn default_health_cooldown_seconds() -> u64 {
    300
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

/// Keyword-nudge rule for one category: when any keyword matches the user
/// text and no cached server belongs to the category, the listed discovery
/// queries are run before the agent starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NudgeRule {
    /// Case-insensitive substrings matched against the user text
    pub keywords: Vec<String>,
    /// Discovery queries synthesized on the agent's behalf
    pub queries: Vec<String>,
}

/// All tunables for the smart router
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Opaque model identifier passed to the agent executor
    #[serde(default = "default_execution_model")]
    pub execution_model: String,

    /// Opaque model identifier passed to the embedding provider
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Absolute cosine-similarity floor for discovery results
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,

    /// Fraction of the top score below which survivors are discarded
    #[serde(default = "default_relative_score_cutoff")]
    pub relative_score_cutoff: f64,

    /// Max discovery results returned to the agent (None = all surviving)
    #[serde(default)]
    pub search_top_k: Option<usize>,

    /// Max bindings the discovery meta-tool opens per call
    #[serde(default = "default_discover_binding_k")]
    pub discover_binding_k: usize,

    /// Tool cache capacity
    #[serde(default = "default_max_cache_size")]
    pub max_cache_size: usize,

    /// Top-N handles opened at startup from usage history
    #[serde(default = "default_preload_count")]
    pub preload_count: usize,

    /// Sliding-window size for history trimming, in user+assistant turns
    #[serde(default = "default_max_history_turns")]
    pub max_history_turns: usize,

    /// Step budget passed to the agent executor
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,

    /// Cooldown applied to a handle after a failure
    #[serde(default = "default_health_cooldown_seconds")]
    pub health_cooldown_seconds: u64,

    /// Directory holding the usage metrics file
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Category -> nudge rule; empty map disables nudging
    #[serde(default)]
    pub keyword_nudge: HashMap<String, NudgeRule>,

    /// Verbose logging on/off
    #[serde(default)]
    pub debug: bool,

    /// The immutable server catalog
    #[serde(default)]
    pub catalog: Vec<ServerEntry>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            execution_model: default_execution_model(),
            embedding_model: default_embedding_model(),
            similarity_threshold: default_similarity_threshold(),
            relative_score_cutoff: default_relative_score_cutoff(),
            search_top_k: None,
            discover_binding_k: default_discover_binding_k(),
            max_cache_size: default_max_cache_size(),
            preload_count: default_preload_count(),
            max_history_turns: default_max_history_turns(),
            max_steps: default_max_steps(),
            health_cooldown_seconds: default_health_cooldown_seconds(),
            data_dir: default_data_dir(),
            keyword_nudge: HashMap::new(),
            debug: false,
            catalog: Vec::new(),
        }
    }
}

impl RouterConfig {
    /// Load configuration from a YAML file
    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            RouterError::config(format!(
                "Failed to read config file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;
        let config: RouterConfig = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration, raising a config error on any violation
    pub fn validate(&self) -> Result<()> {
        if self.max_cache_size == 0 {
            return Err(RouterError::config("max_cache_size must be at least 1"));
        }
        if self.preload_count > self.max_cache_size {
            return Err(RouterError::config(format!(
                "preload_count ({}) must not exceed max_cache_size ({})",
                self.preload_count, self.max_cache_size
            )));
        }
        if self.discover_binding_k == 0 {
            return Err(RouterError::config("discover_binding_k must be at least 1"));
        }
        if self.max_steps == 0 {
            return Err(RouterError::config("max_steps must be at least 1"));
        }
        if self.max_history_turns == 0 {
            return Err(RouterError::config("max_history_turns must be at least 1"));
        }
        if !(-1.0..=1.0).contains(&self.similarity_threshold) {
            return Err(RouterError::config(
                "similarity_threshold must be within [-1.0, 1.0]",
            ));
        }
        if !(0.0..=1.0).contains(&self.relative_score_cutoff) {
            return Err(RouterError::config(
                "relative_score_cutoff must be within [0.0, 1.0]",
            ));
        }

        let mut seen = HashSet::new();
        for entry in &self.catalog {
            if entry.handle.is_empty() {
                return Err(RouterError::config("catalog entries must have a handle"));
            }
            if !seen.insert(entry.handle.as_str()) {
                return Err(RouterError::config(format!(
                    "duplicate catalog handle '{}'",
                    entry.handle
                )));
            }
        }

        Ok(())
    }

    /// Path of the usage metrics file under the data directory
    pub fn metrics_file(&self) -> PathBuf {
        self.data_dir.join("usage_metrics.jsonl")
    }
}
