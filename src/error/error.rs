//! Error types and handling for the tool router

use thiserror::Error;

/// Result type alias for router operations
pub type Result<T> = std::result::Result<T, RouterError>;

/// Main error type for the tool router
#[derive(Error, Debug)]
pub enum RouterError {
    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Catalog registry errors
    #[error("Registry error: {message}")]
    Registry { message: String },

    /// Embedding provider errors
    #[error("Embedding provider error: {message}")]
    Embedding { message: String },

    /// A server binding could not be opened
    #[error("Transport open error for '{handle}': {message}")]
    TransportOpen { handle: String, message: String },

    /// Agent executor errors (raised, timed out, or exceeded step budget).
    /// The only kind surfaced to `handle_turn` callers.
    #[error("Agent execution error: {message}")]
    Agent { message: String, recoverable: bool },

    /// Appending to the metrics file failed
    #[error("Metrics write error: {message}")]
    MetricsWrite { message: String },

    /// Tool invocation errors
    #[error("Tool invocation error: {tool_name}: {message}")]
    ToolInvocation { tool_name: String, message: String },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP client errors
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Generic errors
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl RouterError {
    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a registry error
    pub fn registry<S: Into<String>>(message: S) -> Self {
        Self::Registry {
            message: message.into(),
        }
    }

    /// Create an embedding provider error
    pub fn embedding<S: Into<String>>(message: S) -> Self {
        Self::Embedding {
            message: message.into(),
        }
    }

    /// Create a transport open error
    pub fn transport_open<S: Into<String>>(handle: S, message: S) -> Self {
        Self::TransportOpen {
            handle: handle.into(),
            message: message.into(),
        }
    }

    /// Create an agent execution error
    pub fn agent<S: Into<String>>(message: S, recoverable: bool) -> Self {
        Self::Agent {
            message: message.into(),
            recoverable,
        }
    }

    /// Create a metrics write error
    pub fn metrics_write<S: Into<String>>(message: S) -> Self {
        Self::MetricsWrite {
            message: message.into(),
        }
    }

    /// Create a tool invocation error
    pub fn tool_invocation<S: Into<String>>(tool_name: S, message: S) -> Self {
        Self::ToolInvocation {
            tool_name: tool_name.into(),
            message: message.into(),
        }
    }

    /// Check if the caller may retry the operation that produced this error
    pub fn is_recoverable(&self) -> bool {
        match self {
            RouterError::Agent { recoverable, .. } => *recoverable,
            RouterError::Http(_) | RouterError::Io(_) => true,
            RouterError::TransportOpen { .. } | RouterError::ToolInvocation { .. } => true,
            _ => false,
        }
    }

    /// Get the error category for logging/metrics
    pub fn category(&self) -> &'static str {
        match self {
            RouterError::Config { .. } => "config",
            RouterError::Registry { .. } => "registry",
            RouterError::Embedding { .. } => "embedding",
            RouterError::TransportOpen { .. } => "transport_open",
            RouterError::Agent { .. } => "agent",
            RouterError::MetricsWrite { .. } => "metrics_write",
            RouterError::ToolInvocation { .. } => "tool_invocation",
            RouterError::Io(_) => "io",
            RouterError::Serde(_) => "serialization",
            RouterError::Yaml(_) => "yaml",
            RouterError::Http(_) => "http",
            RouterError::Internal(_) => "internal",
        }
    }
}
