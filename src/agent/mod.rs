//! Agent executor interface
//!
//! The router drives a ReAct-style agent through the [`AgentExecutor`]
//! trait: given messages, a toolset, and a step budget it returns a final
//! text plus the handles whose tools the agent actually invoked.

pub mod openai;

use crate::error::Result;
use crate::history::Message;
use async_trait::async_trait;
use futures_util::future::BoxFuture;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

pub use openai::OpenAiAgentExecutor;

/// Boxed future returned by a tool invocation
pub type ToolInvokeFuture = BoxFuture<'static, Result<Value>>;

/// Invocation closure attached to a tool descriptor
pub type ToolInvokeFn = Arc<dyn Fn(Value) -> ToolInvokeFuture + Send + Sync>;

/// A named, invocable capability exposed to the agent for one turn.
///
/// Tools from server bindings carry the owning handle; router-owned
/// meta-tools (like `discover_tools`) carry none.
#[derive(Clone)]
pub struct AgentTool {
    /// Tool name as presented to the model
    pub name: String,
    /// Tool description as presented to the model
    pub description: String,
    /// JSON schema of the tool arguments
    pub schema: Value,
    /// Handle of the server binding that exposed this tool, if any
    pub handle: Option<String>,
    /// Invocation closure bound to the underlying connection
    pub invoke: ToolInvokeFn,
}

impl fmt::Debug for AgentTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentTool")
            .field("name", &self.name)
            .field("handle", &self.handle)
            .finish()
    }
}

/// One agent execution request
#[derive(Debug)]
pub struct AgentRequest {
    /// Conversation messages, oldest first
    pub messages: Vec<Message>,
    /// System instructions for this run
    pub instructions: String,
    /// Toolset for this run, including the discovery meta-tool
    pub tools: Vec<AgentTool>,
    /// Upper bound on agent-to-tool round trips; exceeding it raises
    pub max_steps: u32,
}

/// Result of a successful agent execution
#[derive(Debug, Clone)]
pub struct AgentOutcome {
    /// Final assistant text
    pub final_text: String,
    /// Handles whose tools the agent invoked during the run.
    ///
    /// `None` means the executor cannot report this; the router then
    /// falls back to treating all cached handles as touched.
    pub touched_handles: Option<Vec<String>>,
}

/// Runs a ReAct-style agent over a message list and toolset
#[async_trait]
pub trait AgentExecutor: Send + Sync {
    /// Execute one agent run. Must observe `max_steps` as an upper bound
    /// on agent-to-tool round trips and raise when it is exceeded.
    async fn run(&self, request: AgentRequest) -> Result<AgentOutcome>;
}
