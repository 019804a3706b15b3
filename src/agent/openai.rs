//! OpenAI-compatible agent executor
//!
//! Drives a chat-completions tool-calling loop: tool schemas are sent
//! with every request, `tool_calls` in the reply are dispatched to the
//! matching [`AgentTool`], and the loop ends when the model answers with
//! plain text. The step budget bounds agent-to-tool round trips;
//! exceeding it raises a recoverable agent error.

use crate::agent::{AgentExecutor, AgentOutcome, AgentRequest, AgentTool};
use crate::error::{Result, RouterError};
use crate::history::Role;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, warn};

/// Agent executor backed by an OpenAI-compatible chat completions API
#[derive(Debug, Clone)]
pub struct OpenAiAgentExecutor {
    client: reqwest::Client,
    model: String,
    api_key: String,
    base_url: String,
}

impl OpenAiAgentExecutor {
    pub fn new(model: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        Self::with_base_url(model, api_key, "https://api.openai.com/v1")
    }

    pub fn with_base_url(
        model: impl Into<String>,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| RouterError::config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            model: model.into(),
            api_key: api_key.into(),
            base_url: base_url.into(),
        })
    }

    async fn chat_completion(&self, messages: &[Value], tools: &[Value]) -> Result<Value> {
        let mut body = json!({
            "model": self.model,
            "messages": messages,
        });
        if !tools.is_empty() {
            body["tools"] = json!(tools);
        }

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| RouterError::agent(format!("chat request failed: {}", e), true))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            // Rate limits and server-side hiccups are worth a caller retry.
            let recoverable = status.is_server_error() || status.as_u16() == 429;
            return Err(RouterError::agent(
                format!("chat API error ({}): {}", status, error_text),
                recoverable,
            ));
        }

        response
            .json()
            .await
            .map_err(|e| RouterError::agent(format!("invalid chat response: {}", e), false))
    }
}

#[async_trait]
impl AgentExecutor for OpenAiAgentExecutor {
    async fn run(&self, request: AgentRequest) -> Result<AgentOutcome> {
        let tool_schemas: Vec<Value> = request.tools.iter().map(tool_schema).collect();

        let mut messages: Vec<Value> =
            vec![json!({"role": "system", "content": request.instructions})];
        for message in &request.messages {
            messages.push(json!({
                "role": role_name(message.role),
                "content": message.content,
            }));
        }

        let mut touched: HashSet<String> = HashSet::new();

        for step in 0..request.max_steps {
            let response = self.chat_completion(&messages, &tool_schemas).await?;
            let message = response["choices"][0]["message"].clone();
            if message.is_null() {
                return Err(RouterError::agent("chat response had no choices", false));
            }

            let tool_calls = message["tool_calls"].as_array().cloned().unwrap_or_default();
            if tool_calls.is_empty() {
                let final_text = message["content"].as_str().unwrap_or_default().to_string();
                debug!("Agent finished after {} step(s)", step);
                return Ok(AgentOutcome {
                    final_text,
                    touched_handles: Some(touched.into_iter().collect()),
                });
            }

            messages.push(message.clone());

            for call in &tool_calls {
                let call_id = call["id"].as_str().unwrap_or_default().to_string();
                let name = call["function"]["name"].as_str().unwrap_or_default();
                let args: Value = call["function"]["arguments"]
                    .as_str()
                    .and_then(|raw| serde_json::from_str(raw).ok())
                    .unwrap_or_else(|| json!({}));

                debug!("Agent invoking tool '{}'", name);
                let content = match request.tools.iter().find(|t| t.name == name) {
                    Some(tool) => match (tool.invoke)(args).await {
                        Ok(result) => {
                            if let Some(handle) = &tool.handle {
                                touched.insert(handle.clone());
                            }
                            result.to_string()
                        }
                        Err(e) => {
                            warn!("Tool '{}' failed: {}", name, e);
                            format!("Tool error: {}", e)
                        }
                    },
                    None => format!("Unknown tool: {}", name),
                };

                messages.push(json!({
                    "role": "tool",
                    "tool_call_id": call_id,
                    "content": content,
                }));
            }
        }

        Err(RouterError::agent(
            format!("step budget of {} exceeded", request.max_steps),
            true,
        ))
    }
}

/// Convert a tool descriptor to the chat API function schema
fn tool_schema(tool: &AgentTool) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.schema,
        }
    })
}

fn role_name(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}
