//! Chat agent
//!
//! Runs the reasoning loop for one chat turn: the provider is called with
//! the available tool descriptions, requested tool calls are executed and
//! their results fed back, and the loop repeats until the provider returns
//! a final text answer or the iteration cap is hit.
//!
//! When no provider is configured, or the provider call fails, the agent
//! falls back to keyword-directed canned replies so the service keeps
//! answering without any vendor key.

use crate::error::{ServiceError, ServiceResult};
use crate::llm::provider::{CompletionRequest, CompletionResponse, LlmProvider, Message, MessageRole, ToolCall};
use crate::tools::ToolRegistry;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Iteration cap preventing infinite tool loops
const MAX_TOOL_ITERATIONS: usize = 10;

/// Provenance label for replies produced without the LLM
pub const SOURCE_RULE_BASED: &str = "rule-based";

/// One finished chat turn with its provenance label
#[derive(Debug, Clone, PartialEq)]
pub struct AgentReply {
    pub text: String,
    /// Where the reply came from: `agent:{model}` or `rule-based`
    pub source: String,
}

/// Settings the agent needs from the `[llm]` config section
#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub model: String,
    pub system_prompt: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// Chat agent with optional LLM provider and tool access
pub struct ChatAgent {
    provider: Option<Arc<dyn LlmProvider>>,
    tools: Arc<ToolRegistry>,
    settings: AgentSettings,
}

impl ChatAgent {
    pub fn new(
        provider: Option<Arc<dyn LlmProvider>>,
        tools: Arc<ToolRegistry>,
        settings: AgentSettings,
    ) -> Self {
        Self {
            provider,
            tools,
            settings,
        }
    }

    /// Whether an LLM provider is wired in
    pub fn is_online(&self) -> bool {
        self.provider.is_some()
    }

    /// Produce a reply for one user message
    pub async fn respond(&self, message: &str) -> AgentReply {
        let provider = match &self.provider {
            Some(provider) => provider.clone(),
            None => {
                debug!("No LLM provider configured, using rule-based reply");
                return AgentReply {
                    text: Self::offline_reply(message),
                    source: SOURCE_RULE_BASED.to_string(),
                };
            }
        };

        match self.run_tool_loop(provider, message).await {
            Ok(text) if !text.is_empty() => AgentReply {
                source: format!("agent:{}", self.settings.model),
                text,
            },
            Ok(_) => {
                warn!("Agent returned empty content, falling back to rule-based reply");
                AgentReply {
                    text: Self::offline_reply(message),
                    source: SOURCE_RULE_BASED.to_string(),
                }
            }
            Err(e) => {
                warn!(error = %e, "Agent invocation failed, falling back to rule-based reply");
                AgentReply {
                    text: Self::offline_reply(message),
                    source: SOURCE_RULE_BASED.to_string(),
                }
            }
        }
    }

    /// Run the completion/tool loop until a final answer
    async fn run_tool_loop(
        &self,
        provider: Arc<dyn LlmProvider>,
        message: &str,
    ) -> ServiceResult<String> {
        let available_tools = self.tools.describe_tools();
        let mut messages = self.build_initial_messages(message);

        let mut iteration = 0;

        loop {
            iteration += 1;
            Self::check_iteration_limit(iteration, MAX_TOOL_ITERATIONS)?;

            let request = CompletionRequest {
                messages: messages.clone(),
                model: self.settings.model.clone(),
                max_tokens: self.settings.max_tokens,
                temperature: self.settings.temperature,
                tools: if available_tools.is_empty() {
                    None
                } else {
                    Some(available_tools.clone())
                },
                response_format: None,
            };

            let response = provider.complete(request).await?;

            Self::add_assistant_response(&mut messages, &response);

            if let Some(tool_calls) = &response.tool_calls {
                debug!(
                    iteration = iteration,
                    tool_count = tool_calls.len(),
                    "Processing tool calls"
                );

                let tool_results = self.execute_tool_calls(tool_calls).await;
                Self::add_tool_results(&mut messages, &tool_results);
                continue;
            }

            info!(iterations = iteration, "Agent reasoning completed");
            return Ok(response.content.unwrap_or_default());
        }
    }

    /// Build the system + user messages for one turn (pure function)
    fn build_initial_messages(&self, message: &str) -> Vec<Message> {
        vec![
            Message {
                role: MessageRole::System,
                content: self.settings.system_prompt.clone(),
            },
            Message {
                role: MessageRole::User,
                content: message.to_string(),
            },
        ]
    }

    /// Execute all tool calls from one response
    async fn execute_tool_calls(&self, tool_calls: &[ToolCall]) -> Vec<String> {
        let mut results = Vec::new();

        for tool_call in tool_calls {
            info!(
                tool = %tool_call.name,
                "Executing tool call"
            );

            let result = match self
                .tools
                .execute_tool(&tool_call.name, &tool_call.arguments)
                .await
            {
                Ok(value) => {
                    // Prefer the tool's text summary when it provides one
                    let rendered = value
                        .get("summary")
                        .and_then(|s| s.as_str())
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| value.to_string());
                    format!("Tool {} returned: {}", tool_call.name, rendered)
                }
                Err(e) => {
                    warn!(tool = %tool_call.name, error = %e, "Tool call failed");
                    format!("Tool {} failed: {}", tool_call.name, e)
                }
            };
            results.push(result);
        }

        results
    }

    /// Add assistant content to the transcript (pure function)
    fn add_assistant_response(messages: &mut Vec<Message>, response: &CompletionResponse) {
        if let Some(content) = &response.content {
            messages.push(Message {
                role: MessageRole::Assistant,
                content: content.clone(),
            });
        }
    }

    /// Add tool results to the transcript (pure function)
    fn add_tool_results(messages: &mut Vec<Message>, tool_results: &[String]) {
        if !tool_results.is_empty() {
            messages.push(Message {
                role: MessageRole::User,
                content: format!("Tool results:\n{}", tool_results.join("\n")),
            });
        }
    }

    /// Check if iteration limit is exceeded (pure validation)
    fn check_iteration_limit(iteration: usize, max_iterations: usize) -> ServiceResult<()> {
        if iteration > max_iterations {
            return Err(ServiceError::internal_error(format!(
                "Tool execution exceeded maximum iterations ({max_iterations})"
            )));
        }
        Ok(())
    }

    /// Keyword-directed canned reply for offline operation (pure function)
    fn offline_reply(message: &str) -> String {
        let text = message.to_lowercase();
        if text.contains("search") {
            return "The live search tool needs an API key. Set one to get answers with cited sources.".to_string();
        }
        if text.contains("monitor") || text.contains("trace") {
            return "Tracing links inputs and outputs. Set the trace keys to see spans appear in the dashboard.".to_string();
        }
        if text.contains("deploy") {
            return "Deploy the API first, then point your chat UI to the live URL to share it."
                .to_string();
        }
        if text.contains("login") || text.contains("token") {
            return "Call /login with the demo credentials, then pass the returned token in the X-Auth-Token header.".to_string();
        }
        "I am in offline mode. Ask about deployment, search, or monitoring to see directed tips."
            .to_string()
    }
}
