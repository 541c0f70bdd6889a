//! Mock implementations for testing
//!
//! Provides a scriptable LlmProvider so agent, guardrail, and route tests
//! can run without external services.

use crate::llm::provider::{
    CompletionRequest, CompletionResponse, FinishReason, LlmError, LlmProvider, TokenUsage,
    ToolCall,
};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use tokio::sync::Mutex;

/// Mock LLM provider with scripted responses
pub struct MockLlmProvider {
    responses: Mutex<VecDeque<CompletionResponse>>,
    requests: Mutex<Vec<CompletionRequest>>,
    should_fail: bool,
}

impl MockLlmProvider {
    /// Provider that returns the given text for every request
    pub fn single_response(text: &str) -> Self {
        Self::with_responses(vec![Self::text_response(text)])
    }

    /// Provider that plays back the given responses in order, repeating the
    /// last one when the script runs out
    pub fn with_responses(responses: Vec<CompletionResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
            should_fail: false,
        }
    }

    /// Provider whose every call fails
    pub fn with_failure() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            should_fail: true,
        }
    }

    /// Build a plain text completion response
    pub fn text_response(text: &str) -> CompletionResponse {
        CompletionResponse {
            content: Some(text.to_string()),
            model: "mock-model".to_string(),
            usage: TokenUsage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            },
            finish_reason: FinishReason::Stop,
            tool_calls: None,
        }
    }

    /// Build a response requesting a single tool call
    pub fn tool_call_response(tool_name: &str, arguments: Value) -> CompletionResponse {
        CompletionResponse {
            content: None,
            model: "mock-model".to_string(),
            usage: TokenUsage::default(),
            finish_reason: FinishReason::Stop,
            tool_calls: Some(vec![ToolCall {
                id: "call-1".to_string(),
                name: tool_name.to_string(),
                arguments,
            }]),
        }
    }

    /// Requests this provider has received, in order
    pub async fn recorded_requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.requests.lock().await.push(request);

        if self.should_fail {
            return Err(LlmError::RequestFailed("Mock provider failure".to_string()));
        }

        let mut responses = self.responses.lock().await;
        match responses.len() {
            0 => Err(LlmError::InvalidResponse(
                "Mock provider has no scripted responses".to_string(),
            )),
            1 => Ok(responses[0].clone()),
            _ => Ok(responses.pop_front().unwrap()),
        }
    }

    async fn health_check(&self) -> Result<(), LlmError> {
        if self.should_fail {
            Err(LlmError::RequestFailed("Mock provider failure".to_string()))
        } else {
            Ok(())
        }
    }
}
