//! Topic restriction guardrail
//!
//! Zero-shot topic classification through the LLM provider: the message is
//! classified into exactly one label from the configured valid and invalid
//! topic lists (or "other"), and only valid labels pass. The classifier
//! runs at temperature 0 with a JSON-only response format.

use crate::config::GuardrailsSection;
use crate::guardrails::Verdict;
use crate::llm::provider::{
    CompletionRequest, LlmProvider, Message, MessageRole, ResponseFormat,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Classifier verdict payload expected from the LLM
#[derive(Debug, Deserialize)]
struct TopicVerdict {
    topic: String,
}

/// Topic restriction on incoming messages
pub struct TopicGuardrail {
    provider: Option<Arc<dyn LlmProvider>>,
    model: String,
    valid_topics: Vec<String>,
    invalid_topics: Vec<String>,
}

impl TopicGuardrail {
    pub fn new(
        provider: Option<Arc<dyn LlmProvider>>,
        model: String,
        settings: &GuardrailsSection,
    ) -> Self {
        Self {
            provider,
            model,
            valid_topics: settings.valid_topics.clone(),
            invalid_topics: settings.invalid_topics.clone(),
        }
    }

    /// Build the classification prompt (pure function)
    fn build_prompt(&self, message: &str) -> String {
        format!(
            "Classify the user message into exactly one topic label.\n\
             Valid topics: {}\n\
             Invalid topics: {}\n\
             If none apply, use \"other\".\n\
             Respond with a JSON object: {{\"topic\": \"<label>\"}}\n\n\
             User message: {message}",
            self.valid_topics.join(", "),
            self.invalid_topics.join(", "),
        )
    }

    /// Decide from a classified label (pure function)
    fn decide(&self, label: &str) -> Verdict {
        let label_lower = label.to_lowercase();
        if self
            .valid_topics
            .iter()
            .any(|t| t.to_lowercase() == label_lower)
        {
            Verdict::Pass
        } else {
            Verdict::reject(format!("Message classified as '{label}'"))
        }
    }

    /// Parse the classifier response content (pure function)
    fn parse_verdict(content: &str) -> Option<String> {
        serde_json::from_str::<TopicVerdict>(content)
            .ok()
            .map(|v| v.topic)
    }

    /// Check an incoming message against the topic policy
    ///
    /// Fails open when no provider is configured or the classifier call
    /// errors, so offline operation stays usable.
    pub async fn check(&self, message: &str) -> Verdict {
        let provider = match &self.provider {
            Some(provider) => provider.clone(),
            None => {
                warn!("Topic guardrail has no LLM provider, failing open");
                return Verdict::Pass;
            }
        };

        let request = CompletionRequest {
            messages: vec![
                Message {
                    role: MessageRole::System,
                    content: "You are a strict topic classifier. Answer only with the requested JSON object.".to_string(),
                },
                Message {
                    role: MessageRole::User,
                    content: self.build_prompt(message),
                },
            ],
            model: self.model.clone(),
            max_tokens: Some(50),
            temperature: Some(0.0),
            tools: None,
            response_format: Some(ResponseFormat::Json),
        };

        let response = match provider.complete(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Topic classification failed, failing open");
                return Verdict::Pass;
            }
        };

        let content = response.content.unwrap_or_default();
        match Self::parse_verdict(&content) {
            Some(label) => {
                let verdict = self.decide(&label);
                debug!(label = %label, pass = verdict.is_pass(), "Topic check");
                verdict
            }
            None => {
                warn!(content = %content, "Unparseable topic verdict, failing open");
                Verdict::Pass
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::mocks::MockLlmProvider;

    fn guard_with(provider: Option<Arc<dyn LlmProvider>>) -> TopicGuardrail {
        TopicGuardrail::new(
            provider,
            "gpt-4o-mini".to_string(),
            &GuardrailsSection::default(),
        )
    }

    #[test]
    fn test_prompt_lists_topics() {
        let guard = guard_with(None);
        let prompt = guard.build_prompt("How do I deploy?");

        assert!(prompt.contains("programming"));
        assert!(prompt.contains("politics"));
        assert!(prompt.contains("How do I deploy?"));
    }

    #[test]
    fn test_decide_valid_topic_passes() {
        let guard = guard_with(None);
        assert!(guard.decide("programming").is_pass());
        assert!(guard.decide("Programming").is_pass());
    }

    #[test]
    fn test_decide_invalid_topic_rejected() {
        let guard = guard_with(None);
        assert!(!guard.decide("politics").is_pass());
        assert!(!guard.decide("other").is_pass());
    }

    #[test]
    fn test_parse_verdict() {
        assert_eq!(
            TopicGuardrail::parse_verdict(r#"{"topic": "programming"}"#),
            Some("programming".to_string())
        );
        assert_eq!(TopicGuardrail::parse_verdict("not json"), None);
    }

    #[tokio::test]
    async fn test_check_without_provider_fails_open() {
        let guard = guard_with(None);
        assert!(guard.check("anything at all").await.is_pass());
    }

    #[tokio::test]
    async fn test_check_rejects_invalid_topic() {
        let provider = Arc::new(MockLlmProvider::single_response(r#"{"topic": "politics"}"#));
        let guard = guard_with(Some(provider));

        let verdict = guard.check("Who should win the election?").await;
        assert!(!verdict.is_pass());
    }

    #[tokio::test]
    async fn test_check_passes_valid_topic() {
        let provider = Arc::new(MockLlmProvider::single_response(
            r#"{"topic": "programming"}"#,
        ));
        let guard = guard_with(Some(provider));

        let verdict = guard.check("How do lifetimes work?").await;
        assert!(verdict.is_pass());
    }

    #[tokio::test]
    async fn test_check_fails_open_on_provider_error() {
        let provider = Arc::new(MockLlmProvider::with_failure());
        let guard = guard_with(Some(provider));

        assert!(guard.check("hello").await.is_pass());
    }

    #[tokio::test]
    async fn test_check_fails_open_on_garbage_verdict() {
        let provider = Arc::new(MockLlmProvider::single_response("certainly!"));
        let guard = guard_with(Some(provider));

        assert!(guard.check("hello").await.is_pass());
    }

    #[tokio::test]
    async fn test_classifier_request_uses_json_format() {
        let provider = Arc::new(MockLlmProvider::single_response(
            r#"{"topic": "programming"}"#,
        ));
        let guard = guard_with(Some(provider.clone()));

        guard.check("How do lifetimes work?").await;

        let requests = provider.recorded_requests().await;
        assert_eq!(requests.len(), 1);
        assert_eq!(
            requests[0].response_format,
            Some(crate::llm::provider::ResponseFormat::Json)
        );
        assert_eq!(requests[0].temperature, Some(0.0));
    }
}
