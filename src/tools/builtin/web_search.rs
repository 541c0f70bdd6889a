//! Web search tool implementation
//!
//! Searches the web through the Tavily API and hands the agent a compact
//! summary of the top results with their source URLs.

use crate::config::SearchSection;
use crate::tools::{Tool, ToolDescription, ToolError};
use async_trait::async_trait;
use serde_json::{json, Value};

/// Web search tool backed by the Tavily API
pub struct WebSearchTool {
    settings: SearchSection,
    client: Option<reqwest::Client>,
    api_key: Option<String>,
}

impl WebSearchTool {
    /// Create new web search tool from service configuration
    pub fn new(settings: SearchSection) -> Self {
        Self {
            settings,
            client: None,
            api_key: None,
        }
    }

    /// Build search payload (pure function)
    fn build_search_payload(api_key: &str, query: &str, max_results: usize) -> Value {
        json!({
            "api_key": api_key,
            "query": query,
            "max_results": max_results
        })
    }

    /// Parse search response into result entries (pure function)
    fn parse_search_response(search_result: &Value, max_results: usize) -> Vec<Value> {
        let mut formatted_results = Vec::new();

        if let Some(results) = search_result.get("results").and_then(|r| r.as_array()) {
            for result in results.iter().take(max_results) {
                if let (Some(title), Some(url)) = (
                    result.get("title").and_then(|t| t.as_str()),
                    result.get("url").and_then(|u| u.as_str()),
                ) {
                    let snippet = result.get("content").and_then(|c| c.as_str()).unwrap_or("");

                    formatted_results.push(json!({
                        "title": title,
                        "url": url,
                        "snippet": snippet
                    }));
                }
            }
        }

        formatted_results
    }

    /// Format final search response with a text summary (pure function)
    fn format_search_response(query: &str, results: Vec<Value>) -> Value {
        let summary_lines: Vec<String> = results
            .iter()
            .map(|r| {
                format!(
                    "- {}: {}",
                    r["title"].as_str().unwrap_or(""),
                    r["url"].as_str().unwrap_or("")
                )
            })
            .collect();

        json!({
            "query": query,
            "results": results,
            "summary": format!("Search results:\n{}", summary_lines.join("\n"))
        })
    }

    /// Validate search parameters (pure function)
    fn validate_search_params(query: Option<&str>) -> Result<&str, String> {
        query.ok_or_else(|| "Query parameter is required".to_string())
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn describe(&self) -> ToolDescription {
        ToolDescription {
            name: "web_search".to_string(),
            description: "Perform a web search and summarize key sources".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Search query"
                    }
                },
                "required": ["query"],
                "additionalProperties": false
            }),
        }
    }

    async fn initialize(&mut self) -> Result<(), ToolError> {
        let api_key = std::env::var(&self.settings.api_key_env).map_err(|_| {
            ToolError::InitializationError(format!(
                "{} environment variable not set",
                self.settings.api_key_env
            ))
        })?;
        self.api_key = Some(api_key);

        self.client = Some(
            reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .map_err(|e| ToolError::InitializationError(e.to_string()))?,
        );

        Ok(())
    }

    async fn execute(&self, parameters: &Value) -> Result<Value, ToolError> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| ToolError::ExecutionError("Tool not initialized".to_string()))?;

        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| ToolError::ExecutionError("API key not configured".to_string()))?;

        let query = Self::validate_search_params(parameters["query"].as_str())
            .map_err(ToolError::ExecutionError)?;

        let payload = Self::build_search_payload(api_key, query, self.settings.max_results);

        // Make request to Tavily API (impure I/O)
        let response = client
            .post(format!("{}/search", self.settings.base_url))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| ToolError::ExecutionError(format!("Request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ToolError::ExecutionError(format!(
                "Tavily API error ({}): {}",
                status.as_u16(),
                error_text
            )));
        }

        let search_result: Value = response
            .json()
            .await
            .map_err(|e| ToolError::ExecutionError(format!("Failed to parse response: {e}")))?;

        let results = Self::parse_search_response(&search_result, self.settings.max_results);
        Ok(Self::format_search_response(query, results))
    }

    async fn shutdown(&mut self) -> Result<(), ToolError> {
        self.client = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_settings() -> SearchSection {
        SearchSection::default()
    }

    #[test]
    fn test_web_search_tool_creation() {
        let tool = WebSearchTool::new(test_settings());
        assert!(tool.client.is_none());
        assert!(tool.api_key.is_none());
        assert_eq!(tool.settings.max_results, 3);
    }

    #[test]
    fn test_build_search_payload() {
        let payload = WebSearchTool::build_search_payload("key-123", "test query", 3);

        assert_eq!(payload["api_key"], "key-123");
        assert_eq!(payload["query"], "test query");
        assert_eq!(payload["max_results"], 3);
    }

    #[test]
    fn test_validate_search_params() {
        assert!(WebSearchTool::validate_search_params(Some("test")).is_ok());
        assert!(WebSearchTool::validate_search_params(None).is_err());
    }

    #[test]
    fn test_parse_search_response_empty() {
        let empty_response = json!({});
        let results = WebSearchTool::parse_search_response(&empty_response, 3);

        assert!(results.is_empty());
    }

    #[test]
    fn test_parse_search_response_with_results() {
        let response = json!({
            "results": [
                {
                    "title": "Test Title",
                    "url": "https://example.com",
                    "content": "Test snippet"
                }
            ]
        });

        let results = WebSearchTool::parse_search_response(&response, 3);

        assert_eq!(results.len(), 1);
        assert_eq!(results[0]["title"], "Test Title");
        assert_eq!(results[0]["url"], "https://example.com");
        assert_eq!(results[0]["snippet"], "Test snippet");
    }

    #[test]
    fn test_parse_search_response_respects_max_results() {
        let response = json!({
            "results": [
                { "title": "A", "url": "https://a.example" },
                { "title": "B", "url": "https://b.example" },
                { "title": "C", "url": "https://c.example" },
                { "title": "D", "url": "https://d.example" }
            ]
        });

        let results = WebSearchTool::parse_search_response(&response, 3);
        assert_eq!(results.len(), 3);
    }

    #[test]
    fn test_format_search_response() {
        let results = vec![json!({
            "title": "Test",
            "url": "https://example.com",
            "snippet": "Test snippet"
        })];

        let response = WebSearchTool::format_search_response("test query", results);

        assert_eq!(response["query"], "test query");
        assert_eq!(response["results"].as_array().unwrap().len(), 1);
        let summary = response["summary"].as_str().unwrap();
        assert!(summary.contains("- Test: https://example.com"));
    }

    #[test]
    fn test_tool_description() {
        let tool = WebSearchTool::new(test_settings());
        let description = tool.describe();

        assert_eq!(description.name, "web_search");
        assert!(!description.description.is_empty());
        assert!(description.parameters.is_object());
    }
}
