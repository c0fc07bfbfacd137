//! Web Search Tools
//!
//! A real search backend against the Tavily API plus a deterministic mock
//! for offline operation. Both return the same result shape so swapping
//! them is invisible to the agent.

use assistant_core::{
    error::{AgentError, Result},
    tool::{ParamType, ParameterSchema, Tool, ToolCall, ToolResult, ToolSchema},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

fn search_parameters() -> Vec<ParameterSchema> {
    vec![
        ParameterSchema::required_string("query", "Search query"),
        ParameterSchema::optional(
            "max_results",
            ParamType::Integer,
            "Maximum number of results to return",
            json!(5),
        ),
    ]
}

fn extract_args(call: &ToolCall) -> (&str, usize) {
    let query = call
        .arguments
        .get("query")
        .and_then(|v| v.as_str())
        .unwrap_or_default();
    let max_results = call
        .arguments
        .get("max_results")
        .and_then(Value::as_u64)
        .unwrap_or(5) as usize;
    (query, max_results)
}

/// Live web search via the Tavily API
pub struct WebSearchTool {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl WebSearchTool {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: "https://api.tavily.com".into(),
        }
    }

    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("TAVILY_API_KEY")
            .map_err(|_| AgentError::Config("TAVILY_API_KEY is not set".into()))?;
        Ok(Self::new(api_key))
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "web_search".into(),
            description: "Search the web for current information".into(),
            parameters: search_parameters(),
            category: Some("search".into()),
        }
    }

    async fn execute(&self, call: &ToolCall) -> Result<ToolResult> {
        let (query, max_results) = extract_args(call);
        tracing::debug!(query, max_results, "dispatching web search");

        let request = SearchRequest {
            api_key: &self.api_key,
            query,
            search_depth: "basic",
            include_answer: true,
            include_images: false,
            include_raw_content: false,
            max_results,
        };

        let response = match self
            .client
            .post(format!("{}/search", self.base_url))
            .json(&request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return Ok(ToolResult::failure(format!("Search failed: {e}"))),
        };

        let status = response.status();
        if !status.is_success() {
            return Ok(ToolResult::failure(format!(
                "Search API returned status {status}"
            )));
        }

        let parsed: SearchResponse = match response.json().await {
            Ok(parsed) => parsed,
            Err(e) => return Ok(ToolResult::failure(format!("Search failed: {e}"))),
        };

        let results: Vec<Value> = parsed
            .results
            .iter()
            .map(|r| {
                json!({
                    "title": r.title,
                    "url": r.url,
                    "content": r.content,
                    "score": r.score,
                })
            })
            .collect();

        Ok(ToolResult::success(json!({
            "query": query,
            "answer": parsed.answer.unwrap_or_default(),
            "results": results,
            "total_results": results.len(),
        }))
        .with_metadata("source", json!("tavily")))
    }
}

/// Simulated search results for use without API keys
pub struct MockSearchTool;

#[async_trait]
impl Tool for MockSearchTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "mock_search".into(),
            description: "Mock search tool that returns simulated results".into(),
            parameters: search_parameters(),
            category: Some("search".into()),
        }
    }

    async fn execute(&self, call: &ToolCall) -> Result<ToolResult> {
        let (query, max_results) = extract_args(call);

        let results: Vec<Value> = (0..max_results.min(3))
            .map(|i| {
                json!({
                    "title": format!("Result {} for '{query}'", i + 1),
                    "url": format!("https://example.com/result-{}", i + 1),
                    "content": format!(
                        "This is mock content for result {} related to your query about {query}.",
                        i + 1
                    ),
                    "score": 0.9 - (i as f64) * 0.1,
                })
            })
            .collect();

        Ok(ToolResult::success(json!({
            "query": query,
            "answer": format!("Based on the search results for '{query}', here's what I found..."),
            "results": results,
            "total_results": results.len(),
        }))
        .with_metadata("source", json!("mock")))
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    search_depth: &'a str,
    include_answer: bool,
    include_images: bool,
    include_raw_content: bool,
    max_results: usize,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    answer: Option<String>,

    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(default)]
    title: String,

    #[serde(default)]
    url: String,

    #[serde(default)]
    content: String,

    #[serde(default)]
    score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[tokio::test]
    async fn test_mock_search_caps_results_at_three() {
        let mut args = HashMap::new();
        args.insert("query".to_string(), json!("rust async"));
        args.insert("max_results".to_string(), json!(10));

        let result = MockSearchTool
            .execute(&ToolCall::new("mock_search", args))
            .await
            .unwrap();
        assert!(result.success);
        let data = result.data.unwrap();
        assert_eq!(data["total_results"], json!(3));
        assert!(data["results"][0]["title"]
            .as_str()
            .unwrap()
            .contains("rust async"));
        assert_eq!(result.metadata.get("source"), Some(&json!("mock")));
    }

    #[tokio::test]
    async fn test_search_tools_share_parameter_schema() {
        let live = WebSearchTool::new("key").schema();
        let mock = MockSearchTool.schema();
        assert_eq!(live.required_parameters(), mock.required_parameters());
        assert_eq!(live.parameters.len(), mock.parameters.len());
    }

    #[tokio::test]
    async fn test_unreachable_search_backend_is_failure_result() {
        let mut tool = WebSearchTool::new("key");
        tool.base_url = "http://127.0.0.1:1".into();

        let mut args = HashMap::new();
        args.insert("query".to_string(), json!("anything"));
        let result = tool
            .execute(&ToolCall::new("web_search", args))
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.error.unwrap().starts_with("Search failed"));
    }
}
