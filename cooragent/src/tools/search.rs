//! Tavily web search tool: planner preflight and the default researcher's
//! search binding.

use async_trait::async_trait;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use super::{Tool, ToolContext, ToolError, ToolSpec};

const TAVILY_SEARCH_URL: &str = "https://api.tavily.com/search";
const MAX_RESULTS: u64 = 5;

pub const TOOL_TAVILY: &str = "tavily_tool";

fn tavily_search_url() -> String {
    std::env::var("TAVILY_SEARCH_URL").unwrap_or_else(|_| TAVILY_SEARCH_URL.to_string())
}

/// Web search via the Tavily API. Requires `TAVILY_API_KEY` (or an explicit
/// key). Returns a JSON array of `{title, content}` entries as text.
pub struct TavilySearch {
    api_key: String,
    client: reqwest::Client,
}

impl TavilySearch {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            client: reqwest::Client::new(),
        }
    }

    /// API key from `TAVILY_API_KEY`; `None` when unset.
    pub fn from_env() -> Option<Self> {
        std::env::var("TAVILY_API_KEY").ok().map(Self::new)
    }

    pub fn tool_spec() -> ToolSpec {
        ToolSpec {
            name: TOOL_TAVILY.into(),
            description: "Search the web for current information; returns result titles and content snippets.".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "The search query"}
                },
                "required": ["query"],
            }),
        }
    }

    async fn search(&self, query: &str, cancel: &CancellationToken) -> Result<String, ToolError> {
        let body = json!({
            "api_key": self.api_key,
            "query": query,
            "max_results": MAX_RESULTS,
        });
        let request = self
            .client
            .post(tavily_search_url())
            .header("Content-Type", "application/json")
            .json(&body)
            .send();

        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(ToolError::Cancelled),
            res = request => res.map_err(|e| ToolError::Execution {
                tool: TOOL_TAVILY.into(),
                message: e.to_string(),
            })?,
        };
        if !response.status().is_success() {
            let status = response.status();
            let err_body = response.text().await.unwrap_or_default();
            return Err(ToolError::Execution {
                tool: TOOL_TAVILY.into(),
                message: format!("tavily api error {status}: {err_body}"),
            });
        }
        let out: serde_json::Value = response.json().await.map_err(|e| ToolError::Execution {
            tool: TOOL_TAVILY.into(),
            message: e.to_string(),
        })?;

        let results: Vec<serde_json::Value> = out
            .get("results")
            .and_then(|r| r.as_array())
            .map(|arr| {
                arr.iter()
                    .map(|r| {
                        json!({
                            "title": r.get("title").cloned().unwrap_or_default(),
                            "content": r.get("content").cloned().unwrap_or_default(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        serde_json::to_string(&results).map_err(|e| ToolError::Execution {
            tool: TOOL_TAVILY.into(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl Tool for TavilySearch {
    fn name(&self) -> &str {
        TOOL_TAVILY
    }

    fn spec(&self) -> ToolSpec {
        Self::tool_spec()
    }

    async fn call(&self, args: serde_json::Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let query = args
            .get("query")
            .and_then(|q| q.as_str())
            .ok_or_else(|| ToolError::InvalidInput {
                tool: TOOL_TAVILY.into(),
                message: "query must be a string".into(),
            })?;
        self.search(query, &ctx.cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_requires_query() {
        let spec = TavilySearch::tool_spec();
        assert_eq!(spec.name, TOOL_TAVILY);
        assert_eq!(spec.input_schema["required"][0], "query");
    }

    #[tokio::test]
    async fn cancelled_before_request_short_circuits() {
        let tool = TavilySearch::new("test-key");
        let cancel = CancellationToken::new();
        cancel.cancel();
        let ctx = ToolContext::new(cancel);
        let err = tool
            .call(json!({"query": "rust"}), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ToolError::Cancelled | ToolError::Execution { .. }
        ));
    }

    #[tokio::test]
    async fn non_string_query_is_invalid_input() {
        let tool = TavilySearch::new("test-key");
        let err = tool
            .call(json!({"query": 7}), &ToolContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput { .. }));
    }
}
