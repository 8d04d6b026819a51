//! Web search tool.
//!
//! The research job calls back into this tool when it needs information
//! newer than its training data. Results are capped at a small fixed
//! count and carry only the fields the job can use.

use serde::Deserialize;

use crate::config::SearchConfig;
use crate::error::ToolError;
use crate::tools::tool::Tool;

use async_trait::async_trait;

/// One search hit as returned to the remote job.
#[derive(Debug, Clone, Deserialize, serde::Serialize)]
pub struct SearchHit {
    pub title: String,
    pub snippet: String,
    pub url: String,
    #[serde(default)]
    pub published: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    results: Vec<SearchHit>,
}

/// HTTP-backed web search tool.
pub struct WebSearchTool {
    client: reqwest::Client,
    config: SearchConfig,
}

impl WebSearchTool {
    /// Create a new search tool against the configured backend.
    pub fn new(config: SearchConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self { client, config }
    }

    async fn run_query(
        &self,
        query: &str,
        timelimit: Option<&str>,
    ) -> Result<Vec<SearchHit>, ToolError> {
        let mut request = self
            .client
            .get(&self.config.endpoint)
            .query(&[("q", query)])
            .query(&[("max_results", self.config.max_results)]);

        if let Some(limit) = timelimit {
            request = request.query(&[("timelimit", limit)]);
        }

        let response = request.send().await.map_err(|e| ToolError::ExternalService {
            name: "web_search".to_string(),
            reason: e.to_string(),
        })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(ToolError::ExternalService {
                name: "web_search".to_string(),
                reason: format!("HTTP {}: {}", status, body),
            });
        }

        let parsed: SearchResponse =
            serde_json::from_str(&body).map_err(|e| ToolError::ExternalService {
                name: "web_search".to_string(),
                reason: format!("bad search response: {}", e),
            })?;

        let mut hits = parsed.results;
        hits.truncate(self.config.max_results);
        Ok(hits)
    }
}

/// Map a trailing-days window onto the backend's recency buckets.
pub(crate) fn recency_bucket(recent_days: u64) -> &'static str {
    if recent_days <= 1 {
        "d"
    } else if recent_days <= 7 {
        "w"
    } else if recent_days <= 30 {
        "m"
    } else {
        "y"
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Internet search, returns top results to query. Use search when information newer than pretraining is needed."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "long natural language allowed"
                },
                "recent_days": {
                    "type": "number",
                    "description": "how many days back from today"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let query = arguments
            .get("query")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidParameters {
                name: "web_search".to_string(),
                reason: "missing 'query' parameter".to_string(),
            })?;

        let timelimit = arguments
            .get("recent_days")
            .and_then(|v| v.as_u64())
            .map(recency_bucket);

        let hits = self.run_query(query, timelimit).await?;
        tracing::debug!(query = %query, hits = hits.len(), "web_search completed");

        serde_json::to_value(hits).map_err(|e| ToolError::ExecutionFailed {
            name: "web_search".to_string(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recency_buckets_match_day_windows() {
        assert_eq!(recency_bucket(0), "d");
        assert_eq!(recency_bucket(1), "d");
        assert_eq!(recency_bucket(7), "w");
        assert_eq!(recency_bucket(8), "m");
        assert_eq!(recency_bucket(30), "m");
        assert_eq!(recency_bucket(31), "y");
        assert_eq!(recency_bucket(365), "y");
    }

    #[tokio::test]
    async fn missing_query_is_invalid_parameters() {
        let tool = WebSearchTool::new(SearchConfig::default());
        let err = tool.execute(serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidParameters { .. }));
    }

    #[test]
    fn search_hit_deserializes_without_published() {
        let hit: SearchHit = serde_json::from_value(serde_json::json!({
            "title": "Acme Corp",
            "snippet": "Acme makes everything",
            "url": "https://acme.example"
        }))
        .unwrap();
        assert!(hit.published.is_none());
    }
}
