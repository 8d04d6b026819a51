//! Tool registry: name → handler mapping with batch dispatch.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;

use crate::error::ToolError;
use crate::remote::{ToolCallOutput, ToolCallRequest};
use crate::tools::tool::{Tool, ToolSchema};

/// Default per-call timeout imposed on handlers.
const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(5);

/// Registry of tools available to remote jobs.
///
/// Dispatch never fails: unknown tool names, handler errors, and timeouts
/// all produce an error-string output entry. A tool-output batch that is
/// short even one entry is a protocol violation on the remote side, so
/// every pending call id must be answered.
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<dyn Tool>>>,
    call_timeout: Duration,
}

impl ToolRegistry {
    /// Create a new empty registry with the default per-call timeout.
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_TOOL_TIMEOUT)
    }

    /// Create a registry with a custom per-call timeout.
    pub fn with_timeout(call_timeout: Duration) -> Self {
        Self {
            tools: RwLock::new(HashMap::new()),
            call_timeout,
        }
    }

    /// Register a tool.
    pub async fn register(&self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.write().await.insert(name.clone(), tool);
        tracing::debug!("Registered tool: {}", name);
    }

    /// Get a tool by name.
    pub async fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.read().await.get(name).cloned()
    }

    /// Check if a tool exists.
    pub async fn has(&self, name: &str) -> bool {
        self.tools.read().await.contains_key(name)
    }

    /// List all tool names.
    pub async fn list(&self) -> Vec<String> {
        self.tools.read().await.keys().cloned().collect()
    }

    /// Schemas of every registered tool, for job submission.
    pub async fn schemas(&self) -> Vec<ToolSchema> {
        self.tools
            .read()
            .await
            .values()
            .map(|tool| tool.schema())
            .collect()
    }

    /// Execute one pending tool call, converting every failure mode into
    /// an output entry.
    pub async fn dispatch(&self, call: &ToolCallRequest) -> ToolCallOutput {
        let output = match self.try_execute(call).await {
            Ok(value) => {
                serde_json::to_string(&value).unwrap_or_else(|e| error_payload(&e.to_string()))
            }
            Err(err) => {
                tracing::warn!(
                    call_id = %call.call_id,
                    tool = %call.tool_name,
                    "Tool call failed, answering with placeholder: {}",
                    err
                );
                error_payload(&err.to_string())
            }
        };

        ToolCallOutput {
            call_id: call.call_id.clone(),
            output,
        }
    }

    /// Execute every call in a `RequiresAction` snapshot, in order.
    ///
    /// Returns exactly one output per request; the whole batch is then
    /// submitted back to the remote job in a single call.
    pub async fn dispatch_batch(&self, calls: &[ToolCallRequest]) -> Vec<ToolCallOutput> {
        let mut outputs = Vec::with_capacity(calls.len());
        for call in calls {
            outputs.push(self.dispatch(call).await);
        }
        outputs
    }

    async fn try_execute(&self, call: &ToolCallRequest) -> Result<serde_json::Value, ToolError> {
        let tool = self
            .get(&call.tool_name)
            .await
            .ok_or_else(|| ToolError::NotFound {
                name: call.tool_name.clone(),
            })?;

        match tokio::time::timeout(self.call_timeout, tool.execute(call.arguments.clone())).await {
            Ok(result) => result,
            Err(_) => Err(ToolError::Timeout {
                name: call.tool_name.clone(),
                timeout: self.call_timeout,
            }),
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Serialized error placeholder submitted in place of a real output.
fn error_payload(message: &str) -> String {
    serde_json::json!({ "error": message }).to_string()
}
