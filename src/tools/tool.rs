//! Tool trait and schema types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ToolError;

/// Definition of a tool's parameters using JSON Schema.
///
/// Shipped to the remote system in research job submissions so the job
/// knows which side functions it may request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// A local side function the remote job can request mid-flight.
///
/// Handlers may themselves be slow network calls; the registry imposes a
/// per-call timeout during dispatch, so implementations don't need their
/// own deadline handling.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name the remote job refers to this tool by.
    fn name(&self) -> &str;

    /// Description shipped with the tool schema.
    fn description(&self) -> &str;

    /// JSON Schema for the tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given arguments.
    async fn execute(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError>;

    /// Schema bundle for job submission.
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// A simple echo tool for tests.
#[derive(Debug)]
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echoes back the input message. Useful for testing."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "message": {
                    "type": "string",
                    "description": "The message to echo back"
                }
            },
            "required": ["message"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let message = arguments
            .get("message")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidParameters {
                name: "echo".to_string(),
                reason: "missing 'message' parameter".to_string(),
            })?;

        Ok(serde_json::Value::String(message.to_string()))
    }
}
