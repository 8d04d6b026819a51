//! Remote job protocol: envelope types, job specs, and the API seam.
//!
//! A remote job is a unit of asynchronous work executed by an external
//! system and tracked by polling. The types here mirror the wire envelope
//! exactly; payload semantics (what a research result *means*) live in
//! `extract`/`materialize`, never in this module.

mod client;

pub use client::HttpRemoteJobClient;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::TransportError;
use crate::tools::ToolSchema;

/// Status of a remote job as reported by the polling endpoint.
///
/// `Unknown` absorbs unrecognized wire strings so a misbehaving remote
/// can never keep the poll loop alive forever; the poller treats it as a
/// synthesized failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    InProgress,
    RequiresAction,
    Succeeded,
    Failed,
    Cancelled,
    Expired,
    #[serde(other)]
    Unknown,
}

impl JobStatus {
    /// Whether no further transition can occur from this status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::Failed | Self::Cancelled | Self::Expired
        )
    }

    /// Whether the job is still pending remote execution.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Queued | Self::InProgress)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Queued => "queued",
            Self::InProgress => "in_progress",
            Self::RequiresAction => "requires_action",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
            Self::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// A side-channel tool call the remote job is blocked on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Opaque id the output must be keyed by.
    pub call_id: String,
    /// Registered tool name.
    pub tool_name: String,
    /// JSON arguments (scalar/sequence/mapping values only).
    #[serde(default)]
    pub arguments: serde_json::Value,
}

/// The answered form of one tool call, submitted back in a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallOutput {
    pub call_id: String,
    /// Serialized handler output, or an error placeholder. Always present:
    /// the remote treats a missing entry as a protocol violation.
    pub output: String,
}

/// Remote-reported job failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteJobError {
    #[serde(default)]
    pub code: Option<String>,
    pub message: String,
}

/// The canonical job handle, deserialized from the wire envelope.
///
/// Status transitions are driven exclusively by polling responses; this
/// crate never mutates a job's status locally.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteJob {
    pub id: String,
    pub status: JobStatus,
    /// Present only while `status == RequiresAction`.
    #[serde(default)]
    pub pending_tool_calls: Vec<ToolCallRequest>,
    /// Opaque raw payload, present only when `status == Succeeded`.
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    /// Present only when `status == Failed`.
    #[serde(default)]
    pub error: Option<RemoteJobError>,
}

/// One autofill field value (asset reference or literal text).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum AutofillField {
    Image { asset_id: String },
    Text { text: String },
}

/// Job-type-specific submission payload.
///
/// One poller serves every job type; the spec variant decides what the
/// submission body looks like and, later, how the raw result is consumed.
#[derive(Debug, Clone)]
pub enum JobSpec {
    /// Assistant-style research job that may pause for tool calls.
    Research {
        /// System instructions for the remote assistant.
        instructions: String,
        /// The research request itself.
        prompt: String,
        /// Schemas of the tools the job may call back into.
        tools: Vec<ToolSchema>,
    },
    /// Binary asset upload tracked as a job.
    AssetUpload {
        name: String,
        content_type: String,
        bytes: Vec<u8>,
    },
    /// Template autofill from a field-data mapping.
    Autofill {
        brand_template_id: String,
        title: String,
        /// BTreeMap keeps the serialized payload deterministic.
        data: BTreeMap<String, AutofillField>,
    },
}

impl JobSpec {
    /// Wire name of the job type, used in submission payloads and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Research { .. } => "research",
            Self::AssetUpload { .. } => "asset_upload",
            Self::Autofill { .. } => "autofill",
        }
    }
}

/// The transport seam to the remote job system.
///
/// All three calls are side-effecting network requests with no retry
/// logic of their own; retries are the poller's responsibility.
#[async_trait]
pub trait RemoteJobApi: Send + Sync {
    /// Create a job. Returns the initial envelope (id + status).
    async fn submit(&self, spec: &JobSpec) -> Result<RemoteJob, TransportError>;

    /// Fetch the current envelope for a job.
    async fn poll(&self, job_id: &str) -> Result<RemoteJob, TransportError>;

    /// Answer one `RequiresAction` snapshot with the full output batch.
    async fn submit_tool_outputs(
        &self,
        job_id: &str,
        outputs: &[ToolCallOutput],
    ) -> Result<RemoteJob, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(JobStatus::Succeeded.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
        assert!(JobStatus::Expired.is_terminal());
        assert!(!JobStatus::InProgress.is_terminal());
        assert!(!JobStatus::RequiresAction.is_terminal());
    }

    #[test]
    fn unknown_status_absorbs_new_wire_strings() {
        let job: RemoteJob = serde_json::from_value(serde_json::json!({
            "id": "job_1",
            "status": "paused_for_review"
        }))
        .unwrap();
        assert_eq!(job.status, JobStatus::Unknown);
    }

    #[test]
    fn envelope_defaults_are_empty() {
        let job: RemoteJob = serde_json::from_value(serde_json::json!({
            "id": "job_2",
            "status": "in_progress"
        }))
        .unwrap();
        assert!(job.pending_tool_calls.is_empty());
        assert!(job.result.is_none());
        assert!(job.error.is_none());
    }

    #[test]
    fn requires_action_envelope_parses_tool_calls() {
        let job: RemoteJob = serde_json::from_value(serde_json::json!({
            "id": "job_3",
            "status": "requires_action",
            "pending_tool_calls": [
                {"call_id": "call_1", "tool_name": "web_search", "arguments": {"query": "acme"}}
            ]
        }))
        .unwrap();
        assert_eq!(job.status, JobStatus::RequiresAction);
        assert_eq!(job.pending_tool_calls.len(), 1);
        assert_eq!(job.pending_tool_calls[0].tool_name, "web_search");
    }

    #[test]
    fn autofill_field_serializes_tagged() {
        let field = AutofillField::Text {
            text: "Launch plan".to_string(),
        };
        let v = serde_json::to_value(&field).unwrap();
        assert_eq!(v["type"], "text");
        assert_eq!(v["text"], "Launch plan");
    }
}
