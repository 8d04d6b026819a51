//! HTTP implementation of the remote job API.
//!
//! A thin transport adapter: it owns no job state, never retries, and
//! interprets nothing beyond the envelope fields. Configuration is
//! injected at construction; there is no shared global client.

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

use crate::config::RemoteApiConfig;
use crate::error::TransportError;
use crate::remote::{
    JobSpec, JobStatus, RemoteJob, RemoteJobApi, RemoteJobError, ToolCallOutput, ToolCallRequest,
};

/// Remote job API client over HTTP.
pub struct HttpRemoteJobClient {
    client: reqwest::Client,
    config: RemoteApiConfig,
}

impl HttpRemoteJobClient {
    /// Create a new client from explicit configuration.
    pub fn new(config: RemoteApiConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self { client, config }
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url, path.trim_start_matches('/'))
    }

    async fn read_envelope(
        &self,
        url: &str,
        response: reqwest::Response,
    ) -> Result<RemoteJob, TransportError> {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        tracing::debug!(url = %url, status = %status, "remote job API response");

        if !status.is_success() {
            return Err(TransportError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let envelope: JobEnvelope =
            serde_json::from_str(&body).map_err(|e| TransportError::InvalidEnvelope {
                url: url.to_string(),
                reason: format!("JSON parse error: {}. Raw: {}", e, body),
            })?;

        Ok(envelope.job.into())
    }

    async fn send(
        &self,
        url: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<RemoteJob, TransportError> {
        let response = request
            .header("Authorization", format!("Bearer {}", self.config.api_key()))
            .send()
            .await
            .map_err(|e| {
                tracing::error!(url = %url, "remote job API request failed: {}", e);
                TransportError::RequestFailed {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            })?;

        self.read_envelope(url, response).await
    }
}

#[async_trait]
impl RemoteJobApi for HttpRemoteJobClient {
    async fn submit(&self, spec: &JobSpec) -> Result<RemoteJob, TransportError> {
        let url = self.api_url("jobs");

        let request = match spec {
            JobSpec::Research {
                instructions,
                prompt,
                tools,
            } => self.client.post(&url).json(&SubmitBody::Research {
                instructions,
                prompt,
                tools,
            }),
            JobSpec::Autofill {
                brand_template_id,
                title,
                data,
            } => self.client.post(&url).json(&SubmitBody::Autofill {
                brand_template_id,
                title,
                data,
            }),
            JobSpec::AssetUpload {
                name,
                content_type,
                bytes,
            } => self
                .client
                .post(&url)
                .header("Content-Type", content_type.as_str())
                .header("Asset-Upload-Metadata", BASE64.encode(name))
                .body(bytes.clone()),
        };

        tracing::info!(kind = spec.kind(), "submitting remote job");
        self.send(&url, request).await
    }

    async fn poll(&self, job_id: &str) -> Result<RemoteJob, TransportError> {
        let url = self.api_url(&format!("jobs/{}", job_id));
        self.send(&url, self.client.get(&url)).await
    }

    async fn submit_tool_outputs(
        &self,
        job_id: &str,
        outputs: &[ToolCallOutput],
    ) -> Result<RemoteJob, TransportError> {
        let url = self.api_url(&format!("jobs/{}/tool-outputs", job_id));
        let body = ToolOutputsBody {
            tool_outputs: outputs
                .iter()
                .map(|o| WireToolOutput {
                    tool_call_id: &o.call_id,
                    output: &o.output,
                })
                .collect(),
        };
        self.send(&url, self.client.post(&url).json(&body)).await
    }
}

// Wire types for the remote job API.

#[derive(Serialize)]
#[serde(rename_all = "snake_case", tag = "type")]
enum SubmitBody<'a> {
    Research {
        instructions: &'a str,
        prompt: &'a str,
        tools: &'a [crate::tools::ToolSchema],
    },
    Autofill {
        brand_template_id: &'a str,
        title: &'a str,
        data: &'a std::collections::BTreeMap<String, crate::remote::AutofillField>,
    },
}

#[derive(Serialize)]
struct ToolOutputsBody<'a> {
    tool_outputs: Vec<WireToolOutput<'a>>,
}

#[derive(Serialize)]
struct WireToolOutput<'a> {
    tool_call_id: &'a str,
    output: &'a str,
}

#[derive(Deserialize)]
struct JobEnvelope {
    job: WireJob,
}

#[derive(Deserialize)]
struct WireJob {
    id: String,
    status: JobStatus,
    #[serde(default)]
    required_action: Option<WireRequiredAction>,
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<RemoteJobError>,
}

#[derive(Deserialize)]
struct WireRequiredAction {
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Deserialize)]
struct WireToolCall {
    id: String,
    name: String,
    /// Either a JSON object or a JSON-encoded string of one.
    #[serde(default)]
    arguments: serde_json::Value,
}

impl From<WireJob> for RemoteJob {
    fn from(job: WireJob) -> Self {
        let pending_tool_calls = job
            .required_action
            .map(|ra| {
                ra.tool_calls
                    .into_iter()
                    .map(|tc| ToolCallRequest {
                        call_id: tc.id,
                        tool_name: tc.name,
                        arguments: decode_arguments(tc.arguments),
                    })
                    .collect()
            })
            .unwrap_or_default();

        RemoteJob {
            id: job.id,
            status: job.status,
            pending_tool_calls,
            result: job.result,
            error: job.error,
        }
    }
}

/// Tool-call arguments arrive either as an object or as a JSON-encoded
/// string of one; normalize to the object form.
fn decode_arguments(raw: serde_json::Value) -> serde_json::Value {
    match raw {
        serde_json::Value::String(s) => {
            serde_json::from_str(&s).unwrap_or(serde_json::Value::Object(Default::default()))
        }
        serde_json::Value::Null => serde_json::Value::Object(Default::default()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_job_converts_required_action() {
        let wire: WireJob = serde_json::from_value(serde_json::json!({
            "id": "job_9",
            "status": "requires_action",
            "required_action": {
                "tool_calls": [
                    {"id": "call_1", "name": "web_search", "arguments": {"query": "acme"}}
                ]
            }
        }))
        .unwrap();

        let job: RemoteJob = wire.into();
        assert_eq!(job.pending_tool_calls.len(), 1);
        assert_eq!(job.pending_tool_calls[0].call_id, "call_1");
        assert_eq!(job.pending_tool_calls[0].arguments["query"], "acme");
    }

    #[test]
    fn string_encoded_arguments_are_decoded() {
        let args = decode_arguments(serde_json::Value::String(
            "{\"query\": \"acme\", \"recent_days\": 7}".to_string(),
        ));
        assert_eq!(args["query"], "acme");
        assert_eq!(args["recent_days"], 7);
    }

    #[test]
    fn unparseable_string_arguments_become_empty_object() {
        let args = decode_arguments(serde_json::Value::String("not json".to_string()));
        assert_eq!(args, serde_json::json!({}));
    }

    #[test]
    fn research_submit_body_is_tagged() {
        let body = SubmitBody::Research {
            instructions: "find competitors",
            prompt: "Business: Acme",
            tools: &[],
        };
        let v = serde_json::to_value(&body).unwrap();
        assert_eq!(v["type"], "research");
        assert_eq!(v["prompt"], "Business: Acme");
    }

    #[test]
    fn envelope_parses_succeeded_job() {
        let envelope: JobEnvelope = serde_json::from_str(
            r#"{"job": {"id": "job_3", "status": "succeeded", "result": [{"name": "X"}]}}"#,
        )
        .unwrap();
        let job: RemoteJob = envelope.job.into();
        assert_eq!(job.status, JobStatus::Succeeded);
        assert_eq!(job.result.unwrap()[0]["name"], "X");
    }
}
