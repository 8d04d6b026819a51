//! The per-job poll loop.
//!
//! Drives one remote job from submission to a terminal state:
//! submit → poll-with-backoff → (dispatch tool calls) → poll → terminal.
//! Exponential backoff bounds remote polling load while still resolving
//! fast jobs quickly; the attempt cap (rather than wall-clock time) keeps
//! the loop deterministic. Tool dispatch never consumes an attempt; it
//! is forward progress, not idling.

use std::sync::Arc;
use std::time::Duration;

use crate::cancel::CancelToken;
use crate::config::PollConfig;
use crate::error::PollError;
use crate::remote::{JobSpec, JobStatus, RemoteJobApi};
use crate::tools::ToolRegistry;

/// Backoff delay for a 0-based attempt index: `initial * 2^attempt`.
pub(crate) fn backoff_delay(initial: Duration, attempt: u32) -> Duration {
    initial.saturating_mul(2u32.saturating_pow(attempt))
}

/// Drives the state machine for one job at a time.
///
/// Holds no per-job state; any number of jobs may be polled concurrently
/// through the same poller.
pub struct JobPoller {
    api: Arc<dyn RemoteJobApi>,
    tools: Arc<ToolRegistry>,
    config: PollConfig,
}

impl JobPoller {
    pub fn new(api: Arc<dyn RemoteJobApi>, tools: Arc<ToolRegistry>, config: PollConfig) -> Self {
        Self { api, tools, config }
    }

    /// Submit a job and poll it to a terminal state.
    ///
    /// Returns the raw result payload of a succeeded job. Cancellation is
    /// observed before every network call and during every backoff sleep.
    pub async fn run(
        &self,
        spec: &JobSpec,
        cancel: &CancelToken,
    ) -> Result<serde_json::Value, PollError> {
        if cancel.is_cancelled() {
            return Err(PollError::Cancelled {
                job_id: spec.kind().to_string(),
            });
        }

        let submitted = self.api.submit(spec).await?;
        let job_id = submitted.id.clone();
        tracing::info!(job_id = %job_id, kind = spec.kind(), "remote job submitted");

        let mut attempt: u32 = 0;

        while attempt < self.config.max_attempts {
            if cancel.is_cancelled() {
                return Err(PollError::Cancelled { job_id });
            }

            let job = match self.api.poll(&job_id).await {
                Ok(job) => job,
                Err(e) => {
                    tracing::warn!(job_id = %job_id, attempt, "poll failed: {}", e);
                    let delay = backoff_delay(self.config.initial_delay, attempt);
                    attempt += 1;
                    if attempt >= self.config.max_attempts {
                        return Err(e.into());
                    }
                    self.sleep_or_cancel(delay, &job_id, cancel).await?;
                    continue;
                }
            };

            match job.status {
                JobStatus::Succeeded => {
                    tracing::info!(job_id = %job_id, attempt, "remote job succeeded");
                    return Ok(job.result.unwrap_or(serde_json::Value::Null));
                }
                JobStatus::Failed | JobStatus::Cancelled | JobStatus::Expired => {
                    let message = job
                        .error
                        .map(|e| e.message)
                        .unwrap_or_else(|| format!("job ended in {} with no error detail", job.status));
                    tracing::error!(job_id = %job_id, status = %job.status, "remote job failed: {}", message);
                    return Err(PollError::RemoteFailed {
                        job_id,
                        status: job.status.to_string(),
                        message,
                    });
                }
                JobStatus::Unknown => {
                    // An unrecognized status string must not keep the loop alive.
                    return Err(PollError::RemoteFailed {
                        job_id,
                        status: "unknown".to_string(),
                        message: "remote reported an unrecognized job status".to_string(),
                    });
                }
                JobStatus::RequiresAction => {
                    if job.pending_tool_calls.is_empty() {
                        return Err(PollError::Protocol {
                            job_id,
                            reason: "requires_action with no pending tool calls".to_string(),
                        });
                    }

                    tracing::info!(
                        job_id = %job_id,
                        calls = job.pending_tool_calls.len(),
                        "dispatching tool calls"
                    );
                    let outputs = self.tools.dispatch_batch(&job.pending_tool_calls).await;

                    if cancel.is_cancelled() {
                        return Err(PollError::Cancelled { job_id });
                    }
                    // One batch per snapshot; a lost batch cannot be safely
                    // replayed, so this call is never retried.
                    self.api.submit_tool_outputs(&job_id, &outputs).await?;
                    // Forward progress: no attempt increment, no sleep.
                }
                JobStatus::Queued | JobStatus::InProgress => {
                    let delay = backoff_delay(self.config.initial_delay, attempt);
                    attempt += 1;
                    tracing::debug!(
                        job_id = %job_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "job pending, backing off"
                    );
                    self.sleep_or_cancel(delay, &job_id, cancel).await?;
                }
            }
        }

        Err(PollError::Timeout {
            job_id,
            attempts: attempt,
        })
    }

    async fn sleep_or_cancel(
        &self,
        delay: Duration,
        job_id: &str,
        cancel: &CancelToken,
    ) -> Result<(), PollError> {
        tokio::select! {
            _ = tokio::time::sleep(delay) => Ok(()),
            _ = cancel.cancelled() => Err(PollError::Cancelled {
                job_id: job_id.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::remote::{RemoteJob, RemoteJobError, ToolCallRequest};
    use crate::testing::ScriptedRemoteApi;
    use crate::tools::EchoTool;

    fn poller(api: Arc<ScriptedRemoteApi>, config: PollConfig) -> (JobPoller, Arc<ToolRegistry>) {
        let tools = Arc::new(ToolRegistry::new());
        (JobPoller::new(api, tools.clone(), config), tools)
    }

    fn fast_config(max_attempts: u32) -> PollConfig {
        PollConfig {
            max_attempts,
            initial_delay: Duration::from_millis(10),
            tool_timeout: Duration::from_secs(1),
        }
    }

    fn spec() -> JobSpec {
        JobSpec::Research {
            instructions: "find competitors".to_string(),
            prompt: "Business: Acme".to_string(),
            tools: Vec::new(),
        }
    }

    #[test]
    fn backoff_delays_double_per_attempt() {
        let initial = Duration::from_secs(1);
        let delays: Vec<u64> = (0..5)
            .map(|a| backoff_delay(initial, a).as_secs())
            .collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16]);
    }

    #[tokio::test(start_paused = true)]
    async fn succeeded_returns_raw_result_and_stops_polling() {
        let api = Arc::new(ScriptedRemoteApi::new("job_1"));
        api.push_status(JobStatus::InProgress);
        api.push_status(JobStatus::InProgress);
        api.push_result(serde_json::json!([{"name": "Acme"}]));

        let (poller, _) = poller(api.clone(), fast_config(10));
        let result = poller.run(&spec(), &CancelToken::never()).await.unwrap();

        assert_eq!(result, serde_json::json!([{"name": "Acme"}]));
        assert_eq!(api.polls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_yields_timeout_with_exact_poll_count() {
        // Script nothing: the API reports InProgress forever.
        let api = Arc::new(ScriptedRemoteApi::new("job_2"));
        let (poller, _) = poller(api.clone(), fast_config(4));

        let err = poller.run(&spec(), &CancelToken::never()).await.unwrap_err();

        match err {
            PollError::Timeout { job_id, attempts } => {
                assert_eq!(job_id, "job_2");
                assert_eq!(attempts, 4);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
        assert_eq!(api.polls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn requires_action_submits_one_batch_with_all_call_ids() {
        let api = Arc::new(ScriptedRemoteApi::new("job_3"));
        api.push_envelope(RemoteJob {
            id: "job_3".to_string(),
            status: JobStatus::RequiresAction,
            pending_tool_calls: vec![
                ToolCallRequest {
                    call_id: "call_a".to_string(),
                    tool_name: "echo".to_string(),
                    arguments: serde_json::json!({"message": "one"}),
                },
                ToolCallRequest {
                    call_id: "call_b".to_string(),
                    tool_name: "echo".to_string(),
                    arguments: serde_json::json!({"message": "two"}),
                },
            ],
            result: None,
            error: None,
        });
        api.push_result(serde_json::json!({"ok": true}));

        let (poller, tools) = poller(api.clone(), fast_config(10));
        tools.register(Arc::new(EchoTool)).await;

        poller.run(&spec(), &CancelToken::never()).await.unwrap();

        let batches = api.tool_output_batches();
        assert_eq!(batches.len(), 1);
        let ids: Vec<&str> = batches[0].iter().map(|o| o.call_id.as_str()).collect();
        assert_eq!(ids, vec!["call_a", "call_b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn tool_dispatch_does_not_consume_attempts() {
        let api = Arc::new(ScriptedRemoteApi::new("job_4"));
        // max_attempts = 1, but a requires_action round intervenes; the
        // poller must still reach the succeeded poll.
        api.push_envelope(RemoteJob {
            id: "job_4".to_string(),
            status: JobStatus::RequiresAction,
            pending_tool_calls: vec![ToolCallRequest {
                call_id: "call_1".to_string(),
                tool_name: "echo".to_string(),
                arguments: serde_json::json!({"message": "x"}),
            }],
            result: None,
            error: None,
        });
        api.push_result(serde_json::json!("done"));

        let (poller, tools) = poller(api.clone(), fast_config(1));
        tools.register(Arc::new(EchoTool)).await;

        let result = poller.run(&spec(), &CancelToken::never()).await.unwrap();
        assert_eq!(result, serde_json::json!("done"));
    }

    #[tokio::test(start_paused = true)]
    async fn requires_action_with_no_calls_fails_fast() {
        let api = Arc::new(ScriptedRemoteApi::new("job_5"));
        api.push_status(JobStatus::RequiresAction);

        let (poller, _) = poller(api.clone(), fast_config(10));
        let err = poller.run(&spec(), &CancelToken::never()).await.unwrap_err();

        assert!(matches!(err, PollError::Protocol { .. }));
        assert_eq!(api.polls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn remote_failure_carries_remote_message() {
        let api = Arc::new(ScriptedRemoteApi::new("job_6"));
        api.push_envelope(RemoteJob {
            id: "job_6".to_string(),
            status: JobStatus::Failed,
            pending_tool_calls: Vec::new(),
            result: None,
            error: Some(RemoteJobError {
                code: Some("quota".to_string()),
                message: "quota exhausted".to_string(),
            }),
        });

        let (poller, _) = poller(api, fast_config(10));
        let err = poller.run(&spec(), &CancelToken::never()).await.unwrap_err();

        match err {
            PollError::RemoteFailed { status, message, .. } => {
                assert_eq!(status, "failed");
                assert_eq!(message, "quota exhausted");
            }
            other => panic!("expected remote failure, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_without_error_detail_synthesizes_message() {
        let api = Arc::new(ScriptedRemoteApi::new("job_7"));
        api.push_status(JobStatus::Expired);

        let (poller, _) = poller(api, fast_config(10));
        let err = poller.run(&spec(), &CancelToken::never()).await.unwrap_err();

        match err {
            PollError::RemoteFailed { message, .. } => {
                assert!(message.contains("expired"));
            }
            other => panic!("expected remote failure, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn unrecognized_status_fails_instead_of_looping() {
        let api = Arc::new(ScriptedRemoteApi::new("job_8"));
        api.push_status(JobStatus::Unknown);

        let (poller, _) = poller(api.clone(), fast_config(10));
        let err = poller.run(&spec(), &CancelToken::never()).await.unwrap_err();

        assert!(matches!(err, PollError::RemoteFailed { status, .. } if status == "unknown"));
        assert_eq!(api.polls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_surfaces_as_cancelled_during_backoff() {
        let api = Arc::new(ScriptedRemoteApi::new("job_9"));
        let (poller, _) = poller(api, fast_config(10));

        let (handle, token) = CancelToken::pair();
        let run = tokio::spawn({
            let spec = spec();
            async move {
                let p = poller;
                p.run(&spec, &token).await
            }
        });

        // Let the first poll land and the loop enter its backoff sleep.
        tokio::task::yield_now().await;
        handle.cancel();

        let err = run.await.unwrap().unwrap_err();
        assert!(matches!(err, PollError::Cancelled { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn transport_errors_are_retried_at_attempt_granularity() {
        let api = Arc::new(ScriptedRemoteApi::new("job_10"));
        api.push_transport_error("connection reset");
        api.push_result(serde_json::json!("recovered"));

        let (poller, _) = poller(api.clone(), fast_config(10));
        let result = poller.run(&spec(), &CancelToken::never()).await.unwrap();

        assert_eq!(result, serde_json::json!("recovered"));
        assert_eq!(api.polls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn persistent_transport_failure_returns_transport_error() {
        let api = Arc::new(ScriptedRemoteApi::new("job_11"));
        for _ in 0..3 {
            api.push_transport_error("connection reset");
        }

        let (poller, _) = poller(api.clone(), fast_config(3));
        let err = poller.run(&spec(), &CancelToken::never()).await.unwrap_err();

        assert!(matches!(err, PollError::Transport(_)));
        assert_eq!(api.polls(), 3);
    }
}
