//! Test harness: scripted fakes for the remote API, store, and tools.
//!
//! Provides:
//! - [`ScriptedRemoteApi`]: a remote job API that replays a scripted
//!   status sequence and records everything submitted to it
//! - [`MemoryPlannerStore`]: an in-memory store with upsert semantics
//!   and a failure toggle
//! - [`StaticTool`]: a tool returning a fixed response, with call counting
//!
//! Use these instead of ad-hoc stub implementations.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::error::{StoreError, ToolError, TransportError};
use crate::materialize::CompetitorDraft;
use crate::remote::{
    JobSpec, JobStatus, RemoteJob, RemoteJobApi, ToolCallOutput,
};
use crate::store::{Business, Competitor, PlannerStore};
use crate::tools::Tool;

enum ScriptedPoll {
    Job(RemoteJob),
    Transport(String),
}

/// A remote job API that replays a scripted poll sequence.
///
/// When the script runs dry the job reports `InProgress` forever, which
/// makes timeout scenarios trivial to express: script nothing.
pub struct ScriptedRemoteApi {
    job_id: String,
    script: Mutex<VecDeque<ScriptedPoll>>,
    polls: AtomicU32,
    fail_submit: AtomicBool,
    submissions: Mutex<Vec<JobSpec>>,
    batches: Mutex<Vec<Vec<ToolCallOutput>>>,
}

impl ScriptedRemoteApi {
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            script: Mutex::new(VecDeque::new()),
            polls: AtomicU32::new(0),
            fail_submit: AtomicBool::new(false),
            submissions: Mutex::new(Vec::new()),
            batches: Mutex::new(Vec::new()),
        }
    }

    fn bare_job(&self, status: JobStatus) -> RemoteJob {
        RemoteJob {
            id: self.job_id.clone(),
            status,
            pending_tool_calls: Vec::new(),
            result: None,
            error: None,
        }
    }

    /// Script a poll response with the given status and nothing else.
    pub fn push_status(&self, status: JobStatus) {
        self.script
            .lock()
            .unwrap()
            .push_back(ScriptedPoll::Job(self.bare_job(status)));
    }

    /// Script a successful poll carrying a raw result payload.
    pub fn push_result(&self, result: serde_json::Value) {
        let mut job = self.bare_job(JobStatus::Succeeded);
        job.result = Some(result);
        self.script
            .lock()
            .unwrap()
            .push_back(ScriptedPoll::Job(job));
    }

    /// Script a full envelope.
    pub fn push_envelope(&self, job: RemoteJob) {
        self.script
            .lock()
            .unwrap()
            .push_back(ScriptedPoll::Job(job));
    }

    /// Script a poll-level transport failure.
    pub fn push_transport_error(&self, reason: impl Into<String>) {
        self.script
            .lock()
            .unwrap()
            .push_back(ScriptedPoll::Transport(reason.into()));
    }

    /// Make the next submission fail with a transport error.
    pub fn fail_submit(&self) {
        self.fail_submit.store(true, Ordering::Relaxed);
    }

    /// Number of poll calls observed.
    pub fn polls(&self) -> u32 {
        self.polls.load(Ordering::Relaxed)
    }

    /// Every job spec submitted, in order.
    pub fn submissions(&self) -> Vec<JobSpec> {
        self.submissions.lock().unwrap().clone()
    }

    /// Every tool-output batch submitted, in order.
    pub fn tool_output_batches(&self) -> Vec<Vec<ToolCallOutput>> {
        self.batches.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteJobApi for ScriptedRemoteApi {
    async fn submit(&self, spec: &JobSpec) -> Result<RemoteJob, TransportError> {
        if self.fail_submit.swap(false, Ordering::Relaxed) {
            return Err(TransportError::RequestFailed {
                url: "scripted://jobs".to_string(),
                reason: "scripted submit failure".to_string(),
            });
        }
        self.submissions.lock().unwrap().push(spec.clone());
        Ok(self.bare_job(JobStatus::Queued))
    }

    async fn poll(&self, _job_id: &str) -> Result<RemoteJob, TransportError> {
        self.polls.fetch_add(1, Ordering::Relaxed);
        match self.script.lock().unwrap().pop_front() {
            Some(ScriptedPoll::Job(job)) => Ok(job),
            Some(ScriptedPoll::Transport(reason)) => Err(TransportError::RequestFailed {
                url: "scripted://jobs".to_string(),
                reason,
            }),
            None => Ok(self.bare_job(JobStatus::InProgress)),
        }
    }

    async fn submit_tool_outputs(
        &self,
        _job_id: &str,
        outputs: &[ToolCallOutput],
    ) -> Result<RemoteJob, TransportError> {
        self.batches.lock().unwrap().push(outputs.to_vec());
        Ok(self.bare_job(JobStatus::InProgress))
    }
}

/// In-memory planner store with real upsert semantics.
pub struct MemoryPlannerStore {
    businesses: Mutex<HashMap<Uuid, Business>>,
    competitors: Mutex<HashMap<(Uuid, String), Competitor>>,
    fail_next_upsert: AtomicBool,
}

impl MemoryPlannerStore {
    pub fn new() -> Self {
        Self {
            businesses: Mutex::new(HashMap::new()),
            competitors: Mutex::new(HashMap::new()),
            fail_next_upsert: AtomicBool::new(false),
        }
    }

    /// Seed a business record.
    pub fn insert_business(&self, business: Business) {
        self.businesses
            .lock()
            .unwrap()
            .insert(business.id, business);
    }

    /// Make the next upsert batch fail, leaving the store untouched.
    pub fn fail_next_upsert(&self) {
        self.fail_next_upsert.store(true, Ordering::Relaxed);
    }
}

impl Default for MemoryPlannerStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlannerStore for MemoryPlannerStore {
    async fn get_business(&self, id: Uuid) -> Result<Option<Business>, StoreError> {
        Ok(self.businesses.lock().unwrap().get(&id).cloned())
    }

    async fn competitor_names(&self, business_id: Uuid) -> Result<Vec<String>, StoreError> {
        let mut names: Vec<String> = self
            .competitors
            .lock()
            .unwrap()
            .keys()
            .filter(|(b, _)| *b == business_id)
            .map(|(_, name)| name.clone())
            .collect();
        names.sort();
        Ok(names)
    }

    async fn list_competitors(&self, business_id: Uuid) -> Result<Vec<Competitor>, StoreError> {
        let mut all: Vec<Competitor> = self
            .competitors
            .lock()
            .unwrap()
            .values()
            .filter(|c| c.business_id == business_id)
            .cloned()
            .collect();
        all.sort_by(|a, b| (a.created_at, &a.name).cmp(&(b.created_at, &b.name)));
        Ok(all)
    }

    async fn upsert_competitors(
        &self,
        business_id: Uuid,
        drafts: &[CompetitorDraft],
    ) -> Result<Vec<Competitor>, StoreError> {
        if self.fail_next_upsert.swap(false, Ordering::Relaxed) {
            return Err(StoreError::Query("scripted store failure".to_string()));
        }

        let mut table = self.competitors.lock().unwrap();
        let mut persisted = Vec::with_capacity(drafts.len());

        for draft in drafts {
            let key = (business_id, draft.name.clone());
            let now = Utc::now();

            let record = match table.get(&key) {
                Some(existing) => Competitor {
                    id: existing.id,
                    business_id,
                    name: draft.name.clone(),
                    industry: draft.industry.clone(),
                    product: draft.product.clone(),
                    market_share: draft.market_share,
                    website: draft.website.clone(),
                    customer_reviews: draft.customer_reviews,
                    growth_trend: draft.growth_trend,
                    strengths: draft.strengths.clone(),
                    weaknesses: draft.weaknesses.clone(),
                    created_at: existing.created_at,
                    updated_at: now,
                },
                None => Competitor {
                    id: Uuid::new_v4(),
                    business_id,
                    name: draft.name.clone(),
                    industry: draft.industry.clone(),
                    product: draft.product.clone(),
                    market_share: draft.market_share,
                    website: draft.website.clone(),
                    customer_reviews: draft.customer_reviews,
                    growth_trend: draft.growth_trend,
                    strengths: draft.strengths.clone(),
                    weaknesses: draft.weaknesses.clone(),
                    created_at: now,
                    updated_at: now,
                },
            };

            table.insert(key, record.clone());
            persisted.push(record);
        }

        Ok(persisted)
    }
}

/// A tool that returns a fixed response and counts its calls.
pub struct StaticTool {
    name: String,
    response: serde_json::Value,
    calls: AtomicU32,
}

impl StaticTool {
    pub fn new(name: impl Into<String>, response: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            response,
            calls: AtomicU32::new(0),
        }
    }

    /// Number of times the tool was executed.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Tool for StaticTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Returns a fixed response. For tests."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, _arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Ok(self.response.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_api_replays_in_order() {
        let api = ScriptedRemoteApi::new("job_t");
        api.push_status(JobStatus::InProgress);
        api.push_result(serde_json::json!("done"));

        assert_eq!(api.poll("job_t").await.unwrap().status, JobStatus::InProgress);
        let succeeded = api.poll("job_t").await.unwrap();
        assert_eq!(succeeded.status, JobStatus::Succeeded);
        assert_eq!(succeeded.result.unwrap(), serde_json::json!("done"));
        // Dry script: pending forever.
        assert_eq!(api.poll("job_t").await.unwrap().status, JobStatus::InProgress);
        assert_eq!(api.polls(), 3);
    }

    #[tokio::test]
    async fn memory_store_upserts_by_natural_key() {
        let store = MemoryPlannerStore::new();
        let business_id = Uuid::new_v4();
        let draft = CompetitorDraft {
            name: "Acme".to_string(),
            industry: "Logistics".to_string(),
            product: "Freight".to_string(),
            market_share: rust_decimal::Decimal::new(10, 0),
            website: "https://acme.example".to_string(),
            customer_reviews: 4,
            growth_trend: crate::store::GrowthTrend::Steady,
            strengths: vec!["scale".to_string()],
            weaknesses: vec![],
        };

        let first = store.upsert_competitors(business_id, &[draft.clone()]).await.unwrap();
        let second = store.upsert_competitors(business_id, &[draft]).await.unwrap();

        assert_eq!(first[0].id, second[0].id);
        assert_eq!(store.list_competitors(business_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn static_tool_counts_calls() {
        let tool = StaticTool::new("probe", serde_json::json!({"ok": true}));
        tool.execute(serde_json::json!({})).await.unwrap();
        tool.execute(serde_json::json!({})).await.unwrap();
        assert_eq!(tool.calls(), 2);
    }
}
