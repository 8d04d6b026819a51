//! Orchestration facade: the entry points consumers call.
//!
//! One method per job type. Each builds a job spec from caller input,
//! enriches it with whatever context the remote system needs, drives the
//! poll loop, and routes the raw result through extraction and (for
//! research) materialization. Every failure mode comes back as a typed
//! [`OrchestrationError`]; nothing raises past this boundary.
//!
//! Calls are synchronous from the caller's perspective (they block until
//! the job reaches a terminal state) but suspend at every sleep and
//! network call, so concurrent orchestrations make independent progress.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use uuid::Uuid;

use crate::cancel::CancelToken;
use crate::config::Config;
use crate::error::{ExtractError, OrchestrationError, StoreError};
use crate::extract;
use crate::materialize::{MaterializeOutcome, Materializer};
use crate::poller::JobPoller;
use crate::remote::{AutofillField, HttpRemoteJobClient, JobSpec, RemoteJobApi};
use crate::store::{Business, PgPlannerStore, PlannerStore};
use crate::tools::{ToolRegistry, WebSearchTool};

/// Instructions given to the research job.
///
/// The schema contract here is what the materializer validates against;
/// the two must move together.
const RESEARCH_INSTRUCTIONS: &str = r#"You are an excellent researcher that researches competitors for a business.
Your task is to find and analyze competitors based on the given business information.
Return the results as a JSON array of competitor objects with the following structure:

[
    {
        "name": "Competitor Name",
        "industry": "Industry (max 30 characters)",
        "product": "Main Product (max 50 characters)",
        "market_share": 0.0 (decimal between 0 and 100, with 2 decimal places),
        "strengths": [
            {"description": "Strength 1 (max 100 characters)"},
            {"description": "Strength 2 (max 100 characters)"}
        ],
        "weaknesses": [
            {"description": "Weakness 1 (max 100 characters)"},
            {"description": "Weakness 2 (max 100 characters)"}
        ],
        "website": "https://example.com",
        "customer_reviews": 0 (positive integer out of 5 stars),
        "growth_trend": "Steady" or "Decreasing" or "Increasing"
    },
    ...
]

Remember only return the JSON, nothing else, and return 3 competitors in each response."#;

/// An uploaded remote asset, parsed from the job result.
#[derive(Debug, Clone, Deserialize)]
pub struct Asset {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Deserialize)]
struct AssetEnvelope {
    asset: Asset,
}

/// The public entry point wiring client, poller, extractor and
/// materializer together per job type.
pub struct Orchestrator {
    poller: JobPoller,
    tools: Arc<ToolRegistry>,
    store: Arc<dyn PlannerStore>,
    materializer: Materializer,
}

impl Orchestrator {
    /// Wire an orchestrator from explicit parts.
    pub fn new(
        api: Arc<dyn RemoteJobApi>,
        tools: Arc<ToolRegistry>,
        store: Arc<dyn PlannerStore>,
        poll: crate::config::PollConfig,
    ) -> Self {
        Self {
            poller: JobPoller::new(api, tools.clone(), poll),
            tools,
            store: store.clone(),
            materializer: Materializer::new(store),
        }
    }

    /// Build a production orchestrator from configuration: HTTP client,
    /// Postgres store, and a registry carrying the web-search tool.
    pub async fn connect(config: &Config) -> Result<Self, OrchestrationError> {
        let api: Arc<dyn RemoteJobApi> =
            Arc::new(HttpRemoteJobClient::new(config.remote.clone()));

        let tools = Arc::new(ToolRegistry::with_timeout(config.poll.tool_timeout));
        tools
            .register(Arc::new(WebSearchTool::new(config.search.clone())))
            .await;

        let store: Arc<dyn PlannerStore> = Arc::new(PgPlannerStore::new(&config.database).await?);

        Ok(Self::new(api, tools, store, config.poll.clone()))
    }

    /// Research new competitors for a business and persist them.
    ///
    /// Existing competitor names are folded into the prompt so the remote
    /// job doesn't rediscover them. Returns the persisted records plus
    /// any per-item validation rejections.
    pub async fn research_competitors(
        &self,
        business_id: Uuid,
        cancel: &CancelToken,
    ) -> Result<MaterializeOutcome, OrchestrationError> {
        let business = self
            .store
            .get_business(business_id)
            .await?
            .ok_or(StoreError::NotFound {
                entity: "business".to_string(),
                id: business_id,
            })?;
        let existing = self.store.competitor_names(business_id).await?;

        let spec = JobSpec::Research {
            instructions: RESEARCH_INSTRUCTIONS.to_string(),
            prompt: research_prompt(&business, &existing),
            tools: self.tools.schemas().await,
        };

        let raw = self.poller.run(&spec, cancel).await?;
        let items = extract::extract_items(&raw)?;
        let outcome = self.materializer.materialize(business_id, &items).await?;

        tracing::info!(
            business = %business.name,
            persisted = outcome.persisted.len(),
            "competitor research complete"
        );
        Ok(outcome)
    }

    /// Upload a local file as a remote asset.
    pub async fn upload_asset(
        &self,
        path: &Path,
        name: &str,
        cancel: &CancelToken,
    ) -> Result<Asset, OrchestrationError> {
        let bytes =
            tokio::fs::read(path)
                .await
                .map_err(|e| OrchestrationError::AssetRead {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                })?;
        let content_type = mime_guess::from_path(path).first_or_octet_stream().to_string();

        let spec = JobSpec::AssetUpload {
            name: name.to_string(),
            content_type,
            bytes,
        };

        let raw = self.poller.run(&spec, cancel).await?;
        let value = extract::extract_value(&raw)?;
        let envelope: AssetEnvelope =
            serde_json::from_value(value.clone()).map_err(|e| ExtractError::MalformedPayload {
                reason: format!("asset envelope: {}", e),
                excerpt: value.to_string().chars().take(120).collect(),
            })?;

        tracing::info!(asset_id = %envelope.asset.id, "asset upload complete");
        Ok(envelope.asset)
    }

    /// Autofill a brand template and return the completed job result.
    pub async fn autofill_template(
        &self,
        brand_template_id: &str,
        title: &str,
        data: BTreeMap<String, AutofillField>,
        cancel: &CancelToken,
    ) -> Result<serde_json::Value, OrchestrationError> {
        let spec = JobSpec::Autofill {
            brand_template_id: brand_template_id.to_string(),
            title: title.to_string(),
            data,
        };

        let raw = self.poller.run(&spec, cancel).await?;
        Ok(extract::extract_value(&raw)?)
    }
}

fn research_prompt(business: &Business, existing: &[String]) -> String {
    format!(
        "Research new competitors for the following business that are not the existing competitors:\n\
         Name: {}\n\
         Industry: {}\n\
         Description: {}\n\
         Existing Competitors: {}",
        business.name,
        business.industry,
        business.description,
        existing.join(", ")
    )
}
