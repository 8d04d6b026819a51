//! Persistent store abstraction.
//!
//! The store is the only shared mutable resource between concurrent
//! orchestrations. The engine reads business records (to build research
//! prompts) and writes competitor records; everything else about the
//! planner's schema belongs to other subsystems.

pub mod postgres;

pub use postgres::PgPlannerStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreError;
use crate::materialize::CompetitorDraft;

/// Reported growth direction of a competitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GrowthTrend {
    Steady,
    Decreasing,
    Increasing,
}

impl GrowthTrend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Steady => "Steady",
            Self::Decreasing => "Decreasing",
            Self::Increasing => "Increasing",
        }
    }
}

impl std::str::FromStr for GrowthTrend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Steady" => Ok(Self::Steady),
            "Decreasing" => Ok(Self::Decreasing),
            "Increasing" => Ok(Self::Increasing),
            other => Err(format!(
                "invalid growth trend '{}', expected Steady, Decreasing or Increasing",
                other
            )),
        }
    }
}

impl std::fmt::Display for GrowthTrend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A business record, read to build research prompts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Business {
    pub id: Uuid,
    pub name: String,
    pub industry: String,
    pub description: String,
}

/// A persisted competitor record.
///
/// Identity is the natural key `(business_id, name)`, not the row id:
/// re-materializing the same payload updates this record in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Competitor {
    pub id: Uuid,
    pub business_id: Uuid,
    pub name: String,
    pub industry: String,
    pub product: String,
    pub market_share: Decimal,
    pub website: String,
    pub customer_reviews: i32,
    pub growth_trend: GrowthTrend,
    /// Child collections; fully replaced, never merged, on update.
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Store surface consumed by the orchestration engine.
#[async_trait]
pub trait PlannerStore: Send + Sync {
    /// Fetch one business record.
    async fn get_business(&self, id: Uuid) -> Result<Option<Business>, StoreError>;

    /// Names of the competitors already recorded for a business.
    ///
    /// Fed into research prompts so the remote job doesn't redo work.
    async fn competitor_names(&self, business_id: Uuid) -> Result<Vec<String>, StoreError>;

    /// List all competitors recorded for a business.
    async fn list_competitors(&self, business_id: Uuid) -> Result<Vec<Competitor>, StoreError>;

    /// Upsert a batch of validated drafts inside one transaction.
    ///
    /// Lookup key is `(business_id, draft.name)`: on match the record's
    /// fields are overwritten and its child collections recreated from
    /// the draft; on no match a new record is inserted. Either the whole
    /// batch commits or none of it does.
    async fn upsert_competitors(
        &self,
        business_id: Uuid,
        drafts: &[CompetitorDraft],
    ) -> Result<Vec<Competitor>, StoreError>;
}
