//! Result materialization.
//!
//! Turns the parsed payload of a research job into persisted competitor
//! records. Each item is validated independently: a bad item is logged,
//! reported, and skipped without touching its siblings, while the valid
//! remainder is upserted in one store transaction. Re-running with an
//! identical payload updates records in place; it never duplicates them.

use std::sync::Arc;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::{StoreError, ValidationError};
use crate::store::{Competitor, GrowthTrend, PlannerStore};

const INDUSTRY_MAX: usize = 30;
const PRODUCT_MAX: usize = 50;
const DESCRIPTION_MAX: usize = 100;
const REVIEWS_MAX: i64 = 5;

/// A validated competitor item, ready for upsert.
#[derive(Debug, Clone, PartialEq)]
pub struct CompetitorDraft {
    pub name: String,
    pub industry: String,
    pub product: String,
    pub market_share: Decimal,
    pub website: String,
    pub customer_reviews: i32,
    pub growth_trend: GrowthTrend,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
}

impl CompetitorDraft {
    /// Validate one payload item.
    ///
    /// Field limits mirror the schema contract the research job is
    /// instructed with; anything outside them is a per-item failure.
    pub fn from_value(item: &serde_json::Value) -> Result<Self, ValidationError> {
        let name_hint = item
            .get("name")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());

        let name = require_str(item, "name", &name_hint)?;
        if name.is_empty() {
            return Err(invalid(&name_hint, "name", "must not be empty"));
        }

        let industry = bounded_str(item, "industry", INDUSTRY_MAX, &name_hint)?;
        let product = bounded_str(item, "product", PRODUCT_MAX, &name_hint)?;
        let website = require_str(item, "website", &name_hint)?;
        if !website.starts_with("http://") && !website.starts_with("https://") {
            return Err(invalid(&name_hint, "website", "must be an http(s) URL"));
        }

        let market_share = market_share(item, &name_hint)?;

        let customer_reviews = item
            .get("customer_reviews")
            .and_then(|v| v.as_i64())
            .ok_or_else(|| invalid(&name_hint, "customer_reviews", "must be an integer"))?;
        if !(0..=REVIEWS_MAX).contains(&customer_reviews) {
            return Err(invalid(
                &name_hint,
                "customer_reviews",
                "must be between 0 and 5 stars",
            ));
        }

        let growth_trend: GrowthTrend = item
            .get("growth_trend")
            .and_then(|v| v.as_str())
            .ok_or_else(|| invalid(&name_hint, "growth_trend", "must be a string"))?
            .parse()
            .map_err(|e: String| invalid(&name_hint, "growth_trend", &e))?;

        let strengths = descriptions(item, "strengths", &name_hint)?;
        let weaknesses = descriptions(item, "weaknesses", &name_hint)?;

        Ok(Self {
            name,
            industry,
            product,
            market_share,
            website,
            customer_reviews: customer_reviews as i32,
            growth_trend,
            strengths,
            weaknesses,
        })
    }
}

fn invalid(item: &Option<String>, field: &str, reason: &str) -> ValidationError {
    ValidationError {
        item: item.clone(),
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

fn require_str(
    item: &serde_json::Value,
    field: &str,
    hint: &Option<String>,
) -> Result<String, ValidationError> {
    item.get(field)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| invalid(hint, field, "must be a string"))
}

fn bounded_str(
    item: &serde_json::Value,
    field: &str,
    max: usize,
    hint: &Option<String>,
) -> Result<String, ValidationError> {
    let value = require_str(item, field, hint)?;
    if value.chars().count() > max {
        return Err(invalid(
            hint,
            field,
            &format!("must be at most {} characters", max),
        ));
    }
    Ok(value)
}

fn market_share(
    item: &serde_json::Value,
    hint: &Option<String>,
) -> Result<Decimal, ValidationError> {
    let raw = item
        .get("market_share")
        .and_then(|v| v.as_f64())
        .ok_or_else(|| invalid(hint, "market_share", "must be a number"))?;

    let share = Decimal::try_from(raw)
        .map_err(|e| invalid(hint, "market_share", &e.to_string()))?
        .round_dp(2);

    if share < Decimal::ZERO || share > Decimal::from(100) {
        return Err(invalid(hint, "market_share", "must be between 0 and 100"));
    }
    Ok(share)
}

/// Pull `[{"description": "..."}]` child collections out of an item.
fn descriptions(
    item: &serde_json::Value,
    field: &str,
    hint: &Option<String>,
) -> Result<Vec<String>, ValidationError> {
    let entries = item
        .get(field)
        .and_then(|v| v.as_array())
        .ok_or_else(|| invalid(hint, field, "must be an array"))?;

    let mut out = Vec::with_capacity(entries.len());
    for entry in entries {
        let description = entry
            .get("description")
            .and_then(|v| v.as_str())
            .ok_or_else(|| invalid(hint, field, "entries must carry a description"))?;
        if description.chars().count() > DESCRIPTION_MAX {
            return Err(invalid(
                hint,
                field,
                &format!("descriptions must be at most {} characters", DESCRIPTION_MAX),
            ));
        }
        out.push(description.to_string());
    }
    Ok(out)
}

/// Outcome of one materialization batch: what persisted, what was skipped.
#[derive(Debug)]
pub struct MaterializeOutcome {
    pub persisted: Vec<Competitor>,
    pub rejected: Vec<ValidationError>,
}

/// Validates payload items and upserts them through the store.
pub struct Materializer {
    store: Arc<dyn PlannerStore>,
}

impl Materializer {
    pub fn new(store: Arc<dyn PlannerStore>) -> Self {
        Self { store }
    }

    /// Materialize one batch of payload items under a business.
    ///
    /// Validation failures skip only the offending item; a store failure
    /// aborts the whole batch (nothing commits).
    pub async fn materialize(
        &self,
        business_id: Uuid,
        items: &[serde_json::Value],
    ) -> Result<MaterializeOutcome, StoreError> {
        let mut drafts = Vec::with_capacity(items.len());
        let mut rejected = Vec::new();

        for item in items {
            match CompetitorDraft::from_value(item) {
                Ok(draft) => drafts.push(draft),
                Err(err) => {
                    tracing::warn!(business_id = %business_id, "skipping invalid item: {}", err);
                    rejected.push(err);
                }
            }
        }

        let persisted = if drafts.is_empty() {
            Vec::new()
        } else {
            self.store.upsert_competitors(business_id, &drafts).await?
        };

        tracing::info!(
            business_id = %business_id,
            persisted = persisted.len(),
            rejected = rejected.len(),
            "materialization batch complete"
        );

        Ok(MaterializeOutcome { persisted, rejected })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::testing::MemoryPlannerStore;

    fn valid_item(name: &str) -> serde_json::Value {
        serde_json::json!({
            "name": name,
            "industry": "Logistics",
            "product": "Freight brokerage platform",
            "market_share": 12.5,
            "strengths": [{"description": "Wide carrier network"}],
            "weaknesses": [{"description": "Thin margins"}],
            "website": "https://example.com",
            "customer_reviews": 4,
            "growth_trend": "Increasing"
        })
    }

    #[test]
    fn valid_item_produces_draft() {
        let draft = CompetitorDraft::from_value(&valid_item("Acme")).unwrap();
        assert_eq!(draft.name, "Acme");
        assert_eq!(draft.market_share, Decimal::new(125, 1));
        assert_eq!(draft.growth_trend, GrowthTrend::Increasing);
        assert_eq!(draft.strengths, vec!["Wide carrier network".to_string()]);
    }

    #[test]
    fn market_share_is_rounded_to_two_places() {
        let mut item = valid_item("Acme");
        item["market_share"] = serde_json::json!(33.333);
        let draft = CompetitorDraft::from_value(&item).unwrap();
        assert_eq!(draft.market_share, Decimal::new(3333, 2));
    }

    #[test]
    fn overlong_industry_is_rejected() {
        let mut item = valid_item("Acme");
        item["industry"] = serde_json::json!("x".repeat(INDUSTRY_MAX + 1));
        let err = CompetitorDraft::from_value(&item).unwrap_err();
        assert_eq!(err.field, "industry");
        assert_eq!(err.item.as_deref(), Some("Acme"));
    }

    #[test]
    fn out_of_range_market_share_is_rejected() {
        let mut item = valid_item("Acme");
        item["market_share"] = serde_json::json!(101.0);
        assert_eq!(
            CompetitorDraft::from_value(&item).unwrap_err().field,
            "market_share"
        );
    }

    #[test]
    fn unknown_growth_trend_is_rejected() {
        let mut item = valid_item("Acme");
        item["growth_trend"] = serde_json::json!("Volatile");
        assert_eq!(
            CompetitorDraft::from_value(&item).unwrap_err().field,
            "growth_trend"
        );
    }

    #[test]
    fn six_star_reviews_are_rejected() {
        let mut item = valid_item("Acme");
        item["customer_reviews"] = serde_json::json!(6);
        assert_eq!(
            CompetitorDraft::from_value(&item).unwrap_err().field,
            "customer_reviews"
        );
    }

    #[test]
    fn overlong_strength_description_is_rejected() {
        let mut item = valid_item("Acme");
        item["strengths"] = serde_json::json!([
            {"description": "y".repeat(DESCRIPTION_MAX + 1)}
        ]);
        assert_eq!(
            CompetitorDraft::from_value(&item).unwrap_err().field,
            "strengths"
        );
    }

    #[test]
    fn non_url_website_is_rejected() {
        let mut item = valid_item("Acme");
        item["website"] = serde_json::json!("acme dot com");
        assert_eq!(
            CompetitorDraft::from_value(&item).unwrap_err().field,
            "website"
        );
    }

    #[tokio::test]
    async fn bad_item_skipped_siblings_persist() {
        let store = Arc::new(MemoryPlannerStore::new());
        let materializer = Materializer::new(store.clone());
        let business_id = Uuid::new_v4();

        let mut bad = valid_item("Broken");
        bad["growth_trend"] = serde_json::json!("Sideways");

        let outcome = materializer
            .materialize(business_id, &[valid_item("Acme"), bad, valid_item("Globex")])
            .await
            .unwrap();

        assert_eq!(outcome.persisted.len(), 2);
        assert_eq!(outcome.rejected.len(), 1);
        assert_eq!(outcome.rejected[0].item.as_deref(), Some("Broken"));

        let names: Vec<String> = store.competitor_names(business_id).await.unwrap();
        assert_eq!(names.len(), 2);
    }

    #[tokio::test]
    async fn materialization_is_idempotent() {
        let store = Arc::new(MemoryPlannerStore::new());
        let materializer = Materializer::new(store.clone());
        let business_id = Uuid::new_v4();
        let items = [valid_item("Acme"), valid_item("Globex")];

        let first = materializer.materialize(business_id, &items).await.unwrap();
        let second = materializer.materialize(business_id, &items).await.unwrap();

        assert_eq!(first.persisted.len(), 2);
        assert_eq!(second.persisted.len(), 2);
        // Same natural keys, same entity count: no duplicates.
        let all = store.list_competitors(business_id).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn children_are_replaced_not_merged() {
        let store = Arc::new(MemoryPlannerStore::new());
        let materializer = Materializer::new(store.clone());
        let business_id = Uuid::new_v4();

        materializer
            .materialize(business_id, &[valid_item("Acme")])
            .await
            .unwrap();

        let mut updated = valid_item("Acme");
        updated["strengths"] = serde_json::json!([
            {"description": "New brand recognition"},
            {"description": "Faster delivery"}
        ]);
        materializer
            .materialize(business_id, &[updated])
            .await
            .unwrap();

        let all = store.list_competitors(business_id).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(
            all[0].strengths,
            vec![
                "New brand recognition".to_string(),
                "Faster delivery".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn store_failure_aborts_the_batch() {
        let store = Arc::new(MemoryPlannerStore::new());
        store.fail_next_upsert();
        let materializer = Materializer::new(store.clone());
        let business_id = Uuid::new_v4();

        let result = materializer
            .materialize(business_id, &[valid_item("Acme")])
            .await;

        assert!(result.is_err());
        assert!(store.list_competitors(business_id).await.unwrap().is_empty());
    }
}
