//! PostgreSQL backend for the planner store.

use async_trait::async_trait;
use deadpool_postgres::{Config, Pool, Runtime};
use rust_decimal::Decimal;
use tokio_postgres::NoTls;
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::error::StoreError;
use crate::materialize::CompetitorDraft;
use crate::store::{Business, Competitor, GrowthTrend, PlannerStore};

/// PostgreSQL planner store.
pub struct PgPlannerStore {
    pool: Pool,
}

impl PgPlannerStore {
    /// Create a new store and connect to the database.
    pub async fn new(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let mut cfg = Config::new();
        cfg.url = Some(config.url().to_string());
        cfg.pool = Some(deadpool_postgres::PoolConfig {
            max_size: config.pool_size,
            ..Default::default()
        });

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| StoreError::Pool(e.to_string()))?;

        // Test connection
        let _ = pool.get().await?;

        Ok(Self { pool })
    }

    /// Run database migrations (embedded via refinery).
    pub async fn run_migrations(&self) -> Result<(), StoreError> {
        use refinery::embed_migrations;
        embed_migrations!("migrations");

        let mut client = self.pool.get().await?;
        migrations::runner()
            .run_async(&mut **client)
            .await
            .map_err(|e| StoreError::Migration(e.to_string()))?;
        Ok(())
    }

    async fn conn(&self) -> Result<deadpool_postgres::Object, StoreError> {
        Ok(self.pool.get().await?)
    }
}

#[async_trait]
impl PlannerStore for PgPlannerStore {
    async fn get_business(&self, id: Uuid) -> Result<Option<Business>, StoreError> {
        let conn = self.conn().await?;
        let row = conn
            .query_opt(
                "SELECT id, name, industry, description FROM businesses WHERE id = $1",
                &[&id],
            )
            .await?;

        Ok(row.map(|r| Business {
            id: r.get("id"),
            name: r.get("name"),
            industry: r.get("industry"),
            description: r.get("description"),
        }))
    }

    async fn competitor_names(&self, business_id: Uuid) -> Result<Vec<String>, StoreError> {
        let conn = self.conn().await?;
        let rows = conn
            .query(
                "SELECT name FROM competitors WHERE business_id = $1 ORDER BY name",
                &[&business_id],
            )
            .await?;
        Ok(rows.iter().map(|r| r.get("name")).collect())
    }

    async fn list_competitors(&self, business_id: Uuid) -> Result<Vec<Competitor>, StoreError> {
        let conn = self.conn().await?;
        let rows = conn
            .query(
                r#"
                SELECT id, business_id, name, industry, product, market_share,
                       website, customer_reviews, growth_trend, created_at, updated_at
                FROM competitors
                WHERE business_id = $1
                ORDER BY created_at, name
                "#,
                &[&business_id],
            )
            .await?;

        let mut competitors = Vec::with_capacity(rows.len());
        for row in &rows {
            let id: Uuid = row.get("id");

            let strengths = conn
                .query(
                    "SELECT description FROM competitor_strengths WHERE competitor_id = $1 ORDER BY position",
                    &[&id],
                )
                .await?
                .iter()
                .map(|r| r.get("description"))
                .collect();

            let weaknesses = conn
                .query(
                    "SELECT description FROM competitor_weaknesses WHERE competitor_id = $1 ORDER BY position",
                    &[&id],
                )
                .await?
                .iter()
                .map(|r| r.get("description"))
                .collect();

            competitors.push(Competitor {
                id,
                business_id: row.get("business_id"),
                name: row.get("name"),
                industry: row.get("industry"),
                product: row.get("product"),
                market_share: row.get::<_, Decimal>("market_share"),
                website: row.get("website"),
                customer_reviews: row.get("customer_reviews"),
                growth_trend: parse_trend(row.get("growth_trend"))?,
                strengths,
                weaknesses,
                created_at: row.get("created_at"),
                updated_at: row.get("updated_at"),
            });
        }

        Ok(competitors)
    }

    async fn upsert_competitors(
        &self,
        business_id: Uuid,
        drafts: &[CompetitorDraft],
    ) -> Result<Vec<Competitor>, StoreError> {
        let mut conn = self.conn().await?;
        let tx = conn.transaction().await?;

        let mut persisted = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let row = tx
                .query_one(
                    r#"
                    INSERT INTO competitors (
                        id, business_id, name, industry, product, market_share,
                        website, customer_reviews, growth_trend
                    )
                    VALUES (gen_random_uuid(), $1, $2, $3, $4, $5, $6, $7, $8)
                    ON CONFLICT (business_id, name) DO UPDATE SET
                        industry = EXCLUDED.industry,
                        product = EXCLUDED.product,
                        market_share = EXCLUDED.market_share,
                        website = EXCLUDED.website,
                        customer_reviews = EXCLUDED.customer_reviews,
                        growth_trend = EXCLUDED.growth_trend,
                        updated_at = NOW()
                    RETURNING id, created_at, updated_at
                    "#,
                    &[
                        &business_id,
                        &draft.name,
                        &draft.industry,
                        &draft.product,
                        &draft.market_share,
                        &draft.website,
                        &draft.customer_reviews,
                        &draft.growth_trend.as_str(),
                    ],
                )
                .await?;

            let id: Uuid = row.get("id");

            // Child collections are replaced wholesale on every upsert.
            tx.execute(
                "DELETE FROM competitor_strengths WHERE competitor_id = $1",
                &[&id],
            )
            .await?;
            tx.execute(
                "DELETE FROM competitor_weaknesses WHERE competitor_id = $1",
                &[&id],
            )
            .await?;

            for (position, description) in draft.strengths.iter().enumerate() {
                tx.execute(
                    "INSERT INTO competitor_strengths (competitor_id, position, description) VALUES ($1, $2, $3)",
                    &[&id, &(position as i32), description],
                )
                .await?;
            }
            for (position, description) in draft.weaknesses.iter().enumerate() {
                tx.execute(
                    "INSERT INTO competitor_weaknesses (competitor_id, position, description) VALUES ($1, $2, $3)",
                    &[&id, &(position as i32), description],
                )
                .await?;
            }

            persisted.push(Competitor {
                id,
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
                created_at: row.get("created_at"),
                updated_at: row.get("updated_at"),
            });
        }

        tx.commit().await?;
        Ok(persisted)
    }
}

fn parse_trend(raw: &str) -> Result<GrowthTrend, StoreError> {
    raw.parse().map_err(StoreError::Query)
}
