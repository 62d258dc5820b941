use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::{debug, info, instrument};

use crate::db::{Briefing, DbError, NewBriefing};

/// Keyed briefing store; the (center, zone, forecast_date) unique key is
/// the pipeline's only concurrency-control mechanism.
#[async_trait]
pub trait BriefingStore: Send + Sync {
    async fn get(
        &self,
        center: &str,
        zone: &str,
        date: NaiveDate,
    ) -> Result<Option<Briefing>, DbError>;

    /// Conditional insert: returns the stored row, or None when another
    /// writer already holds the key.
    async fn insert_if_absent(&self, briefing: &NewBriefing)
        -> Result<Option<Briefing>, DbError>;

    async fn delete(&self, center: &str, zone: &str, date: NaiveDate) -> Result<(), DbError>;
}

const BRIEFING_COLUMNS: &str = "id, center, zone, forecast_date, danger_level, briefing_text, \
     problems, source_url, source_center, disclaimer, field_observation_prompts, created_at";

#[derive(Clone)]
pub struct PgBriefingRepository {
    pool: PgPool,
}

impl PgBriefingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BriefingStore for PgBriefingRepository {
    #[instrument(skip(self), fields(center = %center, zone = %zone, date = %date))]
    async fn get(
        &self,
        center: &str,
        zone: &str,
        date: NaiveDate,
    ) -> Result<Option<Briefing>, DbError> {
        debug!("Querying briefing by key");

        let briefing = sqlx::query_as::<_, Briefing>(&format!(
            "SELECT {BRIEFING_COLUMNS} FROM avalanche_briefings \
             WHERE center = $1 AND zone = $2 AND forecast_date = $3"
        ))
        .bind(center)
        .bind(zone)
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;

        if briefing.is_some() {
            debug!("Found cached briefing");
        } else {
            debug!("No briefing for key");
        }

        Ok(briefing)
    }

    #[instrument(skip(self, briefing), fields(center = %briefing.center, zone = %briefing.zone))]
    async fn insert_if_absent(
        &self,
        briefing: &NewBriefing,
    ) -> Result<Option<Briefing>, DbError> {
        debug!("Inserting briefing if key is free");

        let inserted = sqlx::query_as::<_, Briefing>(&format!(
            "INSERT INTO avalanche_briefings \
             (center, zone, forecast_date, danger_level, briefing_text, problems, \
              source_url, source_center, disclaimer, field_observation_prompts) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             ON CONFLICT (center, zone, forecast_date) DO NOTHING \
             RETURNING {BRIEFING_COLUMNS}"
        ))
        .bind(&briefing.center)
        .bind(&briefing.zone)
        .bind(briefing.forecast_date)
        .bind(briefing.danger_level)
        .bind(&briefing.briefing_text)
        .bind(Json(briefing.problems.clone()))
        .bind(&briefing.source_url)
        .bind(&briefing.source_center)
        .bind(&briefing.disclaimer)
        .bind(briefing.field_observation_prompts.clone().map(Json))
        .fetch_optional(&self.pool)
        .await?;

        match &inserted {
            Some(row) => info!("Stored briefing id {} for {}", row.id, row.zone),
            None => info!("Key already taken by a concurrent writer"),
        }

        Ok(inserted)
    }

    #[instrument(skip(self), fields(center = %center, zone = %zone, date = %date))]
    async fn delete(&self, center: &str, zone: &str, date: NaiveDate) -> Result<(), DbError> {
        let result = sqlx::query(
            "DELETE FROM avalanche_briefings \
             WHERE center = $1 AND zone = $2 AND forecast_date = $3",
        )
        .bind(center)
        .bind(zone)
        .bind(date)
        .execute(&self.pool)
        .await?;

        info!("Deleted {} briefing row(s)", result.rows_affected());
        Ok(())
    }
}
