use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use tracing::{debug, instrument};

use crate::db::DbError;
use crate::forecast_fetcher::{ForecastRecord, MediaItem, OfficialProblem};
use crate::geometry::PolygonGeometry;

/// Daily forecast cache. Forecasts are immutable per (center, zone, date);
/// the upsert only matters when a refresh re-fetches the same day.
#[async_trait]
pub trait ForecastStore: Send + Sync {
    async fn find(
        &self,
        center: &str,
        zone: &str,
        date: NaiveDate,
    ) -> Result<Option<ForecastRecord>, DbError>;

    async fn upsert(&self, record: &ForecastRecord) -> Result<(), DbError>;
}

#[derive(Debug, FromRow)]
struct ForecastRow {
    center: String,
    zone: String,
    forecast_date: NaiveDate,
    danger_overall: i32,
    danger_high: Option<i32>,
    danger_middle: Option<i32>,
    danger_low: Option<i32>,
    travel_advice: Option<String>,
    forecast_url: Option<String>,
    bottom_line: Option<String>,
    hazard_discussion: Option<String>,
    weather_discussion: Option<String>,
    problems: Option<Json<Vec<OfficialProblem>>>,
    media: Option<Json<Vec<MediaItem>>>,
    geometry: Option<Json<PolygonGeometry>>,
    published_time: Option<DateTime<Utc>>,
    has_product_data: bool,
}

impl From<ForecastRow> for ForecastRecord {
    fn from(row: ForecastRow) -> Self {
        ForecastRecord {
            center: row.center,
            zone: row.zone,
            forecast_date: row.forecast_date,
            danger_overall: row.danger_overall,
            danger_high: row.danger_high,
            danger_middle: row.danger_middle,
            danger_low: row.danger_low,
            travel_advice: row.travel_advice,
            forecast_url: row.forecast_url,
            bottom_line: row.bottom_line,
            hazard_discussion: row.hazard_discussion,
            weather_discussion: row.weather_discussion,
            problems: row.problems.map(|p| p.0).unwrap_or_default(),
            media: row.media.map(|m| m.0).unwrap_or_default(),
            geometry: row.geometry.map(|g| g.0),
            published_time: row.published_time,
            has_product_data: row.has_product_data,
        }
    }
}

const FORECAST_COLUMNS: &str = "center, zone, forecast_date, danger_overall, danger_high, \
     danger_middle, danger_low, travel_advice, forecast_url, bottom_line, hazard_discussion, \
     weather_discussion, problems, media, geometry, published_time, has_product_data";

#[derive(Clone)]
pub struct PgForecastRepository {
    pool: PgPool,
}

impl PgForecastRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ForecastStore for PgForecastRepository {
    #[instrument(skip(self), fields(center = %center, zone = %zone, date = %date))]
    async fn find(
        &self,
        center: &str,
        zone: &str,
        date: NaiveDate,
    ) -> Result<Option<ForecastRecord>, DbError> {
        debug!("Querying cached forecast");

        let row = sqlx::query_as::<_, ForecastRow>(&format!(
            "SELECT {FORECAST_COLUMNS} FROM avalanche_forecasts \
             WHERE center = $1 AND zone = $2 AND forecast_date = $3"
        ))
        .bind(center)
        .bind(zone)
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ForecastRecord::from))
    }

    #[instrument(skip(self, record), fields(center = %record.center, zone = %record.zone))]
    async fn upsert(&self, record: &ForecastRecord) -> Result<(), DbError> {
        debug!("Upserting forecast");

        sqlx::query(
            "INSERT INTO avalanche_forecasts \
             (center, zone, forecast_date, danger_overall, danger_high, danger_middle, \
              danger_low, travel_advice, forecast_url, bottom_line, hazard_discussion, \
              weather_discussion, problems, media, geometry, published_time, has_product_data) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17) \
             ON CONFLICT (center, zone, forecast_date) DO UPDATE SET \
                danger_overall = EXCLUDED.danger_overall, \
                danger_high = EXCLUDED.danger_high, \
                danger_middle = EXCLUDED.danger_middle, \
                danger_low = EXCLUDED.danger_low, \
                travel_advice = EXCLUDED.travel_advice, \
                forecast_url = EXCLUDED.forecast_url, \
                bottom_line = EXCLUDED.bottom_line, \
                hazard_discussion = EXCLUDED.hazard_discussion, \
                weather_discussion = EXCLUDED.weather_discussion, \
                problems = EXCLUDED.problems, \
                media = EXCLUDED.media, \
                geometry = EXCLUDED.geometry, \
                published_time = EXCLUDED.published_time, \
                has_product_data = EXCLUDED.has_product_data",
        )
        .bind(&record.center)
        .bind(&record.zone)
        .bind(record.forecast_date)
        .bind(record.danger_overall)
        .bind(record.danger_high)
        .bind(record.danger_middle)
        .bind(record.danger_low)
        .bind(&record.travel_advice)
        .bind(&record.forecast_url)
        .bind(&record.bottom_line)
        .bind(&record.hazard_discussion)
        .bind(&record.weather_discussion)
        .bind(Json(record.problems.clone()))
        .bind(Json(record.media.clone()))
        .bind(record.geometry.clone().map(Json))
        .bind(record.published_time)
        .bind(record.has_product_data)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
