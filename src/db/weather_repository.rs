use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use sqlx::PgPool;
use tracing::{debug, instrument, warn};

use crate::db::DbError;
use crate::weather_fetcher::WeatherSnapshot;

/// Cached weather snapshots per zone. Purely an optimization over the live
/// weather source; every caller must tolerate a miss.
#[async_trait]
pub trait WeatherStore: Send + Sync {
    async fn find_recent(
        &self,
        center: &str,
        zone: &str,
        date: NaiveDate,
        max_age_hours: i64,
    ) -> Result<Option<WeatherSnapshot>, DbError>;

    async fn upsert(
        &self,
        center: &str,
        zone: &str,
        date: NaiveDate,
        snapshot: &WeatherSnapshot,
    ) -> Result<(), DbError>;
}

#[derive(Clone)]
pub struct PgWeatherRepository {
    pool: PgPool,
}

impl PgWeatherRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WeatherStore for PgWeatherRepository {
    #[instrument(skip(self), fields(center = %center, zone = %zone, date = %date))]
    async fn find_recent(
        &self,
        center: &str,
        zone: &str,
        date: NaiveDate,
        max_age_hours: i64,
    ) -> Result<Option<WeatherSnapshot>, DbError> {
        let cutoff = Utc::now() - Duration::hours(max_age_hours);
        debug!("Querying weather cache newer than {}", cutoff);

        let stored: Option<serde_json::Value> = sqlx::query_scalar(
            "SELECT snapshot FROM weather_data \
             WHERE center = $1 AND zone = $2 AND forecast_date = $3 AND created_at >= $4",
        )
        .bind(center)
        .bind(zone)
        .bind(date)
        .bind(cutoff)
        .fetch_optional(&self.pool)
        .await?;

        match stored {
            Some(value) => match serde_json::from_value::<WeatherSnapshot>(value) {
                Ok(snapshot) => Ok(Some(snapshot)),
                Err(e) => {
                    // A schema drift in the cache is not worth failing over;
                    // the caller just refetches.
                    warn!("Discarding unreadable cached snapshot: {e}");
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    #[instrument(skip(self, snapshot), fields(center = %center, zone = %zone, date = %date))]
    async fn upsert(
        &self,
        center: &str,
        zone: &str,
        date: NaiveDate,
        snapshot: &WeatherSnapshot,
    ) -> Result<(), DbError> {
        let value = serde_json::to_value(snapshot)?;

        sqlx::query(
            "INSERT INTO weather_data (center, zone, forecast_date, latitude, longitude, snapshot, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, NOW()) \
             ON CONFLICT (center, zone, forecast_date) DO UPDATE SET \
                latitude = EXCLUDED.latitude, \
                longitude = EXCLUDED.longitude, \
                snapshot = EXCLUDED.snapshot, \
                created_at = NOW()",
        )
        .bind(center)
        .bind(zone)
        .bind(date)
        .bind(snapshot.location.latitude)
        .bind(snapshot.location.longitude)
        .bind(value)
        .execute(&self.pool)
        .await?;

        debug!("Cached weather snapshot");
        Ok(())
    }
}
