use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info, instrument, warn};

use crate::briefing_payload::{parse_briefing_payload, PayloadError};
use crate::clock::Clock;
use crate::db::{Briefing, BriefingStore, DbError, ForecastStore, NewBriefing, WeatherStore};
use crate::fetch_error::FetchError;
use crate::forecast_fetcher::{ForecastRecord, ForecastSource};
use crate::gemini::{OracleError, TextGenerationOracle};
use crate::geometry::polygon_centroid;
use crate::prompt_composer::{compose_prompt, PromptContract, PromptInputs};
use crate::staleness::{assess, staleness_warning, StalenessAssessment};
use crate::weather_fetcher::{WeatherSnapshot, WeatherSource};

#[derive(Debug, thiserror::Error)]
pub enum BriefingError {
    #[error("center and zone are required")]
    InvalidRequest,
    #[error("Forecast not found for {zone} ({center})")]
    ForecastUnavailable { center: String, zone: String },
    #[error("Failed to fetch forecast data: {0}")]
    ForecastFetch(#[from] FetchError),
    #[error("Text generation failed: {0}")]
    Oracle(#[from] OracleError),
    #[error("Model returned invalid JSON: {0}")]
    MalformedAiResponse(String),
    #[error("Model response missing required field `{0}`")]
    IncompleteAiResponse(&'static str),
    #[error("Failed to persist briefing: {0}")]
    Persistence(String),
    #[error(transparent)]
    Store(#[from] DbError),
}

/// Result of the lookup-only path.
#[derive(Debug, Clone)]
pub struct BriefingLookup {
    pub briefing: Option<Briefing>,
    pub cached: bool,
    pub stale_data: Option<bool>,
    pub data_age_ms: Option<i64>,
    pub staleness_warning: Option<String>,
}

/// Result of the synthesis path.
#[derive(Debug, Clone)]
pub struct BriefingOutcome {
    pub briefing: Briefing,
    pub cached: bool,
    pub stale_data: Option<bool>,
    pub data_age_ms: Option<i64>,
    pub staleness_warning: Option<String>,
}

/// Injected collaborators. Everything external lives behind a trait so
/// tests can substitute doubles without a database or network.
#[derive(Clone)]
pub struct BriefingDeps {
    pub briefing_store: Arc<dyn BriefingStore>,
    pub forecast_store: Arc<dyn ForecastStore>,
    pub forecast_source: Arc<dyn ForecastSource>,
    pub weather_store: Arc<dyn WeatherStore>,
    pub weather_source: Arc<dyn WeatherSource>,
    pub oracle: Arc<dyn TextGenerationOracle>,
    pub clock: Arc<dyn Clock>,
}

/// Tunable behavior of the pipeline.
#[derive(Debug, Clone, Copy)]
pub struct BriefingPolicy {
    pub contract: PromptContract,
    pub staleness_threshold_hours: i64,
    pub weather_cache_hours: i64,
}

impl Default for BriefingPolicy {
    fn default() -> Self {
        Self {
            contract: PromptContract::Mentor,
            staleness_threshold_hours: crate::staleness::DEFAULT_STALENESS_THRESHOLD_HOURS,
            weather_cache_hours: 6,
        }
    }
}

/// Orchestrates one briefing per (center, zone, day): cache check, source
/// acquisition, weather enrichment, prompt composition, generation,
/// validation, persistence.
#[derive(Clone)]
pub struct BriefingService {
    deps: BriefingDeps,
    policy: BriefingPolicy,
}

impl BriefingService {
    pub fn new(deps: BriefingDeps, policy: BriefingPolicy) -> Self {
        Self { deps, policy }
    }

    /// Look up today's briefing without generating anything.
    #[instrument(skip(self), fields(center = %center, zone = %zone))]
    pub async fn get_briefing(
        &self,
        center: &str,
        zone: &str,
    ) -> Result<BriefingLookup, BriefingError> {
        validate_key(center, zone)?;
        let now = self.deps.clock.now();
        let today = now.date_naive();

        match self.deps.briefing_store.get(center, zone, today).await? {
            Some(briefing) => {
                let age = assess(briefing.created_at, now, self.policy.staleness_threshold_hours);
                Ok(BriefingLookup {
                    briefing: Some(briefing),
                    cached: true,
                    stale_data: Some(age.is_stale),
                    data_age_ms: Some(age.age_ms),
                    staleness_warning: staleness_warning(&age),
                })
            }
            None => Ok(BriefingLookup {
                briefing: None,
                cached: false,
                stale_data: None,
                data_age_ms: None,
                staleness_warning: None,
            }),
        }
    }

    /// Run the full synthesis pipeline for today's briefing.
    #[instrument(skip(self), fields(center = %center, zone = %zone))]
    pub async fn generate_briefing(
        &self,
        center: &str,
        zone: &str,
    ) -> Result<BriefingOutcome, BriefingError> {
        validate_key(center, zone)?;
        let now = self.deps.clock.now();
        let today = now.date_naive();

        // Unconditional short-circuit: at most one generation per key per day.
        if let Some(existing) = self.deps.briefing_store.get(center, zone, today).await? {
            info!("Returning cached briefing");
            let age = assess(existing.created_at, now, self.policy.staleness_threshold_hours);
            return Ok(BriefingOutcome {
                briefing: existing,
                cached: true,
                stale_data: Some(age.is_stale),
                data_age_ms: Some(age.age_ms),
                staleness_warning: staleness_warning(&age),
            });
        }

        let forecast = self.acquire_forecast(center, zone, today).await?;
        let weather = self.acquire_weather(center, zone, today, &forecast).await;

        let staleness: Option<StalenessAssessment> = forecast
            .published_time
            .map(|published| assess(published, now, self.policy.staleness_threshold_hours));
        if let Some(s) = &staleness {
            if s.is_stale {
                warn!(
                    "Forecast for {zone} is {:.0} hours old",
                    s.elapsed_hours
                );
            }
        }

        let prompt = compose_prompt(
            self.policy.contract,
            &PromptInputs {
                center,
                zone,
                forecast: &forecast,
                weather: weather.as_ref(),
                staleness: staleness.as_ref(),
                now,
            },
        );

        debug!("Composed prompt of {} characters", prompt.len());
        let raw = self.deps.oracle.generate(&prompt).await?;

        let payload = parse_briefing_payload(&raw, self.policy.contract).map_err(|e| match e {
            PayloadError::Malformed(message) => BriefingError::MalformedAiResponse(message),
            PayloadError::MissingField(field) => BriefingError::IncompleteAiResponse(field),
        })?;

        let new_briefing = NewBriefing {
            center: center.to_string(),
            zone: zone.to_string(),
            forecast_date: today,
            danger_level: forecast.danger_overall,
            briefing_text: payload.briefing,
            problems: payload.problems,
            source_url: payload.source_url,
            source_center: payload.source_center,
            disclaimer: payload.disclaimer,
            field_observation_prompts: payload.field_observation_prompts,
        };

        match self
            .deps
            .briefing_store
            .insert_if_absent(&new_briefing)
            .await?
        {
            Some(stored) => {
                info!("Generated briefing id {}", stored.id);
                Ok(BriefingOutcome {
                    briefing: stored,
                    cached: false,
                    stale_data: staleness.map(|s| s.is_stale),
                    data_age_ms: staleness.map(|s| s.age_ms),
                    staleness_warning: staleness.as_ref().and_then(staleness_warning),
                })
            }
            None => {
                // Lost a same-key race after our cache check; the winner's
                // row is authoritative, so hand it back instead of failing.
                warn!("Concurrent generation already stored this key; returning its briefing");
                match self.deps.briefing_store.get(center, zone, today).await? {
                    Some(winner) => {
                        let age =
                            assess(winner.created_at, now, self.policy.staleness_threshold_hours);
                        Ok(BriefingOutcome {
                            briefing: winner,
                            cached: true,
                            stale_data: Some(age.is_stale),
                            data_age_ms: Some(age.age_ms),
                            staleness_warning: staleness_warning(&age),
                        })
                    }
                    None => Err(BriefingError::Persistence(
                        "insert conflicted but no stored briefing was found".to_string(),
                    )),
                }
            }
        }
    }

    /// Delete today's briefing so the next generate call recomputes it.
    #[instrument(skip(self), fields(center = %center, zone = %zone))]
    pub async fn regenerate_briefing(&self, center: &str, zone: &str) -> Result<(), BriefingError> {
        validate_key(center, zone)?;
        let today = self.deps.clock.now().date_naive();
        self.deps.briefing_store.delete(center, zone, today).await?;
        info!("Cleared briefing for regeneration");
        Ok(())
    }

    /// Forecast from the daily cache first, then the live source.
    async fn acquire_forecast(
        &self,
        center: &str,
        zone: &str,
        today: NaiveDate,
    ) -> Result<ForecastRecord, BriefingError> {
        match self.deps.forecast_store.find(center, zone, today).await {
            Ok(Some(cached)) => {
                debug!("Using cached forecast");
                return Ok(cached);
            }
            Ok(None) => debug!("No cached forecast, fetching from source"),
            Err(e) => warn!("Forecast cache read failed, fetching from source: {e}"),
        }

        match self
            .deps
            .forecast_source
            .get_forecast(center, zone, today)
            .await
        {
            Ok(Some(record)) => {
                if let Err(e) = self.deps.forecast_store.upsert(&record).await {
                    warn!("Failed to cache fetched forecast: {e}");
                }
                Ok(record)
            }
            Ok(None) => Err(BriefingError::ForecastUnavailable {
                center: center.to_string(),
                zone: zone.to_string(),
            }),
            Err(e) => Err(BriefingError::ForecastFetch(e)),
        }
    }

    /// Best-effort weather enrichment. Requires zone geometry to derive a
    /// lookup coordinate; every failure is logged and swallowed so a dead
    /// weather feed never blocks briefing generation.
    async fn acquire_weather(
        &self,
        center: &str,
        zone: &str,
        today: NaiveDate,
        forecast: &ForecastRecord,
    ) -> Option<WeatherSnapshot> {
        let geometry = forecast.geometry.as_ref()?;
        let centroid = match polygon_centroid(geometry) {
            Some(c) => c,
            None => {
                warn!("Zone geometry has no usable ring, skipping weather");
                return None;
            }
        };

        match self
            .deps
            .weather_store
            .find_recent(center, zone, today, self.policy.weather_cache_hours)
            .await
        {
            Ok(Some(snapshot)) => {
                debug!("Using cached weather snapshot");
                return Some(snapshot);
            }
            Ok(None) => {}
            Err(e) => warn!("Weather cache read failed: {e}"),
        }

        match self
            .deps
            .weather_source
            .get_weather(centroid.lat, centroid.lon)
            .await
        {
            Ok(snapshot) => {
                if let Err(e) = self
                    .deps
                    .weather_store
                    .upsert(center, zone, today, &snapshot)
                    .await
                {
                    warn!("Weather cache write failed: {e}");
                }
                Some(snapshot)
            }
            Err(e) => {
                warn!("Weather enrichment failed, continuing without weather: {e}");
                None
            }
        }
    }
}

fn validate_key(center: &str, zone: &str) -> Result<(), BriefingError> {
    if center.trim().is_empty() || zone.trim().is_empty() {
        return Err(BriefingError::InvalidRequest);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_key() {
        assert!(validate_key("Sierra Avalanche Center", "Central Sierra").is_ok());
        assert!(matches!(
            validate_key("", "Central Sierra"),
            Err(BriefingError::InvalidRequest)
        ));
        assert!(matches!(
            validate_key("Sierra Avalanche Center", "   "),
            Err(BriefingError::InvalidRequest)
        ));
    }
}
