// End-to-end pipeline tests against in-memory collaborator doubles

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, NaiveDate};

use avalanche_briefing_service::clock::FixedClock;
use avalanche_briefing_service::db::{
    Briefing, BriefingStore, DbError, ForecastStore, NewBriefing, WeatherStore,
};
use avalanche_briefing_service::prompt_composer::PromptContract;
use avalanche_briefing_service::services::{
    BriefingDeps, BriefingError, BriefingPolicy, BriefingService,
};

use common::*;

struct Harness {
    briefing_store: Arc<InMemoryBriefingStore>,
    forecast_store: Arc<InMemoryForecastStore>,
    weather_store: Arc<InMemoryWeatherStore>,
    weather_source: Arc<StubWeatherSource>,
    oracle: Arc<StubOracle>,
}

fn build_service(
    forecast: Option<avalanche_briefing_service::forecast_fetcher::ForecastRecord>,
    weather: Option<avalanche_briefing_service::weather_fetcher::WeatherSnapshot>,
    oracle_response: String,
    contract: PromptContract,
) -> (BriefingService, Harness) {
    let briefing_store = Arc::new(InMemoryBriefingStore::new(fixed_now()));
    let forecast_store = Arc::new(InMemoryForecastStore::new());
    let weather_store = Arc::new(InMemoryWeatherStore::new());
    let weather_source = Arc::new(StubWeatherSource::new(weather));
    let oracle = Arc::new(StubOracle::new(oracle_response));

    let service = BriefingService::new(
        BriefingDeps {
            briefing_store: briefing_store.clone(),
            forecast_store: forecast_store.clone(),
            forecast_source: Arc::new(StubForecastSource { record: forecast }),
            weather_store: weather_store.clone(),
            weather_source: weather_source.clone(),
            oracle: oracle.clone(),
            clock: Arc::new(FixedClock(fixed_now())),
        },
        BriefingPolicy {
            contract,
            ..BriefingPolicy::default()
        },
    );

    (
        service,
        Harness {
            briefing_store,
            forecast_store,
            weather_store,
            weather_source,
            oracle,
        },
    )
}

#[tokio::test]
async fn test_empty_center_is_invalid_request() {
    let (service, _) = build_service(
        Some(forecast_record()),
        None,
        fenced_mentor_response(),
        PromptContract::Mentor,
    );

    let result = service.generate_briefing("", TEST_ZONE).await;
    assert!(matches!(result, Err(BriefingError::InvalidRequest)));

    let result = service.get_briefing(TEST_CENTER, "  ").await;
    assert!(matches!(result, Err(BriefingError::InvalidRequest)));
}

#[tokio::test]
async fn test_generate_without_geometry_never_calls_weather() {
    let (service, harness) = build_service(
        Some(forecast_record()),
        Some(weather_snapshot()),
        fenced_mentor_response(),
        PromptContract::Mentor,
    );

    let outcome = service
        .generate_briefing(TEST_CENTER, TEST_ZONE)
        .await
        .unwrap();

    // No geometry means no centroid, so the weather source is never touched
    assert_eq!(harness.weather_source.call_count(), 0);
    assert!(!outcome.cached);
    assert_eq!(outcome.briefing.danger_level, 3);
    assert_eq!(harness.briefing_store.len(), 1);

    // Fences were stripped before parsing
    assert!(outcome.briefing.briefing_text.starts_with("Considerable danger"));
    assert!(!outcome.briefing.briefing_text.contains("```"));
}

#[tokio::test]
async fn test_second_generate_is_cached_and_identical() {
    let (service, harness) = build_service(
        Some(forecast_record()),
        None,
        fenced_mentor_response(),
        PromptContract::Mentor,
    );

    let first = service
        .generate_briefing(TEST_CENTER, TEST_ZONE)
        .await
        .unwrap();
    let second = service
        .generate_briefing(TEST_CENTER, TEST_ZONE)
        .await
        .unwrap();

    assert!(!first.cached);
    assert!(second.cached);
    assert_eq!(
        serde_json::to_value(&first.briefing).unwrap(),
        serde_json::to_value(&second.briefing).unwrap()
    );
    assert_eq!(harness.briefing_store.len(), 1);

    // Only one oracle call happened across both requests
    assert_eq!(harness.oracle.prompts.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_forecast_unavailable() {
    let (service, _) = build_service(
        None,
        None,
        fenced_mentor_response(),
        PromptContract::Mentor,
    );

    let result = service.generate_briefing(TEST_CENTER, TEST_ZONE).await;
    assert!(matches!(
        result,
        Err(BriefingError::ForecastUnavailable { .. })
    ));
}

#[tokio::test]
async fn test_forecast_store_is_consulted_before_source() {
    // Source has nothing, but the daily cache does
    let (service, harness) = build_service(
        None,
        None,
        fenced_mentor_response(),
        PromptContract::Mentor,
    );
    harness.forecast_store.seed(forecast_record());

    let outcome = service
        .generate_briefing(TEST_CENTER, TEST_ZONE)
        .await
        .unwrap();
    assert_eq!(outcome.briefing.danger_level, 3);
}

#[tokio::test]
async fn test_fetched_forecast_is_cached_for_next_request() {
    let (service, harness) = build_service(
        Some(forecast_record()),
        None,
        fenced_mentor_response(),
        PromptContract::Mentor,
    );

    service
        .generate_briefing(TEST_CENTER, TEST_ZONE)
        .await
        .unwrap();

    let cached = harness
        .forecast_store
        .find(TEST_CENTER, TEST_ZONE, fixed_today())
        .await
        .unwrap();
    assert!(cached.is_some());
}

#[tokio::test]
async fn test_stale_forecast_flows_into_prompt_and_envelope() {
    let mut forecast = forecast_record();
    forecast.published_time = Some(fixed_now() - Duration::hours(30));

    let (service, harness) = build_service(
        Some(forecast),
        None,
        fenced_mentor_response(),
        PromptContract::Mentor,
    );

    let outcome = service
        .generate_briefing(TEST_CENTER, TEST_ZONE)
        .await
        .unwrap();

    assert_eq!(outcome.stale_data, Some(true));
    assert_eq!(outcome.data_age_ms, Some(30 * 3_600_000));
    assert!(outcome.staleness_warning.unwrap().contains("30 hours"));

    let prompt = harness.oracle.last_prompt().unwrap();
    assert!(prompt.contains("DATA FRESHNESS WARNING"));
    assert!(prompt.contains("30 hours old"));
}

#[tokio::test]
async fn test_fresh_forecast_omits_staleness_block() {
    let mut forecast = forecast_record();
    forecast.published_time = Some(fixed_now() - Duration::hours(2));

    let (service, harness) = build_service(
        Some(forecast),
        None,
        fenced_mentor_response(),
        PromptContract::Mentor,
    );

    let outcome = service
        .generate_briefing(TEST_CENTER, TEST_ZONE)
        .await
        .unwrap();

    assert_eq!(outcome.stale_data, Some(false));
    assert!(outcome.staleness_warning.is_none());

    let prompt = harness.oracle.last_prompt().unwrap();
    assert!(!prompt.contains("DATA FRESHNESS WARNING"));
}

#[tokio::test]
async fn test_weather_failure_is_swallowed() {
    let mut forecast = forecast_record();
    forecast.geometry = Some(square_geometry());

    // Weather source answers with an error
    let (service, harness) = build_service(
        Some(forecast),
        None,
        fenced_mentor_response(),
        PromptContract::Mentor,
    );

    let outcome = service
        .generate_briefing(TEST_CENTER, TEST_ZONE)
        .await
        .unwrap();

    assert_eq!(harness.weather_source.call_count(), 1);
    assert!(!outcome.cached);

    // Prompt was composed without the weather block
    let prompt = harness.oracle.last_prompt().unwrap();
    assert!(!prompt.contains("--- WEATHER DATA ---"));
}

#[tokio::test]
async fn test_weather_enrichment_reaches_prompt() {
    let mut forecast = forecast_record();
    forecast.geometry = Some(square_geometry());

    let (service, harness) = build_service(
        Some(forecast),
        Some(weather_snapshot()),
        fenced_mentor_response(),
        PromptContract::Mentor,
    );

    service
        .generate_briefing(TEST_CENTER, TEST_ZONE)
        .await
        .unwrap();

    assert_eq!(harness.weather_source.call_count(), 1);
    let prompt = harness.oracle.last_prompt().unwrap();
    assert!(prompt.contains("--- WEATHER DATA ---"));
    assert!(prompt.contains("**Current Conditions:**"));

    // The fetched snapshot landed in the weather cache
    let cached = harness
        .weather_store
        .find_recent(TEST_CENTER, TEST_ZONE, fixed_today(), 6)
        .await
        .unwrap();
    assert!(cached.is_some());
}

#[tokio::test]
async fn test_cached_weather_skips_the_source() {
    let mut forecast = forecast_record();
    forecast.geometry = Some(square_geometry());

    let (service, harness) = build_service(
        Some(forecast),
        Some(weather_snapshot()),
        fenced_mentor_response(),
        PromptContract::Mentor,
    );
    harness
        .weather_store
        .seed(TEST_CENTER, TEST_ZONE, fixed_today(), weather_snapshot());

    service
        .generate_briefing(TEST_CENTER, TEST_ZONE)
        .await
        .unwrap();

    assert_eq!(harness.weather_source.call_count(), 0);
    let prompt = harness.oracle.last_prompt().unwrap();
    assert!(prompt.contains("--- WEATHER DATA ---"));
}

#[tokio::test]
async fn test_malformed_oracle_response_fails_and_stores_nothing() {
    let (service, harness) = build_service(
        Some(forecast_record()),
        None,
        "Sorry, no JSON today.".to_string(),
        PromptContract::Mentor,
    );

    let result = service.generate_briefing(TEST_CENTER, TEST_ZONE).await;
    assert!(matches!(result, Err(BriefingError::MalformedAiResponse(_))));
    assert_eq!(harness.briefing_store.len(), 0);
}

#[tokio::test]
async fn test_mentor_contract_rejects_missing_disclaimer() {
    let response = r#"{"briefing": "x", "sourceUrl": "https://example.org", "problems": []}"#;
    let (service, harness) = build_service(
        Some(forecast_record()),
        None,
        response.to_string(),
        PromptContract::Mentor,
    );

    let result = service.generate_briefing(TEST_CENTER, TEST_ZONE).await;
    assert!(matches!(
        result,
        Err(BriefingError::IncompleteAiResponse("disclaimer"))
    ));
    assert_eq!(harness.briefing_store.len(), 0);
}

#[tokio::test]
async fn test_friendly_contract_accepts_minimal_response() {
    let response = r#"{"briefing": "Moderate danger today.", "problems": []}"#;
    let (service, _) = build_service(
        Some(forecast_record()),
        None,
        response.to_string(),
        PromptContract::Friendly,
    );

    let outcome = service
        .generate_briefing(TEST_CENTER, TEST_ZONE)
        .await
        .unwrap();
    assert_eq!(outcome.briefing.briefing_text, "Moderate danger today.");
    assert!(outcome.briefing.disclaimer.is_none());
}

#[tokio::test]
async fn test_regenerate_clears_the_cache_key() {
    let (service, harness) = build_service(
        Some(forecast_record()),
        None,
        fenced_mentor_response(),
        PromptContract::Mentor,
    );

    service
        .generate_briefing(TEST_CENTER, TEST_ZONE)
        .await
        .unwrap();
    assert_eq!(harness.briefing_store.len(), 1);

    service
        .regenerate_briefing(TEST_CENTER, TEST_ZONE)
        .await
        .unwrap();
    assert_eq!(harness.briefing_store.len(), 0);

    let again = service
        .generate_briefing(TEST_CENTER, TEST_ZONE)
        .await
        .unwrap();
    assert!(!again.cached);
    assert_eq!(harness.briefing_store.len(), 1);
}

#[tokio::test]
async fn test_get_briefing_reports_cache_age() {
    let (service, _) = build_service(
        Some(forecast_record()),
        None,
        fenced_mentor_response(),
        PromptContract::Mentor,
    );

    let empty = service.get_briefing(TEST_CENTER, TEST_ZONE).await.unwrap();
    assert!(empty.briefing.is_none());
    assert!(!empty.cached);

    service
        .generate_briefing(TEST_CENTER, TEST_ZONE)
        .await
        .unwrap();

    let found = service.get_briefing(TEST_CENTER, TEST_ZONE).await.unwrap();
    assert!(found.briefing.is_some());
    assert!(found.cached);
    // created_at is pinned to "now" in the store double
    assert_eq!(found.data_age_ms, Some(0));
    assert_eq!(found.stale_data, Some(false));
}

// Store double that simulates losing a same-key insert race: the first
// lookup misses, the insert conflicts, and the re-read finds the winner.
struct RacingStore {
    winner: Briefing,
    lookups: std::sync::atomic::AtomicUsize,
}

#[async_trait]
impl BriefingStore for RacingStore {
    async fn get(
        &self,
        _center: &str,
        _zone: &str,
        _date: NaiveDate,
    ) -> Result<Option<Briefing>, DbError> {
        let n = self
            .lookups
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if n == 0 {
            Ok(None)
        } else {
            Ok(Some(self.winner.clone()))
        }
    }

    async fn insert_if_absent(&self, _b: &NewBriefing) -> Result<Option<Briefing>, DbError> {
        Ok(None)
    }

    async fn delete(&self, _c: &str, _z: &str, _d: NaiveDate) -> Result<(), DbError> {
        Ok(())
    }
}

// Store double whose insert conflicts but whose re-read also misses.
struct BrokenStore;

#[async_trait]
impl BriefingStore for BrokenStore {
    async fn get(
        &self,
        _center: &str,
        _zone: &str,
        _date: NaiveDate,
    ) -> Result<Option<Briefing>, DbError> {
        Ok(None)
    }

    async fn insert_if_absent(&self, _b: &NewBriefing) -> Result<Option<Briefing>, DbError> {
        Ok(None)
    }

    async fn delete(&self, _c: &str, _z: &str, _d: NaiveDate) -> Result<(), DbError> {
        Ok(())
    }
}

fn service_with_store(store: Arc<dyn BriefingStore>) -> BriefingService {
    BriefingService::new(
        BriefingDeps {
            briefing_store: store,
            forecast_store: Arc::new(InMemoryForecastStore::new()),
            forecast_source: Arc::new(StubForecastSource {
                record: Some(forecast_record()),
            }),
            weather_store: Arc::new(InMemoryWeatherStore::new()),
            weather_source: Arc::new(StubWeatherSource::new(None)),
            oracle: Arc::new(StubOracle::new(fenced_mentor_response())),
            clock: Arc::new(FixedClock(fixed_now())),
        },
        BriefingPolicy::default(),
    )
}

#[tokio::test]
async fn test_losing_an_insert_race_returns_the_winner() {
    let winner = Briefing {
        id: 99,
        center: TEST_CENTER.to_string(),
        zone: TEST_ZONE.to_string(),
        forecast_date: fixed_today(),
        danger_level: 3,
        briefing_text: "The winner's briefing.".to_string(),
        problems: sqlx::types::Json(Vec::new()),
        source_url: None,
        source_center: None,
        disclaimer: None,
        field_observation_prompts: None,
        created_at: fixed_now(),
    };
    let service = service_with_store(Arc::new(RacingStore {
        winner: winner.clone(),
        lookups: std::sync::atomic::AtomicUsize::new(0),
    }));

    let outcome = service
        .generate_briefing(TEST_CENTER, TEST_ZONE)
        .await
        .unwrap();
    assert!(outcome.cached);
    assert_eq!(outcome.briefing.id, 99);
    assert_eq!(outcome.briefing.briefing_text, "The winner's briefing.");
}

#[tokio::test]
async fn test_conflict_without_a_winner_is_a_persistence_error() {
    let service = service_with_store(Arc::new(BrokenStore));

    let result = service.generate_briefing(TEST_CENTER, TEST_ZONE).await;
    assert!(matches!(result, Err(BriefingError::Persistence(_))));
}
