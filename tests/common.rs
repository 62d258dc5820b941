// Shared fixtures and in-memory collaborator doubles for integration tests
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use sqlx::types::Json;

use avalanche_briefing_service::db::{
    Briefing, BriefingStore, DbError, ForecastStore, NewBriefing, WeatherStore,
};
use avalanche_briefing_service::fetch_error::FetchError;
use avalanche_briefing_service::forecast_fetcher::{ForecastRecord, ForecastSource};
use avalanche_briefing_service::geometry::PolygonGeometry;
use avalanche_briefing_service::weather_fetcher::{
    CurrentConditions, DailySeries, HourlySeries, WeatherLocation, WeatherSnapshot, WeatherSource,
};

pub const TEST_CENTER: &str = "Sierra Avalanche Center";
pub const TEST_ZONE: &str = "Central Sierra";

/// The instant every service test pins its clock to: 2026-01-15 08:00 UTC.
pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 15, 8, 0, 0).unwrap()
}

pub fn fixed_today() -> NaiveDate {
    fixed_now().date_naive()
}

/// Base forecast: considerable danger, advice and URL set, no geometry,
/// no product narrative.
pub fn forecast_record() -> ForecastRecord {
    ForecastRecord {
        center: TEST_CENTER.to_string(),
        zone: TEST_ZONE.to_string(),
        forecast_date: fixed_today(),
        danger_overall: 3,
        danger_high: Some(4),
        danger_middle: Some(3),
        danger_low: None,
        travel_advice: Some("Dangerous avalanche conditions on wind loaded slopes.".to_string()),
        forecast_url: Some("https://www.sierraavalanchecenter.org/forecasts".to_string()),
        bottom_line: None,
        hazard_discussion: None,
        weather_discussion: None,
        problems: Vec::new(),
        media: Vec::new(),
        geometry: None,
        published_time: None,
        has_product_data: false,
    }
}

pub fn square_geometry() -> PolygonGeometry {
    PolygonGeometry {
        kind: "Polygon".to_string(),
        coordinates: vec![vec![
            vec![-120.3, 39.0],
            vec![-120.3, 39.2],
            vec![-120.1, 39.2],
            vec![-120.1, 39.0],
        ]],
    }
}

/// Weather snapshot around `fixed_now()`: 14 past days, today at daily
/// index 14, 48 hourly entries spanning today and tomorrow. The first four
/// history days each dropped 1.0" of snow.
pub fn weather_snapshot() -> WeatherSnapshot {
    let daily_len = 21;
    let mut daily_time = Vec::with_capacity(daily_len);
    for day in 0..daily_len {
        daily_time.push(format!("2026-01-{:02}", day + 1));
    }

    let mut snowfall_sum = vec![0.0; daily_len];
    for entry in snowfall_sum.iter_mut().take(4) {
        *entry = 1.0;
    }
    snowfall_sum[14] = 6.0; // today

    let mut hourly_time = Vec::with_capacity(48);
    for hour in 0..24 {
        hourly_time.push(format!("2026-01-15T{hour:02}:00"));
    }
    for hour in 0..24 {
        hourly_time.push(format!("2026-01-16T{hour:02}:00"));
    }

    WeatherSnapshot {
        location: WeatherLocation {
            latitude: 39.1,
            longitude: -120.2,
            elevation: 2100.0,
        },
        current: CurrentConditions {
            time: "2026-01-15T08:00".to_string(),
            temperature: 24.0,
            feels_like: 16.0,
            humidity: 78.0,
            precipitation: 0.0,
            weather_code: 73,
            weather_description: "Moderate snow".to_string(),
            cloud_cover: 95.0,
            pressure: 1012.0,
            wind_speed: 18.0,
            wind_direction: 225.0,
            wind_direction_cardinal: "SW".to_string(),
            wind_gusts: 34.0,
        },
        hourly: HourlySeries {
            time: hourly_time,
            temperature: (0..48).map(|h| 20.0 + (h % 12) as f64).collect(),
            precipitation_probability: vec![80.0; 48],
            precipitation: vec![0.02; 48],
            snowfall: vec![0.2; 48],
            cloud_cover: vec![95.0; 48],
            visibility: vec![8000.0; 48],
            wind_speed: (0..48).map(|h| 15.0 + (h % 6) as f64).collect(),
            wind_direction: vec![225.0; 48],
            wind_gusts: vec![35.0; 48],
            uv_index: vec![1.0; 48],
        },
        daily: DailySeries {
            time: daily_time,
            temperature_max: vec![28.0; daily_len],
            temperature_min: vec![12.0; daily_len],
            precipitation_sum: vec![0.3; daily_len],
            snowfall_sum,
            precipitation_probability_max: vec![90.0; daily_len],
            wind_speed_max: vec![25.0; daily_len],
            wind_gusts_max: vec![45.0; daily_len],
            uv_index_max: vec![1.5; daily_len],
        },
        last_updated: fixed_now(),
    }
}

/// Mentor-contract oracle response wrapped in a markdown fence.
pub fn fenced_mentor_response() -> String {
    [
        "```json",
        r#"{
  "briefing": "Considerable danger today. Wind slabs sit on lee slopes near ridgelines (official forecast).",
  "sourceUrl": "https://www.sierraavalanchecenter.org/forecasts",
  "sourceCenter": "Sierra Avalanche Center",
  "disclaimer": "This is an educational summary of official sources, not professional avalanche advice.",
  "problems": [
    {
      "name": "Wind Slab",
      "description": "Recent southwest winds drifted storm snow onto northeast aspects.",
      "likelihood": "Likely",
      "size": "Large",
      "officialSource": true
    }
  ],
  "fieldObservationPrompts": ["Do you see cracking in fresh drifts?"]
}"#,
        "```",
    ]
    .join("\n")
}

type Key = (String, String, NaiveDate);

fn key(center: &str, zone: &str, date: NaiveDate) -> Key {
    (center.to_string(), zone.to_string(), date)
}

/// Briefing store backed by a HashMap; created_at is pinned so staleness
/// is deterministic.
pub struct InMemoryBriefingStore {
    rows: Mutex<HashMap<Key, Briefing>>,
    next_id: AtomicI64,
    created_at: DateTime<Utc>,
}

impl InMemoryBriefingStore {
    pub fn new(created_at: DateTime<Utc>) -> Self {
        Self {
            rows: Mutex::new(HashMap::new()),
            next_id: AtomicI64::new(1),
            created_at,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }
}

#[async_trait]
impl BriefingStore for InMemoryBriefingStore {
    async fn get(
        &self,
        center: &str,
        zone: &str,
        date: NaiveDate,
    ) -> Result<Option<Briefing>, DbError> {
        Ok(self.rows.lock().unwrap().get(&key(center, zone, date)).cloned())
    }

    async fn insert_if_absent(
        &self,
        briefing: &NewBriefing,
    ) -> Result<Option<Briefing>, DbError> {
        let mut rows = self.rows.lock().unwrap();
        let k = key(&briefing.center, &briefing.zone, briefing.forecast_date);
        if rows.contains_key(&k) {
            return Ok(None);
        }
        let stored = Briefing {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            center: briefing.center.clone(),
            zone: briefing.zone.clone(),
            forecast_date: briefing.forecast_date,
            danger_level: briefing.danger_level,
            briefing_text: briefing.briefing_text.clone(),
            problems: Json(briefing.problems.clone()),
            source_url: briefing.source_url.clone(),
            source_center: briefing.source_center.clone(),
            disclaimer: briefing.disclaimer.clone(),
            field_observation_prompts: briefing.field_observation_prompts.clone().map(Json),
            created_at: self.created_at,
        };
        rows.insert(k, stored.clone());
        Ok(Some(stored))
    }

    async fn delete(&self, center: &str, zone: &str, date: NaiveDate) -> Result<(), DbError> {
        self.rows.lock().unwrap().remove(&key(center, zone, date));
        Ok(())
    }
}

pub struct InMemoryForecastStore {
    rows: Mutex<HashMap<Key, ForecastRecord>>,
}

impl InMemoryForecastStore {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(HashMap::new()),
        }
    }

    pub fn seed(&self, record: ForecastRecord) {
        self.rows.lock().unwrap().insert(
            key(&record.center, &record.zone, record.forecast_date),
            record,
        );
    }
}

#[async_trait]
impl ForecastStore for InMemoryForecastStore {
    async fn find(
        &self,
        center: &str,
        zone: &str,
        date: NaiveDate,
    ) -> Result<Option<ForecastRecord>, DbError> {
        Ok(self.rows.lock().unwrap().get(&key(center, zone, date)).cloned())
    }

    async fn upsert(&self, record: &ForecastRecord) -> Result<(), DbError> {
        self.seed(record.clone());
        Ok(())
    }
}

/// Fixed-answer forecast source; None means "zone not in map layer".
pub struct StubForecastSource {
    pub record: Option<ForecastRecord>,
}

#[async_trait]
impl ForecastSource for StubForecastSource {
    async fn get_forecast(
        &self,
        _center: &str,
        _zone: &str,
        _date: NaiveDate,
    ) -> Result<Option<ForecastRecord>, FetchError> {
        Ok(self.record.clone())
    }
}

/// Weather source that counts invocations; None answers with an error.
pub struct StubWeatherSource {
    pub snapshot: Option<WeatherSnapshot>,
    pub calls: AtomicUsize,
}

impl StubWeatherSource {
    pub fn new(snapshot: Option<WeatherSnapshot>) -> Self {
        Self {
            snapshot,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WeatherSource for StubWeatherSource {
    async fn get_weather(&self, lat: f64, lon: f64) -> Result<WeatherSnapshot, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.snapshot {
            Some(snapshot) => Ok(snapshot.clone()),
            None => Err(FetchError::Status {
                status: 503,
                context: format!("weather lookup at ({lat}, {lon})"),
            }),
        }
    }
}

pub struct InMemoryWeatherStore {
    rows: Mutex<HashMap<Key, WeatherSnapshot>>,
}

impl InMemoryWeatherStore {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(HashMap::new()),
        }
    }

    pub fn seed(&self, center: &str, zone: &str, date: NaiveDate, snapshot: WeatherSnapshot) {
        self.rows.lock().unwrap().insert(key(center, zone, date), snapshot);
    }
}

#[async_trait]
impl WeatherStore for InMemoryWeatherStore {
    async fn find_recent(
        &self,
        center: &str,
        zone: &str,
        date: NaiveDate,
        _max_age_hours: i64,
    ) -> Result<Option<WeatherSnapshot>, DbError> {
        Ok(self.rows.lock().unwrap().get(&key(center, zone, date)).cloned())
    }

    async fn upsert(
        &self,
        center: &str,
        zone: &str,
        date: NaiveDate,
        snapshot: &WeatherSnapshot,
    ) -> Result<(), DbError> {
        self.seed(center, zone, date, snapshot.clone());
        Ok(())
    }
}

/// Oracle double that records every prompt it is given.
pub struct StubOracle {
    pub response: String,
    pub prompts: Mutex<Vec<String>>,
}

impl StubOracle {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl avalanche_briefing_service::gemini::TextGenerationOracle for StubOracle {
    async fn generate(
        &self,
        prompt: &str,
    ) -> Result<String, avalanche_briefing_service::gemini::OracleError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(self.response.clone())
    }
}
