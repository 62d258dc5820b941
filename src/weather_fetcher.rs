use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::fetch_error::FetchError;
use crate::utils::degrees_to_cardinal;

/// Source of current + historical + near-future weather for a coordinate.
///
/// Implementations must not assume any zone context; caching per zone is
/// layered on top by the caller.
#[async_trait]
pub trait WeatherSource: Send + Sync {
    async fn get_weather(&self, lat: f64, lon: f64) -> Result<WeatherSnapshot, FetchError>;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeatherLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CurrentConditions {
    pub time: String,
    pub temperature: f64,
    pub feels_like: f64,
    pub humidity: f64,
    pub precipitation: f64,
    pub weather_code: i32,
    pub weather_description: String,
    pub cloud_cover: f64,
    pub pressure: f64,
    pub wind_speed: f64,
    pub wind_direction: f64,
    pub wind_direction_cardinal: String,
    pub wind_gusts: f64,
}

/// Index-aligned hourly series; every array matches `time` entry-for-entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HourlySeries {
    pub time: Vec<String>,
    pub temperature: Vec<f64>,
    pub precipitation_probability: Vec<f64>,
    pub precipitation: Vec<f64>,
    pub snowfall: Vec<f64>,
    pub cloud_cover: Vec<f64>,
    pub visibility: Vec<f64>,
    pub wind_speed: Vec<f64>,
    pub wind_direction: Vec<f64>,
    pub wind_gusts: Vec<f64>,
    pub uv_index: Vec<f64>,
}

/// Index-aligned daily series spanning 14 days back through 7 days forward.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DailySeries {
    pub time: Vec<String>,
    pub temperature_max: Vec<f64>,
    pub temperature_min: Vec<f64>,
    pub precipitation_sum: Vec<f64>,
    pub snowfall_sum: Vec<f64>,
    pub precipitation_probability_max: Vec<f64>,
    pub wind_speed_max: Vec<f64>,
    pub wind_gusts_max: Vec<f64>,
    pub uv_index_max: Vec<f64>,
}

/// One fetch of weather context for a zone centroid. Never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WeatherSnapshot {
    pub location: WeatherLocation,
    pub current: CurrentConditions,
    pub hourly: HourlySeries,
    pub daily: DailySeries,
    pub last_updated: DateTime<Utc>,
}

// Raw Open-Meteo response shape (field names as the API returns them)

#[derive(Debug, Deserialize)]
pub struct OpenMeteoResponse {
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: f64,
    pub current: OpenMeteoCurrent,
    pub hourly: OpenMeteoHourly,
    pub daily: OpenMeteoDaily,
}

#[derive(Debug, Deserialize)]
pub struct OpenMeteoCurrent {
    pub time: String,
    pub temperature_2m: f64,
    pub relative_humidity_2m: f64,
    pub apparent_temperature: f64,
    pub precipitation: f64,
    pub weather_code: i32,
    pub cloud_cover: f64,
    pub pressure_msl: f64,
    pub wind_speed_10m: f64,
    pub wind_direction_10m: f64,
    pub wind_gusts_10m: f64,
}

#[derive(Debug, Deserialize)]
pub struct OpenMeteoHourly {
    pub time: Vec<String>,
    pub temperature_2m: Vec<f64>,
    pub precipitation_probability: Vec<f64>,
    pub precipitation: Vec<f64>,
    pub snowfall: Vec<f64>,
    pub cloud_cover: Vec<f64>,
    pub visibility: Vec<f64>,
    pub wind_speed_10m: Vec<f64>,
    pub wind_direction_10m: Vec<f64>,
    pub wind_gusts_10m: Vec<f64>,
    pub uv_index: Vec<f64>,
}

#[derive(Debug, Deserialize)]
pub struct OpenMeteoDaily {
    pub time: Vec<String>,
    pub temperature_2m_max: Vec<f64>,
    pub temperature_2m_min: Vec<f64>,
    pub precipitation_sum: Vec<f64>,
    pub snowfall_sum: Vec<f64>,
    pub precipitation_probability_max: Vec<f64>,
    pub wind_speed_10m_max: Vec<f64>,
    pub wind_gusts_10m_max: Vec<f64>,
    pub uv_index_max: Vec<f64>,
}

const CURRENT_PARAMS: &str = "temperature_2m,relative_humidity_2m,apparent_temperature,precipitation,weather_code,cloud_cover,pressure_msl,wind_speed_10m,wind_direction_10m,wind_gusts_10m";
const HOURLY_PARAMS: &str = "temperature_2m,precipitation_probability,precipitation,snowfall,cloud_cover,visibility,wind_speed_10m,wind_direction_10m,wind_gusts_10m,uv_index";
const DAILY_PARAMS: &str = "temperature_2m_max,temperature_2m_min,precipitation_sum,snowfall_sum,precipitation_probability_max,wind_speed_10m_max,wind_gusts_10m_max,uv_index_max";

/// Open-Meteo forecast client.
#[derive(Clone)]
pub struct OpenMeteoFetcher {
    client: reqwest::Client,
    base_url: String,
}

impl OpenMeteoFetcher {
    pub fn new() -> Self {
        Self::with_base_url("https://api.open-meteo.com/v1".to_string())
    }

    pub fn with_base_url(base_url: String) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .expect("Failed to create HTTP client"),
            base_url,
        }
    }

    #[instrument(skip(self))]
    async fn fetch(&self, lat: f64, lon: f64) -> Result<WeatherSnapshot, FetchError> {
        let url = format!("{}/forecast", self.base_url);
        debug!("Requesting weather from {}", url);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("latitude", lat.to_string()),
                ("longitude", lon.to_string()),
                ("current", CURRENT_PARAMS.to_string()),
                ("hourly", HOURLY_PARAMS.to_string()),
                ("daily", DAILY_PARAMS.to_string()),
                ("temperature_unit", "fahrenheit".to_string()),
                ("wind_speed_unit", "mph".to_string()),
                ("precipitation_unit", "inch".to_string()),
                ("timezone", "auto".to_string()),
                ("forecast_days", "7".to_string()),
                ("past_days", "14".to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                context: format!("weather lookup at ({lat}, {lon})"),
            });
        }

        let raw: OpenMeteoResponse = response
            .json()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))?;

        debug!(
            "Weather response: {} hourly entries, {} daily entries",
            raw.hourly.time.len(),
            raw.daily.time.len()
        );
        Ok(build_snapshot(raw, Utc::now()))
    }
}

impl Default for OpenMeteoFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WeatherSource for OpenMeteoFetcher {
    async fn get_weather(&self, lat: f64, lon: f64) -> Result<WeatherSnapshot, FetchError> {
        self.fetch(lat, lon).await
    }
}

/// Flatten the raw API response into the snapshot shape the rest of the
/// pipeline consumes.
pub fn build_snapshot(raw: OpenMeteoResponse, fetched_at: DateTime<Utc>) -> WeatherSnapshot {
    WeatherSnapshot {
        location: WeatherLocation {
            latitude: raw.latitude,
            longitude: raw.longitude,
            elevation: raw.elevation,
        },
        current: CurrentConditions {
            time: raw.current.time,
            temperature: raw.current.temperature_2m,
            feels_like: raw.current.apparent_temperature,
            humidity: raw.current.relative_humidity_2m,
            precipitation: raw.current.precipitation,
            weather_code: raw.current.weather_code,
            weather_description: weather_code_description(raw.current.weather_code).to_string(),
            cloud_cover: raw.current.cloud_cover,
            pressure: raw.current.pressure_msl,
            wind_speed: raw.current.wind_speed_10m,
            wind_direction: raw.current.wind_direction_10m,
            wind_direction_cardinal: degrees_to_cardinal(raw.current.wind_direction_10m)
                .to_string(),
            wind_gusts: raw.current.wind_gusts_10m,
        },
        hourly: HourlySeries {
            time: raw.hourly.time,
            temperature: raw.hourly.temperature_2m,
            precipitation_probability: raw.hourly.precipitation_probability,
            precipitation: raw.hourly.precipitation,
            snowfall: raw.hourly.snowfall,
            cloud_cover: raw.hourly.cloud_cover,
            visibility: raw.hourly.visibility,
            wind_speed: raw.hourly.wind_speed_10m,
            wind_direction: raw.hourly.wind_direction_10m,
            wind_gusts: raw.hourly.wind_gusts_10m,
            uv_index: raw.hourly.uv_index,
        },
        daily: DailySeries {
            time: raw.daily.time,
            temperature_max: raw.daily.temperature_2m_max,
            temperature_min: raw.daily.temperature_2m_min,
            precipitation_sum: raw.daily.precipitation_sum,
            snowfall_sum: raw.daily.snowfall_sum,
            precipitation_probability_max: raw.daily.precipitation_probability_max,
            wind_speed_max: raw.daily.wind_speed_10m_max,
            wind_gusts_max: raw.daily.wind_gusts_10m_max,
            uv_index_max: raw.daily.uv_index_max,
        },
        last_updated: fetched_at,
    }
}

/// WMO weather interpretation codes as plain descriptions.
pub fn weather_code_description(code: i32) -> &'static str {
    match code {
        0 => "Clear sky",
        1 => "Mainly clear",
        2 => "Partly cloudy",
        3 => "Overcast",
        45 => "Fog",
        48 => "Depositing rime fog",
        51 => "Light drizzle",
        53 => "Moderate drizzle",
        55 => "Dense drizzle",
        56 => "Light freezing drizzle",
        57 => "Dense freezing drizzle",
        61 => "Slight rain",
        63 => "Moderate rain",
        65 => "Heavy rain",
        66 => "Light freezing rain",
        67 => "Heavy freezing rain",
        71 => "Slight snow",
        73 => "Moderate snow",
        75 => "Heavy snow",
        77 => "Snow grains",
        80 => "Slight rain showers",
        81 => "Moderate rain showers",
        82 => "Violent rain showers",
        85 => "Slight snow showers",
        86 => "Heavy snow showers",
        95 => "Thunderstorm",
        96 => "Thunderstorm with slight hail",
        99 => "Thunderstorm with heavy hail",
        _ => "Unknown",
    }
}
