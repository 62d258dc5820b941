use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::fetch_error::FetchError;
use crate::geometry::PolygonGeometry;

/// Source of official avalanche forecasts for a (center, zone, date).
#[async_trait]
pub trait ForecastSource: Send + Sync {
    async fn get_forecast(
        &self,
        center: &str,
        zone: &str,
        date: NaiveDate,
    ) -> Result<Option<ForecastRecord>, FetchError>;
}

/// One zone's official forecast for one calendar date.
///
/// Danger ratings use the North American scale: -1 means the center issued
/// "no rating", 1-5 run Low through Extreme. A `None` elevation band means
/// the band was not assessed at all, which is distinct from -1.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ForecastRecord {
    pub center: String,
    pub zone: String,
    pub forecast_date: NaiveDate,
    pub danger_overall: i32,
    pub danger_high: Option<i32>,
    pub danger_middle: Option<i32>,
    pub danger_low: Option<i32>,
    pub travel_advice: Option<String>,
    pub forecast_url: Option<String>,
    pub bottom_line: Option<String>,
    pub hazard_discussion: Option<String>,
    pub weather_discussion: Option<String>,
    pub problems: Vec<OfficialProblem>,
    pub media: Vec<MediaItem>,
    pub geometry: Option<PolygonGeometry>,
    pub published_time: Option<DateTime<Utc>>,
    /// True when the detailed product endpoint contributed narrative fields.
    pub has_product_data: bool,
}

/// Avalanche problem as the product API describes it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OfficialProblem {
    pub name: Option<String>,
    pub likelihood: Option<String>,
    pub min_size: Option<String>,
    pub max_size: Option<String>,
    pub discussion: Option<String>,
    #[serde(default)]
    pub location: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MediaUrls {
    pub large: Option<String>,
    pub medium: Option<String>,
    pub thumbnail: Option<String>,
    pub original: Option<String>,
}

/// Field photo or video attached to a forecast product.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MediaItem {
    pub id: Option<String>,
    pub caption: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub url: Option<MediaUrls>,
}

/// Map-layer feature ids arrive as numbers or strings depending on center.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum FeatureId {
    Num(i64),
    Text(String),
}

impl FeatureId {
    pub fn as_string(&self) -> String {
        match self {
            FeatureId::Num(n) => n.to_string(),
            FeatureId::Text(s) => s.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct MapLayerResponse {
    pub features: Vec<MapLayerFeature>,
}

#[derive(Debug, Deserialize)]
pub struct MapLayerFeature {
    #[serde(default)]
    pub id: Option<FeatureId>,
    #[serde(default)]
    pub geometry: Option<serde_json::Value>,
    pub properties: MapLayerProperties,
}

#[derive(Debug, Deserialize)]
pub struct MapLayerProperties {
    pub name: String,
    pub center: String,
    #[serde(default)]
    pub danger_level: Option<i32>,
    #[serde(default)]
    pub danger_elevation_high: Option<i32>,
    #[serde(default)]
    pub danger_elevation_middle: Option<i32>,
    #[serde(default)]
    pub danger_elevation_low: Option<i32>,
    #[serde(default)]
    pub travel_advice: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProductResponse {
    #[serde(default)]
    pub published_time: Option<String>,
    #[serde(default)]
    pub bottom_line: Option<String>,
    #[serde(default)]
    pub hazard_discussion: Option<String>,
    #[serde(default)]
    pub weather_discussion: Option<String>,
    #[serde(default)]
    pub forecast_avalanche_problems: Vec<OfficialProblem>,
    #[serde(default)]
    pub media: Vec<MediaItem>,
}

/// center name as the map layer reports it -> center_id the product API wants
pub fn center_id_for(center: &str) -> Option<&'static str> {
    match center {
        "Sierra Avalanche Center" => Some("SAC"),
        "Northwest Avalanche Center" => Some("NWAC"),
        "Colorado Avalanche Information Center" => Some("CAIC"),
        "Utah Avalanche Center" => Some("UAC"),
        "Bridger-Teton Avalanche Center" => Some("BTAC"),
        "Gallatin National Forest Avalanche Center" => Some("GNFAC"),
        "Central Oregon Avalanche Center" => Some("COAA"),
        "Mount Washington Avalanche Center" => Some("MWAC"),
        "Sawtooth Avalanche Center" => Some("SAW"),
        "Wallowa Avalanche Center" => Some("WAC"),
        "Flathead Avalanche Center" => Some("FAC"),
        "Chugach National Forest Avalanche Information Center" => Some("CNFAIC"),
        "Hatcher Pass Avalanche Center" => Some("HPAC"),
        "West Central Montana Avalanche Center" => Some("WCMAC"),
        "Payette Avalanche Center" => Some("PAC"),
        "Crested Butte Avalanche Center" => Some("CBAC"),
        "Friends of CBAC" => Some("FCBAC"),
        "Eastern Sierra Avalanche Center" => Some("ESAC"),
        "Mount Shasta Avalanche Center" => Some("MSAC"),
        _ => None,
    }
}

/// Client for the national avalanche forecast API (map layer + product).
#[derive(Clone)]
pub struct AvalancheOrgFetcher {
    client: reqwest::Client,
    base_url: String,
}

impl AvalancheOrgFetcher {
    pub fn new() -> Self {
        Self::with_base_url("https://api.avalanche.org/v2/public".to_string())
    }

    pub fn with_base_url(base_url: String) -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent("avalanche-briefing-service")
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .expect("Failed to create HTTP client"),
            base_url,
        }
    }

    /// Fetch every zone in the national map layer.
    #[instrument(skip(self))]
    pub async fn fetch_map_layer(&self) -> Result<MapLayerResponse, FetchError> {
        let url = format!("{}/products/map-layer", self.base_url);
        debug!("Requesting forecast map layer from {}", url);

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                context: "forecast map layer".to_string(),
            });
        }

        let map_layer: MapLayerResponse = response
            .json()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))?;

        debug!("Map layer returned {} zones", map_layer.features.len());
        Ok(map_layer)
    }

    /// Fetch the detailed forecast product for one zone. Best-effort: any
    /// failure is logged and reported as None so the base forecast still
    /// flows through.
    #[instrument(skip(self))]
    pub async fn fetch_product(&self, center_id: &str, zone_id: &str) -> Option<ProductResponse> {
        let url = format!(
            "{}/product?type=forecast&center_id={}&zone_id={}",
            self.base_url, center_id, zone_id
        );

        let response = match self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!("Product request failed for {center_id}/{zone_id}: {e}");
                return None;
            }
        };

        if !response.status().is_success() {
            warn!(
                "Product API returned {} for {center_id}/{zone_id}",
                response.status()
            );
            return None;
        }

        match response.json::<ProductResponse>().await {
            Ok(product) => Some(product),
            Err(e) => {
                warn!("Failed to decode product for {center_id}/{zone_id}: {e}");
                None
            }
        }
    }

    /// All of today's forecasts from the map layer, without product
    /// enrichment. Used by the refresh scheduler to warm the cache.
    #[instrument(skip(self))]
    pub async fn fetch_all_forecasts(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<ForecastRecord>, FetchError> {
        let map_layer = self.fetch_map_layer().await?;
        Ok(map_layer
            .features
            .into_iter()
            .map(|f| record_from_feature(f, date).0)
            .collect())
    }
}

impl Default for AvalancheOrgFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ForecastSource for AvalancheOrgFetcher {
    async fn get_forecast(
        &self,
        center: &str,
        zone: &str,
        date: NaiveDate,
    ) -> Result<Option<ForecastRecord>, FetchError> {
        let map_layer = self.fetch_map_layer().await?;

        let feature = match map_layer
            .features
            .into_iter()
            .find(|f| f.properties.center == center && f.properties.name == zone)
        {
            Some(f) => f,
            None => {
                debug!("Zone {zone} of {center} not present in map layer");
                return Ok(None);
            }
        };

        let (mut record, zone_id) = record_from_feature(feature, date);

        // Narrative enrichment needs the product API's center_id code
        if let (Some(center_id), Some(zone_id)) = (center_id_for(center), zone_id) {
            if let Some(product) = self.fetch_product(center_id, &zone_id).await {
                apply_product(&mut record, product);
            }
        } else {
            debug!("No product lookup possible for {center} (unmapped center id)");
        }

        Ok(Some(record))
    }
}

/// Convert a map-layer feature into a base forecast record, returning the
/// feature id needed for a follow-up product lookup.
pub fn record_from_feature(
    feature: MapLayerFeature,
    date: NaiveDate,
) -> (ForecastRecord, Option<String>) {
    let zone_id = feature.id.as_ref().map(FeatureId::as_string);
    let geometry = feature
        .geometry
        .and_then(|g| serde_json::from_value::<PolygonGeometry>(g).ok());

    let p = feature.properties;
    let record = ForecastRecord {
        center: p.center,
        zone: p.name,
        forecast_date: date,
        danger_overall: p.danger_level.unwrap_or(-1),
        danger_high: p.danger_elevation_high,
        danger_middle: p.danger_elevation_middle,
        danger_low: p.danger_elevation_low,
        travel_advice: p.travel_advice,
        forecast_url: p.url,
        bottom_line: None,
        hazard_discussion: None,
        weather_discussion: None,
        problems: Vec::new(),
        media: Vec::new(),
        geometry,
        published_time: None,
        has_product_data: false,
    };

    (record, zone_id)
}

/// Merge product narrative fields into a base record.
pub fn apply_product(record: &mut ForecastRecord, product: ProductResponse) {
    record.bottom_line = product.bottom_line;
    record.hazard_discussion = product.hazard_discussion;
    record.weather_discussion = product.weather_discussion;
    record.problems = product.forecast_avalanche_problems;
    record.media = product.media;
    record.published_time = product.published_time.as_deref().and_then(|raw| {
        match DateTime::parse_from_rfc3339(raw) {
            Ok(t) => Some(t.with_timezone(&Utc)),
            Err(e) => {
                warn!("Unparseable published_time {raw:?}: {e}");
                None
            }
        }
    });
    record.has_product_data = true;
}
