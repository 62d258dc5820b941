use serde::{Deserialize, Serialize};

/// GeoJSON polygon as published by the forecast map-layer API.
///
/// Coordinates are rings of [longitude, latitude] pairs; the first ring is
/// the zone outline. Inner rings (holes) are retained but never used.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PolygonGeometry {
    #[serde(rename = "type")]
    pub kind: String,
    pub coordinates: Vec<Vec<Vec<f64>>>,
}

/// A centroid in weather-lookup order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Centroid {
    pub lat: f64,
    pub lon: f64,
}

/// Unweighted centroid of the polygon's first ring.
///
/// Arithmetic mean of the ring vertices, not an area-weighted centroid.
/// Forecast zones are small enough that the difference does not move the
/// point outside the zone, and the result only seeds a weather lookup.
pub fn polygon_centroid(geometry: &PolygonGeometry) -> Option<Centroid> {
    let ring = geometry.coordinates.first()?;
    if ring.is_empty() {
        return None;
    }

    let mut lon_sum = 0.0;
    let mut lat_sum = 0.0;
    let mut count = 0usize;

    for vertex in ring {
        let (lon, lat) = match (vertex.first(), vertex.get(1)) {
            (Some(lon), Some(lat)) => (*lon, *lat),
            _ => return None,
        };
        lon_sum += lon;
        lat_sum += lat;
        count += 1;
    }

    Some(Centroid {
        lat: lat_sum / count as f64,
        lon: lon_sum / count as f64,
    })
}
