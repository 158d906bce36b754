// Geographic primitives shared by restaurants and the activity map

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A WGS84 coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// A map region: center plus the full latitude/longitude span shown on screen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub center: GeoPoint,
    pub latitude_delta: f64,
    pub longitude_delta: f64,
}

impl Viewport {
    pub fn new(center: GeoPoint, latitude_delta: f64, longitude_delta: f64) -> Self {
        Self {
            center,
            latitude_delta,
            longitude_delta,
        }
    }

    /// Whether a point falls within `[center - delta/2, center + delta/2]`
    /// on both axes. Bounds are inclusive.
    pub fn contains(&self, point: GeoPoint) -> bool {
        let half_lat = self.latitude_delta / 2.0;
        let half_lng = self.longitude_delta / 2.0;
        point.latitude >= self.center.latitude - half_lat
            && point.latitude <= self.center.latitude + half_lat
            && point.longitude >= self.center.longitude - half_lng
            && point.longitude <= self.center.longitude + half_lng
    }
}

/// Remote rows carry latitude/longitude either as a JSON number or as a
/// numeric string. Anything else, and anything non-finite, is rejected.
pub fn parse_coordinate(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}
