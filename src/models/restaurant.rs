// Restaurants - venue records with tolerant coordinate parsing and a
// normalized price tier

use serde::{Serialize, Serializer};
use serde_json::json;

use crate::core::geo::{parse_coordinate, GeoPoint};
use crate::gateway::JsonRow;
use crate::models::decode;
use crate::models::RestaurantId;

/// Display tier derived from free-text price data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PriceTier {
    Budget,
    Moderate,
    Premium,
    /// Text that matches no known prefix is kept as-is.
    Other(String),
}

impl PriceTier {
    /// Normalizes raw price text. Empty input means "no tier", never a
    /// default tier. Prefix checks run longest-first so `$$$premium`
    /// lands on the premium tier rather than the budget one.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        if trimmed.starts_with("$$$") {
            Some(PriceTier::Premium)
        } else if trimmed.starts_with("$$") {
            Some(PriceTier::Moderate)
        } else if trimmed.starts_with('$') {
            Some(PriceTier::Budget)
        } else {
            Some(PriceTier::Other(trimmed.to_string()))
        }
    }

    pub fn label(&self) -> &str {
        match self {
            PriceTier::Budget => "$",
            PriceTier::Moderate => "$$",
            PriceTier::Premium => "$$$+",
            PriceTier::Other(text) => text,
        }
    }

    /// Rank used when sorting saved lists by price, cheapest first.
    /// Unrecognized text sorts after the known tiers.
    pub fn rank(&self) -> u8 {
        match self {
            PriceTier::Budget => 0,
            PriceTier::Moderate => 1,
            PriceTier::Premium => 2,
            PriceTier::Other(_) => 3,
        }
    }
}

impl Serialize for PriceTier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl std::fmt::Display for PriceTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Restaurant {
    pub id: RestaurantId,
    pub name: String,
    pub cuisine: Option<String>,
    /// Present only when both coordinates parsed to finite numbers.
    pub location: Option<GeoPoint>,
    pub price_tier: Option<PriceTier>,
    pub rating: Option<f64>,
    pub address: Option<String>,
}

impl Restaurant {
    pub fn from_row(row: &JsonRow) -> Option<Self> {
        let latitude = row.get("latitude").and_then(parse_coordinate);
        let longitude = row.get("longitude").and_then(parse_coordinate);
        let location = match (latitude, longitude) {
            (Some(latitude), Some(longitude)) => Some(GeoPoint {
                latitude,
                longitude,
            }),
            _ => None,
        };
        Some(Restaurant {
            id: decode::uuid_field(row, "id")?,
            name: decode::string_field(row, "name")?,
            cuisine: decode::string_field(row, "cuisine"),
            location,
            price_tier: decode::str_field(row, "price").and_then(PriceTier::parse),
            rating: decode::f64_field(row, "rating"),
            address: decode::string_field(row, "address"),
        })
    }

    pub fn to_row(&self) -> JsonRow {
        decode::row_from_value(json!({
            "id": self.id.to_string(),
            "name": self.name,
            "cuisine": self.cuisine,
            "latitude": self.location.map(|point| point.latitude),
            "longitude": self.location.map(|point| point.longitude),
            "price": self.price_tier.as_ref().map(PriceTier::label),
            "rating": self.rating,
            "address": self.address,
        }))
    }
}
