// Saved restaurants - a per-user bookmark edge onto the restaurants collection

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;

use crate::gateway::JsonRow;
use crate::models::decode;
use crate::models::{RestaurantId, UserId};

#[derive(Debug, Clone, Serialize)]
pub struct SavedRestaurant {
    pub user_id: UserId,
    pub restaurant_id: RestaurantId,
    pub created_at: DateTime<Utc>,
}

impl SavedRestaurant {
    pub fn from_row(row: &JsonRow) -> Option<Self> {
        Some(SavedRestaurant {
            user_id: decode::uuid_field(row, "user_id")?,
            restaurant_id: decode::uuid_field(row, "restaurant_id")?,
            created_at: decode::datetime_field(row, "created_at")?,
        })
    }

    pub fn to_row(&self) -> JsonRow {
        decode::row_from_value(json!({
            "user_id": self.user_id.to_string(),
            "restaurant_id": self.restaurant_id.to_string(),
            "created_at": decode::format_timestamp(self.created_at),
        }))
    }
}
