// SavedListService - the viewer's bookmarked restaurants with display-time
// sorting and an optional cuisine filter

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::core::Viewer;
use crate::error::{AppError, AppResult};
use crate::gateway::{DataGateway, Filter, Table, TableQuery};
use crate::models::{Restaurant, RestaurantId, SavedRestaurant};

/// Sort orders the saved list offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SavedSort {
    RecentlySaved,
    NameAsc,
    RatingDesc,
    PriceAsc,
}

impl SavedSort {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "recent" => Some(SavedSort::RecentlySaved),
            "name" => Some(SavedSort::NameAsc),
            "rating" => Some(SavedSort::RatingDesc),
            "price" => Some(SavedSort::PriceAsc),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SavedEntry {
    pub restaurant: Restaurant,
    pub saved_at: DateTime<Utc>,
}

/// Case-insensitive cuisine filter; `None` keeps everything.
pub fn filter_by_cuisine(entries: Vec<SavedEntry>, cuisine: Option<&str>) -> Vec<SavedEntry> {
    let Some(cuisine) = cuisine else {
        return entries;
    };
    let wanted = cuisine.to_lowercase();
    entries
        .into_iter()
        .filter(|entry| {
            entry
                .restaurant
                .cuisine
                .as_deref()
                .map(|value| value.to_lowercase() == wanted)
                .unwrap_or(false)
        })
        .collect()
}

pub fn sort_entries(entries: &mut [SavedEntry], sort: SavedSort) {
    match sort {
        SavedSort::RecentlySaved => {
            entries.sort_by(|a, b| b.saved_at.cmp(&a.saved_at));
        }
        SavedSort::NameAsc => {
            entries.sort_by(|a, b| {
                a.restaurant
                    .name
                    .to_lowercase()
                    .cmp(&b.restaurant.name.to_lowercase())
            });
        }
        SavedSort::RatingDesc => {
            entries.sort_by(|a, b| match (a.restaurant.rating, b.restaurant.rating) {
                (Some(left), Some(right)) => right
                    .partial_cmp(&left)
                    .unwrap_or(std::cmp::Ordering::Equal),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            });
        }
        SavedSort::PriceAsc => {
            // Unrated and untiered entries sort to the end.
            let rank = |entry: &SavedEntry| {
                entry
                    .restaurant
                    .price_tier
                    .as_ref()
                    .map(|tier| tier.rank())
                    .unwrap_or(4)
            };
            entries.sort_by_key(rank);
        }
    }
}

#[derive(Clone)]
pub struct SavedListService {
    gateway: Arc<dyn DataGateway>,
}

impl SavedListService {
    pub fn new(gateway: Arc<dyn DataGateway>) -> Self {
        Self { gateway }
    }

    /// Bookmarks a restaurant. Returns whether this was a new save.
    pub async fn save(&self, viewer: &Viewer, restaurant_id: RestaurantId) -> AppResult<bool> {
        let viewer_id = viewer.require_user()?;
        let restaurant = self
            .gateway
            .fetch_one(TableQuery::new(Table::Restaurants).eq("id", restaurant_id.to_string()))
            .await?;
        if restaurant.is_none() {
            return Err(AppError::NotFound(format!(
                "Restaurant {} not found",
                restaurant_id
            )));
        }
        let entry = SavedRestaurant {
            user_id: viewer_id,
            restaurant_id,
            created_at: Utc::now(),
        };
        let inserted = self
            .gateway
            .insert_if_absent(
                Table::SavedRestaurants,
                entry.to_row(),
                &["user_id", "restaurant_id"],
            )
            .await?;
        if inserted {
            info!("User {} saved restaurant {}", viewer_id, restaurant_id);
        }
        Ok(inserted)
    }

    /// Removes a bookmark. Returns whether one existed.
    pub async fn unsave(&self, viewer: &Viewer, restaurant_id: RestaurantId) -> AppResult<bool> {
        let viewer_id = viewer.require_user()?;
        let removed = self
            .gateway
            .delete(
                Table::SavedRestaurants,
                vec![
                    Filter::eq("user_id", viewer_id.to_string()),
                    Filter::eq("restaurant_id", restaurant_id.to_string()),
                ],
            )
            .await?;
        if removed > 0 {
            info!("User {} removed saved restaurant {}", viewer_id, restaurant_id);
        }
        Ok(removed > 0)
    }

    /// The viewer's saved restaurants. Bookmarks whose restaurant row has
    /// disappeared are dropped silently.
    pub async fn list(
        &self,
        viewer: &Viewer,
        sort: SavedSort,
        cuisine: Option<&str>,
    ) -> AppResult<Vec<SavedEntry>> {
        let viewer_id = viewer.require_user()?;
        let saved_rows = self
            .gateway
            .select(
                TableQuery::new(Table::SavedRestaurants)
                    .eq("user_id", viewer_id.to_string())
                    .order_desc("created_at"),
            )
            .await?;
        let saved: Vec<SavedRestaurant> = saved_rows
            .iter()
            .filter_map(SavedRestaurant::from_row)
            .collect();

        let ids: Vec<String> = saved
            .iter()
            .map(|entry| entry.restaurant_id.to_string())
            .collect();
        let restaurants = self.restaurants_by_ids(ids).await?;

        let entries: Vec<SavedEntry> = saved
            .into_iter()
            .filter_map(|entry| {
                Some(SavedEntry {
                    restaurant: restaurants.get(&entry.restaurant_id)?.clone(),
                    saved_at: entry.created_at,
                })
            })
            .collect();

        let mut entries = filter_by_cuisine(entries, cuisine);
        sort_entries(&mut entries, sort);
        Ok(entries)
    }

    async fn restaurants_by_ids(
        &self,
        ids: Vec<String>,
    ) -> AppResult<HashMap<RestaurantId, Restaurant>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = self
            .gateway
            .select(TableQuery::new(Table::Restaurants).is_in("id", ids))
            .await?;
        Ok(rows
            .iter()
            .filter_map(Restaurant::from_row)
            .map(|restaurant| (restaurant.id, restaurant))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MemoryGateway;
    use crate::models::decode;
    use crate::models::PriceTier;
    use serde_json::json;
    use uuid::Uuid;

    async fn seed_restaurant(
        gateway: &MemoryGateway,
        name: &str,
        cuisine: &str,
        price: &str,
        rating: Option<f64>,
    ) -> RestaurantId {
        let id = Uuid::new_v4();
        gateway
            .insert(
                Table::Restaurants,
                decode::row_from_value(json!({
                    "id": id.to_string(),
                    "name": name,
                    "cuisine": cuisine,
                    "latitude": 29.0,
                    "longitude": -98.0,
                    "price": price,
                    "rating": rating,
                })),
            )
            .await
            .unwrap();
        id
    }

    #[tokio::test]
    async fn save_is_idempotent_and_unsave_reports_presence() {
        let gateway = Arc::new(MemoryGateway::new());
        let tacos = seed_restaurant(&gateway, "Taqueria Norte", "Mexican", "$", Some(4.5)).await;
        let service = SavedListService::new(gateway.clone());
        let viewer = Viewer::authenticated(Uuid::new_v4());

        assert!(service.save(&viewer, tacos).await.unwrap());
        assert!(!service.save(&viewer, tacos).await.unwrap());
        assert!(service.unsave(&viewer, tacos).await.unwrap());
        assert!(!service.unsave(&viewer, tacos).await.unwrap());

        let missing = service.save(&viewer, Uuid::new_v4()).await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn list_sorts_and_filters() {
        let gateway = Arc::new(MemoryGateway::new());
        let tacos = seed_restaurant(&gateway, "Taqueria Norte", "Mexican", "$", Some(4.5)).await;
        let pho = seed_restaurant(&gateway, "Pho Palace", "Vietnamese", "$$", Some(3.9)).await;
        let omakase = seed_restaurant(&gateway, "Aji Omakase", "Japanese", "$$$", None).await;
        let service = SavedListService::new(gateway.clone());
        let viewer = Viewer::authenticated(Uuid::new_v4());

        for id in [tacos, pho, omakase] {
            service.save(&viewer, id).await.unwrap();
        }

        let by_name = service
            .list(&viewer, SavedSort::NameAsc, None)
            .await
            .unwrap();
        let names: Vec<&str> = by_name
            .iter()
            .map(|entry| entry.restaurant.name.as_str())
            .collect();
        assert_eq!(names, vec!["Aji Omakase", "Pho Palace", "Taqueria Norte"]);

        let by_rating = service
            .list(&viewer, SavedSort::RatingDesc, None)
            .await
            .unwrap();
        assert_eq!(by_rating[0].restaurant.name, "Taqueria Norte");
        // The unrated entry lands last.
        assert_eq!(by_rating[2].restaurant.name, "Aji Omakase");

        let by_price = service
            .list(&viewer, SavedSort::PriceAsc, None)
            .await
            .unwrap();
        assert_eq!(
            by_price[0].restaurant.price_tier,
            Some(PriceTier::Budget)
        );

        let mexican_only = service
            .list(&viewer, SavedSort::RecentlySaved, Some("MEXICAN"))
            .await
            .unwrap();
        assert_eq!(mexican_only.len(), 1);
        assert_eq!(mexican_only[0].restaurant.id, tacos);
    }

    #[tokio::test]
    async fn bookmarks_for_vanished_restaurants_are_dropped() {
        let gateway = Arc::new(MemoryGateway::new());
        let tacos = seed_restaurant(&gateway, "Taqueria Norte", "Mexican", "$", Some(4.5)).await;
        let service = SavedListService::new(gateway.clone());
        let viewer = Viewer::authenticated(Uuid::new_v4());

        service.save(&viewer, tacos).await.unwrap();
        gateway
            .delete(
                Table::Restaurants,
                vec![Filter::eq("id", tacos.to_string())],
            )
            .await
            .unwrap();

        let entries = service
            .list(&viewer, SavedSort::RecentlySaved, None)
            .await
            .unwrap();
        assert!(entries.is_empty());
    }
}
