// MapPinService - groups followed users' reviews into restaurant map pins
// and holds the display-time filter state for the map view.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use crate::core::geo::{GeoPoint, Viewport};
use crate::core::text::review_snippet;
use crate::core::Viewer;
use crate::error::AppResult;
use crate::gateway::{DataGateway, Table, TableQuery};
use crate::models::{
    EdgeStatus, Post, PostId, PostKind, PriceTier, Profile, Restaurant, RestaurantId, UserId,
};

/// One review rendered inside a pin callout.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewPreview {
    pub post_id: PostId,
    pub author_id: UserId,
    pub author_name: String,
    pub author_avatar_url: Option<String>,
    pub rating: Option<f64>,
    pub snippet: String,
    pub created_at: DateTime<Utc>,
}

/// One restaurant on the map, carrying its qualifying reviews newest first.
#[derive(Debug, Clone, Serialize)]
pub struct MapPin {
    pub restaurant_id: RestaurantId,
    pub name: String,
    pub cuisine: Option<String>,
    pub location: GeoPoint,
    pub price_tier: Option<PriceTier>,
    pub rating: Option<f64>,
    /// Timestamp of the most recent review; pins sort by this.
    pub latest_activity: DateTime<Utc>,
    pub reviews: Vec<ReviewPreview>,
}

/// Groups reviews by restaurant. Reviews pointing at a missing restaurant,
/// at a restaurant without parseable coordinates, or at a missing author
/// profile are excluded, never reported; a restaurant with zero surviving
/// reviews produces no pin.
pub fn build_pins(
    reviews: &[Post],
    restaurants: &HashMap<RestaurantId, Restaurant>,
    authors: &HashMap<UserId, Profile>,
) -> Vec<MapPin> {
    let mut grouped: HashMap<RestaurantId, Vec<ReviewPreview>> = HashMap::new();
    for review in reviews {
        let Some(restaurant_id) = review.restaurant_id else {
            continue;
        };
        let Some(restaurant) = restaurants.get(&restaurant_id) else {
            continue;
        };
        if restaurant.location.is_none() {
            continue;
        }
        let Some(author) = authors.get(&review.author_id) else {
            continue;
        };
        grouped
            .entry(restaurant_id)
            .or_default()
            .push(ReviewPreview {
                post_id: review.id,
                author_id: review.author_id,
                author_name: author
                    .display_name
                    .clone()
                    .unwrap_or_else(|| author.username.clone()),
                author_avatar_url: author.avatar_url.clone(),
                rating: review.rating,
                snippet: review_snippet(review.body.as_deref()),
                created_at: review.created_at,
            });
    }

    let mut pins: Vec<MapPin> = grouped
        .into_iter()
        .filter_map(|(restaurant_id, mut previews)| {
            let restaurant = restaurants.get(&restaurant_id)?;
            let location = restaurant.location?;
            previews.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            let latest_activity = previews.first()?.created_at;
            Some(MapPin {
                restaurant_id,
                name: restaurant.name.clone(),
                cuisine: restaurant.cuisine.clone(),
                location,
                price_tier: restaurant.price_tier.clone(),
                rating: restaurant.rating,
                latest_activity,
                reviews: previews,
            })
        })
        .collect();
    pins.sort_by(|a, b| b.latest_activity.cmp(&a.latest_activity));
    pins
}

/// Case-insensitive cuisine membership. An empty selection keeps every pin.
pub fn cuisine_matches(pin: &MapPin, selected: &[String]) -> bool {
    if selected.is_empty() {
        return true;
    }
    let Some(cuisine) = pin.cuisine.as_deref() else {
        return false;
    };
    let cuisine = cuisine.to_lowercase();
    selected.iter().any(|choice| choice.to_lowercase() == cuisine)
}

/// Filter state for the map view. The selection is re-checked after every
/// change: a selected pin that a new filter or viewport excludes is
/// deselected immediately.
#[derive(Debug, Default)]
pub struct MapViewState {
    pins: Vec<MapPin>,
    cuisine_filter: Vec<String>,
    viewport: Option<Viewport>,
    selected: Option<RestaurantId>,
}

impl MapViewState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_pins(&mut self, pins: Vec<MapPin>) {
        self.pins = pins;
        self.enforce_selection();
    }

    pub fn set_cuisine_filter(&mut self, cuisines: Vec<String>) {
        self.cuisine_filter = cuisines;
        self.enforce_selection();
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = Some(viewport);
        self.enforce_selection();
    }

    /// Selects a pin; selecting one the current filters hide is a no-op
    /// ending with no selection. Returns whether a selection is active.
    pub fn select(&mut self, restaurant_id: RestaurantId) -> bool {
        self.selected = Some(restaurant_id);
        self.enforce_selection();
        self.selected.is_some()
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    pub fn selected(&self) -> Option<RestaurantId> {
        self.selected
    }

    /// Pins surviving the cuisine filter composed with the viewport filter.
    pub fn visible_pins(&self) -> Vec<&MapPin> {
        self.pins
            .iter()
            .filter(|pin| cuisine_matches(pin, &self.cuisine_filter))
            .filter(|pin| match &self.viewport {
                Some(viewport) => viewport.contains(pin.location),
                None => true,
            })
            .collect()
    }

    fn enforce_selection(&mut self) {
        if let Some(selected) = self.selected {
            let still_visible = self
                .visible_pins()
                .iter()
                .any(|pin| pin.restaurant_id == selected);
            if !still_visible {
                self.selected = None;
            }
        }
    }
}

#[derive(Clone)]
pub struct MapPinService {
    gateway: Arc<dyn DataGateway>,
    /// Cap on how many recent reviews feed the aggregation.
    activity_limit: u32,
}

impl MapPinService {
    pub fn new(gateway: Arc<dyn DataGateway>, activity_limit: u32) -> Self {
        Self {
            gateway,
            activity_limit,
        }
    }

    /// Pins for the viewer's map: recent reviews authored by users the
    /// viewer follows (approved edges only), grouped by restaurant.
    /// An anonymous viewer follows nobody and gets an empty map.
    pub async fn load_pins(&self, viewer: &Viewer) -> AppResult<Vec<MapPin>> {
        let Some(viewer_id) = viewer.user_id() else {
            return Ok(Vec::new());
        };

        let followed = self.followed_ids(viewer_id).await?;
        if followed.is_empty() {
            return Ok(Vec::new());
        }

        let review_rows = self
            .gateway
            .select(
                TableQuery::new(Table::Posts)
                    .eq("kind", PostKind::Review.as_str())
                    .is_in("author_id", followed)
                    .order_desc("created_at")
                    .limit(self.activity_limit),
            )
            .await?;
        let reviews: Vec<Post> = review_rows.iter().filter_map(Post::from_row).collect();

        let restaurant_ids: Vec<String> = reviews
            .iter()
            .filter_map(|review| review.restaurant_id)
            .map(|id| id.to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let author_ids: Vec<String> = reviews
            .iter()
            .map(|review| review.author_id.to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let (restaurants, authors) = futures::try_join!(
            self.restaurants_by_ids(restaurant_ids),
            self.profiles_by_ids(author_ids)
        )?;

        let pins = build_pins(&reviews, &restaurants, &authors);
        let kept: usize = pins.iter().map(|pin| pin.reviews.len()).sum();
        if kept < reviews.len() {
            warn!(
                "Excluded {} of {} reviews during map aggregation",
                reviews.len() - kept,
                reviews.len()
            );
        }
        Ok(pins)
    }

    async fn followed_ids(&self, viewer_id: UserId) -> AppResult<Vec<String>> {
        let rows = self
            .gateway
            .select(
                TableQuery::new(Table::Follows)
                    .eq("follower_id", viewer_id.to_string())
                    .eq("status", EdgeStatus::Approved.as_str()),
            )
            .await?;
        Ok(rows
            .iter()
            .filter_map(crate::models::FollowEdge::from_row)
            .map(|edge| edge.followee_id.to_string())
            .collect())
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

    async fn profiles_by_ids(&self, ids: Vec<String>) -> AppResult<HashMap<UserId, Profile>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = self
            .gateway
            .select(TableQuery::new(Table::Profiles).is_in("id", ids))
            .await?;
        Ok(rows
            .iter()
            .filter_map(Profile::from_row)
            .map(|profile| (profile.id, profile))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::decode;
    use uuid::Uuid;

    fn restaurant(name: &str, cuisine: &str, latitude: f64, longitude: f64) -> Restaurant {
        Restaurant {
            id: Uuid::new_v4(),
            name: name.to_string(),
            cuisine: Some(cuisine.to_string()),
            location: Some(GeoPoint {
                latitude,
                longitude,
            }),
            price_tier: PriceTier::parse("$$"),
            rating: Some(4.0),
            address: None,
        }
    }

    fn author(username: &str) -> Profile {
        Profile {
            id: Uuid::new_v4(),
            username: username.to_string(),
            display_name: None,
            avatar_url: None,
            bio: None,
            is_public: true,
            onboarded: true,
            created_at: Utc::now(),
        }
    }

    fn review(author_id: UserId, restaurant_id: Option<RestaurantId>, at: &str) -> Post {
        Post {
            id: Uuid::new_v4(),
            author_id,
            kind: PostKind::Review,
            restaurant_id,
            rating: Some(4.5),
            title: None,
            body: Some("Worth the wait.".to_string()),
            image_urls: Vec::new(),
            attached_review_id: None,
            likes_count: 0,
            comments_count: 0,
            created_at: decode::parse_timestamp(at).unwrap(),
        }
    }

    fn pin_fixture() -> (Vec<MapPin>, RestaurantId, RestaurantId) {
        let writer = author("taco_fan");
        let tacos = restaurant("Taqueria Norte", "Mexican", 29.0, -98.0);
        let pho = restaurant("Pho Palace", "Vietnamese", 29.5, -98.5);
        let restaurants: HashMap<_, _> = [(tacos.id, tacos.clone()), (pho.id, pho.clone())].into();
        let reviews = vec![
            review(writer.id, Some(tacos.id), "2025-06-01T00:00:00.000000Z"),
            review(writer.id, Some(pho.id), "2025-06-02T00:00:00.000000Z"),
        ];
        let pins = build_pins(&reviews, &restaurants, &[(writer.id, writer)].into());
        (pins, tacos.id, pho.id)
    }

    #[test]
    fn groups_reviews_and_orders_within_pin() {
        let writer = author("taco_fan");
        let tacos = restaurant("Taqueria Norte", "Mexican", 29.0, -98.0);
        let restaurants: HashMap<_, _> = [(tacos.id, tacos.clone())].into();
        let older = review(writer.id, Some(tacos.id), "2025-06-01T00:00:00.000000Z");
        let newer = review(writer.id, Some(tacos.id), "2025-06-03T00:00:00.000000Z");
        let reviews = vec![older.clone(), newer.clone()];

        let pins = build_pins(&reviews, &restaurants, &[(writer.id, writer)].into());
        assert_eq!(pins.len(), 1);
        assert_eq!(pins[0].reviews.len(), 2);
        assert_eq!(pins[0].reviews[0].post_id, newer.id);
        assert_eq!(pins[0].reviews[1].post_id, older.id);
        assert_eq!(pins[0].latest_activity, newer.created_at);
    }

    #[test]
    fn malformed_reviews_are_silently_excluded() {
        let writer = author("taco_fan");
        let mut no_coords = restaurant("Mystery Diner", "Fusion", 0.0, 0.0);
        no_coords.location = None;
        let tacos = restaurant("Taqueria Norte", "Mexican", 29.0, -98.0);
        let restaurants: HashMap<_, _> =
            [(no_coords.id, no_coords.clone()), (tacos.id, tacos.clone())].into();

        let reviews = vec![
            review(writer.id, Some(no_coords.id), "2025-06-01T00:00:00.000000Z"),
            review(writer.id, Some(Uuid::new_v4()), "2025-06-01T00:00:00.000000Z"),
            review(writer.id, None, "2025-06-01T00:00:00.000000Z"),
            // Valid restaurant, but the author profile has vanished
            review(Uuid::new_v4(), Some(tacos.id), "2025-06-01T00:00:00.000000Z"),
        ];
        let pins = build_pins(&reviews, &restaurants, &[(writer.id, writer)].into());
        assert!(pins.is_empty());
    }

    #[test]
    fn preview_carries_snippet_and_author() {
        let author_id = Uuid::new_v4();
        let author = Profile {
            id: author_id,
            username: "taco_fan".to_string(),
            display_name: Some("Taco Fan".to_string()),
            avatar_url: Some("avatar.jpg".to_string()),
            bio: None,
            is_public: true,
            onboarded: true,
            created_at: Utc::now(),
        };
        let tacos = restaurant("Taqueria Norte", "Mexican", 29.0, -98.0);
        let restaurants: HashMap<_, _> = [(tacos.id, tacos.clone())].into();
        let mut long_review = review(author_id, Some(tacos.id), "2025-06-01T00:00:00.000000Z");
        long_review.body = Some("x".repeat(120));

        let pins = build_pins(
            &[long_review],
            &restaurants,
            &[(author_id, author)].into(),
        );
        let preview = &pins[0].reviews[0];
        assert_eq!(preview.author_name, "Taco Fan");
        assert_eq!(preview.snippet.chars().count(), 91);
        assert!(preview.snippet.ends_with('…'));
    }

    #[test]
    fn cuisine_filter_is_case_insensitive() {
        let (pins, tacos_id, _) = pin_fixture();
        let mut state = MapViewState::new();
        state.set_pins(pins);

        state.set_cuisine_filter(vec!["MEXICAN".to_string()]);
        let visible = state.visible_pins();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].restaurant_id, tacos_id);

        state.set_cuisine_filter(Vec::new());
        assert_eq!(state.visible_pins().len(), 2);
    }

    #[test]
    fn filter_change_clears_an_excluded_selection() {
        let (pins, tacos_id, pho_id) = pin_fixture();
        let mut state = MapViewState::new();
        state.set_pins(pins);

        assert!(state.select(tacos_id));
        state.set_cuisine_filter(vec!["vietnamese".to_string()]);
        assert_eq!(state.selected(), None);

        // Re-widening the filter does not resurrect the old selection.
        state.set_cuisine_filter(Vec::new());
        assert_eq!(state.selected(), None);

        assert!(state.select(pho_id));
        state.set_viewport(Viewport {
            center: GeoPoint {
                latitude: 29.0,
                longitude: -98.0,
            },
            latitude_delta: 0.2,
            longitude_delta: 0.2,
        });
        // pho sits outside the viewport, so the selection clears again.
        assert_eq!(state.selected(), None);
        assert_eq!(state.visible_pins().len(), 1);
    }

    #[test]
    fn viewport_composes_with_cuisine_filter() {
        let (pins, tacos_id, _) = pin_fixture();
        let mut state = MapViewState::new();
        state.set_pins(pins);
        state.set_viewport(Viewport {
            center: GeoPoint {
                latitude: 29.0,
                longitude: -98.0,
            },
            latitude_delta: 0.2,
            longitude_delta: 0.2,
        });
        assert_eq!(state.visible_pins().len(), 1);

        state.set_cuisine_filter(vec!["vietnamese".to_string()]);
        assert!(state.visible_pins().is_empty());

        state.set_cuisine_filter(vec!["mexican".to_string()]);
        assert_eq!(state.visible_pins()[0].restaurant_id, tacos_id);
    }

    #[tokio::test]
    async fn load_pins_only_sees_followed_authors() {
        use crate::gateway::MemoryGateway;
        use serde_json::json;

        let gateway = Arc::new(MemoryGateway::new());
        let viewer_id = Uuid::new_v4();
        let followed = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let requested = Uuid::new_v4();
        let restaurant_id = Uuid::new_v4();

        for (user, status) in [(followed, "approved"), (requested, "requested")] {
            gateway
                .insert(
                    Table::Follows,
                    decode::row_from_value(json!({
                        "follower_id": viewer_id.to_string(),
                        "followee_id": user.to_string(),
                        "status": status,
                        "created_at": "2025-05-01T00:00:00.000000Z",
                    })),
                )
                .await
                .unwrap();
        }
        gateway
            .insert(
                Table::Profiles,
                decode::row_from_value(json!({
                    "id": followed.to_string(),
                    "username": "al_pastor_fan",
                    "is_public": true,
                    "created_at": "2025-04-01T00:00:00.000000Z",
                })),
            )
            .await
            .unwrap();

        // String coordinates still produce a pin.
        gateway
            .insert(
                Table::Restaurants,
                decode::row_from_value(json!({
                    "id": restaurant_id.to_string(),
                    "name": "Taqueria Norte",
                    "cuisine": "Mexican",
                    "latitude": "29.37",
                    "longitude": "-98.49",
                    "price": "$$$premium",
                })),
            )
            .await
            .unwrap();

        for (author, at) in [
            (followed, "2025-06-01T00:00:00.000000Z"),
            (stranger, "2025-06-02T00:00:00.000000Z"),
            (requested, "2025-06-03T00:00:00.000000Z"),
        ] {
            gateway
                .insert(
                    Table::Posts,
                    decode::row_from_value(json!({
                        "id": Uuid::new_v4().to_string(),
                        "author_id": author.to_string(),
                        "kind": "review",
                        "restaurant_id": restaurant_id.to_string(),
                        "rating": 4.0,
                        "body": "Great al pastor.",
                        "created_at": at,
                    })),
                )
                .await
                .unwrap();
        }

        let service = MapPinService::new(gateway.clone(), 200);
        let pins = service
            .load_pins(&Viewer::authenticated(viewer_id))
            .await
            .unwrap();
        assert_eq!(pins.len(), 1);
        assert_eq!(pins[0].reviews.len(), 1);
        assert_eq!(pins[0].reviews[0].author_id, followed);
        assert_eq!(pins[0].reviews[0].author_name, "al_pastor_fan");
        assert_eq!(pins[0].location.latitude, 29.37);
        assert_eq!(
            pins[0].price_tier.as_ref().map(PriceTier::label),
            Some("$$$+")
        );

        let empty = service.load_pins(&Viewer::anonymous()).await.unwrap();
        assert!(empty.is_empty());
    }
}
