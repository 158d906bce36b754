// Map pin pipeline over seeded collections: follows feed the activity
// query, noisy rows decode or drop out, pins group and order by recency.

use std::sync::Arc;

use serde_json::json;
use tastemap::{
    app_state::AppState,
    config::{Config, DatabaseConfig, FeedConfig, ServerConfig},
    core::{Viewer, Viewport},
    gateway::{DataGateway, MemoryGateway, Table},
    models::{decode, NewProfile},
    services::MapViewState,
};
use uuid::Uuid;

fn test_config() -> Config {
    Config {
        database: DatabaseConfig {
            url: "postgres://unused".to_string(),
            max_connections: 1,
        },
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        feed: FeedConfig { activity_limit: 50 },
    }
}

fn test_state() -> (Arc<MemoryGateway>, AppState) {
    let gateway = Arc::new(MemoryGateway::new());
    let state = AppState::with_gateway(gateway.clone(), test_config());
    (gateway, state)
}

async fn onboard(state: &AppState, username: &str, is_public: bool) -> Uuid {
    let id = Uuid::new_v4();
    state
        .profiles
        .create_profile(
            &Viewer::authenticated(id),
            NewProfile {
                username: username.to_string(),
                display_name: None,
                is_public,
            },
        )
        .await
        .unwrap();
    id
}

async fn seed_restaurant(gateway: &MemoryGateway, value: serde_json::Value) -> Uuid {
    let id = Uuid::new_v4();
    let mut value = value;
    value["id"] = json!(id.to_string());
    gateway
        .insert(Table::Restaurants, decode::row_from_value(value))
        .await
        .unwrap();
    id
}

async fn seed_review(
    gateway: &MemoryGateway,
    author_id: Uuid,
    restaurant_id: Uuid,
    body: &str,
    at: &str,
) -> Uuid {
    let id = Uuid::new_v4();
    gateway
        .insert(
            Table::Posts,
            decode::row_from_value(json!({
                "id": id.to_string(),
                "author_id": author_id.to_string(),
                "kind": "review",
                "restaurant_id": restaurant_id.to_string(),
                "rating": 4.5,
                "body": body,
                "image_urls": [],
                "likes_count": 0,
                "comments_count": 0,
                "created_at": at,
            })),
        )
        .await
        .unwrap();
    id
}

#[tokio::test]
async fn pins_come_only_from_approved_follows() {
    let (gateway, state) = test_state();
    let ana = onboard(&state, "ana_eats", true).await;
    let marco = onboard(&state, "marco_reviews", true).await;
    let hana = onboard(&state, "quiet_hana", false).await;
    let stranger = onboard(&state, "stranger", true).await;
    let ana_viewer = Viewer::authenticated(ana);

    // marco approved, hana stuck at requested
    state
        .relationships
        .follow_user(&ana_viewer, marco)
        .await
        .unwrap();
    state
        .relationships
        .follow_user(&ana_viewer, hana)
        .await
        .unwrap();

    // String coordinates and a noisy price tag decode like their clean
    // counterparts
    let tacos = seed_restaurant(
        &gateway,
        json!({
            "name": "Taqueria Norte",
            "cuisine": "Mexican",
            "latitude": "29.3772",
            "longitude": "-98.4936",
            "price": "$$$premium",
            "rating": 4.6,
        }),
    )
    .await;
    let pho = seed_restaurant(
        &gateway,
        json!({
            "name": "Pho Palace",
            "cuisine": "Vietnamese",
            "latitude": 29.51,
            "longitude": -98.58,
            "price": "$",
            "rating": 4.4,
        }),
    )
    .await;
    let broken = seed_restaurant(
        &gateway,
        json!({
            "name": "No Fixed Address",
            "cuisine": "Fusion",
            "latitude": "downtown",
            "longitude": -98.0,
        }),
    )
    .await;

    let long_body = "The al pastor comes off a real trompo and the salsa roja \
                     has actual heat, not the polite kind they serve tourists.";
    seed_review(&gateway, marco, tacos, long_body, "2025-06-01T12:00:00.000000Z").await;
    seed_review(&gateway, marco, tacos, "Short one.", "2025-06-03T09:00:00.000000Z").await;
    seed_review(&gateway, marco, pho, "Broth of the week.", "2025-06-02T10:00:00.000000Z").await;
    // Unreachable authors and undecodable restaurants stay off the map
    seed_review(&gateway, hana, pho, "Still pending.", "2025-06-04T08:00:00.000000Z").await;
    seed_review(&gateway, stranger, tacos, "Not followed.", "2025-06-04T09:00:00.000000Z").await;
    seed_review(&gateway, marco, broken, "Nice spot, no coords.", "2025-06-05T07:00:00.000000Z")
        .await;

    let pins = state.map_pins.load_pins(&ana_viewer).await.unwrap();
    assert_eq!(pins.len(), 2);

    // Tacos carries the newer review, so it sorts first
    assert_eq!(pins[0].restaurant_id, tacos);
    assert_eq!(pins[0].reviews.len(), 2);
    assert_eq!(pins[0].reviews[0].snippet, "Short one.");
    assert_eq!(pins[1].restaurant_id, pho);

    // Coordinates parsed out of strings, price tag normalized
    assert!((pins[0].location.latitude - 29.3772).abs() < 1e-9);
    assert_eq!(
        pins[0].price_tier.as_ref().map(|tier| tier.label()),
        Some("$$$+")
    );

    // Long bodies trim to a bounded snippet
    let older = &pins[0].reviews[1];
    assert!(older.snippet.chars().count() <= 91);
    assert!(older.snippet.ends_with('…'));
    assert_eq!(older.author_name, "marco_reviews");
}

#[tokio::test]
async fn anonymous_viewers_get_an_empty_map() {
    let (gateway, state) = test_state();
    let marco = onboard(&state, "marco_reviews", true).await;
    let tacos = seed_restaurant(
        &gateway,
        json!({ "name": "Taqueria Norte", "latitude": 29.0, "longitude": -98.0 }),
    )
    .await;
    seed_review(&gateway, marco, tacos, "Open late.", "2025-06-01T12:00:00.000000Z").await;

    let pins = state.map_pins.load_pins(&Viewer::anonymous()).await.unwrap();
    assert!(pins.is_empty());
}

#[tokio::test]
async fn view_state_composes_filters_and_guards_selection() {
    let (gateway, state) = test_state();
    let ana = onboard(&state, "ana_eats", true).await;
    let marco = onboard(&state, "marco_reviews", true).await;
    let ana_viewer = Viewer::authenticated(ana);
    state
        .relationships
        .follow_user(&ana_viewer, marco)
        .await
        .unwrap();

    let tacos = seed_restaurant(
        &gateway,
        json!({ "name": "Taqueria Norte", "cuisine": "Mexican", "latitude": 29.0, "longitude": -98.0 }),
    )
    .await;
    let pho = seed_restaurant(
        &gateway,
        json!({ "name": "Pho Palace", "cuisine": "Vietnamese", "latitude": 29.5, "longitude": -98.5 }),
    )
    .await;
    seed_review(&gateway, marco, tacos, "Good.", "2025-06-01T12:00:00.000000Z").await;
    seed_review(&gateway, marco, pho, "Great.", "2025-06-02T12:00:00.000000Z").await;

    let pins = state.map_pins.load_pins(&ana_viewer).await.unwrap();
    let mut view = MapViewState::new();
    view.set_pins(pins);

    assert!(view.select(tacos));

    // Cuisine filter hides the selected pin, so the selection drops
    view.set_cuisine_filter(vec!["vietnamese".to_string()]);
    assert_eq!(view.visible_pins().len(), 1);
    assert_eq!(view.selected(), None);

    // Clearing the filter brings the pin back but not the selection
    view.set_cuisine_filter(Vec::new());
    assert_eq!(view.visible_pins().len(), 2);
    assert_eq!(view.selected(), None);

    // Viewport composes on top of the cuisine filter
    assert!(view.select(pho));
    view.set_viewport(Viewport {
        center: tastemap::core::GeoPoint {
            latitude: 29.0,
            longitude: -98.0,
        },
        latitude_delta: 0.2,
        longitude_delta: 0.2,
    });
    assert_eq!(view.visible_pins().len(), 1);
    assert_eq!(view.visible_pins()[0].restaurant_id, tacos);
    assert_eq!(view.selected(), None);
}
