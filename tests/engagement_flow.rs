// Reviews, threads, comments, and likes working together through the
// application state.

use std::sync::Arc;

use serde_json::json;
use tastemap::{
    app_state::AppState,
    config::{Config, DatabaseConfig, FeedConfig, ServerConfig},
    core::Viewer,
    error::AppError,
    gateway::{DataGateway, MemoryGateway, Table},
    models::{decode, NewProfile, NewReview, NewThread},
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

async fn onboard(state: &AppState, username: &str) -> Uuid {
    let id = Uuid::new_v4();
    state
        .profiles
        .create_profile(
            &Viewer::authenticated(id),
            NewProfile {
                username: username.to_string(),
                display_name: None,
                is_public: true,
            },
        )
        .await
        .unwrap();
    id
}

async fn seed_restaurant(gateway: &MemoryGateway) -> Uuid {
    let id = Uuid::new_v4();
    gateway
        .insert(
            Table::Restaurants,
            decode::row_from_value(json!({
                "id": id.to_string(),
                "name": "Taqueria Norte",
                "cuisine": "Mexican",
                "latitude": 29.0,
                "longitude": -98.0,
            })),
        )
        .await
        .unwrap();
    id
}

#[tokio::test]
async fn review_thread_and_comment_flow() {
    let (gateway, state) = test_state();
    let ana = onboard(&state, "ana_eats").await;
    let marco = onboard(&state, "marco_reviews").await;
    let tacos = seed_restaurant(&gateway).await;
    let ana_viewer = Viewer::authenticated(ana);
    let marco_viewer = Viewer::authenticated(marco);

    let review = state
        .posts
        .create_review(
            &ana_viewer,
            NewReview {
                restaurant_id: tacos,
                rating: 4.5,
                body: Some("Tortillas made to order.".to_string()),
                image_urls: Vec::new(),
            },
        )
        .await
        .unwrap();

    let thread = state
        .posts
        .create_thread(
            &marco_viewer,
            NewThread {
                title: Some("Agreed?".to_string()),
                body: "Is this really the best taqueria on the south side?".to_string(),
                attached_review_id: Some(review.id),
            },
        )
        .await
        .unwrap();

    let top = state
        .engagement
        .add_comment(&ana_viewer, thread.id, None, "Yes. Fight me.".to_string())
        .await
        .unwrap();
    state
        .engagement
        .add_comment(
            &marco_viewer,
            thread.id,
            Some(top.id),
            "No argument here.".to_string(),
        )
        .await
        .unwrap();

    let threads = state.engagement.comments_for_post(thread.id).await.unwrap();
    assert_eq!(threads.len(), 1);
    assert_eq!(threads[0].comment.id, top.id);
    assert_eq!(threads[0].replies.len(), 1);
    assert_eq!(threads[0].replies[0].author_id, marco);

    // Counter reflects both rows
    let reloaded = state.posts.get_post(thread.id).await.unwrap();
    assert_eq!(reloaded.comments_count, 2);
}

#[tokio::test]
async fn likes_stay_idempotent_in_both_directions() {
    let (gateway, state) = test_state();
    let ana = onboard(&state, "ana_eats").await;
    let marco = onboard(&state, "marco_reviews").await;
    let tacos = seed_restaurant(&gateway).await;
    let ana_viewer = Viewer::authenticated(ana);
    let marco_viewer = Viewer::authenticated(marco);

    let review = state
        .posts
        .create_review(
            &ana_viewer,
            NewReview {
                restaurant_id: tacos,
                rating: 5.0,
                body: None,
                image_urls: Vec::new(),
            },
        )
        .await
        .unwrap();

    assert_eq!(
        state.engagement.like_post(&marco_viewer, review.id).await.unwrap(),
        1
    );
    assert_eq!(
        state.engagement.like_post(&marco_viewer, review.id).await.unwrap(),
        1
    );
    assert!(state.engagement.is_liked(&marco_viewer, review.id).await.unwrap());
    assert!(!state
        .engagement
        .is_liked(&Viewer::anonymous(), review.id)
        .await
        .unwrap());

    assert_eq!(
        state.engagement.unlike_post(&marco_viewer, review.id).await.unwrap(),
        0
    );
    assert_eq!(
        state.engagement.unlike_post(&marco_viewer, review.id).await.unwrap(),
        0
    );
    assert!(!state.engagement.is_liked(&marco_viewer, review.id).await.unwrap());
}

#[tokio::test]
async fn only_the_author_deletes_and_engagement_goes_with_it() {
    let (gateway, state) = test_state();
    let ana = onboard(&state, "ana_eats").await;
    let marco = onboard(&state, "marco_reviews").await;
    let tacos = seed_restaurant(&gateway).await;
    let ana_viewer = Viewer::authenticated(ana);
    let marco_viewer = Viewer::authenticated(marco);

    let review = state
        .posts
        .create_review(
            &ana_viewer,
            NewReview {
                restaurant_id: tacos,
                rating: 3.5,
                body: Some("Fine.".to_string()),
                image_urls: Vec::new(),
            },
        )
        .await
        .unwrap();
    state
        .engagement
        .like_post(&marco_viewer, review.id)
        .await
        .unwrap();
    state
        .engagement
        .add_comment(&marco_viewer, review.id, None, "Harsh.".to_string())
        .await
        .unwrap();

    let denied = state.posts.delete_post(&marco_viewer, review.id).await;
    assert!(matches!(denied, Err(AppError::Forbidden(_))));

    state.posts.delete_post(&ana_viewer, review.id).await.unwrap();
    assert!(matches!(
        state.posts.get_post(review.id).await,
        Err(AppError::NotFound(_))
    ));
    assert!(state
        .engagement
        .comments_for_post(review.id)
        .await
        .unwrap()
        .is_empty());
    assert!(!state
        .engagement
        .is_liked(&marco_viewer, review.id)
        .await
        .unwrap());
}
