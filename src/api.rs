// HTTP interface - one router over the service layer

use axum::{
    extract::{Path as AxumPath, Query, State},
    response::Json,
    routing::{delete, get, patch, post, put},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    app_state::AppState,
    core::Viewer,
    error::{AppError, AppResult},
    models::decode,
    models::{
        Comment, CommentId, FollowCounts, ListMode, NewProfile, NewReview, NewThread, Post,
        PostId, Profile, ProfileChanges, RelationshipEntry, RestaurantId, UserId,
    },
    services::{CommentThread, MapPin, SavedEntry, SavedSort},
};

// HTTP Request/Response types

#[derive(Deserialize)]
pub struct RelationshipListQuery {
    pub mode: String,
}

#[derive(Deserialize)]
pub struct ReviewFeedQuery {
    pub before: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Deserialize)]
pub struct SavedListQuery {
    pub sort: Option<String>,
    pub cuisine: Option<String>,
}

#[derive(Deserialize)]
pub struct NewCommentRequest {
    pub body: String,
    pub parent_comment_id: Option<CommentId>,
}

// Helper functions to parse query enumerations

fn parse_list_mode(raw: &str) -> AppResult<ListMode> {
    ListMode::parse(raw)
        .ok_or_else(|| AppError::Validation(format!("Unknown relationship mode: {}", raw)))
}

fn parse_saved_sort(raw: Option<&str>) -> AppResult<SavedSort> {
    match raw {
        None => Ok(SavedSort::RecentlySaved),
        Some(s) => SavedSort::parse(s)
            .ok_or_else(|| AppError::Validation(format!("Unknown sort order: {}", s))),
    }
}

fn parse_before_cursor(raw: Option<&str>) -> AppResult<Option<chrono::DateTime<chrono::Utc>>> {
    match raw {
        None => Ok(None),
        Some(s) => decode::parse_timestamp(s)
            .map(Some)
            .ok_or_else(|| AppError::Validation(format!("Invalid cursor timestamp: {}", s))),
    }
}

// HTTP Handlers

pub async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn create_profile_handler(
    State(state): State<AppState>,
    viewer: Viewer,
    Json(req): Json<NewProfile>,
) -> Result<Json<Profile>, AppError> {
    let profile = state.profiles.create_profile(&viewer, req).await?;
    Ok(Json(profile))
}

pub async fn get_profile_handler(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<UserId>,
) -> Result<Json<Profile>, AppError> {
    let profile = state.profiles.get_profile(id).await?;
    Ok(Json(profile))
}

pub async fn get_profile_by_username_handler(
    State(state): State<AppState>,
    AxumPath(username): AxumPath<String>,
) -> Result<Json<Profile>, AppError> {
    let profile = state.profiles.get_by_username(&username).await?;
    Ok(Json(profile))
}

pub async fn update_profile_handler(
    State(state): State<AppState>,
    viewer: Viewer,
    Json(changes): Json<ProfileChanges>,
) -> Result<Json<Profile>, AppError> {
    let profile = state.profiles.update_profile(&viewer, changes).await?;
    Ok(Json(profile))
}

pub async fn profile_reviews_handler(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<UserId>,
    Query(params): Query<ReviewFeedQuery>,
) -> Result<Json<Vec<Post>>, AppError> {
    let before = parse_before_cursor(params.before.as_deref())?;
    let limit = params.limit.unwrap_or(20).min(100);
    let posts = state.posts.recent_reviews_by(id, before, limit).await?;
    Ok(Json(posts))
}

pub async fn list_relationships_handler(
    State(state): State<AppState>,
    viewer: Viewer,
    AxumPath(id): AxumPath<UserId>,
    Query(params): Query<RelationshipListQuery>,
) -> Result<Json<Vec<RelationshipEntry>>, AppError> {
    let mode = parse_list_mode(&params.mode)?;
    let entries = state.relationships.list_relationships(&viewer, id, mode).await?;
    Ok(Json(entries))
}

pub async fn follow_counts_handler(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<UserId>,
) -> Result<Json<FollowCounts>, AppError> {
    let counts = state.relationships.follow_counts(id).await?;
    Ok(Json(counts))
}

pub async fn follow_handler(
    State(state): State<AppState>,
    viewer: Viewer,
    AxumPath(id): AxumPath<UserId>,
) -> Result<Json<Value>, AppError> {
    let status = state.relationships.follow_user(&viewer, id).await?;
    Ok(Json(json!({ "follow_status": status })))
}

pub async fn unfollow_handler(
    State(state): State<AppState>,
    viewer: Viewer,
    AxumPath(id): AxumPath<UserId>,
) -> Result<Json<Value>, AppError> {
    state.relationships.unfollow_user(&viewer, id).await?;
    Ok(Json(json!({ "unfollowed": true })))
}

pub async fn follow_status_handler(
    State(state): State<AppState>,
    viewer: Viewer,
    AxumPath(id): AxumPath<UserId>,
) -> Result<Json<Value>, AppError> {
    let status = state.relationships.follow_status(&viewer, id).await?;
    Ok(Json(json!({ "follow_status": status })))
}

pub async fn pending_requests_handler(
    State(state): State<AppState>,
    viewer: Viewer,
) -> Result<Json<Vec<RelationshipEntry>>, AppError> {
    let entries = state.relationships.pending_requests(&viewer).await?;
    Ok(Json(entries))
}

pub async fn accept_request_handler(
    State(state): State<AppState>,
    viewer: Viewer,
    AxumPath(id): AxumPath<UserId>,
) -> Result<Json<Value>, AppError> {
    state.relationships.accept_follow_request(&viewer, id).await?;
    Ok(Json(json!({ "accepted": true })))
}

pub async fn decline_request_handler(
    State(state): State<AppState>,
    viewer: Viewer,
    AxumPath(id): AxumPath<UserId>,
) -> Result<Json<Value>, AppError> {
    state.relationships.decline_follow_request(&viewer, id).await?;
    Ok(Json(json!({ "declined": true })))
}

pub async fn create_review_handler(
    State(state): State<AppState>,
    viewer: Viewer,
    Json(req): Json<NewReview>,
) -> Result<Json<Post>, AppError> {
    let post = state.posts.create_review(&viewer, req).await?;
    Ok(Json(post))
}

pub async fn create_thread_handler(
    State(state): State<AppState>,
    viewer: Viewer,
    Json(req): Json<NewThread>,
) -> Result<Json<Post>, AppError> {
    let post = state.posts.create_thread(&viewer, req).await?;
    Ok(Json(post))
}

pub async fn get_post_handler(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<PostId>,
) -> Result<Json<Post>, AppError> {
    let post = state.posts.get_post(id).await?;
    Ok(Json(post))
}

pub async fn delete_post_handler(
    State(state): State<AppState>,
    viewer: Viewer,
    AxumPath(id): AxumPath<PostId>,
) -> Result<Json<Value>, AppError> {
    state.posts.delete_post(&viewer, id).await?;
    Ok(Json(json!({ "deleted": true })))
}

pub async fn like_post_handler(
    State(state): State<AppState>,
    viewer: Viewer,
    AxumPath(id): AxumPath<PostId>,
) -> Result<Json<Value>, AppError> {
    let likes_count = state.engagement.like_post(&viewer, id).await?;
    Ok(Json(json!({ "likes_count": likes_count })))
}

pub async fn unlike_post_handler(
    State(state): State<AppState>,
    viewer: Viewer,
    AxumPath(id): AxumPath<PostId>,
) -> Result<Json<Value>, AppError> {
    let likes_count = state.engagement.unlike_post(&viewer, id).await?;
    Ok(Json(json!({ "likes_count": likes_count })))
}

pub async fn like_status_handler(
    State(state): State<AppState>,
    viewer: Viewer,
    AxumPath(id): AxumPath<PostId>,
) -> Result<Json<Value>, AppError> {
    let liked = state.engagement.is_liked(&viewer, id).await?;
    Ok(Json(json!({ "liked": liked })))
}

pub async fn comments_handler(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<PostId>,
) -> Result<Json<Vec<CommentThread>>, AppError> {
    let threads = state.engagement.comments_for_post(id).await?;
    Ok(Json(threads))
}

pub async fn add_comment_handler(
    State(state): State<AppState>,
    viewer: Viewer,
    AxumPath(id): AxumPath<PostId>,
    Json(req): Json<NewCommentRequest>,
) -> Result<Json<Comment>, AppError> {
    let comment = state
        .engagement
        .add_comment(&viewer, id, req.parent_comment_id, req.body)
        .await?;
    Ok(Json(comment))
}

pub async fn delete_comment_handler(
    State(state): State<AppState>,
    viewer: Viewer,
    AxumPath(id): AxumPath<CommentId>,
) -> Result<Json<Value>, AppError> {
    state.engagement.delete_comment(&viewer, id).await?;
    Ok(Json(json!({ "deleted": true })))
}

pub async fn map_pins_handler(
    State(state): State<AppState>,
    viewer: Viewer,
) -> Result<Json<Vec<MapPin>>, AppError> {
    let pins = state.map_pins.load_pins(&viewer).await?;
    Ok(Json(pins))
}

pub async fn save_restaurant_handler(
    State(state): State<AppState>,
    viewer: Viewer,
    AxumPath(id): AxumPath<RestaurantId>,
) -> Result<Json<Value>, AppError> {
    let saved = state.saved.save(&viewer, id).await?;
    Ok(Json(json!({ "saved": saved })))
}

pub async fn unsave_restaurant_handler(
    State(state): State<AppState>,
    viewer: Viewer,
    AxumPath(id): AxumPath<RestaurantId>,
) -> Result<Json<Value>, AppError> {
    let removed = state.saved.unsave(&viewer, id).await?;
    Ok(Json(json!({ "removed": removed })))
}

pub async fn saved_list_handler(
    State(state): State<AppState>,
    viewer: Viewer,
    Query(params): Query<SavedListQuery>,
) -> Result<Json<Vec<SavedEntry>>, AppError> {
    let sort = parse_saved_sort(params.sort.as_deref())?;
    let entries = state
        .saved
        .list(&viewer, sort, params.cuisine.as_deref())
        .await?;
    Ok(Json(entries))
}

// Create unified router
pub fn create_api_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        // Profile operations
        .route("/profiles", post(create_profile_handler))
        .route("/profiles/me", patch(update_profile_handler))
        .route("/profiles/by-username/{username}", get(get_profile_by_username_handler))
        .route("/profiles/{id}", get(get_profile_handler))
        .route("/profiles/{id}/reviews", get(profile_reviews_handler))
        .route("/profiles/{id}/relationships", get(list_relationships_handler))
        .route("/profiles/{id}/follow-counts", get(follow_counts_handler))
        // Follow graph operations
        .route("/follows/{id}", post(follow_handler))
        .route("/follows/{id}", delete(unfollow_handler))
        .route("/follows/{id}/status", get(follow_status_handler))
        .route("/follow-requests", get(pending_requests_handler))
        .route("/follow-requests/{id}/accept", post(accept_request_handler))
        .route("/follow-requests/{id}", delete(decline_request_handler))
        // Post operations
        .route("/reviews", post(create_review_handler))
        .route("/threads", post(create_thread_handler))
        .route("/posts/{id}", get(get_post_handler))
        .route("/posts/{id}", delete(delete_post_handler))
        // Engagement operations
        .route("/posts/{id}/like", put(like_post_handler))
        .route("/posts/{id}/like", delete(unlike_post_handler))
        .route("/posts/{id}/like", get(like_status_handler))
        .route("/posts/{id}/comments", get(comments_handler))
        .route("/posts/{id}/comments", post(add_comment_handler))
        .route("/comments/{id}", delete(delete_comment_handler))
        // Map operations
        .route("/map/pins", get(map_pins_handler))
        // Saved list operations
        .route("/saved", get(saved_list_handler))
        .route("/saved/{restaurant_id}", put(save_restaurant_handler))
        .route("/saved/{restaurant_id}", delete(unsave_restaurant_handler))
        .with_state(state)
}
