// PostService - authoring and lifecycle of reviews and threads

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use crate::core::Viewer;
use crate::error::{AppError, AppResult};
use crate::gateway::{DataGateway, Filter, Table, TableQuery};
use crate::models::decode;
use crate::models::{NewReview, NewThread, Post, PostId, PostKind, UserId};

const MIN_RATING: f64 = 1.0;
const MAX_RATING: f64 = 5.0;

#[derive(Clone)]
pub struct PostService {
    gateway: Arc<dyn DataGateway>,
}

impl PostService {
    pub fn new(gateway: Arc<dyn DataGateway>) -> Self {
        Self { gateway }
    }

    /// Publishes a review of an existing restaurant.
    pub async fn create_review(&self, viewer: &Viewer, new: NewReview) -> AppResult<Post> {
        let author_id = viewer.require_user()?;
        if !(MIN_RATING..=MAX_RATING).contains(&new.rating) {
            return Err(AppError::Validation(format!(
                "Rating must be between {} and {}",
                MIN_RATING, MAX_RATING
            )));
        }
        let restaurant = self
            .gateway
            .fetch_one(TableQuery::new(Table::Restaurants).eq("id", new.restaurant_id.to_string()))
            .await?;
        if restaurant.is_none() {
            return Err(AppError::NotFound(format!(
                "Restaurant {} not found",
                new.restaurant_id
            )));
        }

        let post = Post {
            id: Uuid::new_v4(),
            author_id,
            kind: PostKind::Review,
            restaurant_id: Some(new.restaurant_id),
            rating: Some(new.rating),
            title: None,
            body: new.body,
            image_urls: new.image_urls,
            attached_review_id: None,
            likes_count: 0,
            comments_count: 0,
            created_at: Utc::now(),
        };
        self.gateway.insert(Table::Posts, post.to_row()).await?;
        info!("Created review {} by {}", post.id, author_id);
        Ok(post)
    }

    /// Starts a discussion thread, optionally quoting an existing review.
    pub async fn create_thread(&self, viewer: &Viewer, new: NewThread) -> AppResult<Post> {
        let author_id = viewer.require_user()?;
        if new.body.trim().is_empty() {
            return Err(AppError::Validation(
                "Thread body cannot be empty".to_string(),
            ));
        }
        if let Some(review_id) = new.attached_review_id {
            let attached = self.get_post(review_id).await?;
            if attached.kind != PostKind::Review {
                return Err(AppError::Validation(
                    "Threads can only attach reviews".to_string(),
                ));
            }
        }

        let post = Post {
            id: Uuid::new_v4(),
            author_id,
            kind: PostKind::Thread,
            restaurant_id: None,
            rating: None,
            title: new.title,
            body: Some(new.body),
            image_urls: Vec::new(),
            attached_review_id: new.attached_review_id,
            likes_count: 0,
            comments_count: 0,
            created_at: Utc::now(),
        };
        self.gateway.insert(Table::Posts, post.to_row()).await?;
        info!("Created thread {} by {}", post.id, author_id);
        Ok(post)
    }

    pub async fn get_post(&self, post_id: PostId) -> AppResult<Post> {
        let row = self
            .gateway
            .fetch_one(TableQuery::new(Table::Posts).eq("id", post_id.to_string()))
            .await?;
        row.as_ref()
            .and_then(Post::from_row)
            .ok_or_else(|| AppError::NotFound(format!("Post {} not found", post_id)))
    }

    /// Removes a post along with its likes and comments. Only the author
    /// may delete.
    pub async fn delete_post(&self, viewer: &Viewer, post_id: PostId) -> AppResult<()> {
        let viewer_id = viewer.require_user()?;
        let post = self.get_post(post_id).await?;
        if post.author_id != viewer_id {
            return Err(AppError::Forbidden(
                "Only the author can delete a post".to_string(),
            ));
        }

        let key = post_id.to_string();
        let likes = self
            .gateway
            .delete(Table::Likes, vec![Filter::eq("post_id", key.clone())])
            .await?;
        let comments = self
            .gateway
            .delete(Table::Comments, vec![Filter::eq("post_id", key.clone())])
            .await?;
        self.gateway
            .delete(Table::Posts, vec![Filter::eq("id", key)])
            .await?;
        info!(
            "Deleted post {} along with {} likes and {} comments",
            post_id, likes, comments
        );
        Ok(())
    }

    /// Reviews by one author, newest first, with an optional exclusive
    /// cursor for paging further back.
    pub async fn recent_reviews_by(
        &self,
        author_id: UserId,
        before: Option<DateTime<Utc>>,
        limit: u32,
    ) -> AppResult<Vec<Post>> {
        let mut query = TableQuery::new(Table::Posts)
            .eq("author_id", author_id.to_string())
            .eq("kind", PostKind::Review.as_str())
            .order_desc("created_at")
            .limit(limit);
        if let Some(before) = before {
            query = query.lt("created_at", decode::format_timestamp(before));
        }
        let rows = self.gateway.select(query).await?;
        Ok(rows.iter().filter_map(Post::from_row).collect())
    }
}
