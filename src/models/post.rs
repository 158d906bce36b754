// Posts - restaurant reviews and discussion threads share one collection,
// discriminated by kind

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::gateway::JsonRow;
use crate::models::decode;
use crate::models::{PostId, RestaurantId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostKind {
    Review,
    Thread,
}

impl PostKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostKind::Review => "review",
            PostKind::Thread => "thread",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "review" => Some(PostKind::Review),
            "thread" => Some(PostKind::Thread),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Post {
    pub id: PostId,
    pub author_id: UserId,
    pub kind: PostKind,
    /// Set on reviews; threads carry no restaurant of their own.
    pub restaurant_id: Option<RestaurantId>,
    pub rating: Option<f64>,
    pub title: Option<String>,
    pub body: Option<String>,
    pub image_urls: Vec<String>,
    /// Threads may quote a review they were started from.
    pub attached_review_id: Option<PostId>,
    pub likes_count: i64,
    pub comments_count: i64,
    pub created_at: DateTime<Utc>,
}

impl Post {
    pub fn from_row(row: &JsonRow) -> Option<Self> {
        Some(Post {
            id: decode::uuid_field(row, "id")?,
            author_id: decode::uuid_field(row, "author_id")?,
            kind: decode::str_field(row, "kind").and_then(PostKind::parse)?,
            restaurant_id: decode::uuid_field(row, "restaurant_id"),
            rating: decode::f64_field(row, "rating"),
            title: decode::string_field(row, "title"),
            body: decode::string_field(row, "body"),
            image_urls: decode::string_list_field(row, "image_urls"),
            attached_review_id: decode::uuid_field(row, "attached_review_id"),
            likes_count: decode::i64_field(row, "likes_count").unwrap_or(0),
            comments_count: decode::i64_field(row, "comments_count").unwrap_or(0),
            created_at: decode::datetime_field(row, "created_at")?,
        })
    }

    pub fn to_row(&self) -> JsonRow {
        decode::row_from_value(json!({
            "id": self.id.to_string(),
            "author_id": self.author_id.to_string(),
            "kind": self.kind.as_str(),
            "restaurant_id": self.restaurant_id.map(|id| id.to_string()),
            "rating": self.rating,
            "title": self.title,
            "body": self.body,
            "image_urls": self.image_urls,
            "attached_review_id": self.attached_review_id.map(|id| id.to_string()),
            "likes_count": self.likes_count,
            "comments_count": self.comments_count,
            "created_at": decode::format_timestamp(self.created_at),
        }))
    }
}

/// Request payload for posting a review.
#[derive(Debug, Clone, Deserialize)]
pub struct NewReview {
    pub restaurant_id: RestaurantId,
    pub rating: f64,
    pub body: Option<String>,
    #[serde(default)]
    pub image_urls: Vec<String>,
}

/// Request payload for starting a thread.
#[derive(Debug, Clone, Deserialize)]
pub struct NewThread {
    pub title: Option<String>,
    pub body: String,
    pub attached_review_id: Option<PostId>,
}
