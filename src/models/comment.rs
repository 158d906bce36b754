// Comments - flat rows under a post, with optional parent links for replies

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;

use crate::gateway::JsonRow;
use crate::models::decode;
use crate::models::{CommentId, PostId, UserId};

#[derive(Debug, Clone, Serialize)]
pub struct Comment {
    pub id: CommentId,
    pub post_id: PostId,
    pub author_id: UserId,
    /// Replies point at another comment on the same post.
    pub parent_comment_id: Option<CommentId>,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    pub fn from_row(row: &JsonRow) -> Option<Self> {
        Some(Comment {
            id: decode::uuid_field(row, "id")?,
            post_id: decode::uuid_field(row, "post_id")?,
            author_id: decode::uuid_field(row, "author_id")?,
            parent_comment_id: decode::uuid_field(row, "parent_comment_id"),
            body: decode::string_field(row, "body")?,
            created_at: decode::datetime_field(row, "created_at")?,
        })
    }

    pub fn to_row(&self) -> JsonRow {
        decode::row_from_value(json!({
            "id": self.id.to_string(),
            "post_id": self.post_id.to_string(),
            "author_id": self.author_id.to_string(),
            "parent_comment_id": self.parent_comment_id.map(|id| id.to_string()),
            "body": self.body,
            "created_at": decode::format_timestamp(self.created_at),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn decodes_reply_with_parent() {
        let parent = Uuid::new_v4();
        let row = decode::row_from_value(json!({
            "id": Uuid::new_v4().to_string(),
            "post_id": Uuid::new_v4().to_string(),
            "author_id": Uuid::new_v4().to_string(),
            "parent_comment_id": parent.to_string(),
            "body": "Same, the broth is unreal.",
            "created_at": "2025-04-03T09:00:00.000000Z",
        }));
        let comment = Comment::from_row(&row).unwrap();
        assert_eq!(comment.parent_comment_id, Some(parent));
    }

    #[test]
    fn missing_body_is_dropped() {
        let row = decode::row_from_value(json!({
            "id": Uuid::new_v4().to_string(),
            "post_id": Uuid::new_v4().to_string(),
            "author_id": Uuid::new_v4().to_string(),
            "parent_comment_id": null,
            "created_at": "2025-04-03T09:00:00.000000Z",
        }));
        assert!(Comment::from_row(&row).is_none());
    }
}
