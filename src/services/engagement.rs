// EngagementService - likes and comments, plus the denormalized counters
// on posts. Counters move only through the gateway's atomic adjustment and
// only when a row was really inserted or removed.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::core::Viewer;
use crate::error::{AppError, AppResult};
use crate::gateway::{DataGateway, Filter, Table, TableQuery};
use crate::models::decode;
use crate::models::{Comment, CommentId, Post, PostId};

/// A top-level comment with its replies, ready for rendering.
#[derive(Debug, Clone, Serialize)]
pub struct CommentThread {
    pub comment: Comment,
    pub replies: Vec<Comment>,
}

#[derive(Clone)]
pub struct EngagementService {
    gateway: Arc<dyn DataGateway>,
}

impl EngagementService {
    pub fn new(gateway: Arc<dyn DataGateway>) -> Self {
        Self { gateway }
    }

    /// Likes a post, returning its like count. Liking twice is a no-op that
    /// reports the current count without moving it.
    pub async fn like_post(&self, viewer: &Viewer, post_id: PostId) -> AppResult<i64> {
        let viewer_id = viewer.require_user()?;
        let post = self.post_row(post_id).await?;

        let like = decode::row_from_value(json!({
            "user_id": viewer_id.to_string(),
            "post_id": post_id.to_string(),
            "created_at": decode::format_timestamp(Utc::now()),
        }));
        let inserted = self
            .gateway
            .insert_if_absent(Table::Likes, like, &["user_id", "post_id"])
            .await?;
        if inserted {
            info!("User {} liked post {}", viewer_id, post_id);
            self.gateway
                .adjust_counter(Table::Posts, "id", &post_id.to_string(), "likes_count", 1)
                .await
        } else {
            Ok(post.likes_count)
        }
    }

    /// Removes the viewer's like, returning the post's like count. Unliking
    /// something never liked reports the current count unchanged.
    pub async fn unlike_post(&self, viewer: &Viewer, post_id: PostId) -> AppResult<i64> {
        let viewer_id = viewer.require_user()?;
        let post = self.post_row(post_id).await?;

        let removed = self
            .gateway
            .delete(
                Table::Likes,
                vec![
                    Filter::eq("user_id", viewer_id.to_string()),
                    Filter::eq("post_id", post_id.to_string()),
                ],
            )
            .await?;
        if removed > 0 {
            self.gateway
                .adjust_counter(Table::Posts, "id", &post_id.to_string(), "likes_count", -1)
                .await
        } else {
            Ok(post.likes_count)
        }
    }

    /// Whether the viewer has liked the post. Anonymous viewers have not.
    pub async fn is_liked(&self, viewer: &Viewer, post_id: PostId) -> AppResult<bool> {
        let Some(viewer_id) = viewer.user_id() else {
            return Ok(false);
        };
        let total = self
            .gateway
            .count(
                TableQuery::new(Table::Likes)
                    .eq("user_id", viewer_id.to_string())
                    .eq("post_id", post_id.to_string()),
            )
            .await?;
        Ok(total > 0)
    }

    /// Adds a comment or reply. A reply's parent must live on the same post.
    pub async fn add_comment(
        &self,
        viewer: &Viewer,
        post_id: PostId,
        parent_comment_id: Option<CommentId>,
        body: String,
    ) -> AppResult<Comment> {
        let viewer_id = viewer.require_user()?;
        if body.trim().is_empty() {
            return Err(AppError::Validation(
                "Comment body cannot be empty".to_string(),
            ));
        }
        self.post_row(post_id).await?;

        if let Some(parent_id) = parent_comment_id {
            let parent = self.comment_row(parent_id).await?;
            if parent.post_id != post_id {
                return Err(AppError::Validation(
                    "Parent comment belongs to a different post".to_string(),
                ));
            }
        }

        let comment = Comment {
            id: Uuid::new_v4(),
            post_id,
            author_id: viewer_id,
            parent_comment_id,
            body,
            created_at: Utc::now(),
        };
        self.gateway
            .insert(Table::Comments, comment.to_row())
            .await?;
        self.gateway
            .adjust_counter(Table::Posts, "id", &post_id.to_string(), "comments_count", 1)
            .await?;
        info!("User {} commented on post {}", viewer_id, post_id);
        Ok(comment)
    }

    /// Deletes the viewer's comment and any direct replies, keeping the
    /// post's comment count in step with the rows actually removed.
    pub async fn delete_comment(&self, viewer: &Viewer, comment_id: CommentId) -> AppResult<()> {
        let viewer_id = viewer.require_user()?;
        let comment = self.comment_row(comment_id).await?;
        if comment.author_id != viewer_id {
            return Err(AppError::Forbidden(
                "Only the author can delete a comment".to_string(),
            ));
        }

        let removed_replies = self
            .gateway
            .delete(
                Table::Comments,
                vec![Filter::eq("parent_comment_id", comment_id.to_string())],
            )
            .await?;
        let removed_self = self
            .gateway
            .delete(
                Table::Comments,
                vec![Filter::eq("id", comment_id.to_string())],
            )
            .await?;
        let removed = (removed_replies + removed_self) as i64;
        if removed > 0 {
            self.gateway
                .adjust_counter(
                    Table::Posts,
                    "id",
                    &comment.post_id.to_string(),
                    "comments_count",
                    -removed,
                )
                .await?;
            info!(
                "Deleted comment {} and {} replies from post {}",
                comment_id, removed_replies, comment.post_id
            );
        }
        Ok(())
    }

    /// All comments on a post assembled into top-level threads, oldest
    /// first, replies oldest first within each thread.
    pub async fn comments_for_post(&self, post_id: PostId) -> AppResult<Vec<CommentThread>> {
        let rows = self
            .gateway
            .select(
                TableQuery::new(Table::Comments)
                    .eq("post_id", post_id.to_string())
                    .order_asc("created_at"),
            )
            .await?;
        let comments: Vec<Comment> = rows.iter().filter_map(Comment::from_row).collect();
        Ok(assemble_threads(comments))
    }

    async fn post_row(&self, post_id: PostId) -> AppResult<Post> {
        let row = self
            .gateway
            .fetch_one(TableQuery::new(Table::Posts).eq("id", post_id.to_string()))
            .await?;
        row.as_ref()
            .and_then(Post::from_row)
            .ok_or_else(|| AppError::NotFound(format!("Post {} not found", post_id)))
    }

    async fn comment_row(&self, comment_id: CommentId) -> AppResult<Comment> {
        let row = self
            .gateway
            .fetch_one(TableQuery::new(Table::Comments).eq("id", comment_id.to_string()))
            .await?;
        row.as_ref()
            .and_then(Comment::from_row)
            .ok_or_else(|| AppError::NotFound(format!("Comment {} not found", comment_id)))
    }
}

/// Groups flat comments into threads. Nested replies attach to the root of
/// their parent chain; a reply whose chain is broken (deleted parent) or
/// circular is promoted to a thread of its own rather than dropped.
pub fn assemble_threads(comments: Vec<Comment>) -> Vec<CommentThread> {
    let parents: HashMap<CommentId, Option<CommentId>> = comments
        .iter()
        .map(|comment| (comment.id, comment.parent_comment_id))
        .collect();

    let resolve_root = |comment: &Comment| -> CommentId {
        let mut current = comment.id;
        let mut seen = HashSet::new();
        while let Some(Some(parent)) = parents.get(&current) {
            if !seen.insert(current) {
                // Cycle in parent links; treat the original comment as a root.
                return comment.id;
            }
            if !parents.contains_key(parent) {
                // Parent was deleted; the chain ends here.
                return current;
            }
            current = *parent;
        }
        current
    };

    let mut threads: Vec<CommentThread> = Vec::new();
    let mut position: HashMap<CommentId, usize> = HashMap::new();

    for comment in comments {
        let root = resolve_root(&comment);
        if root == comment.id {
            position.insert(comment.id, threads.len());
            threads.push(CommentThread {
                comment,
                replies: Vec::new(),
            });
        } else if let Some(&index) = position.get(&root) {
            threads[index].replies.push(comment);
        } else {
            // Root appears later in the feed or resolved onto itself; keep
            // the reply visible as its own thread.
            position.insert(comment.id, threads.len());
            threads.push(CommentThread {
                comment,
                replies: Vec::new(),
            });
        }
    }
    threads
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MemoryGateway;

    async fn seed_post(gateway: &MemoryGateway) -> PostId {
        let id = Uuid::new_v4();
        gateway
            .insert(
                Table::Posts,
                decode::row_from_value(json!({
                    "id": id.to_string(),
                    "author_id": Uuid::new_v4().to_string(),
                    "kind": "review",
                    "rating": 4.0,
                    "likes_count": 0,
                    "comments_count": 0,
                    "created_at": "2025-06-01T00:00:00.000000Z",
                })),
            )
            .await
            .unwrap();
        id
    }

    fn comment(post_id: PostId, parent: Option<CommentId>, at: &str) -> Comment {
        Comment {
            id: Uuid::new_v4(),
            post_id,
            author_id: Uuid::new_v4(),
            parent_comment_id: parent,
            body: "hello".to_string(),
            created_at: decode::parse_timestamp(at).unwrap(),
        }
    }

    #[tokio::test]
    async fn likes_are_idempotent_and_counted_once() {
        let gateway = Arc::new(MemoryGateway::new());
        let post_id = seed_post(&gateway).await;
        let engagement = EngagementService::new(gateway.clone());
        let viewer = Viewer::authenticated(Uuid::new_v4());

        assert_eq!(engagement.like_post(&viewer, post_id).await.unwrap(), 1);
        assert_eq!(engagement.like_post(&viewer, post_id).await.unwrap(), 1);
        assert!(engagement.is_liked(&viewer, post_id).await.unwrap());

        assert_eq!(engagement.unlike_post(&viewer, post_id).await.unwrap(), 0);
        assert_eq!(engagement.unlike_post(&viewer, post_id).await.unwrap(), 0);
        assert!(!engagement.is_liked(&viewer, post_id).await.unwrap());
    }

    #[tokio::test]
    async fn liking_a_missing_post_is_a_not_found() {
        let engagement = EngagementService::new(Arc::new(MemoryGateway::new()));
        let result = engagement
            .like_post(&Viewer::authenticated(Uuid::new_v4()), Uuid::new_v4())
            .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn replies_must_stay_on_the_same_post() {
        let gateway = Arc::new(MemoryGateway::new());
        let first = seed_post(&gateway).await;
        let second = seed_post(&gateway).await;
        let engagement = EngagementService::new(gateway.clone());
        let viewer = Viewer::authenticated(Uuid::new_v4());

        let root = engagement
            .add_comment(&viewer, first, None, "first!".to_string())
            .await
            .unwrap();
        let cross_post = engagement
            .add_comment(&viewer, second, Some(root.id), "off it goes".to_string())
            .await;
        assert!(matches!(cross_post, Err(AppError::Validation(_))));

        let reply = engagement
            .add_comment(&viewer, first, Some(root.id), "agreed".to_string())
            .await
            .unwrap();
        assert_eq!(reply.parent_comment_id, Some(root.id));

        let threads = engagement.comments_for_post(first).await.unwrap();
        assert_eq!(threads.len(), 1);
        assert_eq!(threads[0].replies.len(), 1);
    }

    #[tokio::test]
    async fn comment_counter_follows_real_rows() {
        let gateway = Arc::new(MemoryGateway::new());
        let post_id = seed_post(&gateway).await;
        let engagement = EngagementService::new(gateway.clone());
        let viewer = Viewer::authenticated(Uuid::new_v4());

        let root = engagement
            .add_comment(&viewer, post_id, None, "first!".to_string())
            .await
            .unwrap();
        engagement
            .add_comment(&viewer, post_id, Some(root.id), "reply".to_string())
            .await
            .unwrap();

        let count = gateway
            .fetch_one(TableQuery::new(Table::Posts).eq("id", post_id.to_string()))
            .await
            .unwrap()
            .and_then(|row| decode::i64_field(&row, "comments_count"))
            .unwrap();
        assert_eq!(count, 2);

        // Deleting the root takes its reply with it and the counter drops by two.
        engagement.delete_comment(&viewer, root.id).await.unwrap();
        let count = gateway
            .fetch_one(TableQuery::new(Table::Posts).eq("id", post_id.to_string()))
            .await
            .unwrap()
            .and_then(|row| decode::i64_field(&row, "comments_count"))
            .unwrap();
        assert_eq!(count, 0);
        assert!(engagement
            .comments_for_post(post_id)
            .await
            .unwrap()
            .is_empty());
    }

    #[test]
    fn nested_replies_attach_to_the_thread_root() {
        let post_id = Uuid::new_v4();
        let root = comment(post_id, None, "2025-06-01T00:00:00.000000Z");
        let reply = comment(post_id, Some(root.id), "2025-06-01T00:01:00.000000Z");
        let nested = comment(post_id, Some(reply.id), "2025-06-01T00:02:00.000000Z");

        let threads = assemble_threads(vec![root.clone(), reply, nested]);
        assert_eq!(threads.len(), 1);
        assert_eq!(threads[0].comment.id, root.id);
        assert_eq!(threads[0].replies.len(), 2);
    }

    #[test]
    fn orphaned_replies_are_promoted_not_dropped() {
        let post_id = Uuid::new_v4();
        let orphan = comment(post_id, Some(Uuid::new_v4()), "2025-06-01T00:00:00.000000Z");
        let threads = assemble_threads(vec![orphan.clone()]);
        assert_eq!(threads.len(), 1);
        assert_eq!(threads[0].comment.id, orphan.id);
    }

    #[test]
    fn cyclic_parent_links_do_not_hang_assembly() {
        let post_id = Uuid::new_v4();
        let mut a = comment(post_id, None, "2025-06-01T00:00:00.000000Z");
        let mut b = comment(post_id, None, "2025-06-01T00:01:00.000000Z");
        a.parent_comment_id = Some(b.id);
        b.parent_comment_id = Some(a.id);

        let threads = assemble_threads(vec![a, b]);
        assert_eq!(threads.len(), 2);
    }
}
