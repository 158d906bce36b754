// RelationshipService - follow graph reconciliation
// Follows, requests, approvals, and the merged per-user status views that
// listings render from.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::core::Viewer;
use crate::error::{AppError, AppResult};
use crate::gateway::{DataGateway, Filter, Table, TableQuery};
use crate::models::{
    EdgeStatus, FollowCounts, FollowEdge, FollowStatus, ListMode, Profile, RelationshipEntry,
    UserId,
};

#[derive(Clone)]
pub struct RelationshipService {
    gateway: Arc<dyn DataGateway>,
}

impl RelationshipService {
    pub fn new(gateway: Arc<dyn DataGateway>) -> Self {
        Self { gateway }
    }

    /// Followers or following of `user_id`, newest edge first, each entry
    /// merged with the viewer's own follow state toward that user. Anonymous
    /// viewers see `not_following` everywhere. Users whose profile row is
    /// missing are dropped from the listing.
    pub async fn list_relationships(
        &self,
        viewer: &Viewer,
        user_id: UserId,
        mode: ListMode,
    ) -> AppResult<Vec<RelationshipEntry>> {
        let anchor_column = match mode {
            ListMode::Followers => "followee_id",
            ListMode::Following => "follower_id",
        };
        let edges = self
            .edges(
                TableQuery::new(Table::Follows)
                    .eq(anchor_column, user_id.to_string())
                    .order_desc("created_at"),
            )
            .await?;
        self.assemble_entries(viewer.user_id(), edges, mode).await
    }

    /// Follow or request to follow `target_id`. Public targets approve
    /// immediately; private ones hold a request until accepted. Re-following
    /// never downgrades an edge the target has already approved.
    pub async fn follow_user(&self, viewer: &Viewer, target_id: UserId) -> AppResult<FollowStatus> {
        let viewer_id = viewer.require_user()?;
        if viewer_id == target_id {
            return Err(AppError::Validation("Cannot follow yourself".to_string()));
        }

        let (target_row, existing) = futures::try_join!(
            self.gateway
                .fetch_one(TableQuery::new(Table::Profiles).eq("id", target_id.to_string())),
            self.edge_between(viewer_id, target_id)
        )?;
        let target = target_row
            .as_ref()
            .and_then(Profile::from_row)
            .ok_or_else(|| AppError::NotFound(format!("Profile {} not found", target_id)))?;

        if let Some(edge) = existing {
            if edge.status == EdgeStatus::Approved {
                return Ok(FollowStatus::Following);
            }
        }

        let status = if target.is_public {
            EdgeStatus::Approved
        } else {
            EdgeStatus::Requested
        };
        let edge = FollowEdge {
            follower_id: viewer_id,
            followee_id: target_id,
            status,
            created_at: Utc::now(),
        };
        self.gateway
            .upsert(
                Table::Follows,
                edge.to_row(),
                &["follower_id", "followee_id"],
            )
            .await?;
        info!(
            "Stored follow edge {} -> {} as {}",
            viewer_id,
            target_id,
            status.as_str()
        );
        Ok(FollowStatus::from_edge(Some(status)))
    }

    /// Removes the viewer's edge toward `target_id` whatever its state, so
    /// unfollowing also cancels a pending request. Removing an edge that is
    /// not there is not an error.
    pub async fn unfollow_user(&self, viewer: &Viewer, target_id: UserId) -> AppResult<()> {
        let viewer_id = viewer.require_user()?;
        let removed = self
            .gateway
            .delete(
                Table::Follows,
                vec![
                    Filter::eq("follower_id", viewer_id.to_string()),
                    Filter::eq("followee_id", target_id.to_string()),
                ],
            )
            .await?;
        if removed > 0 {
            info!("Removed follow edge {} -> {}", viewer_id, target_id);
        }
        Ok(())
    }

    /// Approves a pending request from `requester_id` to follow the viewer.
    pub async fn accept_follow_request(
        &self,
        viewer: &Viewer,
        requester_id: UserId,
    ) -> AppResult<()> {
        let viewer_id = viewer.require_user()?;
        let touched = self
            .gateway
            .update(
                Table::Follows,
                FollowEdge::status_change(EdgeStatus::Approved),
                vec![
                    Filter::eq("follower_id", requester_id.to_string()),
                    Filter::eq("followee_id", viewer_id.to_string()),
                    Filter::eq("status", EdgeStatus::Requested.as_str()),
                ],
            )
            .await?;
        if touched == 0 {
            return Err(AppError::NotFound(format!(
                "No pending follow request from {}",
                requester_id
            )));
        }
        info!("Approved follow request {} -> {}", requester_id, viewer_id);
        Ok(())
    }

    /// Rejects a pending request by deleting its edge.
    pub async fn decline_follow_request(
        &self,
        viewer: &Viewer,
        requester_id: UserId,
    ) -> AppResult<()> {
        let viewer_id = viewer.require_user()?;
        let removed = self
            .gateway
            .delete(
                Table::Follows,
                vec![
                    Filter::eq("follower_id", requester_id.to_string()),
                    Filter::eq("followee_id", viewer_id.to_string()),
                    Filter::eq("status", EdgeStatus::Requested.as_str()),
                ],
            )
            .await?;
        if removed == 0 {
            return Err(AppError::NotFound(format!(
                "No pending follow request from {}",
                requester_id
            )));
        }
        Ok(())
    }

    /// Pending requests addressed to the viewer, newest first.
    pub async fn pending_requests(&self, viewer: &Viewer) -> AppResult<Vec<RelationshipEntry>> {
        let viewer_id = viewer.require_user()?;
        let edges = self
            .edges(
                TableQuery::new(Table::Follows)
                    .eq("followee_id", viewer_id.to_string())
                    .eq("status", EdgeStatus::Requested.as_str())
                    .order_desc("created_at"),
            )
            .await?;
        self.assemble_entries(Some(viewer_id), edges, ListMode::Followers)
            .await
    }

    /// The viewer's follow state toward one user. Anonymous viewers are
    /// trivially not following anyone.
    pub async fn follow_status(
        &self,
        viewer: &Viewer,
        target_id: UserId,
    ) -> AppResult<FollowStatus> {
        let Some(viewer_id) = viewer.user_id() else {
            return Ok(FollowStatus::NotFollowing);
        };
        let edge = self.edge_between(viewer_id, target_id).await?;
        Ok(FollowStatus::from_edge(edge.map(|edge| edge.status)))
    }

    /// Approved follower and following totals for a user. Pending requests
    /// are not counted on either side.
    pub async fn follow_counts(&self, user_id: UserId) -> AppResult<FollowCounts> {
        let (followers, following) = futures::try_join!(
            self.gateway.count(
                TableQuery::new(Table::Follows)
                    .eq("followee_id", user_id.to_string())
                    .eq("status", EdgeStatus::Approved.as_str()),
            ),
            self.gateway.count(
                TableQuery::new(Table::Follows)
                    .eq("follower_id", user_id.to_string())
                    .eq("status", EdgeStatus::Approved.as_str()),
            )
        )?;
        Ok(FollowCounts {
            followers,
            following,
        })
    }

    /// Joins edges with their profiles and the viewer's own outgoing state.
    /// The profile fetch and the viewer's edge fetch are independent reads
    /// and run in flight together; results merge by user id, preserving the
    /// incoming edge order.
    async fn assemble_entries(
        &self,
        viewer_id: Option<UserId>,
        edges: Vec<FollowEdge>,
        mode: ListMode,
    ) -> AppResult<Vec<RelationshipEntry>> {
        let related_ids: Vec<String> = edges
            .iter()
            .map(|edge| match mode {
                ListMode::Followers => edge.follower_id.to_string(),
                ListMode::Following => edge.followee_id.to_string(),
            })
            .collect();

        let (mut profiles, outgoing) = futures::try_join!(self.profiles_by_ids(related_ids), async {
            match viewer_id {
                Some(viewer_id) => self.outgoing_status(viewer_id).await,
                None => Ok(HashMap::new()),
            }
        })?;

        let expected = edges.len();
        let entries: Vec<RelationshipEntry> = edges
            .into_iter()
            .filter_map(|edge| {
                let related_id = match mode {
                    ListMode::Followers => edge.follower_id,
                    ListMode::Following => edge.followee_id,
                };
                let profile = profiles.remove(&related_id)?;
                Some(RelationshipEntry {
                    follow_status: FollowStatus::from_edge(outgoing.get(&related_id).copied()),
                    relationship_status: edge.status,
                    profile,
                })
            })
            .collect();
        if entries.len() < expected {
            warn!(
                "Dropped {} relationship entries with missing profiles",
                expected - entries.len()
            );
        }
        Ok(entries)
    }

    async fn edges(&self, query: TableQuery) -> AppResult<Vec<FollowEdge>> {
        let rows = self.gateway.select(query).await?;
        Ok(rows.iter().filter_map(FollowEdge::from_row).collect())
    }

    async fn edge_between(
        &self,
        follower_id: UserId,
        followee_id: UserId,
    ) -> AppResult<Option<FollowEdge>> {
        let row = self
            .gateway
            .fetch_one(
                TableQuery::new(Table::Follows)
                    .eq("follower_id", follower_id.to_string())
                    .eq("followee_id", followee_id.to_string()),
            )
            .await?;
        Ok(row.as_ref().and_then(FollowEdge::from_row))
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

    async fn outgoing_status(&self, viewer_id: UserId) -> AppResult<HashMap<UserId, EdgeStatus>> {
        let edges = self
            .edges(TableQuery::new(Table::Follows).eq("follower_id", viewer_id.to_string()))
            .await?;
        Ok(edges
            .into_iter()
            .map(|edge| (edge.followee_id, edge.status))
            .collect())
    }
}
