// Follow graph - directed edges with an approval state, one row per
// (follower, followee) pair in the follows collection

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::gateway::JsonRow;
use crate::models::decode;
use crate::models::{Profile, UserId};

/// Persisted state of a follow edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeStatus {
    Approved,
    Requested,
}

impl EdgeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeStatus::Approved => "approved",
            EdgeStatus::Requested => "requested",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "approved" => Some(EdgeStatus::Approved),
            "requested" => Some(EdgeStatus::Requested),
            _ => None,
        }
    }
}

/// Viewer-relative follow state, derived by merging the viewer's outgoing
/// edges into a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowStatus {
    NotFollowing,
    Following,
    Requested,
}

impl FollowStatus {
    pub fn from_edge(status: Option<EdgeStatus>) -> Self {
        match status {
            None => FollowStatus::NotFollowing,
            Some(EdgeStatus::Approved) => FollowStatus::Following,
            Some(EdgeStatus::Requested) => FollowStatus::Requested,
        }
    }
}

/// Which side of the graph a relationship listing walks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListMode {
    Followers,
    Following,
}

impl ListMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "followers" => Some(ListMode::Followers),
            "following" => Some(ListMode::Following),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FollowEdge {
    pub follower_id: UserId,
    pub followee_id: UserId,
    pub status: EdgeStatus,
    pub created_at: DateTime<Utc>,
}

impl FollowEdge {
    /// Decodes a gateway row. Edges with an unknown status or malformed ids
    /// decode to `None` and are silently excluded upstream.
    pub fn from_row(row: &JsonRow) -> Option<Self> {
        Some(FollowEdge {
            follower_id: decode::uuid_field(row, "follower_id")?,
            followee_id: decode::uuid_field(row, "followee_id")?,
            status: decode::str_field(row, "status").and_then(EdgeStatus::parse)?,
            created_at: decode::datetime_field(row, "created_at")?,
        })
    }

    pub fn to_row(&self) -> JsonRow {
        decode::row_from_value(json!({
            "follower_id": self.follower_id.to_string(),
            "followee_id": self.followee_id.to_string(),
            "status": self.status.as_str(),
            "created_at": decode::format_timestamp(self.created_at),
        }))
    }

    /// Partial row for moving an edge to a new status.
    pub fn status_change(status: EdgeStatus) -> JsonRow {
        decode::row_from_value(json!({ "status": status.as_str() }))
    }
}

/// One entry in a followers/following listing: the related profile plus the
/// listed edge's state and the viewer's own state toward that user.
#[derive(Debug, Clone, Serialize)]
pub struct RelationshipEntry {
    pub profile: Profile,
    pub relationship_status: EdgeStatus,
    pub follow_status: FollowStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FollowCounts {
    pub followers: u64,
    pub following: u64,
}
