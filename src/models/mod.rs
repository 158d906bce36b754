// Domain models - typed structs decoded from gateway rows at the trust boundary

pub mod comment;
pub mod decode;
pub mod follow;
pub mod post;
pub mod profile;
pub mod restaurant;
pub mod saved;

// Re-export model types
pub use comment::Comment;
pub use follow::{EdgeStatus, FollowCounts, FollowEdge, FollowStatus, ListMode, RelationshipEntry};
pub use post::{NewReview, NewThread, Post, PostKind};
pub use profile::{NewProfile, Profile, ProfileChanges};
pub use restaurant::{PriceTier, Restaurant};
pub use saved::SavedRestaurant;

use uuid::Uuid;

/// Entity identifiers as issued by the hosted platform.
pub type UserId = Uuid;
pub type PostId = Uuid;
pub type CommentId = Uuid;
pub type RestaurantId = Uuid;
