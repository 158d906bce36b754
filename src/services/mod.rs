// Service layer: each service owns one slice of app behavior over the data gateway

pub mod engagement;
pub mod map_pins;
pub mod posts;
pub mod profiles;
pub mod relationships;
pub mod saved;

pub use engagement::{CommentThread, EngagementService};
pub use map_pins::{MapPin, MapPinService, MapViewState, ReviewPreview};
pub use posts::PostService;
pub use profiles::ProfileService;
pub use relationships::RelationshipService;
pub use saved::{SavedEntry, SavedListService, SavedSort};
