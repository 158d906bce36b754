// Core primitives - geography, review text helpers, viewer identity

pub mod geo;
pub mod text;
pub mod viewer;

// Re-export commonly used types
pub use geo::{GeoPoint, Viewport};
pub use viewer::Viewer;
