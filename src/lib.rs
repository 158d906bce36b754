// TasteMap - social restaurant discovery core

// HTTP interface - handlers and the API router
pub mod api;

// Application state - services wired over the data gateway
pub mod app_state;

// Configuration
pub mod config;

// Core types and primitives
pub mod core;

// Remote data gateway - typed access to the hosted collections
pub mod gateway;

// Domain models decoded at the trust boundary
pub mod models;

// Service layer - relationships, map pins, posts, engagement, saved lists
pub mod services;

// Common utilities
pub mod error;

// Re-exports for convenience
pub use error::{AppError, AppResult};
