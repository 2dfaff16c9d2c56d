pub mod auth;
pub mod error;
pub mod models;
pub mod openapi;
pub mod rate_limit; // in-memory rate limiting
pub mod repo;
pub mod routes;
pub mod search; // item filter engine + visibility gate
pub mod security;

// Re-export commonly used items for tests / external users
pub use routes::{config, AppState};
pub use search::{filter_items, FilterSpec, Viewer};
pub use security::SecurityHeaders;
