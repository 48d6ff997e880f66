//! # Storage Crate
//!
//! Durable state for the restaurant recommender.
//!
//! ## Main Components
//!
//! - **types**: Domain records (Venue, Review, RecommendationRecord)
//! - **store**: SQLite persistence via sqlx
//! - **error**: Error types for storage operations
//!
//! ## Example Usage
//!
//! ```ignore
//! use storage::{Store, Venue};
//!
//! let store = Store::connect("sqlite://data/app.db").await?;
//! store.upsert_venue(&venue).await?;
//!
//! if let Some(reviews) = store.fresh_reviews(&venue.place_id, 30).await? {
//!     // reuse cached reviews instead of collecting again
//! }
//! ```

// Public modules
pub mod error;
pub mod store;
pub mod types;

// Re-export commonly used types for convenience
pub use error::{Result, StorageError};
pub use store::Store;
pub use types::{RecommendationRecord, Review, Venue};
