//! Seams between the core and the external collaborators.
//!
//! The orchestrator and engine only ever see these traits; the
//! concrete reqwest/tonic clients implement them, and tests substitute
//! in-process fakes.

use async_trait::async_trait;
use storage::{Review, Venue};

use crate::error::Result;
use crate::types::{Geocoded, ReviewAnalysis};

/// Place lookup provider: location phrase + category to candidate
/// venues, plus geocoding for the area-size check.
#[async_trait]
pub trait PlaceSearch: Send + Sync {
    /// Resolve a location phrase to a center point and viewport
    /// bounds. Fails with `Unresolvable` when the phrase matches
    /// nothing.
    async fn geocode(&self, location: &str) -> Result<Geocoded>;

    /// Search venues of `category` around `location`, in provider
    /// discovery order.
    async fn search(&self, location: &str, category: &str) -> Result<Vec<Venue>>;
}

/// Per-venue review collector. May fail or stall per venue; the
/// collection coordinator isolates that.
#[async_trait]
pub trait ReviewSource: Send + Sync {
    /// Fetch up to `max_items` reviews for a venue.
    async fn fetch_reviews(&self, place_id: &str, max_items: usize) -> Result<Vec<Review>>;
}

/// Natural-language generation backend (intent checks, structured
/// extraction, recommendation reasons).
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Semantic/sentiment scorer for a venue's review set against a
/// preference description.
#[async_trait]
pub trait ReviewScorer: Send + Sync {
    async fn score_reviews(&self, texts: &[String], preference: &str) -> Result<ReviewAnalysis>;
}
