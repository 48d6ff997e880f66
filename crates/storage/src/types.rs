//! Core domain records persisted by the recommender.
//!
//! These are the durable shapes: venues found through place search,
//! the reviews collected for them, and the append-only history of
//! delivered recommendations. Session-scoped working data (signals,
//! rankings in progress) lives in the engine and server crates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A venue as returned by the place provider and stored in `venues`.
///
/// Immutable from the session's point of view once fetched; the
/// stored row is refreshed (upserted) whenever the venue reappears in
/// a search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Venue {
    /// Provider-unique identifier (primary dedup key)
    pub place_id: String,
    pub name: String,
    /// Provider star rating in [0, 5]
    pub rating: f64,
    pub user_ratings_total: i64,
    pub address: String,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub map_url: String,
}

/// One review row for a venue.
///
/// `review_id` is the provider's stable identifier and the dedup key
/// within a venue. Stars may be missing when the collector could not
/// parse them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub review_id: String,
    pub text: String,
    pub stars: Option<f64>,
}

/// Append-only snapshot of one completed session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationRecord {
    pub user_input: String,
    pub location: String,
    pub category: String,
    /// Ordered, comma-joined place ids of the delivered top entries
    pub top_place_ids: String,
    /// Full ranked payload, as delivered to the client
    pub recommendation_json: serde_json::Value,
    pub created_at: DateTime<Utc>,
}
