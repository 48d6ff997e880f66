//! Typed events sent to the client over the session transport.
//!
//! One session per connection; the client sends raw utterance text
//! and receives these events as JSON, discriminated by `type`.

use engine::RankedVenue;
use serde::{Deserialize, Serialize};

/// One entry of the terminal recommendation payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationItem {
    pub name: String,
    pub rating: f64,
    pub address: String,
    pub reason: String,
    pub map_url: String,
}

impl RecommendationItem {
    pub fn from_ranked(ranked: &RankedVenue, reason: String) -> Self {
        Self {
            name: ranked.venue.name.clone(),
            rating: ranked.venue.rating,
            address: ranked.venue.address.clone(),
            reason,
            map_url: ranked.venue.map_url.clone(),
        }
    }
}

/// Server-to-client session events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Non-terminal status while the pipeline runs.
    Progress { text: String },
    /// Conversational reply (questions, summaries, terminal notices).
    Message { text: String },
    /// Terminal success payload, at most 3 entries.
    Recommendations { data: Vec<RecommendationItem> },
    /// Terminal or recoverable failure notice.
    Error { text: String },
}

impl SessionEvent {
    pub fn progress(text: impl Into<String>) -> Self {
        SessionEvent::Progress { text: text.into() }
    }

    pub fn message(text: impl Into<String>) -> Self {
        SessionEvent::Message { text: text.into() }
    }

    pub fn error(text: impl Into<String>) -> Self {
        SessionEvent::Error { text: text.into() }
    }
}
