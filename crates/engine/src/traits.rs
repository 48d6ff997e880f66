//! Core traits for the candidate filtering pipeline.

use anyhow::Result;
use storage::Venue;

use crate::extractor::ClassifiedPreferences;

/// Core trait for filtering venue candidates.
///
/// Filters take ownership of the candidate list and return the kept
/// subset; `Send + Sync` lets a pipeline be shared across sessions.
pub trait Filter: Send + Sync {
    /// Returns the name of this filter (for logging/debugging)
    fn name(&self) -> &str;

    /// Apply this filter to a set of candidates.
    ///
    /// # Arguments
    /// * `candidates` - The candidates to filter (takes ownership)
    /// * `preferences` - The session's classified preferences
    fn apply(
        &self,
        candidates: Vec<Venue>,
        preferences: &ClassifiedPreferences,
    ) -> Result<Vec<Venue>>;
}
