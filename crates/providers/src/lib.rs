//! External service clients for the recommendation engine.
//!
//! Everything that leaves the process lives here, behind async traits
//! so the conversation engine can run against fakes in tests:
//!
//! - [`GooglePlaceClient`]: geocoding and nearby venue search
//! - [`ReviewServiceClient`]: the review scraper sidecar
//! - [`GeminiClient`]: text generation for extraction and wording

pub mod error;
pub mod llm;
pub mod places;
pub mod reviews;
pub mod traits;
pub mod types;

pub use error::{ProviderError, Result};
pub use llm::GeminiClient;
pub use places::GooglePlaceClient;
pub use reviews::ReviewServiceClient;
pub use traits::{PlaceSearch, ReviewScorer, ReviewSource, TextGenerator};
pub use types::{GeoBounds, Geocoded, ReviewAnalysis};
