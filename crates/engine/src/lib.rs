//! Recommendation engine: extraction, validation, collection, fusion.
//!
//! This crate holds the session-independent machinery the orchestrator
//! drives:
//! - [`extractor`]: utterances to structured constraints
//! - [`validator`]: the geocode + area-size policy
//! - [`collector`]: bounded-concurrency review collection with cache
//! - [`filters`] / [`filter_pipeline`]: hard preference enforcement
//! - [`fusion`]: deterministic scoring and top-3 ranking

pub mod collector;
pub mod extractor;
pub mod filter_pipeline;
pub mod filters;
pub mod fusion;
pub mod traits;
pub mod validator;

pub use collector::{CollectedReviews, CollectionCoordinator};
pub use extractor::{
    classify_preferences, ClassifiedPreferences, Completeness, Extraction, InputExtractor,
    PreferenceTag,
};
pub use filter_pipeline::FilterPipeline;
pub use filters::HardPreferenceFilter;
pub use fusion::{fuse, rank, FusionWeights, RankedVenue, ReviewSignal, NEUTRAL_SCORE, TOP_N};
pub use traits::Filter;
pub use validator::{check_span, LocationCheck, LocationValidator, DEFAULT_MAX_SPAN_DEG};
