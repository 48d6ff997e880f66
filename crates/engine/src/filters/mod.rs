//! Candidate filters.

mod hard_preference;

pub use hard_preference::HardPreferenceFilter;
