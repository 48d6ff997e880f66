//! Filter that enforces hard dietary exclusions.
//!
//! Hard tags exclude venues outright before any scoring happens. The
//! signal is the venue name: exclusion tags drop venues whose name
//! advertises the excluded food, and requirement tags (vegetarian,
//! halal) keep only venues whose name advertises compliance.

use std::sync::OnceLock;

use anyhow::Result;
use regex::Regex;
use storage::Venue;

use crate::extractor::{ClassifiedPreferences, PreferenceTag};
use crate::traits::Filter;

struct TagPattern {
    tag: PreferenceTag,
    pattern: Regex,
    /// true: name must match to keep; false: a match drops the venue
    required: bool,
}

fn tag_patterns() -> &'static [TagPattern] {
    static PATTERNS: OnceLock<Vec<TagPattern>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            (PreferenceTag::NoBeef, r"(牛|和牛|牛排)", false),
            (PreferenceTag::NoSpicy, r"(辣|麻辣|辣子|辣醬)", false),
            (PreferenceTag::Vegetarian, r"(素食|蔬食|vegan|vegetarian)", true),
            (PreferenceTag::Halal, r"(清真|halal)", true),
            (PreferenceTag::NoPork, r"(豬|豬肉)", false),
        ]
        .into_iter()
        .map(|(tag, pattern, required)| TagPattern {
            tag,
            pattern: Regex::new(pattern).expect("hardcoded pattern"),
            required,
        })
        .collect()
    })
}

/// Drops candidates that conflict with the session's hard tags.
pub struct HardPreferenceFilter;

fn venue_allowed(venue: &Venue, hard: &[PreferenceTag]) -> bool {
    let name = venue.name.to_lowercase();
    tag_patterns()
        .iter()
        .filter(|tp| hard.contains(&tp.tag))
        .all(|tp| tp.pattern.is_match(&name) == tp.required)
}

impl Filter for HardPreferenceFilter {
    fn name(&self) -> &str {
        "HardPreferenceFilter"
    }

    fn apply(
        &self,
        candidates: Vec<Venue>,
        preferences: &ClassifiedPreferences,
    ) -> Result<Vec<Venue>> {
        if preferences.hard.is_empty() {
            return Ok(candidates);
        }
        Ok(candidates
            .into_iter()
            .filter(|venue| venue_allowed(venue, &preferences.hard))
            .collect())
    }
}
