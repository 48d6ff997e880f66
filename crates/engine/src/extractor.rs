//! Preference extraction from raw utterances.
//!
//! Turns free text into structured constraints in three steps:
//! 1. Intent check: is this a dining query at all?
//! 2. Structured extraction: location, category, preference list,
//!    pulled out of the model's completion as a JSON block
//! 3. Classification: each preference item becomes a hard exclusion
//!    tag or a soft ranking hint, by fixed pattern matching so the
//!    decision is stable for the whole session

use std::sync::{Arc, OnceLock};

use anyhow::{Context, Result};
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

use providers::TextGenerator;

/// Structured constraints pulled from one or more utterances.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub location: Option<String>,
    pub category: Option<String>,
    pub preferences: Vec<String>,
}

/// How complete an extraction is, for state-machine branching.
/// Irrelevance is decided separately by the intent check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completeness {
    Complete,
    MissingLocation,
    MissingCategory,
    MissingBoth,
}

impl Extraction {
    /// Classify completeness from which fields are present.
    pub fn completeness(&self) -> Completeness {
        match (self.location.is_some(), self.category.is_some()) {
            (true, true) => Completeness::Complete,
            (false, true) => Completeness::MissingLocation,
            (true, false) => Completeness::MissingCategory,
            (false, false) => Completeness::MissingBoth,
        }
    }

    /// Fill empty fields from an earlier extraction (correction turns
    /// keep whatever the user did not re-state).
    pub fn merged_with(mut self, prior: &Extraction) -> Extraction {
        if self.location.is_none() {
            self.location = prior.location.clone();
        }
        if self.category.is_none() {
            self.category = prior.category.clone();
        }
        if self.preferences.is_empty() {
            self.preferences = prior.preferences.clone();
        }
        self
    }
}

/// Hard exclusion tags, normalized from free-text preference items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PreferenceTag {
    NoBeef,
    NoSpicy,
    Vegetarian,
    Halal,
    NoPork,
}

/// Preference items split into hard exclusions and soft ranking hints.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassifiedPreferences {
    pub hard: Vec<PreferenceTag>,
    pub soft: Vec<String>,
}

impl ClassifiedPreferences {
    /// Soft hints joined for the similarity scorer.
    pub fn soft_text(&self) -> String {
        self.soft.join("，")
    }
}

fn hard_tag_patterns() -> &'static [(PreferenceTag, Regex)] {
    static PATTERNS: OnceLock<Vec<(PreferenceTag, Regex)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            (PreferenceTag::NoBeef, r"(不吃|不能).*牛"),
            (PreferenceTag::NoSpicy, r"(不吃|不能).*辣"),
            (PreferenceTag::Vegetarian, r"(素食|吃素|vegan|vegetarian)"),
            (PreferenceTag::Halal, r"(清真|halal)"),
            (PreferenceTag::NoPork, r"(不吃|不能).*豬"),
        ]
        .into_iter()
        .map(|(tag, pattern)| (tag, Regex::new(pattern).expect("hardcoded pattern")))
        .collect()
    })
}

/// Split preference items into hard tags and soft hints.
///
/// The first matching pattern wins; items matching no pattern are
/// soft. Fixed patterns keep the split deterministic per session.
pub fn classify_preferences(preferences: &[String]) -> ClassifiedPreferences {
    let mut classified = ClassifiedPreferences::default();
    for item in preferences {
        let lowered = item.to_lowercase();
        match hard_tag_patterns()
            .iter()
            .find(|(_, re)| re.is_match(&lowered))
        {
            Some((tag, _)) => {
                if !classified.hard.contains(tag) {
                    classified.hard.push(*tag);
                }
            }
            None => classified.soft.push(lowered),
        }
    }
    classified
}

/// Pull the JSON object out of a model completion.
///
/// Handles fenced blocks and leading/trailing prose by slicing from
/// the first `{` to the last `}`.
pub fn extract_json_block(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

#[derive(Deserialize)]
struct RawExtraction {
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    preferences: Vec<String>,
}

fn normalize_field(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && v != "null" && v != "無")
}

fn normalize_preferences(items: Vec<String>) -> Vec<String> {
    let mut seen = Vec::new();
    for item in items {
        let trimmed = item.trim().to_string();
        if !trimmed.is_empty() && !seen.contains(&trimmed) {
            seen.push(trimmed);
        }
    }
    seen
}

/// Extractor backed by the external reasoning generator.
pub struct InputExtractor {
    generator: Arc<dyn TextGenerator>,
}

impl InputExtractor {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Decide whether the utterance is a dining query at all.
    ///
    /// Generator failure defaults to relevant so a flaky model never
    /// turns a real query away.
    pub async fn is_dining_query(&self, utterance: &str) -> bool {
        let prompt = format!(
            "判斷以下句子是否在詢問餐廳、美食或用餐建議。只回答「是」或「否」。\n句子：{utterance}"
        );
        match self.generator.generate(&prompt).await {
            Ok(reply) => {
                let reply = reply.trim().to_lowercase();
                reply.contains('是') || reply.contains("yes")
            }
            Err(e) => {
                warn!("Intent check failed, assuming dining query: {}", e);
                true
            }
        }
    }

    /// Extract structured constraints from one utterance.
    pub async fn extract(&self, utterance: &str) -> Result<Extraction> {
        let prompt = format!(
            "從使用者的句子中擷取餐廳搜尋條件，輸出 JSON，格式：\n\
             {{\"location\": \"地點或 null\", \"category\": \"餐廳類型或 null\", \"preferences\": [\"偏好\"]}}\n\
             找不到的欄位填 null，preferences 沒有就給空陣列。只輸出 JSON。\n\
             句子：{utterance}"
        );
        let completion = self
            .generator
            .generate(&prompt)
            .await
            .context("Extraction completion")?;

        let block = extract_json_block(&completion)
            .context("No JSON object in extraction completion")?;
        let raw: RawExtraction =
            serde_json::from_str(block).context("Parsing extraction JSON")?;

        let extraction = Extraction {
            location: normalize_field(raw.location),
            category: normalize_field(raw.category),
            preferences: normalize_preferences(raw.preferences),
        };
        debug!("Extracted constraints: {:?}", extraction);
        Ok(extraction)
    }
}
