//! # Session Orchestrator
//!
//! Drives one conversation session through the full workflow:
//! 1. Parse the utterance into structured constraints
//! 2. Validate the location against the area-size policy
//! 3. Collect preferences and confirm the resolved query
//! 4. Search venues and enforce hard preferences
//! 5. Collect reviews concurrently with per-venue budgets
//! 6. Score, fuse and rank the signals into a Top-3
//! 7. Generate reasons, persist the record, deliver
//!
//! Failure containment is the orchestrator's job: per-venue and
//! per-signal problems degrade in place, session-scope problems end
//! the session with a user-legible message, and nothing is raised
//! past this boundary.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, warn};

use engine::{
    classify_preferences, rank, CollectionCoordinator, Extraction, FilterPipeline, FusionWeights,
    HardPreferenceFilter, InputExtractor, LocationCheck, LocationValidator, RankedVenue,
    ReviewSignal,
};
use providers::{PlaceSearch, ProviderError, ReviewScorer, ReviewSource, TextGenerator};
use storage::{RecommendationRecord, Store, Venue};

use crate::config::Config;
use crate::error::SessionError;
use crate::events::{RecommendationItem, SessionEvent};
use crate::state::{
    is_no_preference, parse_confirmation, split_preferences, ConfirmationReply, ConversationState,
    Phase, PhaseOutcome,
};

/// External collaborators a session needs, behind trait objects so
/// tests can substitute in-process fakes.
#[derive(Clone)]
pub struct SessionDeps {
    pub places: Arc<dyn PlaceSearch>,
    pub reviews: Arc<dyn ReviewSource>,
    pub generator: Arc<dyn TextGenerator>,
    pub scorer: Arc<dyn ReviewScorer>,
    pub store: Store,
}

/// Per-session knobs, lifted out of [`Config`] so tests can override
/// them without a full CLI parse.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub collect_concurrency: usize,
    pub per_venue_timeout: Duration,
    pub max_reviews_per_venue: usize,
    pub max_area_span_deg: f64,
    pub review_cache_days: i64,
    pub pipeline_deadline: Duration,
    pub quota_backoff: Duration,
    pub neutral_score: f64,
    pub fallback_reason: String,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            collect_concurrency: 3,
            per_venue_timeout: Duration::from_secs(20),
            max_reviews_per_venue: 100,
            max_area_span_deg: 0.2,
            review_cache_days: 30,
            pipeline_deadline: Duration::from_secs(120),
            quota_backoff: Duration::from_secs(2),
            neutral_score: 0.5,
            fallback_reason: "這家餐廳評價不錯，值得一試。".to_string(),
        }
    }
}

impl From<&Config> for SessionSettings {
    fn from(config: &Config) -> Self {
        Self {
            collect_concurrency: config.collect_concurrency,
            per_venue_timeout: config.per_venue_timeout(),
            max_reviews_per_venue: config.max_reviews_per_venue,
            max_area_span_deg: config.max_area_span_deg,
            review_cache_days: config.review_cache_days,
            pipeline_deadline: config.pipeline_deadline(),
            quota_backoff: Duration::from_secs(2),
            neutral_score: config.neutral_score,
            fallback_reason: config.fallback_reason.clone(),
        }
    }
}

/// Events flow to the transport as they happen, not at turn end.
pub type EventSink = UnboundedSender<SessionEvent>;

/// Drives one conversation session.
///
/// One driver per connection; the state machine inside is single-owner
/// and never shared across sessions.
pub struct SessionDriver {
    deps: SessionDeps,
    settings: SessionSettings,
    extractor: InputExtractor,
    validator: LocationValidator,
    filter_pipeline: FilterPipeline,
    weights: FusionWeights,
    state: ConversationState,
    last_extraction: Extraction,
}

impl SessionDriver {
    pub fn new(deps: SessionDeps, settings: SessionSettings) -> Self {
        let extractor = InputExtractor::new(Arc::clone(&deps.generator));
        let validator = LocationValidator::new(Arc::clone(&deps.places))
            .with_max_span_deg(settings.max_area_span_deg);
        let filter_pipeline = FilterPipeline::new().add_filter(HardPreferenceFilter);
        Self {
            deps,
            settings,
            extractor,
            validator,
            filter_pipeline,
            weights: FusionWeights::default(),
            state: ConversationState::new(),
            last_extraction: Extraction::default(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    /// Process one utterance from the resting point the session is in.
    ///
    /// A terminal session resets first, so the same connection can ask
    /// for another recommendation.
    pub async fn handle_utterance(&mut self, text: &str, events: &EventSink) {
        if self.state.phase.is_terminal() {
            self.reset();
        }
        self.state.record_utterance(text);

        match self.state.phase {
            Phase::Idle => {
                self.state.transition(PhaseOutcome::UtteranceReceived);
                self.parse_turn(text, events).await;
            }
            Phase::ParsingInput => self.parse_turn(text, events).await,
            Phase::ValidatingLocation => {
                // The re-ask asked for a location phrase; take it as-is
                self.last_extraction.location = Some(text.trim().to_string());
                self.state.location = self.last_extraction.location.clone();
                self.validate_turn(events).await;
            }
            Phase::AwaitingPreferenceInput => self.preference_turn(text, events).await,
            Phase::AwaitingConfirmation => self.confirmation_turn(text, events).await,
            // Pipeline phases never rest between utterances
            _ => {}
        }
    }

    fn reset(&mut self) {
        info!("Session reset after terminal phase {:?}", self.state.phase);
        self.state = ConversationState::new();
        self.last_extraction = Extraction::default();
    }

    async fn parse_turn(&mut self, text: &str, events: &EventSink) {
        if !self.extractor.is_dining_query(text).await {
            self.state.transition(PhaseOutcome::Irrelevant);
            emit(
                events,
                SessionEvent::message(SessionError::InputIrrelevant.user_message()),
            );
            return;
        }

        let extraction = match self.extractor.extract(text).await {
            Ok(extraction) => extraction.merged_with(&self.last_extraction),
            Err(e) => {
                // Degrade to a re-ask rather than failing the session
                warn!("Extraction failed: {:#}", e);
                Extraction::default().merged_with(&self.last_extraction)
            }
        };
        self.last_extraction = extraction.clone();

        use engine::Completeness::*;
        match extraction.completeness() {
            Complete => {
                self.state.location = extraction.location;
                self.state.category = extraction.category;
                self.state.preferences = classify_preferences(&extraction.preferences);
                self.state.transition(PhaseOutcome::Complete);
                self.validate_turn(events).await;
            }
            MissingLocation => {
                self.state.transition(PhaseOutcome::Incomplete);
                emit(events, SessionEvent::message("請問你想在哪個地區用餐呢？"));
            }
            MissingCategory => {
                self.state.transition(PhaseOutcome::Incomplete);
                emit(events, SessionEvent::message("想吃什麼類型的餐廳呢？"));
            }
            MissingBoth => {
                self.state.transition(PhaseOutcome::Incomplete);
                emit(
                    events,
                    SessionEvent::message(SessionError::InputIncomplete.user_message()),
                );
            }
        }
    }

    async fn validate_turn(&mut self, events: &EventSink) {
        let Some(location) = self.state.location.clone() else {
            self.state.transition(PhaseOutcome::Incomplete);
            emit(events, SessionEvent::message("請問你想在哪個地區用餐呢？"));
            return;
        };

        let check = self.geocode_with_retry(&location, events).await;
        match check {
            Ok(LocationCheck::Valid(_)) => {
                self.state.transition(PhaseOutcome::LocationValid);
                emit(
                    events,
                    SessionEvent::message(
                        "有什麼飲食偏好或限制嗎？（例如：不吃牛、想要安靜）沒有的話請說「沒有」。",
                    ),
                );
            }
            Ok(LocationCheck::TooLarge { span }) => {
                self.state.transition(PhaseOutcome::LocationTooLarge);
                emit(
                    events,
                    SessionEvent::message(
                        SessionError::LocationTooLarge { span }.user_message(),
                    ),
                );
            }
            Ok(LocationCheck::Unresolvable) => {
                self.state.transition(PhaseOutcome::LocationUnresolvable);
                emit(
                    events,
                    SessionEvent::message("找不到這個地點，換個說法試試？"),
                );
            }
            Err(error) => {
                self.state.transition(PhaseOutcome::PipelineFailed);
                emit(events, SessionEvent::error(error.user_message()));
            }
        }
    }

    /// One retry with backoff on provider quota, per the containment
    /// policy; other provider errors fail the session immediately.
    async fn geocode_with_retry(
        &self,
        location: &str,
        events: &EventSink,
    ) -> Result<LocationCheck, SessionError> {
        match self.validator.validate(location).await {
            Ok(check) => Ok(check),
            Err(ProviderError::QuotaExceeded) => {
                emit(
                    events,
                    SessionEvent::error("服務繁忙，稍等一下再試一次…"),
                );
                tokio::time::sleep(self.settings.quota_backoff).await;
                match self.validator.validate(location).await {
                    Ok(check) => Ok(check),
                    Err(_) => Err(SessionError::ProviderQuotaExceeded),
                }
            }
            Err(e) => {
                warn!("Geocoding '{}' failed: {}", location, e);
                Err(SessionError::NoCandidatesFound)
            }
        }
    }

    async fn preference_turn(&mut self, text: &str, events: &EventSink) {
        let items = if is_no_preference(text) {
            Vec::new()
        } else {
            split_preferences(text)
        };
        self.state.preferences = classify_preferences(&items);
        self.state.transition(PhaseOutcome::PreferencesClassified);

        let location = self.state.location.clone().unwrap_or_default();
        let category = self.state.category.clone().unwrap_or_default();
        let preference_text = if items.is_empty() {
            "無".to_string()
        } else {
            items.join("、")
        };
        emit(
            events,
            SessionEvent::message(format!(
                "幫你確認一下：在{location}找{category}，偏好：{preference_text}。可以開始搜尋嗎？"
            )),
        );
        self.state.transition(PhaseOutcome::SummaryPresented);
    }

    async fn confirmation_turn(&mut self, text: &str, events: &EventSink) {
        match parse_confirmation(text) {
            ConfirmationReply::Confirm => {
                self.state.transition(PhaseOutcome::Confirmed);
                self.run_pipeline(events).await;
            }
            ConfirmationReply::Cancel => {
                self.state.transition(PhaseOutcome::CancelRequested);
                emit(events, SessionEvent::message("好的，已取消這次搜尋。"));
            }
            ConfirmationReply::Modify => {
                // Correction: re-parse with the prior state as defaults
                self.state.transition(PhaseOutcome::ModifyRequested);
                self.parse_turn(text, events).await;
            }
        }
    }

    /// Search through delivery, under one wall-clock deadline.
    async fn run_pipeline(&mut self, events: &EventSink) {
        let started = Instant::now();
        let deadline = self.settings.pipeline_deadline;
        let finished = tokio::time::timeout(deadline, self.pipeline_inner(events)).await;

        match finished {
            Ok(()) => {
                info!(
                    "Pipeline finished in {:.2?} at phase {:?}",
                    started.elapsed(),
                    self.state.phase
                );
            }
            Err(_) => {
                // Generic failure, never a partial result
                warn!("Pipeline deadline ({:?}) exceeded", deadline);
                self.state.transition(PhaseOutcome::PipelineFailed);
                emit(
                    events,
                    SessionEvent::error(SessionError::PipelineDeadline.user_message()),
                );
            }
        }
    }

    async fn pipeline_inner(&mut self, events: &EventSink) {
        // Searching
        emit(events, SessionEvent::progress("正在搜尋餐廳…"));
        let candidates = match self.search_with_retry(events).await {
            Ok(candidates) => candidates,
            Err(error) => {
                self.state.transition(PhaseOutcome::PipelineFailed);
                emit(events, SessionEvent::error(error.user_message()));
                return;
            }
        };
        info!("Search returned {} candidates", candidates.len());

        let kept = match self.filter_pipeline.apply(candidates, &self.state.preferences) {
            Ok(kept) => kept,
            Err(e) => {
                warn!("Filter pipeline failed: {:#}", e);
                self.state.transition(PhaseOutcome::PipelineFailed);
                emit(
                    events,
                    SessionEvent::error(SessionError::NoCandidatesFound.user_message()),
                );
                return;
            }
        };
        if kept.is_empty() {
            self.state.transition(PhaseOutcome::NoCandidates);
            emit(
                events,
                SessionEvent::message(SessionError::NoCandidatesFound.user_message()),
            );
            return;
        }
        self.state.candidates = kept;
        self.state.transition(PhaseOutcome::CandidatesFound);

        // CollectingReviews
        emit(events, SessionEvent::progress("正在收集評論…"));
        let coordinator = CollectionCoordinator::new(Arc::clone(&self.deps.reviews))
            .with_store(self.deps.store.clone())
            .with_concurrency(self.settings.collect_concurrency)
            .with_per_venue_timeout(self.settings.per_venue_timeout)
            .with_max_items(self.settings.max_reviews_per_venue)
            .with_cache_max_age_days(self.settings.review_cache_days);
        let collected = coordinator.collect(&self.state.candidates).await;

        if collected.values().all(|c| !c.succeeded) {
            self.state.transition(PhaseOutcome::AllCollectionFailed);
            emit(
                events,
                SessionEvent::message(SessionError::NoCandidatesFound.user_message()),
            );
            return;
        }
        self.state.collected = collected;
        self.state.transition(PhaseOutcome::CollectionFinished);

        // Analyzing
        emit(events, SessionEvent::progress("正在分析評論…"));
        let (scored, summaries) = self.score_candidates().await;
        self.state.transition(PhaseOutcome::AnalysisDone);

        // Ranking and delivery
        let ranked = rank(scored, self.weights);
        emit(events, SessionEvent::progress("正在產生推薦理由…"));
        let items = self.build_items(&ranked, &summaries).await;

        self.persist_record(&ranked, &items).await;

        self.state.transition(PhaseOutcome::RankingDone);
        self.state.ranked = ranked;
        emit(events, SessionEvent::message("推薦結果來囉！"));
        emit(events, SessionEvent::Recommendations { data: items });
    }

    async fn search_with_retry(&self, events: &EventSink) -> Result<Vec<Venue>, SessionError> {
        let location = self.state.location.clone().unwrap_or_default();
        let category = self.state.category.clone().unwrap_or_default();

        match self.deps.places.search(&location, &category).await {
            Ok(venues) => Ok(venues),
            Err(ProviderError::QuotaExceeded) => {
                emit(
                    events,
                    SessionEvent::error("服務繁忙，稍等一下再試一次…"),
                );
                tokio::time::sleep(self.settings.quota_backoff).await;
                self.deps
                    .places
                    .search(&location, &category)
                    .await
                    .map_err(|e| {
                        warn!("Search retry failed: {}", e);
                        SessionError::ProviderQuotaExceeded
                    })
            }
            Err(e) => {
                warn!("Search failed: {}", e);
                Err(SessionError::NoCandidatesFound)
            }
        }
    }

    /// Score each candidate in discovery order. A venue with no
    /// reviews, or one the scorer fails on, gets the neutral signal.
    async fn score_candidates(&self) -> (Vec<(Venue, ReviewSignal)>, HashMap<String, String>) {
        let preference_text = self.state.preferences.soft_text();
        let neutral = ReviewSignal {
            match_score: self.settings.neutral_score,
            positive_rate: self.settings.neutral_score,
        };

        let mut scored = Vec::with_capacity(self.state.candidates.len());
        let mut summaries = HashMap::new();

        for venue in &self.state.candidates {
            let texts: Vec<String> = self
                .state
                .collected
                .get(&venue.place_id)
                .map(|c| c.reviews.iter().map(|r| r.text.clone()).collect())
                .unwrap_or_default();

            let signal = if texts.is_empty() {
                neutral
            } else {
                match self.deps.scorer.score_reviews(&texts, &preference_text).await {
                    Ok(analysis) => {
                        summaries.insert(venue.place_id.clone(), analysis.summary);
                        ReviewSignal {
                            match_score: analysis.match_score,
                            positive_rate: analysis.positive_rate,
                        }
                    }
                    Err(e) => {
                        warn!("Scoring {} failed, using neutral: {}", venue.place_id, e);
                        neutral
                    }
                }
            };
            scored.push((venue.clone(), signal));
        }

        (scored, summaries)
    }

    /// Build the delivery payload, generating one reason sentence per
    /// venue. Generation failure falls back to the configured sentence.
    async fn build_items(
        &self,
        ranked: &[RankedVenue],
        summaries: &HashMap<String, String>,
    ) -> Vec<RecommendationItem> {
        let preference_text = self.state.preferences.soft_text();
        let mut items = Vec::with_capacity(ranked.len());

        for entry in ranked {
            let summary = summaries
                .get(&entry.venue.place_id)
                .map(String::as_str)
                .unwrap_or("");
            let prompt = format!(
                "你是餐廳推薦助理。用一句繁體中文說明為什麼推薦這家餐廳，只輸出那一句話。\n\
                 餐廳名稱：{}\n評論摘要：{}\n使用者偏好：{}",
                entry.venue.name,
                summary,
                if preference_text.is_empty() {
                    "無特別偏好"
                } else {
                    preference_text.as_str()
                }
            );
            let reason = match self.deps.generator.generate(&prompt).await {
                Ok(text) => text.trim().to_string(),
                Err(e) => {
                    warn!("Reason generation for {} failed: {}", entry.venue.name, e);
                    self.settings.fallback_reason.clone()
                }
            };
            items.push(RecommendationItem::from_ranked(entry, reason));
        }
        items
    }

    /// Append the completed session to durable history. A write
    /// failure is logged and the delivery still goes out.
    async fn persist_record(&self, ranked: &[RankedVenue], items: &[RecommendationItem]) {
        let top_place_ids = ranked
            .iter()
            .map(|r| r.venue.place_id.as_str())
            .collect::<Vec<_>>()
            .join(",");
        let payload = match serde_json::to_value(items) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Recommendation payload not serializable: {}", e);
                return;
            }
        };

        let record = RecommendationRecord {
            user_input: self.state.original_utterance().to_string(),
            location: self.state.location.clone().unwrap_or_default(),
            category: self.state.category.clone().unwrap_or_default(),
            top_place_ids,
            recommendation_json: payload,
            created_at: Utc::now(),
        };
        if let Err(e) = self.deps.store.insert_recommendation(&record).await {
            warn!("Failed to persist recommendation record: {}", e);
        }
    }
}

fn emit(events: &EventSink, event: SessionEvent) {
    // A closed sink means the client is gone; the session is being
    // torn down anyway
    let _ = events.send(event);
}
