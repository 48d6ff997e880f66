//! Conversation state machine.
//!
//! A session is a long-lived, re-entrant state machine: corrections
//! loop back to earlier states, waiting states park the session until
//! the next utterance, and three absorbing states end it. The
//! transition function `route_next` is pure so every edge is unit
//! testable without any I/O.

use std::collections::HashMap;

use engine::{ClassifiedPreferences, CollectedReviews, RankedVenue};
use storage::Venue;

/// The active state of a conversation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    ParsingInput,
    ValidatingLocation,
    AwaitingPreferenceInput,
    ConfirmingSummary,
    AwaitingConfirmation,
    Searching,
    CollectingReviews,
    Analyzing,
    Ranking,
    Delivered,
    AbortedIrrelevant,
    AbortedNoResults,
    Cancelled,
}

impl Phase {
    /// Absorbing states: the session is over.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Phase::Delivered | Phase::AbortedIrrelevant | Phase::AbortedNoResults | Phase::Cancelled
        )
    }

    /// States that park the session until the next utterance.
    pub fn is_waiting(self) -> bool {
        matches!(
            self,
            Phase::ParsingInput
                | Phase::ValidatingLocation
                | Phase::AwaitingPreferenceInput
                | Phase::AwaitingConfirmation
        )
    }
}

/// What the session is waiting to hear from the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PendingQuestion {
    #[default]
    None,
    AwaitingLocation,
    AwaitingPreferences,
    AwaitingConfirmation,
}

/// Outcome of the most recent component call, fed to `route_next`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PhaseOutcome {
    UtteranceReceived,
    Irrelevant,
    Incomplete,
    Complete,
    LocationTooLarge,
    LocationUnresolvable,
    LocationValid,
    PreferencesClassified,
    SummaryPresented,
    Confirmed,
    CancelRequested,
    ModifyRequested,
    CandidatesFound,
    NoCandidates,
    CollectionFinished,
    AllCollectionFailed,
    AnalysisDone,
    RankingDone,
    PipelineFailed,
}

/// Pure transition function: `(phase, outcome) → next phase`.
///
/// An outcome that does not apply to the current phase leaves the
/// phase unchanged; absorbing states never move.
pub fn route_next(phase: Phase, outcome: PhaseOutcome) -> Phase {
    use Phase::*;
    use PhaseOutcome::*;

    if phase.is_terminal() {
        return phase;
    }

    match (phase, outcome) {
        (Idle, UtteranceReceived) => ParsingInput,

        (ParsingInput, Irrelevant) => AbortedIrrelevant,
        // Re-ask without advancing; the turn counter moves instead
        (ParsingInput, Incomplete) => ParsingInput,
        (ParsingInput, Complete) => ValidatingLocation,

        (ValidatingLocation, LocationTooLarge) => ValidatingLocation,
        (ValidatingLocation, LocationUnresolvable) => ValidatingLocation,
        (ValidatingLocation, LocationValid) => AwaitingPreferenceInput,
        (ValidatingLocation, PipelineFailed) => AbortedNoResults,

        (AwaitingPreferenceInput, PreferencesClassified) => ConfirmingSummary,

        (ConfirmingSummary, SummaryPresented) => AwaitingConfirmation,

        (AwaitingConfirmation, Confirmed) => Searching,
        (AwaitingConfirmation, CancelRequested) => Cancelled,
        (AwaitingConfirmation, ModifyRequested) => ParsingInput,

        (Searching, CandidatesFound) => CollectingReviews,
        (Searching, NoCandidates) => AbortedNoResults,
        (Searching, PipelineFailed) => AbortedNoResults,

        (CollectingReviews, CollectionFinished) => Analyzing,
        (CollectingReviews, AllCollectionFailed) => AbortedNoResults,
        (CollectingReviews, PipelineFailed) => AbortedNoResults,

        (Analyzing, AnalysisDone) => Ranking,
        (Analyzing, PipelineFailed) => AbortedNoResults,

        (Ranking, RankingDone) => Delivered,
        (Ranking, PipelineFailed) => AbortedNoResults,

        (current, _) => current,
    }
}

/// Mutable, single-owner record held for the duration of a session.
#[derive(Debug, Default)]
pub struct ConversationState {
    pub utterances: Vec<String>,
    pub location: Option<String>,
    pub category: Option<String>,
    pub preferences: ClassifiedPreferences,
    pub candidates: Vec<Venue>,
    pub collected: HashMap<String, CollectedReviews>,
    pub ranked: Vec<RankedVenue>,
    pub pending_question: PendingQuestion,
    pub phase: Phase,
    pub turns: u32,
}

impl Default for Phase {
    fn default() -> Self {
        Phase::Idle
    }
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an incoming utterance and bump the turn counter.
    pub fn record_utterance(&mut self, text: &str) {
        self.utterances.push(text.to_string());
        self.turns += 1;
    }

    /// The first utterance of the session, for the persisted record.
    pub fn original_utterance(&self) -> &str {
        self.utterances.first().map(String::as_str).unwrap_or("")
    }

    /// Apply an outcome: advance the phase and keep `pending_question`
    /// consistent with the new resting point.
    pub fn transition(&mut self, outcome: PhaseOutcome) {
        self.phase = route_next(self.phase, outcome);
        self.pending_question = match (self.phase, outcome) {
            (Phase::ParsingInput, PhaseOutcome::Incomplete) => PendingQuestion::AwaitingLocation,
            (Phase::ValidatingLocation, PhaseOutcome::LocationTooLarge)
            | (Phase::ValidatingLocation, PhaseOutcome::LocationUnresolvable) => {
                PendingQuestion::AwaitingLocation
            }
            (Phase::AwaitingPreferenceInput, _) => PendingQuestion::AwaitingPreferences,
            (Phase::AwaitingConfirmation, _) => PendingQuestion::AwaitingConfirmation,
            _ => PendingQuestion::None,
        };
    }
}

/// How an utterance at `AwaitingConfirmation` is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationReply {
    Confirm,
    Cancel,
    /// Anything that is neither a confirm nor a cancel is a correction.
    Modify,
}

const CONFIRM_KEYWORDS: &[&str] = &["是", "yes", "ok", "好", "對", "確定"];
const CANCEL_KEYWORDS: &[&str] = &["否", "不要", "no", "取消", "不是"];
const NO_PREFERENCE_KEYWORDS: &[&str] = &["沒有", "無", "no", "none", "開始搜尋"];

/// Read a confirmation-stage reply.
///
/// Cancel keywords are checked first: "不是" must not read as a
/// confirm via its trailing "是".
pub fn parse_confirmation(text: &str) -> ConfirmationReply {
    let lowered = text.trim().to_lowercase();
    if CANCEL_KEYWORDS.iter().any(|k| lowered.contains(k)) {
        ConfirmationReply::Cancel
    } else if CONFIRM_KEYWORDS.iter().any(|k| lowered.contains(k)) {
        ConfirmationReply::Confirm
    } else {
        ConfirmationReply::Modify
    }
}

/// Does a preference-stage reply mean "no preferences, go ahead"?
pub fn is_no_preference(text: &str) -> bool {
    let lowered = text.trim().to_lowercase();
    lowered.is_empty() || NO_PREFERENCE_KEYWORDS.iter().any(|k| lowered.contains(k))
}

/// Split free preference text into individual items.
pub fn split_preferences(text: &str) -> Vec<String> {
    text.split(['、', '，', ',', ';', '；'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================================================
    // route_next
    // ========================================================================

    #[test]
    fn test_happy_path_edge_by_edge() {
        let edges = [
            (Phase::Idle, PhaseOutcome::UtteranceReceived, Phase::ParsingInput),
            (Phase::ParsingInput, PhaseOutcome::Complete, Phase::ValidatingLocation),
            (Phase::ValidatingLocation, PhaseOutcome::LocationValid, Phase::AwaitingPreferenceInput),
            (Phase::AwaitingPreferenceInput, PhaseOutcome::PreferencesClassified, Phase::ConfirmingSummary),
            (Phase::ConfirmingSummary, PhaseOutcome::SummaryPresented, Phase::AwaitingConfirmation),
            (Phase::AwaitingConfirmation, PhaseOutcome::Confirmed, Phase::Searching),
            (Phase::Searching, PhaseOutcome::CandidatesFound, Phase::CollectingReviews),
            (Phase::CollectingReviews, PhaseOutcome::CollectionFinished, Phase::Analyzing),
            (Phase::Analyzing, PhaseOutcome::AnalysisDone, Phase::Ranking),
            (Phase::Ranking, PhaseOutcome::RankingDone, Phase::Delivered),
        ];
        for (from, outcome, to) in edges {
            assert_eq!(route_next(from, outcome), to, "{from:?} --{outcome:?}-->");
        }
    }

    #[test]
    fn test_incomplete_input_re_asks_without_advancing() {
        assert_eq!(
            route_next(Phase::ParsingInput, PhaseOutcome::Incomplete),
            Phase::ParsingInput
        );
    }

    #[test]
    fn test_too_large_location_stays_put() {
        assert_eq!(
            route_next(Phase::ValidatingLocation, PhaseOutcome::LocationTooLarge),
            Phase::ValidatingLocation
        );
        assert_eq!(
            route_next(Phase::ValidatingLocation, PhaseOutcome::LocationUnresolvable),
            Phase::ValidatingLocation
        );
    }

    #[test]
    fn test_confirmation_branches() {
        assert_eq!(
            route_next(Phase::AwaitingConfirmation, PhaseOutcome::Confirmed),
            Phase::Searching
        );
        assert_eq!(
            route_next(Phase::AwaitingConfirmation, PhaseOutcome::CancelRequested),
            Phase::Cancelled
        );
        assert_eq!(
            route_next(Phase::AwaitingConfirmation, PhaseOutcome::ModifyRequested),
            Phase::ParsingInput
        );
    }

    #[test]
    fn test_abort_edges() {
        assert_eq!(
            route_next(Phase::ParsingInput, PhaseOutcome::Irrelevant),
            Phase::AbortedIrrelevant
        );
        assert_eq!(
            route_next(Phase::Searching, PhaseOutcome::NoCandidates),
            Phase::AbortedNoResults
        );
        assert_eq!(
            route_next(Phase::CollectingReviews, PhaseOutcome::AllCollectionFailed),
            Phase::AbortedNoResults
        );
    }

    #[test]
    fn test_terminal_states_absorb_everything() {
        for terminal in [
            Phase::Delivered,
            Phase::AbortedIrrelevant,
            Phase::AbortedNoResults,
            Phase::Cancelled,
        ] {
            assert_eq!(route_next(terminal, PhaseOutcome::Confirmed), terminal);
            assert_eq!(route_next(terminal, PhaseOutcome::UtteranceReceived), terminal);
        }
    }

    #[test]
    fn test_inapplicable_outcome_is_a_no_op() {
        assert_eq!(
            route_next(Phase::Searching, PhaseOutcome::Confirmed),
            Phase::Searching
        );
    }

    // ========================================================================
    // ConversationState
    // ========================================================================

    #[test]
    fn test_pending_question_tracks_waiting_states() {
        let mut state = ConversationState::new();
        assert_eq!(state.pending_question, PendingQuestion::None);

        state.record_utterance("台北 火鍋");
        state.transition(PhaseOutcome::UtteranceReceived);
        state.transition(PhaseOutcome::Complete);
        state.transition(PhaseOutcome::LocationTooLarge);
        assert_eq!(state.phase, Phase::ValidatingLocation);
        assert_eq!(state.pending_question, PendingQuestion::AwaitingLocation);

        state.record_utterance("信義區");
        state.transition(PhaseOutcome::LocationValid);
        assert_eq!(state.pending_question, PendingQuestion::AwaitingPreferences);
        assert_eq!(state.turns, 2);

        state.transition(PhaseOutcome::PreferencesClassified);
        state.transition(PhaseOutcome::SummaryPresented);
        assert_eq!(state.pending_question, PendingQuestion::AwaitingConfirmation);

        state.transition(PhaseOutcome::Confirmed);
        assert_eq!(state.pending_question, PendingQuestion::None);
        assert!(state.pending_question == PendingQuestion::None || state.phase.is_waiting());
    }

    #[test]
    fn test_turn_counter_increments_on_re_ask() {
        let mut state = ConversationState::new();
        state.record_utterance("想吃火鍋");
        state.transition(PhaseOutcome::UtteranceReceived);
        state.transition(PhaseOutcome::Incomplete);
        assert_eq!(state.turns, 1);
        assert_eq!(state.phase, Phase::ParsingInput);

        state.record_utterance("信義區");
        assert_eq!(state.turns, 2);
        assert!(state.candidates.is_empty());
    }

    // ========================================================================
    // Reply parsing
    // ========================================================================

    #[test]
    fn test_confirm_keywords() {
        for text in ["是", "yes", "OK", "好", "對", "確定", "好啊"] {
            assert_eq!(parse_confirmation(text), ConfirmationReply::Confirm, "{text}");
        }
    }

    #[test]
    fn test_cancel_keywords_beat_confirm_substrings() {
        for text in ["否", "不要", "No", "取消", "不是"] {
            assert_eq!(parse_confirmation(text), ConfirmationReply::Cancel, "{text}");
        }
    }

    #[test]
    fn test_other_replies_are_corrections() {
        assert_eq!(
            parse_confirmation("改成大安區"),
            ConfirmationReply::Modify
        );
    }

    #[test]
    fn test_no_preference_detection() {
        for text in ["沒有", "無", "no", "none", "開始搜尋", ""] {
            assert!(is_no_preference(text), "{text}");
        }
        assert!(!is_no_preference("不吃牛"));
    }

    #[test]
    fn test_preference_splitting() {
        assert_eq!(
            split_preferences("不吃牛、想要安靜，有停車位"),
            vec!["不吃牛", "想要安靜", "有停車位"]
        );
        assert!(split_preferences("  ").is_empty());
    }
}
