//! Signal fusion and ranking.
//!
//! Each surviving venue carries three signals: semantic match score,
//! positive sentiment rate, and the provider's raw star rating. The
//! fused score is a fixed weighted sum and the ranking is fully
//! deterministic: identical inputs always produce identical output.

use storage::Venue;
use tracing::debug;

/// How many venues a session delivers at most.
pub const TOP_N: usize = 3;

/// Neutral score substituted when the scorer fails for a venue.
pub const NEUTRAL_SCORE: f64 = 0.5;

/// Weights for the fused score. The three weights sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionWeights {
    pub match_weight: f64,
    pub positive_weight: f64,
    pub rating_weight: f64,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            match_weight: 0.7,
            positive_weight: 0.2,
            rating_weight: 0.1,
        }
    }
}

/// Scorer output for one venue, both in [0.0, 1.0].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReviewSignal {
    pub match_score: f64,
    pub positive_rate: f64,
}

impl ReviewSignal {
    /// The fallback signal for venues the scorer could not handle.
    pub fn neutral() -> Self {
        Self {
            match_score: NEUTRAL_SCORE,
            positive_rate: NEUTRAL_SCORE,
        }
    }
}

/// A venue with its fused score, ready for delivery.
#[derive(Debug, Clone)]
pub struct RankedVenue {
    pub venue: Venue,
    pub final_score: f64,
    pub match_score: f64,
    pub positive_rate: f64,
}

/// Fuse the three signals into a single score.
///
/// `finalScore = match*0.7 + positive*0.2 + (rating/5)*0.1` with the
/// default weights. Star ratings are on a 0-5 scale and normalized
/// here.
pub fn fuse(signal: ReviewSignal, raw_rating: f64, weights: FusionWeights) -> f64 {
    signal.match_score * weights.match_weight
        + signal.positive_rate * weights.positive_weight
        + (raw_rating / 5.0) * weights.rating_weight
}

/// Rank venues by fused score and keep the top 3.
///
/// Sort is stable descending on the fused score; ties break by raw
/// rating descending, then by original candidate order (which the
/// stable sort preserves).
pub fn rank(candidates: Vec<(Venue, ReviewSignal)>, weights: FusionWeights) -> Vec<RankedVenue> {
    let mut ranked: Vec<RankedVenue> = candidates
        .into_iter()
        .map(|(venue, signal)| {
            let final_score = fuse(signal, venue.rating, weights);
            RankedVenue {
                final_score,
                match_score: signal.match_score,
                positive_rate: signal.positive_rate,
                venue,
            }
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.final_score
            .total_cmp(&a.final_score)
            .then(b.venue.rating.total_cmp(&a.venue.rating))
    });
    ranked.truncate(TOP_N);

    debug!(
        "Ranked {} venues, top score {:?}",
        ranked.len(),
        ranked.first().map(|r| r.final_score)
    );
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn venue(place_id: &str, rating: f64) -> Venue {
        Venue {
            place_id: place_id.to_string(),
            name: format!("venue-{place_id}"),
            rating,
            user_ratings_total: 100,
            address: "somewhere".to_string(),
            phone: None,
            website: None,
            map_url: format!("https://maps.example/{place_id}"),
        }
    }

    fn signal(match_score: f64, positive_rate: f64) -> ReviewSignal {
        ReviewSignal {
            match_score,
            positive_rate,
        }
    }

    #[test]
    fn test_fused_score_formula() {
        let score = fuse(signal(0.8, 0.6), 4.5, FusionWeights::default());
        // 0.8*0.7 + 0.6*0.2 + 0.9*0.1
        assert!((score - 0.77).abs() < 1e-9);
    }

    #[test]
    fn test_rank_orders_by_fused_score() {
        let candidates = vec![
            (venue("low", 3.0), signal(0.2, 0.3)),
            (venue("high", 4.0), signal(0.9, 0.9)),
            (venue("mid", 4.8), signal(0.5, 0.5)),
        ];

        let ranked = rank(candidates, FusionWeights::default());
        let order: Vec<&str> = ranked.iter().map(|r| r.venue.place_id.as_str()).collect();
        assert_eq!(order, vec!["high", "mid", "low"]);
    }

    #[test]
    fn test_equal_scores_tie_break_on_raw_rating() {
        // Same match/positive signals, different star ratings. With the
        // rating term included, scores differ; force a pure tie by
        // compensating the match score.
        let weights = FusionWeights::default();
        let a = venue("a", 4.5);
        let b = venue("b", 4.3);
        let c = venue("c", 4.8);

        // Scores: 0.81, 0.81, 0.65 with ratings 4.5, 4.3, 4.8
        let candidates = vec![
            (a, signal(0.9, 0.45)),
            (b, signal(0.9, 0.47)),
            (c, signal(0.7, 0.32)),
        ];
        let ranked = rank(candidates, weights);

        assert!((ranked[0].final_score - 0.81).abs() < 1e-9);
        assert!((ranked[1].final_score - 0.81).abs() < 1e-9);
        assert_eq!(ranked[0].venue.place_id, "a", "4.5 stars beats 4.3 on tie");
        assert_eq!(ranked[1].venue.place_id, "b");
        assert_eq!(ranked[2].venue.place_id, "c");
    }

    #[test]
    fn test_full_tie_preserves_discovery_order() {
        let candidates = vec![
            (venue("first", 4.0), signal(0.5, 0.5)),
            (venue("second", 4.0), signal(0.5, 0.5)),
        ];
        let ranked = rank(candidates, FusionWeights::default());
        assert_eq!(ranked[0].venue.place_id, "first");
        assert_eq!(ranked[1].venue.place_id, "second");
    }

    #[test]
    fn test_output_truncated_to_top_three() {
        let candidates: Vec<(Venue, ReviewSignal)> = (0..7)
            .map(|i| (venue(&format!("p{i}"), 4.0), signal(0.1 * i as f64, 0.5)))
            .collect();
        let ranked = rank(candidates, FusionWeights::default());
        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[0].venue.place_id, "p6");
    }

    #[test]
    fn test_ranking_is_deterministic() {
        let make = || {
            vec![
                (venue("a", 4.5), signal(0.9, 0.45)),
                (venue("b", 4.3), signal(0.9, 0.47)),
                (venue("c", 4.8), signal(0.7, 0.32)),
            ]
        };
        let first = rank(make(), FusionWeights::default());
        for _ in 0..10 {
            let again = rank(make(), FusionWeights::default());
            let ids: Vec<_> = again.iter().map(|r| r.venue.place_id.clone()).collect();
            let expected: Vec<_> = first.iter().map(|r| r.venue.place_id.clone()).collect();
            assert_eq!(ids, expected);
        }
    }

    #[test]
    fn test_neutral_signal_value() {
        let score = fuse(ReviewSignal::neutral(), 0.0, FusionWeights::default());
        assert!((score - 0.45).abs() < 1e-9);
    }
}
