//! Integration tests for the engine.
//!
//! These tests run the hard-preference filter and signal fusion
//! together on a realistic candidate set, the way a session does
//! between search and delivery.

use engine::filters::HardPreferenceFilter;
use engine::{
    classify_preferences, rank, FilterPipeline, FusionWeights, ReviewSignal,
};
use storage::Venue;

fn venue(place_id: &str, name: &str, rating: f64) -> Venue {
    Venue {
        place_id: place_id.to_string(),
        name: name.to_string(),
        rating,
        user_ratings_total: 500,
        address: "台北市信義區".to_string(),
        phone: None,
        website: None,
        map_url: format!("https://www.google.com/maps/place/?q=place_id:{place_id}"),
    }
}

fn create_test_candidates() -> Vec<Venue> {
    vec![
        venue("p1", "麻辣牛肉鍋專門店", 4.7),
        venue("p2", "小林石頭火鍋", 4.5),
        venue("p3", "阿秋清燉鍋物", 4.2),
        venue("p4", "和牛涮涮鍋", 4.8),
        venue("p5", "養生菇菇鍋", 4.0),
    ]
}

#[test]
fn test_filter_then_rank_produces_top_three() {
    let candidates = create_test_candidates();
    let preferences = classify_preferences(&["不吃牛肉".to_string(), "湯頭要清爽".to_string()]);

    let pipeline = FilterPipeline::new().add_filter(HardPreferenceFilter);
    let kept = pipeline.apply(candidates, &preferences).unwrap();

    // Both beef venues are gone before any scoring happens
    assert_eq!(kept.len(), 3);
    assert!(kept.iter().all(|v| !v.name.contains('牛')));

    let scored: Vec<(Venue, ReviewSignal)> = kept
        .into_iter()
        .zip([
            ReviewSignal {
                match_score: 0.55,
                positive_rate: 0.80,
            },
            ReviewSignal {
                match_score: 0.90,
                positive_rate: 0.85,
            },
            ReviewSignal {
                match_score: 0.40,
                positive_rate: 0.60,
            },
        ])
        .collect();

    let ranked = rank(scored, FusionWeights::default());
    assert_eq!(ranked.len(), 3);
    assert_eq!(ranked[0].venue.place_id, "p3", "best match wins");
    assert!(ranked[0].final_score > ranked[1].final_score);
    assert!(ranked[1].final_score > ranked[2].final_score);
}

#[test]
fn test_hard_conflict_can_empty_the_candidate_set() {
    let candidates = vec![
        venue("p1", "麻辣牛肉鍋專門店", 4.7),
        venue("p2", "和牛涮涮鍋", 4.8),
    ];
    let preferences = classify_preferences(&["不吃牛".to_string()]);

    let pipeline = FilterPipeline::new().add_filter(HardPreferenceFilter);
    let kept = pipeline.apply(candidates, &preferences).unwrap();

    // The caller turns an empty set into the no-candidates abort
    assert!(kept.is_empty());
}

#[test]
fn test_soft_preferences_never_filter() {
    let candidates = create_test_candidates();
    let preferences = classify_preferences(&["大份量".to_string(), "有停車位".to_string()]);
    assert!(preferences.hard.is_empty());

    let pipeline = FilterPipeline::new().add_filter(HardPreferenceFilter);
    let kept = pipeline.apply(candidates, &preferences).unwrap();
    assert_eq!(kept.len(), 5);
}
