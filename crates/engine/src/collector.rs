//! Bounded-concurrency review collection.
//!
//! For N candidate venues the coordinator obtains review sets with a
//! bounded wall-clock cost:
//! - at most `concurrency` venues are collected at once
//! - each venue gets its own timeout; one stalled venue never extends
//!   another's budget
//! - a venue that fails or times out yields an empty review set with
//!   `succeeded = false` instead of aborting the batch
//! - reviews are capped per venue and deduplicated by review id
//!
//! Fresh cached reviews short-circuit collection; successful fetches
//! are written back so the next session within the freshness window
//! skips the scrape.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use storage::{Review, Store, Venue};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use providers::ReviewSource;

const DEFAULT_CONCURRENCY: usize = 3;
const DEFAULT_PER_VENUE_TIMEOUT: Duration = Duration::from_secs(20);
const DEFAULT_MAX_ITEMS: usize = 100;
const DEFAULT_CACHE_MAX_AGE_DAYS: i64 = 30;

/// One venue's collection result.
#[derive(Debug, Clone, Default)]
pub struct CollectedReviews {
    pub reviews: Vec<Review>,
    pub succeeded: bool,
}

/// Coordinates per-venue review collection under a concurrency cap.
pub struct CollectionCoordinator {
    source: Arc<dyn ReviewSource>,
    store: Option<Store>,
    concurrency: usize,
    per_venue_timeout: Duration,
    max_items: usize,
    cache_max_age_days: i64,
}

impl CollectionCoordinator {
    pub fn new(source: Arc<dyn ReviewSource>) -> Self {
        Self {
            source,
            store: None,
            concurrency: DEFAULT_CONCURRENCY,
            per_venue_timeout: DEFAULT_PER_VENUE_TIMEOUT,
            max_items: DEFAULT_MAX_ITEMS,
            cache_max_age_days: DEFAULT_CACHE_MAX_AGE_DAYS,
        }
    }

    /// Attach a store for the review cache and write-back.
    pub fn with_store(mut self, store: Store) -> Self {
        self.store = Some(store);
        self
    }

    /// Configure how many venues collect at once (default: 3)
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Configure the per-venue time budget (default: 20s)
    pub fn with_per_venue_timeout(mut self, per_venue_timeout: Duration) -> Self {
        self.per_venue_timeout = per_venue_timeout;
        self
    }

    /// Configure the per-venue review cap (default: 100)
    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items = max_items;
        self
    }

    /// Configure cache freshness in days (default: 30)
    pub fn with_cache_max_age_days(mut self, days: i64) -> Self {
        self.cache_max_age_days = days;
        self
    }

    /// Collect reviews for every venue.
    ///
    /// # Returns
    /// A mapping from place id to its (possibly empty) review set and
    /// success flag. Every input venue appears in the output.
    pub async fn collect(&self, venues: &[Venue]) -> HashMap<String, CollectedReviews> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut join_set = JoinSet::new();

        for venue in venues.iter().cloned() {
            let semaphore = Arc::clone(&semaphore);
            let source = Arc::clone(&self.source);
            let store = self.store.clone();
            let per_venue_timeout = self.per_venue_timeout;
            let max_items = self.max_items;
            let cache_max_age_days = self.cache_max_age_days;

            join_set.spawn(async move {
                // Closed only when the JoinSet itself is dropped
                let Ok(_permit) = semaphore.acquire().await else {
                    return (venue.place_id.clone(), CollectedReviews::default());
                };
                let collected = collect_one(
                    &*source,
                    store.as_ref(),
                    &venue,
                    per_venue_timeout,
                    max_items,
                    cache_max_age_days,
                )
                .await;
                (venue.place_id.clone(), collected)
            });
        }

        let mut results: HashMap<String, CollectedReviews> = venues
            .iter()
            .map(|v| (v.place_id.clone(), CollectedReviews::default()))
            .collect();

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((place_id, collected)) => {
                    results.insert(place_id, collected);
                }
                Err(e) => warn!("Collection task panicked: {}", e),
            }
        }

        let succeeded = results.values().filter(|c| c.succeeded).count();
        info!(
            "Collected reviews for {}/{} venues",
            succeeded,
            venues.len()
        );
        results
    }
}

async fn collect_one(
    source: &dyn ReviewSource,
    store: Option<&Store>,
    venue: &Venue,
    per_venue_timeout: Duration,
    max_items: usize,
    cache_max_age_days: i64,
) -> CollectedReviews {
    if let Some(store) = store {
        match store.fresh_reviews(&venue.place_id, cache_max_age_days).await {
            Ok(Some(reviews)) => {
                debug!(
                    "Cache hit for {}: {} reviews",
                    venue.place_id,
                    reviews.len()
                );
                return CollectedReviews {
                    reviews: dedup_and_cap(reviews, max_items),
                    succeeded: true,
                };
            }
            Ok(None) => {}
            Err(e) => warn!("Cache lookup for {} failed: {}", venue.place_id, e),
        }
    }

    let fetched = timeout(
        per_venue_timeout,
        source.fetch_reviews(&venue.place_id, max_items),
    )
    .await;

    let reviews = match fetched {
        Ok(Ok(reviews)) => dedup_and_cap(reviews, max_items),
        Ok(Err(e)) => {
            warn!("Review fetch for {} failed: {}", venue.place_id, e);
            return CollectedReviews::default();
        }
        Err(_) => {
            warn!(
                "Review fetch for {} timed out after {:?}",
                venue.place_id, per_venue_timeout
            );
            return CollectedReviews::default();
        }
    };

    if let Some(store) = store {
        // Write-back failures degrade to an uncached success
        if let Err(e) = store.upsert_venue(venue).await {
            warn!("Venue write-back for {} failed: {}", venue.place_id, e);
        } else if let Err(e) = store.replace_reviews(&venue.place_id, &reviews).await {
            warn!("Review write-back for {} failed: {}", venue.place_id, e);
        }
    }

    CollectedReviews {
        reviews,
        succeeded: true,
    }
}

/// Drop duplicate review ids (first occurrence wins) and cap the list.
fn dedup_and_cap(reviews: Vec<Review>, max_items: usize) -> Vec<Review> {
    let mut seen = HashSet::new();
    reviews
        .into_iter()
        .filter(|r| seen.insert(r.review_id.clone()))
        .take(max_items)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use providers::ProviderError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn venue(place_id: &str) -> Venue {
        Venue {
            place_id: place_id.to_string(),
            name: format!("venue-{place_id}"),
            rating: 4.2,
            user_ratings_total: 100,
            address: "somewhere".to_string(),
            phone: None,
            website: None,
            map_url: format!("https://maps.example/{place_id}"),
        }
    }

    fn review(id: &str, text: &str) -> Review {
        Review {
            review_id: id.to_string(),
            text: text.to_string(),
            stars: Some(5.0),
        }
    }

    /// Source with scripted per-venue behavior.
    struct ScriptedSource {
        slow_place: Option<String>,
        failing_place: Option<String>,
        in_flight: Arc<AtomicUsize>,
        max_in_flight: Arc<AtomicUsize>,
    }

    impl ScriptedSource {
        fn new() -> Self {
            Self {
                slow_place: None,
                failing_place: None,
                in_flight: Arc::new(AtomicUsize::new(0)),
                max_in_flight: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl ReviewSource for ScriptedSource {
        async fn fetch_reviews(
            &self,
            place_id: &str,
            _max_items: usize,
        ) -> providers::Result<Vec<Review>> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            let result = if self.slow_place.as_deref() == Some(place_id) {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(vec![])
            } else if self.failing_place.as_deref() == Some(place_id) {
                Err(ProviderError::BadResponse("scripted failure".to_string()))
            } else {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok(vec![
                    review(&format!("{place_id}-r1"), "好吃"),
                    review(&format!("{place_id}-r1"), "duplicate id"),
                    review(&format!("{place_id}-r2"), "服務很好"),
                ])
            };

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            result
        }
    }

    #[tokio::test]
    async fn test_failure_is_isolated_per_venue() {
        let mut source = ScriptedSource::new();
        source.failing_place = Some("bad".to_string());

        let coordinator = CollectionCoordinator::new(Arc::new(source));
        let results = coordinator.collect(&[venue("good"), venue("bad")]).await;

        let good = &results["good"];
        assert!(good.succeeded);
        assert_eq!(good.reviews.len(), 2, "duplicate review id must be dropped");

        let bad = &results["bad"];
        assert!(!bad.succeeded);
        assert!(bad.reviews.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_degrades_to_empty_set() {
        let mut source = ScriptedSource::new();
        source.slow_place = Some("slow".to_string());

        let coordinator = CollectionCoordinator::new(Arc::new(source))
            .with_per_venue_timeout(Duration::from_secs(20));
        let results = coordinator.collect(&[venue("slow"), venue("fast")]).await;

        assert!(!results["slow"].succeeded);
        assert!(results["slow"].reviews.is_empty());
        assert!(results["fast"].succeeded);
    }

    #[tokio::test]
    async fn test_concurrency_never_exceeds_cap() {
        let source = ScriptedSource::new();
        let max_in_flight = Arc::clone(&source.max_in_flight);

        let coordinator = CollectionCoordinator::new(Arc::new(source)).with_concurrency(2);
        let venues: Vec<Venue> = (0..6).map(|i| venue(&format!("p{i}"))).collect();
        let results = coordinator.collect(&venues).await;

        assert_eq!(results.len(), 6);
        assert!(max_in_flight.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_item_cap_applies() {
        struct FloodSource;

        #[async_trait]
        impl ReviewSource for FloodSource {
            async fn fetch_reviews(
                &self,
                place_id: &str,
                _max_items: usize,
            ) -> providers::Result<Vec<Review>> {
                Ok((0..250)
                    .map(|i| review(&format!("{place_id}-{i}"), "text"))
                    .collect())
            }
        }

        let coordinator = CollectionCoordinator::new(Arc::new(FloodSource)).with_max_items(100);
        let results = coordinator.collect(&[venue("p1")]).await;
        assert_eq!(results["p1"].reviews.len(), 100);
    }

    #[tokio::test]
    async fn test_cache_hit_skips_fetch() {
        struct PanickySource;

        #[async_trait]
        impl ReviewSource for PanickySource {
            async fn fetch_reviews(
                &self,
                _place_id: &str,
                _max_items: usize,
            ) -> providers::Result<Vec<Review>> {
                panic!("cache hit must not reach the source");
            }
        }

        let store = Store::in_memory().await.unwrap();
        let v = venue("cached");
        store.upsert_venue(&v).await.unwrap();
        store
            .replace_reviews("cached", &[review("r1", "好吃")])
            .await
            .unwrap();

        let coordinator = CollectionCoordinator::new(Arc::new(PanickySource)).with_store(store);
        let results = coordinator.collect(&[v]).await;

        assert!(results["cached"].succeeded);
        assert_eq!(results["cached"].reviews.len(), 1);
    }
}
