//! Client for the review scraper sidecar.
//!
//! The sidecar exposes a single POST endpoint that takes a place id
//! and a cap, and returns the scraped reviews as JSON.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use storage::Review;
use tracing::debug;

use crate::error::Result;
use crate::traits::ReviewSource;

/// HTTP client for the review scraping service.
#[derive(Clone)]
pub struct ReviewServiceClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct FetchRequest<'a> {
    place_id: &'a str,
    max_reviews: usize,
}

#[derive(Deserialize)]
struct FetchResponse {
    #[serde(default)]
    reviews: Vec<ScrapedReview>,
}

#[derive(Deserialize)]
struct ScrapedReview {
    review_id: String,
    text: String,
    stars: Option<f64>,
}

impl ReviewServiceClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl ReviewSource for ReviewServiceClient {
    async fn fetch_reviews(&self, place_id: &str, max_items: usize) -> Result<Vec<Review>> {
        let url = format!("{}/reviews", self.base_url);
        let response: FetchResponse = self
            .http
            .post(&url)
            .json(&FetchRequest {
                place_id,
                max_reviews: max_items,
            })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let reviews: Vec<Review> = response
            .reviews
            .into_iter()
            .take(max_items)
            .map(|r| Review {
                review_id: r.review_id,
                text: r.text,
                stars: r.stars,
            })
            .collect();

        debug!("Fetched {} reviews for {}", reviews.len(), place_id);
        Ok(reviews)
    }
}
