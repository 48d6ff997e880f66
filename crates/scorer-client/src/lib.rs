//! Review scoring client for the Python gRPC sidecar.
//!
//! The sidecar embeds review texts, compares them to the preference
//! description, and runs sentiment classification. This crate wraps
//! the generated gRPC client and adapts it to the engine-facing
//! [`ReviewScorer`] trait.

use anyhow::{Context, Result};
use async_trait::async_trait;
use providers::{ProviderError, ReviewAnalysis, ReviewScorer};
use thiserror::Error;
use tonic::transport::Channel;
use tracing::{debug, error, info};

// Include the generated protobuf code
pub mod scoring {
    tonic::include_proto!("scoring");
}

use scoring::{review_scorer_client::ReviewScorerClient as GrpcReviewScorerClient, ScoreRequest};

/// Errors that can occur when interacting with the scoring service
#[derive(Error, Debug)]
pub enum ScorerError {
    #[error("Failed to connect to scoring service: {0}")]
    ConnectionError(String),

    #[error("Failed to score reviews: {0}")]
    ScoringError(String),

    #[error("Invalid response from scoring service: {0}")]
    InvalidResponse(String),
}

/// Client for the review scoring service.
///
/// Wraps the auto-generated gRPC client with response validation.
/// Cloning is cheap; clones share the underlying channel.
#[derive(Clone)]
pub struct ScorerClient {
    client: GrpcReviewScorerClient<Channel>,
    service_addr: String,
}

impl ScorerClient {
    /// Connect to the scoring service.
    ///
    /// # Arguments
    /// * `addr` - Address of the gRPC service (e.g., "http://localhost:50051")
    pub async fn connect(addr: impl Into<String>) -> Result<Self> {
        let addr = addr.into();
        info!("Connecting to scoring service at {}", addr);

        let channel = Channel::from_shared(addr.clone())
            .context("Creating channel from address")?
            .connect()
            .await
            .context("Connecting to scoring service")?;

        let client = GrpcReviewScorerClient::new(channel);
        Ok(ScorerClient {
            client,
            service_addr: addr,
        })
    }

    /// Score one venue's reviews against a preference description.
    ///
    /// # Arguments
    /// * `texts` - The venue's review texts
    /// * `preference` - Free-text preference description, may be empty
    ///
    /// # Returns
    /// Match score, positive rate and a text summary. Both scores are
    /// validated to lie in [0.0, 1.0].
    pub async fn score(
        &self,
        texts: &[String],
        preference: &str,
    ) -> Result<ReviewAnalysis, ScorerError> {
        debug!(
            "Scoring {} reviews against preference '{}'",
            texts.len(),
            preference
        );
        let request = tonic::Request::new(ScoreRequest {
            texts: texts.to_vec(),
            preference: preference.to_string(),
        });

        let mut client = self.client.clone();
        let response = client.score_reviews(request).await.map_err(|e| {
            error!("gRPC error while scoring reviews: {}", e);
            ScorerError::ScoringError(e.to_string())
        })?;

        let inner = response.into_inner();
        for (label, value) in [
            ("match_score", inner.match_score),
            ("positive_rate", inner.positive_rate),
        ] {
            if !(0.0..=1.0).contains(&value) {
                error!("Scoring service returned {} = {}", label, value);
                return Err(ScorerError::InvalidResponse(format!(
                    "{label} {value} outside [0.0, 1.0]"
                )));
            }
        }

        Ok(ReviewAnalysis {
            match_score: inner.match_score,
            positive_rate: inner.positive_rate,
            summary: inner.summary,
        })
    }

    /// Get the address of the scoring service this client is connected to.
    pub fn service_address(&self) -> &str {
        &self.service_addr
    }
}

#[async_trait]
impl ReviewScorer for ScorerClient {
    async fn score_reviews(
        &self,
        texts: &[String],
        preference: &str,
    ) -> providers::Result<ReviewAnalysis> {
        self.score(texts, preference)
            .await
            .map_err(|e| ProviderError::BadResponse(e.to_string()))
    }
}
