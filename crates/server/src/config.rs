//! Server configuration.
//!
//! Every knob is settable by flag or environment variable; fallback
//! constants live here so tests can override them deterministically.

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;

/// Conversational restaurant recommendation server.
#[derive(Parser, Debug, Clone)]
#[command(name = "dining-server", version)]
pub struct Config {
    /// Address the HTTP/WebSocket server listens on
    #[arg(long, env = "BIND_ADDR", default_value = "127.0.0.1:8080")]
    pub bind_addr: SocketAddr,

    /// SQLite database URL
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://dining.db")]
    pub database_url: String,

    /// Google Maps API key
    #[arg(long, env = "GOOGLE_MAPS_API_KEY")]
    pub google_maps_api_key: String,

    /// Base URL of the review scraper sidecar
    #[arg(long, env = "REVIEW_SERVICE_URL", default_value = "http://localhost:8001")]
    pub review_service_url: String,

    /// Gemini API key
    #[arg(long, env = "GEMINI_API_KEY")]
    pub gemini_api_key: String,

    /// Address of the review scoring gRPC service
    #[arg(long, env = "SCORER_ADDR", default_value = "http://localhost:50051")]
    pub scorer_addr: String,

    /// How many venues collect reviews at once
    #[arg(long, env = "COLLECT_CONCURRENCY", default_value_t = 3)]
    pub collect_concurrency: usize,

    /// Per-venue review collection budget, in seconds
    #[arg(long, env = "PER_VENUE_TIMEOUT_SECS", default_value_t = 20)]
    pub per_venue_timeout_secs: u64,

    /// Per-venue review cap
    #[arg(long, env = "MAX_REVIEWS_PER_VENUE", default_value_t = 100)]
    pub max_reviews_per_venue: usize,

    /// Maximum geocoded viewport span, in degrees
    #[arg(long, env = "MAX_AREA_SPAN_DEG", default_value_t = 0.2)]
    pub max_area_span_deg: f64,

    /// Review cache freshness, in days
    #[arg(long, env = "REVIEW_CACHE_DAYS", default_value_t = 30)]
    pub review_cache_days: i64,

    /// Idle period after which a session is silently abandoned
    #[arg(long, env = "IDLE_TIMEOUT_SECS", default_value_t = 300)]
    pub idle_timeout_secs: u64,

    /// Wall-clock budget for the search-to-delivery pipeline
    #[arg(long, env = "PIPELINE_DEADLINE_SECS", default_value_t = 120)]
    pub pipeline_deadline_secs: u64,

    /// Score substituted when the scorer fails for a venue
    #[arg(long, env = "NEUTRAL_SCORE", default_value_t = 0.5)]
    pub neutral_score: f64,

    /// Sentence substituted when reason generation fails
    #[arg(
        long,
        env = "FALLBACK_REASON",
        default_value = "這家餐廳評價不錯，值得一試。"
    )]
    pub fallback_reason: String,
}

impl Config {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn per_venue_timeout(&self) -> Duration {
        Duration::from_secs(self.per_venue_timeout_secs)
    }

    pub fn pipeline_deadline(&self) -> Duration {
        Duration::from_secs(self.pipeline_deadline_secs)
    }
}
