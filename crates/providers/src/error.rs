//! Error types for the provider clients.

use thiserror::Error;

/// Errors surfaced by the external collaborators.
///
/// The orchestrator maps these onto conversational outcomes:
/// `QuotaExceeded` earns one retry with backoff, `Unresolvable` asks
/// the user for a different phrase, everything else degrades the
/// affected venue or aborts the session with a user-legible message.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Transport-level failure (connect, timeout, TLS)
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider rate-limited us (Google `OVER_QUERY_LIMIT`)
    #[error("provider quota exceeded")]
    QuotaExceeded,

    /// The geocoder could not resolve the location phrase at all
    #[error("location could not be resolved: {location}")]
    Unresolvable { location: String },

    /// The provider answered with something we could not interpret
    #[error("unexpected provider response: {0}")]
    BadResponse(String),

    /// The language model returned no usable text
    #[error("generation failed: {0}")]
    Generation(String),
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, ProviderError>;
