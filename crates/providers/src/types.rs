//! Wire-level types shared by the provider clients.

use serde::{Deserialize, Serialize};

/// Geocoded bounding box for a location phrase.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoBounds {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lng_min: f64,
    pub lng_max: f64,
}

impl GeoBounds {
    /// The larger of the latitude and longitude ranges, in degrees.
    /// This is the quantity the location validator compares against
    /// the area threshold.
    pub fn span(&self) -> f64 {
        let lat_span = (self.lat_max - self.lat_min).abs();
        let lng_span = (self.lng_max - self.lng_min).abs();
        lat_span.max(lng_span)
    }
}

/// Result of geocoding a location phrase: a center point to search
/// around, plus the viewport bounds when the geocoder supplies them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geocoded {
    pub lat: f64,
    pub lng: f64,
    pub bounds: Option<GeoBounds>,
}

/// Aggregate signals computed by the scorer sidecar for one venue's
/// review set.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewAnalysis {
    /// Similarity between the preference description and the reviews, in [0, 1]
    pub match_score: f64,
    /// Fraction of reviews classified sentiment-positive, in [0, 1]
    pub positive_rate: f64,
    /// Short textual summary of the most relevant reviews
    pub summary: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_takes_larger_axis() {
        let bounds = GeoBounds {
            lat_min: 25.0,
            lat_max: 25.05,
            lng_min: 121.5,
            lng_max: 121.8,
        };
        assert!((bounds.span() - 0.3).abs() < 1e-9);

        let bounds = GeoBounds {
            lat_min: 24.0,
            lat_max: 24.4,
            lng_min: 121.0,
            lng_max: 121.1,
        };
        assert!((bounds.span() - 0.4).abs() < 1e-9);
    }
}
