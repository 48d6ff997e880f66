//! Location validation against the area-size policy.
//!
//! A usable location must geocode and its viewport must not span more
//! than a configurable number of degrees on either axis. City-scale
//! inputs ("台北") get a narrowing question instead of a search.

use std::sync::Arc;

use providers::{Geocoded, PlaceSearch, ProviderError};
use tracing::debug;

/// Default maximum viewport span in degrees.
pub const DEFAULT_MAX_SPAN_DEG: f64 = 0.2;

/// Outcome of validating a location string.
#[derive(Debug, Clone, PartialEq)]
pub enum LocationCheck {
    /// Geocoded and small enough to search around.
    Valid(Geocoded),
    /// Geocoded but the area is too broad to search meaningfully.
    TooLarge { span: f64 },
    /// The geocoder could not resolve the string at all.
    Unresolvable,
}

/// Pure policy: is this geocoded area small enough to search?
///
/// A result without a viewport is treated as a point and accepted.
pub fn check_span(geocoded: &Geocoded, max_span_deg: f64) -> LocationCheck {
    match &geocoded.bounds {
        Some(bounds) => {
            let span = bounds.span();
            if span > max_span_deg {
                LocationCheck::TooLarge { span }
            } else {
                LocationCheck::Valid(geocoded.clone())
            }
        }
        None => LocationCheck::Valid(geocoded.clone()),
    }
}

/// Validates locations by geocoding and applying the span policy.
pub struct LocationValidator {
    places: Arc<dyn PlaceSearch>,
    max_span_deg: f64,
}

impl LocationValidator {
    pub fn new(places: Arc<dyn PlaceSearch>) -> Self {
        Self {
            places,
            max_span_deg: DEFAULT_MAX_SPAN_DEG,
        }
    }

    /// Configure the maximum viewport span in degrees (default: 0.2)
    pub fn with_max_span_deg(mut self, max_span_deg: f64) -> Self {
        self.max_span_deg = max_span_deg;
        self
    }

    /// Geocode a location string and validate its extent.
    ///
    /// Unresolvable strings are a distinct outcome, not an error;
    /// transport and quota problems still propagate.
    pub async fn validate(&self, location: &str) -> providers::Result<LocationCheck> {
        match self.places.geocode(location).await {
            Ok(geocoded) => {
                let check = check_span(&geocoded, self.max_span_deg);
                debug!("Location '{}' validated: {:?}", location, check);
                Ok(check)
            }
            Err(ProviderError::Unresolvable { .. }) => Ok(LocationCheck::Unresolvable),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use providers::GeoBounds;

    fn geocoded_with_span(span: f64) -> Geocoded {
        Geocoded {
            lat: 25.03,
            lng: 121.56,
            bounds: Some(GeoBounds {
                lat_min: 25.0,
                lat_max: 25.0 + span,
                lng_min: 121.5,
                lng_max: 121.5 + span / 2.0,
            }),
        }
    }

    #[test]
    fn test_district_scale_span_is_valid() {
        let check = check_span(&geocoded_with_span(0.08), DEFAULT_MAX_SPAN_DEG);
        assert!(matches!(check, LocationCheck::Valid(_)));
    }

    #[test]
    fn test_city_scale_span_is_too_large() {
        let check = check_span(&geocoded_with_span(1.5), DEFAULT_MAX_SPAN_DEG);
        match check {
            LocationCheck::TooLarge { span } => assert!((span - 1.5).abs() < 1e-9),
            other => panic!("expected TooLarge, got {:?}", other),
        }
    }

    #[test]
    fn test_threshold_is_exclusive() {
        // Exactly at the limit still counts as searchable
        let check = check_span(&geocoded_with_span(0.2), DEFAULT_MAX_SPAN_DEG);
        assert!(matches!(check, LocationCheck::Valid(_)));
    }

    #[test]
    fn test_point_result_without_viewport_is_valid() {
        let geocoded = Geocoded {
            lat: 25.03,
            lng: 121.56,
            bounds: None,
        };
        assert!(matches!(
            check_span(&geocoded, DEFAULT_MAX_SPAN_DEG),
            LocationCheck::Valid(_)
        ));
    }
}
