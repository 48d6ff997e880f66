//! Google-style place lookup client.
//!
//! Two endpoints are consumed: geocoding (for the center point and
//! the viewport used by the area-size check) and nearby search (for
//! candidate venues, enriched with a per-venue details fetch for
//! address/phone/website).

use async_trait::async_trait;
use serde::Deserialize;
use storage::Venue;
use tracing::{debug, warn};

use crate::error::{ProviderError, Result};
use crate::traits::PlaceSearch;
use crate::types::{GeoBounds, Geocoded};

const DEFAULT_BASE_URL: &str = "https://maps.googleapis.com";
const DEFAULT_RADIUS_M: u32 = 2000;
const DEFAULT_MAX_RESULTS: usize = 10;

/// Client for the Google Maps web service family.
#[derive(Clone)]
pub struct GooglePlaceClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    radius_m: u32,
    max_results: usize,
}

impl GooglePlaceClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            radius_m: DEFAULT_RADIUS_M,
            max_results: DEFAULT_MAX_RESULTS,
        }
    }

    /// Point the client at a different host (tests, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Configure the search radius in meters (default: 2000)
    pub fn with_radius_m(mut self, radius_m: u32) -> Self {
        self.radius_m = radius_m;
        self
    }

    /// Configure the candidate cap per search (default: 10)
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    async fn fetch_details(&self, place_id: &str) -> Option<PlaceDetails> {
        let url = format!("{}/maps/api/place/details/json", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[
                ("place_id", place_id),
                ("fields", "formatted_address,formatted_phone_number,website"),
                ("language", "zh-TW"),
                ("key", &self.api_key),
            ])
            .send()
            .await;

        match response {
            Ok(resp) => match resp.json::<DetailsResponse>().await {
                Ok(details) => details.result,
                Err(e) => {
                    warn!("Details response for {} unreadable: {}", place_id, e);
                    None
                }
            },
            Err(e) => {
                warn!("Details request for {} failed: {}", place_id, e);
                None
            }
        }
    }
}

#[async_trait]
impl PlaceSearch for GooglePlaceClient {
    async fn geocode(&self, location: &str) -> Result<Geocoded> {
        let url = format!("{}/maps/api/geocode/json", self.base_url);
        let response: GeocodeResponse = self
            .http
            .get(&url)
            .query(&[
                ("address", location),
                ("language", "zh-TW"),
                ("key", &self.api_key),
            ])
            .send()
            .await?
            .json()
            .await?;

        geocoded_from_response(location, response)
    }

    async fn search(&self, location: &str, category: &str) -> Result<Vec<Venue>> {
        let center = self.geocode(location).await?;

        let url = format!("{}/maps/api/place/nearbysearch/json", self.base_url);
        let response: NearbyResponse = self
            .http
            .get(&url)
            .query(&[
                ("location", format!("{},{}", center.lat, center.lng).as_str()),
                ("radius", self.radius_m.to_string().as_str()),
                ("keyword", category),
                ("type", "restaurant"),
                ("language", "zh-TW"),
                ("key", &self.api_key),
            ])
            .send()
            .await?
            .json()
            .await?;

        match response.status.as_str() {
            "OK" | "ZERO_RESULTS" => {}
            "OVER_QUERY_LIMIT" => return Err(ProviderError::QuotaExceeded),
            other => {
                return Err(ProviderError::BadResponse(format!(
                    "nearby search status {other}"
                )))
            }
        }

        let mut venues = Vec::new();
        for item in response.results.into_iter().take(self.max_results) {
            let Some(place_id) = item.place_id.clone() else {
                continue;
            };
            // Details failures degrade to the nearby-search fields
            let details = self.fetch_details(&place_id).await;
            venues.push(venue_from_parts(item, details));
        }

        debug!(
            "Place search '{}' / '{}' returned {} venues",
            location,
            category,
            venues.len()
        );
        Ok(venues)
    }
}

// ---------------------------------------------------------------------------
// Response shapes and pure conversions
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: LatLng,
    viewport: Option<Viewport>,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

#[derive(Debug, Deserialize)]
struct Viewport {
    northeast: LatLng,
    southwest: LatLng,
}

#[derive(Debug, Deserialize)]
struct NearbyResponse {
    status: String,
    #[serde(default)]
    results: Vec<NearbyResult>,
}

#[derive(Debug, Deserialize)]
struct NearbyResult {
    place_id: Option<String>,
    name: Option<String>,
    rating: Option<f64>,
    user_ratings_total: Option<i64>,
    vicinity: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DetailsResponse {
    #[allow(dead_code)]
    status: String,
    result: Option<PlaceDetails>,
}

#[derive(Debug, Deserialize)]
struct PlaceDetails {
    formatted_address: Option<String>,
    formatted_phone_number: Option<String>,
    website: Option<String>,
}

fn geocoded_from_response(location: &str, response: GeocodeResponse) -> Result<Geocoded> {
    match response.status.as_str() {
        "OK" => {}
        "OVER_QUERY_LIMIT" => return Err(ProviderError::QuotaExceeded),
        "ZERO_RESULTS" => {
            return Err(ProviderError::Unresolvable {
                location: location.to_string(),
            })
        }
        other => {
            return Err(ProviderError::BadResponse(format!(
                "geocode status {other}"
            )))
        }
    }

    let result = response
        .results
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::Unresolvable {
            location: location.to_string(),
        })?;

    let bounds = result.geometry.viewport.map(|v| GeoBounds {
        lat_min: v.southwest.lat,
        lat_max: v.northeast.lat,
        lng_min: v.southwest.lng,
        lng_max: v.northeast.lng,
    });

    Ok(Geocoded {
        lat: result.geometry.location.lat,
        lng: result.geometry.location.lng,
        bounds,
    })
}

fn venue_from_parts(item: NearbyResult, details: Option<PlaceDetails>) -> Venue {
    let place_id = item.place_id.unwrap_or_default();
    let map_url = format!("https://www.google.com/maps/place/?q=place_id:{place_id}");
    let details = details.unwrap_or(PlaceDetails {
        formatted_address: None,
        formatted_phone_number: None,
        website: None,
    });

    Venue {
        place_id,
        name: item.name.unwrap_or_default(),
        rating: item.rating.unwrap_or(0.0),
        user_ratings_total: item.user_ratings_total.unwrap_or(0),
        address: details
            .formatted_address
            .or(item.vicinity)
            .unwrap_or_default(),
        phone: details.formatted_phone_number,
        website: details.website,
        map_url,
    }
}
