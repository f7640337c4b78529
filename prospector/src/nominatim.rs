//! Geocoding through a Nominatim-compatible HTTP search endpoint.

use log::debug;
use serde::Deserialize;
use spectra::config::GeocoderConfig;
use spectra::{GeoPoint, GeocodeError, Geocoder};
use std::time::Duration;
use ureq::Agent;

/// One search hit. Nominatim returns coordinates as strings.
#[derive(Debug, Clone, Deserialize)]
pub struct Place {
    pub lat: String,
    pub lon: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl Place {
    pub fn point(&self) -> Result<GeoPoint, GeocodeError> {
        let parse = |field: &str, value: &str| {
            value
                .trim()
                .parse::<f64>()
                .map_err(|_| GeocodeError::Parse(format!("invalid {field}: '{value}'")))
        };
        let latitude = parse("latitude", &self.lat)?;
        let longitude = parse("longitude", &self.lon)?;
        GeoPoint::new(latitude, longitude).map_err(GeocodeError::Parse)
    }
}

/// First hit of a search response body, if any.
pub fn parse_search_response(body: &str) -> Result<Option<GeoPoint>, GeocodeError> {
    let places: Vec<Place> =
        serde_json::from_str(body).map_err(|e| GeocodeError::Parse(e.to_string()))?;
    places.first().map(Place::point).transpose()
}

/// Blocking Nominatim client with a global request timeout.
pub struct NominatimGeocoder {
    agent: Agent,
    endpoint: String,
    user_agent: String,
}

impl NominatimGeocoder {
    pub fn new(endpoint: &str, user_agent: &str, timeout: Duration) -> Self {
        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        Self {
            agent,
            endpoint: endpoint.to_string(),
            user_agent: user_agent.to_string(),
        }
    }

    pub fn from_config(config: &GeocoderConfig) -> Self {
        Self::new(&config.endpoint, &config.user_agent, config.timeout())
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn map_transport_error(error: ureq::Error) -> GeocodeError {
    match error {
        ureq::Error::Timeout(_) => GeocodeError::Timeout,
        ureq::Error::StatusCode(status) => GeocodeError::ServerError { status },
        ureq::Error::Json(e) => GeocodeError::Parse(e.to_string()),
        other => GeocodeError::Connection(other.to_string()),
    }
}

impl Geocoder for NominatimGeocoder {
    fn geocode(&self, query: &str) -> Result<Option<GeoPoint>, GeocodeError> {
        debug!("GET {} q='{query}'", self.endpoint);
        let mut response = self
            .agent
            .get(&self.endpoint)
            .query("q", query)
            .query("format", "jsonv2")
            .query("limit", "1")
            .header("User-Agent", &self.user_agent)
            .call()
            .map_err(map_transport_error)?;

        let body = response
            .body_mut()
            .read_to_string()
            .map_err(map_transport_error)?;
        parse_search_response(&body)
    }
}
