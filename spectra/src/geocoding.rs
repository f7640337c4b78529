//! Area resolution: locality text to a region of interest.
//!
//! The actual lookup is delegated to a [`Geocoder`] so the pipeline can run
//! against an HTTP service in production and a fixed table in tests.

use crate::error::{Result, ScanError};
use crate::geo::{GeoPoint, RegionOfInterest};
use log::{debug, info};

/// Failure of the geocoding collaborator itself (not an empty answer).
#[derive(Debug, thiserror::Error)]
pub enum GeocodeError {
    /// Request did not complete within the configured timeout
    #[error("Timeout")]
    Timeout,
    /// Transport level failure
    #[error("Connection error: {0}")]
    Connection(String),
    /// Service answered with a non-success status
    #[error("Server error (status {status})")]
    ServerError { status: u16 },
    /// Response body could not be understood
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Resolves free text to a coordinate.
pub trait Geocoder {
    /// Returns `Ok(None)` when the service has no match for `query`.
    fn geocode(&self, query: &str) -> std::result::Result<Option<GeoPoint>, GeocodeError>;
}

impl<G: Geocoder + ?Sized> Geocoder for &G {
    fn geocode(&self, query: &str) -> std::result::Result<Option<GeoPoint>, GeocodeError> {
        (**self).geocode(query)
    }
}

/// Turns locality text into a [`RegionOfInterest`] of fixed radius.
#[derive(Debug, Clone)]
pub struct AreaResolver<G> {
    geocoder: G,
    radius_m: f64,
}

impl<G: Geocoder> AreaResolver<G> {
    pub fn new(geocoder: G, radius_m: f64) -> Self {
        Self { geocoder, radius_m }
    }

    pub fn radius_m(&self) -> f64 {
        self.radius_m
    }

    /// Resolve `locality` with a single geocoder call.
    ///
    /// Blank text fails with `LocationNotFound` without contacting the
    /// geocoder. Collaborator failures become `GeocodingUnavailable`. There
    /// are no retries.
    pub fn resolve(&self, locality: &str) -> Result<RegionOfInterest> {
        let query = locality.trim();
        if query.is_empty() {
            return Err(ScanError::LocationNotFound {
                query: locality.to_string(),
            });
        }

        debug!("Geocoding '{query}'");
        let center = self
            .geocoder
            .geocode(query)
            .map_err(|e| ScanError::GeocodingUnavailable(e.to_string()))?
            .ok_or_else(|| ScanError::LocationNotFound {
                query: query.to_string(),
            })?;

        info!("Resolved '{query}' to {center}");
        Ok(RegionOfInterest::new(center, self.radius_m))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::DEFAULT_RADIUS_M;
    use crate::test_util::{FailingGeocoder, StaticGeocoder};

    #[test]
    fn test_resolve_known_locality() {
        let geocoder = StaticGeocoder::carajas();
        let resolver = AreaResolver::new(&geocoder, DEFAULT_RADIUS_M);

        let region = resolver.resolve("Canaã dos Carajás, PA").unwrap();
        assert_eq!(region.center.latitude, -6.497);
        assert_eq!(region.center.longitude, -49.880);
        assert_eq!(region.radius_m, DEFAULT_RADIUS_M);
    }

    #[test]
    fn test_blank_locality_skips_geocoder() {
        let geocoder = StaticGeocoder::carajas();
        let resolver = AreaResolver::new(&geocoder, DEFAULT_RADIUS_M);

        for text in ["", "   "] {
            let err = resolver.resolve(text).unwrap_err();
            assert!(matches!(err, ScanError::LocationNotFound { .. }));
        }
        assert_eq!(geocoder.calls(), 0);
    }

    #[test]
    fn test_unmatched_locality() {
        let geocoder = StaticGeocoder::carajas();
        let resolver = AreaResolver::new(&geocoder, DEFAULT_RADIUS_M);

        let err = resolver.resolve("Atlantis").unwrap_err();
        assert!(matches!(err, ScanError::LocationNotFound { query } if query == "Atlantis"));
        assert_eq!(geocoder.calls(), 1);
    }

    #[test]
    fn test_geocoder_failure_is_unavailable() {
        let resolver = AreaResolver::new(FailingGeocoder::timing_out(), DEFAULT_RADIUS_M);
        let err = resolver.resolve("Belo Horizonte").unwrap_err();
        assert!(matches!(err, ScanError::GeocodingUnavailable(_)));
    }
}
