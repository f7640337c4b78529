//! Error types for a mineral scan.
//!
//! Every stage of a scan fails fast with one of these variants. Nothing here is
//! fatal to the process: callers report [`ScanError::user_message`] and let the
//! operator adjust inputs and run again.

use crate::band::SpectralBand;
use thiserror::Error;

/// Failure of any stage of a scan.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The requested mineral is not a registry key.
    #[error("Unknown mineral: {name}")]
    UnknownMineral { name: String },

    /// The geocoder returned no match for the locality text.
    #[error("Location not found: '{query}'")]
    LocationNotFound { query: String },

    /// The geocoder could not be reached or answered with garbage.
    #[error("Geocoding service unavailable: {0}")]
    GeocodingUnavailable(String),

    /// No scene intersects the region below the cloud cover bound.
    #[error("No scene available with cloud cover below {max_cloud_cover_percent}%")]
    NoSceneAvailable { max_cloud_cover_percent: f64 },

    /// The scene does not carry a band the evaluation needs.
    #[error("Band {band} unavailable in scene {scene_id}")]
    BandUnavailable { scene_id: String, band: SpectralBand },

    /// Drawing candidate points from the detection raster failed.
    #[error("Sampling failed: {0}")]
    SamplingFailure(String),

    /// A mineral signature violates its invariants.
    #[error("Invalid mineral signature: {0}")]
    InvalidSignature(String),

    /// Sensitivity outside the accepted range.
    #[error("Sensitivity {value} outside [{min}, {max}]")]
    InvalidSensitivity { value: f64, min: f64, max: f64 },

    /// A band's grid cannot be resampled onto the grid of the other bands.
    #[error("Band {band} with shape {actual:?} cannot be aligned to grid {expected:?}")]
    BandShapeMismatch {
        band: SpectralBand,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    /// Unexpected failure inside the imagery archive.
    #[error("Imagery archive error: {0}")]
    Imagery(String),

    /// Building the tabular export failed.
    #[error("Export failed: {0}")]
    Export(String),

    /// Configuration could not be loaded or is inconsistent.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ScanError {
    /// Single line suitable for showing to the operator.
    ///
    /// Recognized failures are described precisely. Unexpected archive
    /// failures are reported generically so internal state does not leak.
    pub fn user_message(&self) -> String {
        match self {
            ScanError::Imagery(_) => {
                "Unexpected failure while reading imagery; try again later".to_string()
            }
            other => other.to_string(),
        }
    }
}

/// Standard Result type for scan operations.
pub type Result<T> = std::result::Result<T, ScanError>;
