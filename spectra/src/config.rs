//! Scan configuration.
//!
//! Everything here has a default matching the reference deployment, so an
//! absent or partial JSON file is fine: missing fields fall back to defaults.

use crate::band::SpectralBand;
use crate::error::{Result, ScanError};
use crate::evaluator::sampling::{DEFAULT_MAX_SAMPLES, DEFAULT_SAMPLE_SCALE_M};
use crate::evaluator::{EvaluationParams, RankOrder, SamplingParams, DEFAULT_VEGETATION_CUTOFF};
use crate::geo::DEFAULT_RADIUS_M;
use crate::selection::{MostRecentClear, DEFAULT_MAX_CLOUD_COVER_PERCENT};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_GEOCODER_ENDPOINT: &str = "https://nominatim.openstreetmap.org/search";
pub const DEFAULT_USER_AGENT: &str = "geos_app";
pub const DEFAULT_GEOCODER_TIMEOUT: Duration = Duration::from_secs(10);

/// Width of the overlay colour ramp above the sensitivity
pub const DEFAULT_OVERLAY_SPAN: f64 = 0.5;

/// Reflectance mapped to full brightness in the satellite composite
pub const DEFAULT_COMPOSITE_MAX: f64 = 3500.0;

/// False-colour composite: SWIR2, NIR, red
pub const DEFAULT_COMPOSITE_BANDS: [SpectralBand; 3] =
    [SpectralBand::B12, SpectralBand::B8, SpectralBand::B4];

pub const DEFAULT_MAP_ZOOM: u8 = 13;

/// Geocoding service settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocoderConfig {
    pub endpoint: String,
    pub user_agent: String,
    /// Request timeout in milliseconds
    pub timeout_ms: u64,
}

impl GeocoderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_GEOCODER_ENDPOINT.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_ms: DEFAULT_GEOCODER_TIMEOUT.as_millis() as u64,
        }
    }
}

/// Map presentation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub overlay_span: f64,
    pub composite_bands: [SpectralBand; 3],
    pub composite_max: f64,
    pub map_zoom: u8,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            overlay_span: DEFAULT_OVERLAY_SPAN,
            composite_bands: DEFAULT_COMPOSITE_BANDS,
            composite_max: DEFAULT_COMPOSITE_MAX,
            map_zoom: DEFAULT_MAP_ZOOM,
        }
    }
}

/// Full configuration of a scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub geocoder: GeocoderConfig,
    pub region_radius_m: f64,
    pub max_cloud_cover_percent: f64,
    pub vegetation_cutoff: f64,
    pub max_samples: usize,
    pub sample_scale_m: f64,
    pub sampling_seed: u64,
    pub rank_order: RankOrder,
    pub display: DisplayConfig,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            geocoder: GeocoderConfig::default(),
            region_radius_m: DEFAULT_RADIUS_M,
            max_cloud_cover_percent: DEFAULT_MAX_CLOUD_COVER_PERCENT,
            vegetation_cutoff: DEFAULT_VEGETATION_CUTOFF,
            max_samples: DEFAULT_MAX_SAMPLES,
            sample_scale_m: DEFAULT_SAMPLE_SCALE_M,
            sampling_seed: 0,
            rank_order: RankOrder::Sample,
            display: DisplayConfig::default(),
        }
    }
}

impl ScanConfig {
    /// Check value ranges. Returns the first violation found.
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(ScanError::Config(msg));

        if !(self.region_radius_m.is_finite() && self.region_radius_m > 0.0) {
            return fail(format!(
                "region radius must be positive, got {}",
                self.region_radius_m
            ));
        }
        if !(self.max_cloud_cover_percent > 0.0 && self.max_cloud_cover_percent <= 100.0) {
            return fail(format!(
                "max cloud cover must be in (0, 100], got {}",
                self.max_cloud_cover_percent
            ));
        }
        if !(-1.0..=1.0).contains(&self.vegetation_cutoff) {
            return fail(format!(
                "vegetation cutoff must be in [-1, 1], got {}",
                self.vegetation_cutoff
            ));
        }
        if self.max_samples == 0 {
            return fail("max samples must be positive".to_string());
        }
        if !(self.sample_scale_m.is_finite() && self.sample_scale_m >= 0.0) {
            return fail(format!(
                "sample scale must be a non-negative number, got {}",
                self.sample_scale_m
            ));
        }
        if self.geocoder.timeout_ms == 0 {
            return fail("geocoder timeout must be positive".to_string());
        }
        if !(self.display.composite_max.is_finite() && self.display.composite_max > 0.0) {
            return fail(format!(
                "composite max must be positive, got {}",
                self.display.composite_max
            ));
        }
        if !(self.display.overlay_span.is_finite() && self.display.overlay_span > 0.0) {
            return fail(format!(
                "overlay span must be positive, got {}",
                self.display.overlay_span
            ));
        }
        Ok(())
    }

    pub fn evaluation_params(&self) -> EvaluationParams {
        EvaluationParams {
            vegetation_cutoff: self.vegetation_cutoff,
            sampling: SamplingParams {
                max_samples: self.max_samples,
                scale_m: self.sample_scale_m,
                seed: self.sampling_seed,
                rank_order: self.rank_order,
            },
        }
    }

    pub fn selection_policy(&self) -> MostRecentClear {
        MostRecentClear::new(self.max_cloud_cover_percent)
    }

    /// Save as pretty-printed JSON
    pub fn save_to_file(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, json)
    }

    /// Load from JSON. Values are not validated here; call [`ScanConfig::validate`].
    pub fn load_from_file(path: &Path) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        let config = ScanConfig::default();
        config.validate().unwrap();
        assert_eq!(config.geocoder.timeout(), Duration::from_secs(10));
        assert_eq!(config.evaluation_params(), EvaluationParams::default());
        assert_eq!(config.selection_policy(), MostRecentClear::default());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: ScanConfig =
            serde_json::from_str(r#"{"max_samples": 200, "rank_order": "intensity_descending"}"#)
                .unwrap();
        assert_eq!(config.max_samples, 200);
        assert_eq!(config.rank_order, RankOrder::IntensityDescending);
        assert_eq!(config.max_cloud_cover_percent, 20.0);
        assert_eq!(config.display.composite_bands, DEFAULT_COMPOSITE_BANDS);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let cases: [fn(&mut ScanConfig); 8] = [
            |c| c.region_radius_m = 0.0,
            |c| c.max_cloud_cover_percent = 0.0,
            |c| c.max_cloud_cover_percent = 100.5,
            |c| c.vegetation_cutoff = 1.5,
            |c| c.max_samples = 0,
            |c| c.sample_scale_m = f64::INFINITY,
            |c| c.geocoder.timeout_ms = 0,
            |c| c.display.composite_max = -1.0,
        ];
        for mutate in cases {
            let mut config = ScanConfig::default();
            mutate(&mut config);
            assert!(matches!(config.validate(), Err(ScanError::Config(_))));
        }
    }

    #[test]
    fn test_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scan_config.json");

        let config = ScanConfig {
            sampling_seed: 42,
            ..Default::default()
        };
        config.save_to_file(&path).unwrap();
        assert_eq!(ScanConfig::load_from_file(&path).unwrap(), config);

        std::fs::write(&path, "{ not json").unwrap();
        let err = ScanConfig::load_from_file(&path).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }
}
