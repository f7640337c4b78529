//! Bounded sampling of detected pixels into candidate targets.
//!
//! The detection raster can hold millions of pixels. Candidates are drawn on a
//! grid at the sampling scale and, when there are still more than the cap, a
//! seeded subset is taken. The seed makes repeated scans of the same scene
//! return the same targets in the same order.

use crate::error::{Result, ScanError};
use crate::geo::GeoPoint;
use crate::raster::{GeoTransform, MaskedRaster};
use log::debug;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Upper bound on the number of candidate targets per scan
pub const DEFAULT_MAX_SAMPLES: usize = 1500;

/// Ground distance between sampled pixels, in metres
pub const DEFAULT_SAMPLE_SCALE_M: f64 = 20.0;

/// How ranks are assigned to sampled targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankOrder {
    /// Order in which the sampler returns points (raster order)
    #[default]
    Sample,
    /// Highest intensity first, ties by row then column
    IntensityDescending,
}

/// Sampling knobs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    pub max_samples: usize,
    pub scale_m: f64,
    pub seed: u64,
    pub rank_order: RankOrder,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            max_samples: DEFAULT_MAX_SAMPLES,
            scale_m: DEFAULT_SAMPLE_SCALE_M,
            seed: 0,
            rank_order: RankOrder::Sample,
        }
    }
}

/// A sampled detection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CandidateTarget {
    /// 1-based rank
    pub rank: usize,
    pub latitude: f64,
    pub longitude: f64,
    /// Band ratio at the pixel
    pub intensity: f64,
    pub row: usize,
    pub col: usize,
}

/// Pixel stride that approximates `scale_m` on a grid of `pixel_size_m`.
///
/// A scale at or below the native pixel size keeps every pixel.
pub fn grid_stride(pixel_size_m: f64, scale_m: f64) -> Result<usize> {
    if !scale_m.is_finite() || scale_m < 0.0 {
        return Err(ScanError::SamplingFailure(format!(
            "invalid sampling scale: {scale_m}"
        )));
    }
    if !(pixel_size_m.is_finite() && pixel_size_m > 0.0) {
        return Err(ScanError::SamplingFailure(format!(
            "invalid pixel size: {pixel_size_m} m"
        )));
    }
    Ok(((scale_m / pixel_size_m).round() as usize).max(1))
}

/// Draw up to `params.max_samples` targets from the present pixels of `intensity`.
pub fn sample_targets(
    intensity: &MaskedRaster,
    transform: &GeoTransform,
    params: &SamplingParams,
) -> Result<Vec<CandidateTarget>> {
    if params.max_samples == 0 {
        return Err(ScanError::SamplingFailure(
            "sample cap must be positive".to_string(),
        ));
    }

    let stride = grid_stride(transform.pixel_size_m(), params.scale_m)?;
    let grid: Vec<((usize, usize), f64)> = intensity
        .iter_valid()
        .filter(|((row, col), _)| row % stride == 0 && col % stride == 0)
        .collect();

    debug!(
        "Sampling grid stride {stride}: {} of {} detected pixels eligible",
        grid.len(),
        intensity.valid_count()
    );

    let chosen: Vec<((usize, usize), f64)> = if grid.len() > params.max_samples {
        let mut rng = ChaCha8Rng::seed_from_u64(params.seed);
        let mut indices = rand::seq::index::sample(&mut rng, grid.len(), params.max_samples)
            .into_vec();
        indices.sort_unstable();
        indices.into_iter().map(|i| grid[i]).collect()
    } else {
        grid
    };

    let mut targets = chosen
        .into_iter()
        .map(|((row, col), value)| {
            let center = transform.pixel_center(row, col);
            let point = GeoPoint::new(center.latitude, center.longitude).map_err(|e| {
                ScanError::SamplingFailure(format!(
                    "pixel ({row}, {col}) maps outside the globe: {e}"
                ))
            })?;
            Ok(CandidateTarget {
                rank: 0,
                latitude: point.latitude,
                longitude: point.longitude,
                intensity: value,
                row,
                col,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    if params.rank_order == RankOrder::IntensityDescending {
        targets.sort_by(|a, b| {
            b.intensity
                .partial_cmp(&a.intensity)
                .unwrap_or(Ordering::Equal)
                .then_with(|| (a.row, a.col).cmp(&(b.row, b.col)))
        });
    }
    for (i, target) in targets.iter_mut().enumerate() {
        target.rank = i + 1;
    }

    Ok(targets)
}
