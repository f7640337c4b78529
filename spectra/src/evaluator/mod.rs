//! Spectral evaluation: band ratio, vegetation exclusion and thresholding.
//!
//! For a mineral signature with bands (N, D) and a sensitivity `s`:
//!
//! ```text
//! ratio     = N / D                      absent where D == 0 or data missing
//! ndvi      = (B8 - B4) / (B8 + B4)      absent where B8 + B4 == 0
//! mask      = ratio > s  AND  ndvi < 0.45
//! intensity = ratio where mask, absent elsewhere
//! ```
//!
//! High ratios under dense canopy are treated as false positives: the canopy
//! hides the ground signal, so vegetated pixels never become targets no matter
//! how high their ratio. The intensity raster is then sampled into at most a
//! fixed number of candidate targets (see [`sampling`]).

pub mod sampling;

use crate::band::SpectralBand;
use crate::error::{Result, ScanError};
use crate::imagery::{BandImage, ImageryArchive};
use crate::minerals::MineralSignature;
use crate::raster::{clear_outside, GeoTransform, MaskedRaster};
use crate::selection::SceneSelection;
use log::{debug, info};
use ndarray::{Array2, ArrayView2, Zip};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub use sampling::{sample_targets, CandidateTarget, RankOrder, SamplingParams};

/// Vegetation index at or above which pixels are excluded
pub const DEFAULT_VEGETATION_CUTOFF: f64 = 0.45;

/// Smallest accepted sensitivity
pub const MIN_SENSITIVITY: f64 = 0.01;

/// Largest accepted sensitivity
pub const MAX_SENSITIVITY: f64 = 4.0;

/// Check that `sensitivity` lies in [`MIN_SENSITIVITY`, `MAX_SENSITIVITY`]
pub fn validate_sensitivity(sensitivity: f64) -> Result<f64> {
    if (MIN_SENSITIVITY..=MAX_SENSITIVITY).contains(&sensitivity) {
        Ok(sensitivity)
    } else {
        Err(ScanError::InvalidSensitivity {
            value: sensitivity,
            min: MIN_SENSITIVITY,
            max: MAX_SENSITIVITY,
        })
    }
}

/// Per-pixel quotient `numerator / denominator`.
///
/// Pixels with missing data (NaN) in either band, a zero denominator, or a
/// non-finite quotient are absent.
pub fn band_ratio(numerator: ArrayView2<f64>, denominator: ArrayView2<f64>) -> MaskedRaster {
    let ratio = Zip::from(numerator)
        .and(denominator)
        .par_map_collect(|&n, &d| {
            if d == 0.0 {
                return None;
            }
            Some(n / d).filter(|q| q.is_finite())
        });
    MaskedRaster::from_options(&ratio)
}

/// Normalized difference `(a - b) / (a + b)`; with NIR and red this is NDVI.
///
/// Absent where either input is missing or the sum is zero.
pub fn normalized_difference(a: ArrayView2<f64>, b: ArrayView2<f64>) -> MaskedRaster {
    let index = Zip::from(a).and(b).par_map_collect(|&a, &b| {
        let sum = a + b;
        if sum == 0.0 {
            return None;
        }
        Some((a - b) / sum).filter(|v| v.is_finite())
    });
    MaskedRaster::from_options(&index)
}

/// Pixels with `ratio > sensitivity` and `vegetation < vegetation_cutoff`.
///
/// Absent pixels in either input are never selected.
pub fn detection_mask(
    ratio: &MaskedRaster,
    vegetation: &MaskedRaster,
    sensitivity: f64,
    vegetation_cutoff: f64,
) -> Array2<bool> {
    Zip::from(ratio.values())
        .and(ratio.mask())
        .and(vegetation.values())
        .and(vegetation.mask())
        .par_map_collect(|&r, &r_valid, &v, &v_valid| {
            r_valid && v_valid && r > sensitivity && v < vegetation_cutoff
        })
}

/// Evaluation settings that are not part of the mineral signature.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationParams {
    pub vegetation_cutoff: f64,
    pub sampling: SamplingParams,
}

impl Default for EvaluationParams {
    fn default() -> Self {
        Self {
            vegetation_cutoff: DEFAULT_VEGETATION_CUTOFF,
            sampling: SamplingParams::default(),
        }
    }
}

/// Output of one evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralEvaluation {
    /// Mineral the evaluation was run for
    pub mineral: String,
    /// Threshold applied to the ratio
    pub sensitivity: f64,
    /// Ratio restricted to detected pixels
    pub intensity: MaskedRaster,
    /// Georeference of `intensity`
    pub transform: GeoTransform,
    /// Sampled detections, ranked 1..N
    pub targets: Vec<CandidateTarget>,
}

impl SpectralEvaluation {
    /// Number of pixels passing the detection mask, before sampling
    pub fn detected_pixels(&self) -> usize {
        self.intensity.valid_count()
    }

    pub fn target_count(&self) -> usize {
        self.targets.len()
    }

    pub fn has_targets(&self) -> bool {
        !self.targets.is_empty()
    }
}

/// Rasters the evaluation needs, all on one grid.
#[derive(Debug, Clone)]
pub struct EvaluationBands {
    pub numerator: Array2<f64>,
    pub denominator: Array2<f64>,
    pub nir: Array2<f64>,
    pub red: Array2<f64>,
    pub transform: GeoTransform,
}

impl EvaluationBands {
    /// Read the bands of `signature` plus NIR and red from a selected scene.
    ///
    /// Bands shared between the ratio and the vegetation index are read once.
    /// Coarser bands are resampled onto the finest grid among them, and pixels
    /// whose centre falls outside the scene's clip bounds are marked missing.
    pub fn load<A: ImageryArchive>(
        scene: &SceneSelection<'_, A>,
        signature: &MineralSignature,
    ) -> Result<Self> {
        let wanted = [
            signature.numerator,
            signature.denominator,
            SpectralBand::NIR,
            SpectralBand::RED,
        ];

        let mut loaded: BTreeMap<SpectralBand, BandImage> = BTreeMap::new();
        for band in wanted {
            if !loaded.contains_key(&band) {
                loaded.insert(band, scene.band(band)?);
            }
        }

        // Finest grid wins; ties keep the earliest band in `wanted`
        let scene_id = scene.scene_id();
        let mut grid = fetch(&loaded, scene_id, signature.numerator)?;
        for band in &wanted[1..] {
            let image = fetch(&loaded, scene_id, *band)?;
            if image.transform.pixel_height_deg < grid.transform.pixel_height_deg {
                grid = image;
            }
        }
        let transform = grid.transform;
        let dim = grid.dim();

        let align = |band: SpectralBand| -> Result<Array2<f64>> {
            let image = fetch(&loaded, scene_id, band)?;
            let mut data = image
                .align_to(&transform, dim)
                .ok_or(ScanError::BandShapeMismatch {
                    band,
                    expected: dim,
                    actual: image.dim(),
                })?;
            if image.dim() != dim {
                debug!("Resampled {band} from {:?} to {dim:?}", image.dim());
            }
            clear_outside(&mut data, &transform, scene.clip_bounds());
            Ok(data)
        };

        Ok(Self {
            numerator: align(signature.numerator)?,
            denominator: align(signature.denominator)?,
            nir: align(SpectralBand::NIR)?,
            red: align(SpectralBand::RED)?,
            transform,
        })
    }
}

fn fetch<'a>(
    loaded: &'a BTreeMap<SpectralBand, BandImage>,
    scene_id: &str,
    band: SpectralBand,
) -> Result<&'a BandImage> {
    loaded.get(&band).ok_or_else(|| ScanError::BandUnavailable {
        scene_id: scene_id.to_string(),
        band,
    })
}

/// Applies mineral signatures to scenes.
#[derive(Debug, Clone, Default)]
pub struct SpectralEvaluator {
    params: EvaluationParams,
}

impl SpectralEvaluator {
    pub fn new(params: EvaluationParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &EvaluationParams {
        &self.params
    }

    /// Evaluate `signature` on `scene` with the given sensitivity.
    ///
    /// The sensitivity replaces the signature's default threshold for this
    /// run. Finding nothing is a valid outcome with an empty target list.
    pub fn evaluate<A: ImageryArchive>(
        &self,
        scene: &SceneSelection<'_, A>,
        signature: &MineralSignature,
        sensitivity: f64,
    ) -> Result<SpectralEvaluation> {
        let sensitivity = validate_sensitivity(sensitivity)?;
        let bands = EvaluationBands::load(scene, signature)?;
        self.evaluate_bands(&bands, signature, sensitivity)
    }

    /// Evaluate already loaded bands.
    pub fn evaluate_bands(
        &self,
        bands: &EvaluationBands,
        signature: &MineralSignature,
        sensitivity: f64,
    ) -> Result<SpectralEvaluation> {
        let ratio = band_ratio(bands.numerator.view(), bands.denominator.view());
        let vegetation = normalized_difference(bands.nir.view(), bands.red.view());
        let mask = detection_mask(
            &ratio,
            &vegetation,
            sensitivity,
            self.params.vegetation_cutoff,
        );
        let intensity = ratio.update_mask(mask.view());

        debug!(
            "{} ({}/{}): {} ratio pixels, {} detected at sensitivity {sensitivity}",
            signature.name,
            signature.numerator,
            signature.denominator,
            ratio.valid_count(),
            intensity.valid_count()
        );

        let targets = sample_targets(&intensity, &bands.transform, &self.params.sampling)?;
        info!("{}: {} candidate targets", signature.name, targets.len());

        Ok(SpectralEvaluation {
            mineral: signature.name.clone(),
            sensitivity,
            intensity,
            transform: bands.transform,
            targets,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::{BoundingBox, RegionOfInterest};
    use crate::imagery::{InMemoryArchive, SceneDescriptor};
    use crate::selection::{MostRecentClear, SceneSelector};
    use crate::test_util::{carajas_center, carajas_scene, OUTCROP};
    use approx::assert_relative_eq;
    use std::collections::HashMap;
    use ndarray::array;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn gold() -> MineralSignature {
        MineralSignature::new("Ouro (Nativo/Sufetos)", SpectralBand::B11, SpectralBand::B2, 2.15)
            .unwrap()
    }

    fn transform(rows: usize, cols: usize) -> GeoTransform {
        GeoTransform::from_footprint(&BoundingBox::new(-49.9, -6.6, -49.8, -6.5), rows, cols)
    }

    fn random_bands(n: usize, seed: u64) -> EvaluationBands {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut draw = |lo: f64, hi: f64| {
            Array2::from_shape_simple_fn((n, n), || rng.random_range(lo..hi))
        };
        EvaluationBands {
            numerator: draw(0.0, 4000.0),
            denominator: draw(200.0, 2000.0),
            nir: draw(100.0, 5000.0),
            red: draw(100.0, 3000.0),
            transform: transform(n, n),
        }
    }

    fn native_sampling() -> EvaluationParams {
        EvaluationParams {
            sampling: SamplingParams {
                scale_m: 0.0,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_band_ratio_absence() {
        let num = array![[10.0, 5.0], [f64::NAN, 0.0]];
        let den = array![[2.0, 0.0], [1.0, 4.0]];
        let ratio = band_ratio(num.view(), den.view());

        assert_eq!(ratio.get(0, 0), Some(5.0));
        assert_eq!(ratio.get(0, 1), None);
        assert_eq!(ratio.get(1, 0), None);
        assert_eq!(ratio.get(1, 1), Some(0.0));
    }

    #[test]
    fn test_ndvi() {
        let nir = array![[3000.0, 0.0], [500.0, f64::NAN]];
        let red = array![[1000.0, 0.0], [1500.0, 10.0]];
        let ndvi = normalized_difference(nir.view(), red.view());

        assert_relative_eq!(ndvi.get(0, 0).unwrap(), 0.5, epsilon = 1e-12);
        assert_eq!(ndvi.get(0, 1), None);
        assert_relative_eq!(ndvi.get(1, 0).unwrap(), -0.5, epsilon = 1e-12);
        assert_eq!(ndvi.get(1, 1), None);
    }

    #[test]
    fn test_mask_is_conjunction_with_strict_threshold() {
        // ratio: 2.0 (== s), 3.0 (> s, vegetated), 3.0 (> s, bare), 3.0 (> s, ndvi == cutoff)
        let ratio = array![[Some(2.0), Some(3.0), Some(3.0), Some(3.0)]];
        let ndvi = array![[Some(0.1), Some(0.8), Some(0.2), Some(0.45)]];
        let ratio = MaskedRaster::from_options(&ratio);
        let ndvi = MaskedRaster::from_options(&ndvi);

        let mask = detection_mask(&ratio, &ndvi, 2.0, 0.45);
        assert_eq!(mask, array![[false, false, true, false]]);
    }

    #[test]
    fn test_absent_vegetation_never_detects() {
        let ratio = MaskedRaster::from_options(&array![[Some(9.0)]]);
        let ndvi = MaskedRaster::from_options(&array![[None]]);
        assert_eq!(detection_mask(&ratio, &ndvi, 1.0, 0.45), array![[false]]);
    }

    #[test]
    fn test_sensitivity_bounds() {
        assert!(validate_sensitivity(0.01).is_ok());
        assert!(validate_sensitivity(4.0).is_ok());
        assert!(validate_sensitivity(0.0).is_err());
        assert!(validate_sensitivity(4.01).is_err());
        assert!(validate_sensitivity(f64::NAN).is_err());
    }

    #[test]
    fn test_targets_satisfy_both_inequalities() {
        let bands = random_bands(64, 1);
        let evaluator = SpectralEvaluator::new(native_sampling());
        let sensitivity = 1.21;

        let result = evaluator.evaluate_bands(&bands, &gold(), sensitivity).unwrap();
        assert!(result.has_targets());

        for target in &result.targets {
            let (r, c) = (target.row, target.col);
            let ratio = bands.numerator[[r, c]] / bands.denominator[[r, c]];
            let (nir, red) = (bands.nir[[r, c]], bands.red[[r, c]]);
            let ndvi = (nir - red) / (nir + red);
            assert!(target.intensity > sensitivity);
            assert_relative_eq!(target.intensity, ratio, epsilon = 1e-12);
            assert!(ndvi < DEFAULT_VEGETATION_CUTOFF);
        }
    }

    #[test]
    fn test_fully_vegetated_scene_has_no_targets() {
        let n = 16;
        let bands = EvaluationBands {
            numerator: Array2::from_elem((n, n), 4000.0),
            denominator: Array2::from_elem((n, n), 100.0),
            nir: Array2::from_elem((n, n), 4000.0),
            red: Array2::from_elem((n, n), 400.0),
            transform: transform(n, n),
        };
        let result = SpectralEvaluator::default()
            .evaluate_bands(&bands, &gold(), 0.01)
            .unwrap();
        assert!(result.targets.is_empty());
        assert_eq!(result.detected_pixels(), 0);
    }

    #[test]
    fn test_sample_cap_holds_on_large_masks() {
        let n = 200;
        let bands = EvaluationBands {
            numerator: Array2::from_elem((n, n), 3000.0),
            denominator: Array2::from_elem((n, n), 1000.0),
            nir: Array2::from_elem((n, n), 1000.0),
            red: Array2::from_elem((n, n), 1000.0),
            transform: transform(n, n),
        };
        let result = SpectralEvaluator::new(native_sampling())
            .evaluate_bands(&bands, &gold(), 1.0)
            .unwrap();

        assert_eq!(result.detected_pixels(), n * n);
        assert_eq!(result.target_count(), sampling::DEFAULT_MAX_SAMPLES);
    }

    #[test]
    fn test_evaluation_is_idempotent() {
        let bands = random_bands(80, 3);
        let evaluator = SpectralEvaluator::default();

        let first = evaluator.evaluate_bands(&bands, &gold(), 1.5).unwrap();
        let second = evaluator.evaluate_bands(&bands, &gold(), 1.5).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_max_sensitivity_can_find_nothing() {
        let n = 32;
        let bands = EvaluationBands {
            numerator: Array2::from_elem((n, n), 1500.0),
            denominator: Array2::from_elem((n, n), 1000.0),
            nir: Array2::from_elem((n, n), 900.0),
            red: Array2::from_elem((n, n), 1000.0),
            transform: transform(n, n),
        };
        let result = SpectralEvaluator::default()
            .evaluate_bands(&bands, &gold(), MAX_SENSITIVITY)
            .unwrap();
        assert!(!result.has_targets());
    }

    fn evaluate_scene(
        (descriptor, bands): (SceneDescriptor, HashMap<SpectralBand, Array2<f64>>),
    ) -> Result<SpectralEvaluation> {
        let archive = InMemoryArchive::new().with_scene(descriptor, bands);
        let selector = SceneSelector::new(&archive, MostRecentClear::default());
        let selection = selector.select(&RegionOfInterest::around(carajas_center()))?;
        SpectralEvaluator::default().evaluate(&selection, &gold(), 1.21)
    }

    #[test]
    fn test_twenty_metre_band_is_resampled_onto_ten_metre_grid() {
        let native = evaluate_scene(carajas_scene("native", 12).build()).unwrap();
        let coarse = evaluate_scene(
            carajas_scene("coarse", 12)
                .coarsen(SpectralBand::B11, (200, 200))
                .build(),
        )
        .unwrap();

        let (rows, cols) = OUTCROP;
        assert_eq!(coarse.detected_pixels(), rows.len() * cols.len());
        assert_eq!(coarse.transform, native.transform);
        assert_eq!(coarse.intensity, native.intensity);
        assert_eq!(coarse.targets, native.targets);
    }

    #[test]
    fn test_incommensurate_band_grid_is_rejected() {
        let err = evaluate_scene(
            carajas_scene("odd", 12)
                .coarsen(SpectralBand::B11, (150, 150))
                .build(),
        )
        .unwrap_err();

        match err {
            ScanError::BandShapeMismatch {
                band,
                expected,
                actual,
            } => {
                assert_eq!(band, SpectralBand::B11);
                assert_ne!(expected, actual);
            }
            other => panic!("expected BandShapeMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_pixels_outside_clip_are_missing() {
        let (descriptor, scene_bands) = carajas_scene("bare", 12)
            .fill(SpectralBand::B11, 3000.0)
            .fill(SpectralBand::B8, 1200.0)
            .build();
        let archive = InMemoryArchive::new().with_scene(descriptor, scene_bands);
        let selector = SceneSelector::new(&archive, MostRecentClear::default());
        let selection = selector
            .select(&RegionOfInterest::around(carajas_center()))
            .unwrap();
        let bands = EvaluationBands::load(&selection, &gold()).unwrap();

        let clip = selection.clip_bounds();
        let mut inside = 0;
        for ((row, col), &value) in bands.numerator.indexed_iter() {
            let centre = bands.transform.pixel_center(row, col);
            if clip.contains(&centre) {
                inside += 1;
                assert_eq!(value, 3000.0);
            } else {
                assert!(value.is_nan());
            }
        }
        assert!(inside > 0);
        assert!(inside < bands.numerator.len());
    }
}
