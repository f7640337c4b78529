//! One scan from request to presentation.
//!
//! ```text
//! ScanRequest -> registry lookup -> AreaResolver -> SceneSelector
//!             -> SpectralEvaluator -> Presenter -> ScanReport
//! ```
//!
//! Stages run in order and the first failure ends the scan. Nothing is kept
//! between runs, so the same request against unchanged collaborators yields
//! the same report.

use crate::band::SpectralBand;
use crate::config::ScanConfig;
use crate::error::{Result, ScanError};
use crate::evaluator::{validate_sensitivity, SpectralEvaluation, SpectralEvaluator};
use crate::geo::RegionOfInterest;
use crate::geocoding::{AreaResolver, Geocoder};
use crate::imagery::{ImageryArchive, SceneDescriptor};
use crate::minerals::MineralRegistry;
use crate::presenter::{PresentationBundle, Presenter};
use crate::render::{composite_image, overlay_image};
use crate::selection::SceneSelector;
use image::{RgbImage, RgbaImage};
use log::info;
use ndarray::Array2;

/// Operator input for one scan.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanRequest {
    pub locality: String,
    pub mineral: String,
    pub sensitivity: f64,
}

impl ScanRequest {
    pub fn new(locality: impl Into<String>, mineral: impl Into<String>, sensitivity: f64) -> Self {
        Self {
            locality: locality.into(),
            mineral: mineral.into(),
            sensitivity,
        }
    }
}

/// Result of a completed scan.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanReport {
    pub region: RegionOfInterest,
    pub scene: SceneDescriptor,
    pub evaluation: SpectralEvaluation,
    pub presentation: PresentationBundle,
}

/// Wires the scan stages together.
///
/// The registry is borrowed and never modified, so several scanners can share
/// one table.
pub struct Scanner<'r, G, A> {
    registry: &'r MineralRegistry,
    resolver: AreaResolver<G>,
    selector: SceneSelector<A>,
    evaluator: SpectralEvaluator,
    presenter: Presenter,
}

impl<'r, G: Geocoder, A: ImageryArchive> Scanner<'r, G, A> {
    /// Build a scanner from a validated configuration.
    pub fn new(
        registry: &'r MineralRegistry,
        geocoder: G,
        archive: A,
        config: &ScanConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            registry,
            resolver: AreaResolver::new(geocoder, config.region_radius_m),
            selector: SceneSelector::new(archive, config.selection_policy()),
            evaluator: SpectralEvaluator::new(config.evaluation_params()),
            presenter: Presenter::new(config.display.clone()),
        })
    }

    pub fn registry(&self) -> &MineralRegistry {
        self.registry
    }

    pub fn presenter(&self) -> &Presenter {
        &self.presenter
    }

    /// Run one scan.
    ///
    /// Mineral and sensitivity are checked before any collaborator is
    /// contacted.
    pub fn run(&self, request: &ScanRequest) -> Result<ScanReport> {
        let signature = self.registry.lookup(&request.mineral)?;
        let sensitivity = validate_sensitivity(request.sensitivity)?;

        info!(
            "Scanning '{}' for {} at sensitivity {sensitivity}",
            request.locality, signature.name
        );

        let region = self.resolver.resolve(&request.locality)?;
        let selection = self.selector.select(&region)?;
        let evaluation = self.evaluator.evaluate(&selection, signature, sensitivity)?;
        let presentation = self
            .presenter
            .present(&evaluation, selection.descriptor(), region.center)?;

        info!(
            "Scan of '{}' finished: {} targets in scene {}",
            request.locality,
            presentation.target_count,
            selection.scene_id()
        );

        Ok(ScanReport {
            region,
            scene: selection.descriptor().clone(),
            evaluation,
            presentation,
        })
    }

    /// Satellite composite of the report's scene over its region.
    ///
    /// Each channel is resampled onto the evaluation grid so the composite
    /// lines up with the detection overlay pixel for pixel.
    pub fn render_composite(&self, report: &ScanReport) -> Result<RgbImage> {
        let selection = self
            .selector
            .select_by_id(&report.scene.id, &report.region)?;
        let grid = report.evaluation.transform;
        let dim = report.evaluation.intensity.dim();

        let channel = |band: SpectralBand| -> Result<Array2<f64>> {
            let image = selection.band(band)?;
            image
                .align_to(&grid, dim)
                .ok_or(ScanError::BandShapeMismatch {
                    band,
                    expected: dim,
                    actual: image.dim(),
                })
        };

        let [r, g, b] = self.presenter.display().composite_bands;
        let (red, green, blue) = (channel(r)?, channel(g)?, channel(b)?);
        Ok(composite_image(
            red.view(),
            green.view(),
            blue.view(),
            self.presenter.display().composite_max,
        ))
    }

    /// Detection overlay of the report's intensity raster.
    pub fn render_overlay(&self, report: &ScanReport) -> RgbaImage {
        let (min, max) = self.presenter.overlay_range(report.evaluation.sensitivity);
        overlay_image(
            &report.evaluation.intensity,
            self.presenter.ramp(),
            min,
            max,
        )
    }
}
