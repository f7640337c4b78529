//! Scene selection: pick the one capture a scan is evaluated on.

use crate::band::SpectralBand;
use crate::error::{Result, ScanError};
use crate::geo::{BoundingBox, RegionOfInterest};
use crate::imagery::{BandImage, ImageryArchive, SceneDescriptor};
use chrono::{DateTime, Utc};
use log::{debug, info};

/// Default upper bound (exclusive) on scene cloud cover, in percent
pub const DEFAULT_MAX_CLOUD_COVER_PERCENT: f64 = 20.0;

/// Selection strategy: the latest capture with cloud cover below a bound.
///
/// Captures with equal timestamps are ordered by scene id and the smallest id
/// wins, so the choice never depends on archive ordering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MostRecentClear {
    pub max_cloud_cover_percent: f64,
}

impl MostRecentClear {
    pub fn new(max_cloud_cover_percent: f64) -> Self {
        Self {
            max_cloud_cover_percent,
        }
    }

    /// Choose among `candidates` covering `bounds`.
    ///
    /// The footprint and cloud bounds are checked again here rather than
    /// trusting the archive's filtering.
    pub fn choose<'a>(
        &self,
        candidates: &'a [SceneDescriptor],
        bounds: &BoundingBox,
    ) -> Option<&'a SceneDescriptor> {
        candidates
            .iter()
            .filter(|d| d.cloud_cover_percent < self.max_cloud_cover_percent)
            .filter(|d| d.footprint.intersects(bounds))
            .min_by(|a, b| {
                b.captured_at
                    .cmp(&a.captured_at)
                    .then_with(|| a.id.cmp(&b.id))
            })
    }
}

impl Default for MostRecentClear {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CLOUD_COVER_PERCENT)
    }
}

/// Queries an archive and applies the selection strategy.
#[derive(Debug, Clone)]
pub struct SceneSelector<A> {
    archive: A,
    policy: MostRecentClear,
}

impl<A: ImageryArchive> SceneSelector<A> {
    pub fn new(archive: A, policy: MostRecentClear) -> Self {
        Self { archive, policy }
    }

    pub fn policy(&self) -> &MostRecentClear {
        &self.policy
    }

    pub fn archive(&self) -> &A {
        &self.archive
    }

    /// Select the scene for `region`, clipped to its bounding box.
    ///
    /// Every call queries the archive; nothing is cached between scans.
    pub fn select(&self, region: &RegionOfInterest) -> Result<SceneSelection<'_, A>> {
        let bounds = region.bounding_box();
        let candidates = self
            .archive
            .query_scenes(&bounds, self.policy.max_cloud_cover_percent)
            .map_err(|e| ScanError::Imagery(e.to_string()))?;
        debug!("Archive returned {} candidate scenes", candidates.len());

        let chosen = self
            .policy
            .choose(&candidates, &bounds)
            .cloned()
            .ok_or(ScanError::NoSceneAvailable {
                max_cloud_cover_percent: self.policy.max_cloud_cover_percent,
            })?;

        info!(
            "Selected scene {} captured {} ({:.1}% cloud)",
            chosen.id, chosen.captured_at, chosen.cloud_cover_percent
        );

        Ok(SceneSelection {
            archive: &self.archive,
            descriptor: chosen,
            clip: bounds,
        })
    }
}

impl<A: ImageryArchive> SceneSelector<A> {
    /// Re-open a known scene clipped to `region`, bypassing the policy.
    ///
    /// Used to render layers for an earlier report.
    pub fn select_by_id(
        &self,
        scene_id: &str,
        region: &RegionOfInterest,
    ) -> Result<SceneSelection<'_, A>> {
        let descriptor = self
            .archive
            .descriptor(scene_id)
            .map_err(|e| ScanError::Imagery(e.to_string()))?
            .ok_or_else(|| ScanError::Imagery(format!("unknown scene {scene_id}")))?;
        Ok(SceneSelection::new(
            &self.archive,
            descriptor,
            region.bounding_box(),
        ))
    }
}

/// The chosen capture, clipped to a region.
///
/// Acts as the handle through which the evaluator reads bands; every band
/// comes back cropped to the same bounds.
pub struct SceneSelection<'a, A> {
    archive: &'a A,
    descriptor: SceneDescriptor,
    clip: BoundingBox,
}

impl<'a, A: ImageryArchive> SceneSelection<'a, A> {
    /// Wrap an already chosen scene. Used when the caller does its own selection.
    pub fn new(archive: &'a A, descriptor: SceneDescriptor, clip: BoundingBox) -> Self {
        Self {
            archive,
            descriptor,
            clip,
        }
    }

    pub fn descriptor(&self) -> &SceneDescriptor {
        &self.descriptor
    }

    pub fn scene_id(&self) -> &str {
        &self.descriptor.id
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.descriptor.captured_at
    }

    pub fn cloud_cover_percent(&self) -> f64 {
        self.descriptor.cloud_cover_percent
    }

    /// Bounds every band is clipped to
    pub fn clip_bounds(&self) -> &BoundingBox {
        &self.clip
    }

    /// Read `band` cropped to the clip bounds.
    ///
    /// Fails with `BandUnavailable` when the scene lacks the band.
    pub fn band(&self, band: SpectralBand) -> Result<BandImage> {
        let full = self
            .archive
            .band(&self.descriptor.id, band)
            .map_err(|e| ScanError::Imagery(e.to_string()))?
            .ok_or_else(|| ScanError::BandUnavailable {
                scene_id: self.descriptor.id.clone(),
                band,
            })?;

        let window = full.transform.window(full.dim(), &self.clip).ok_or_else(|| {
            ScanError::Imagery(format!(
                "band {band} of scene {} does not cover the region",
                self.descriptor.id
            ))
        })?;

        Ok(BandImage {
            data: window.crop(full.data.view()),
            transform: full.transform.cropped(&window),
        })
    }
}
