//! Imagery archive collaborator.
//!
//! The archive answers two questions: which scenes intersect an area below a
//! cloud cover bound, and what a given band of a scene looks like. Storage and
//! transport are up to the implementation.

use crate::band::SpectralBand;
use crate::geo::BoundingBox;
use crate::raster::{resample_nearest, GeoTransform};
use chrono::{DateTime, Utc};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Metadata of one satellite capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneDescriptor {
    /// Archive identifier, also the selection tie-break key
    pub id: String,
    /// Acquisition time
    pub captured_at: DateTime<Utc>,
    /// Percentage of the scene obscured by clouds
    pub cloud_cover_percent: f64,
    /// Geographic extent of the capture
    pub footprint: BoundingBox,
}

/// One band of a scene. NaN marks missing data.
#[derive(Debug, Clone, PartialEq)]
pub struct BandImage {
    pub data: Array2<f64>,
    pub transform: GeoTransform,
}

impl BandImage {
    pub fn dim(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// This band on the `dim` grid of `transform`, by nearest neighbour.
    ///
    /// Returns `None` when the pixel sizes are not whole multiples of each other.
    pub fn align_to(&self, transform: &GeoTransform, dim: (usize, usize)) -> Option<Array2<f64>> {
        if self.transform == *transform && self.dim() == dim {
            return Some(self.data.clone());
        }
        if !self.transform.is_commensurate(transform) {
            return None;
        }
        Some(resample_nearest(self.data.view(), &self.transform, transform, dim))
    }
}

/// Failure inside an archive implementation.
#[derive(Debug, thiserror::Error)]
pub enum ImageryError {
    #[error("Unknown scene: {0}")]
    UnknownScene(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Decode error: {0}")]
    Decode(String),
}

/// Source of scenes and band rasters.
pub trait ImageryArchive {
    /// Scenes whose footprint intersects `bounds` with cloud cover strictly
    /// below `max_cloud_cover_percent`. Order is unspecified.
    fn query_scenes(
        &self,
        bounds: &BoundingBox,
        max_cloud_cover_percent: f64,
    ) -> Result<Vec<SceneDescriptor>, ImageryError>;

    /// Full raster of `band`, or `None` when the scene does not carry it.
    fn band(&self, scene_id: &str, band: SpectralBand) -> Result<Option<BandImage>, ImageryError>;

    /// Metadata of one scene, or `None` when the archive does not know it.
    fn descriptor(&self, scene_id: &str) -> Result<Option<SceneDescriptor>, ImageryError>;
}

impl<A: ImageryArchive + ?Sized> ImageryArchive for &A {
    fn query_scenes(
        &self,
        bounds: &BoundingBox,
        max_cloud_cover_percent: f64,
    ) -> Result<Vec<SceneDescriptor>, ImageryError> {
        (**self).query_scenes(bounds, max_cloud_cover_percent)
    }

    fn band(&self, scene_id: &str, band: SpectralBand) -> Result<Option<BandImage>, ImageryError> {
        (**self).band(scene_id, band)
    }

    fn descriptor(&self, scene_id: &str) -> Result<Option<SceneDescriptor>, ImageryError> {
        (**self).descriptor(scene_id)
    }
}

struct StoredScene {
    descriptor: SceneDescriptor,
    bands: HashMap<SpectralBand, Array2<f64>>,
}

/// Archive held entirely in memory.
///
/// Band rasters are spread evenly over the scene footprint. Queries are
/// counted so callers can verify whether the archive was consulted.
#[derive(Default)]
pub struct InMemoryArchive {
    scenes: Vec<StoredScene>,
    queries: AtomicUsize,
}

impl InMemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a scene with its band rasters
    pub fn add_scene(
        &mut self,
        descriptor: SceneDescriptor,
        bands: HashMap<SpectralBand, Array2<f64>>,
    ) {
        self.scenes.push(StoredScene { descriptor, bands });
    }

    /// Builder form of [`InMemoryArchive::add_scene`]
    pub fn with_scene(
        mut self,
        descriptor: SceneDescriptor,
        bands: HashMap<SpectralBand, Array2<f64>>,
    ) -> Self {
        self.add_scene(descriptor, bands);
        self
    }

    /// Number of `query_scenes` calls so far
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }
}

impl ImageryArchive for InMemoryArchive {
    fn query_scenes(
        &self,
        bounds: &BoundingBox,
        max_cloud_cover_percent: f64,
    ) -> Result<Vec<SceneDescriptor>, ImageryError> {
        self.queries.fetch_add(1, Ordering::Relaxed);
        Ok(self
            .scenes
            .iter()
            .map(|scene| &scene.descriptor)
            .filter(|d| d.footprint.intersects(bounds))
            .filter(|d| d.cloud_cover_percent < max_cloud_cover_percent)
            .cloned()
            .collect())
    }

    fn band(&self, scene_id: &str, band: SpectralBand) -> Result<Option<BandImage>, ImageryError> {
        let scene = self
            .scenes
            .iter()
            .find(|s| s.descriptor.id == scene_id)
            .ok_or_else(|| ImageryError::UnknownScene(scene_id.to_string()))?;

        Ok(scene.bands.get(&band).map(|data| {
            let (rows, cols) = data.dim();
            BandImage {
                data: data.clone(),
                transform: GeoTransform::from_footprint(&scene.descriptor.footprint, rows, cols),
            }
        }))
    }

    fn descriptor(&self, scene_id: &str) -> Result<Option<SceneDescriptor>, ImageryError> {
        Ok(self
            .scenes
            .iter()
            .map(|s| &s.descriptor)
            .find(|d| d.id == scene_id)
            .cloned())
    }
}
