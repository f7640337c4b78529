//! Imagery archive stored on disk.
//!
//! Layout:
//!
//! ```text
//! <root>/catalog.json
//! <root>/<scene>/B2.png ...    16-bit grayscale, one file per band
//! ```
//!
//! `catalog.json` lists every scene with its metadata and the band files,
//! relative to the root:
//!
//! ```json
//! {
//!   "scenes": [{
//!     "id": "S2A_MSIL2A_20240812",
//!     "captured_at": "2024-08-12T13:40:00Z",
//!     "cloud_cover_percent": 8.5,
//!     "footprint": {"west": -50.08, "south": -6.697, "east": -49.68, "north": -6.297},
//!     "nodata": 0,
//!     "bands": {"B2": "S2A_MSIL2A_20240812/B2.png"}
//!   }]
//! }
//! ```

use log::{debug, info, warn};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use spectra::imagery::{BandImage, ImageryArchive, ImageryError, SceneDescriptor};
use spectra::{BoundingBox, GeoTransform, SpectralBand};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const CATALOG_FILE: &str = "catalog.json";

/// Catalog entry for one scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogScene {
    #[serde(flatten)]
    pub descriptor: SceneDescriptor,
    /// Sample value marking missing data
    #[serde(default)]
    pub nodata: u16,
    pub bands: BTreeMap<SpectralBand, PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub scenes: Vec<CatalogScene>,
}

impl Catalog {
    pub fn save_to_file(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, json)
    }

    pub fn load_from_file(path: &Path) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}

/// Archive backed by a directory with a `catalog.json`.
#[derive(Debug, Clone)]
pub struct DirectoryArchive {
    root: PathBuf,
    catalog: Catalog,
}

impl DirectoryArchive {
    /// Open the archive rooted at `root`, reading its catalog once.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, ImageryError> {
        let root = root.into();
        let catalog_path = root.join(CATALOG_FILE);
        let catalog = Catalog::load_from_file(&catalog_path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::InvalidData {
                ImageryError::Decode(format!("{}: {e}", catalog_path.display()))
            } else {
                ImageryError::Io(e)
            }
        })?;
        info!(
            "Opened archive {} with {} scenes",
            root.display(),
            catalog.scenes.len()
        );
        Ok(Self { root, catalog })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    fn scene(&self, scene_id: &str) -> Result<&CatalogScene, ImageryError> {
        self.catalog
            .scenes
            .iter()
            .find(|s| s.descriptor.id == scene_id)
            .ok_or_else(|| ImageryError::UnknownScene(scene_id.to_string()))
    }
}

/// Decode a 16-bit grayscale band file. Samples equal to `nodata` become NaN.
pub fn load_band_file(path: &Path, nodata: u16) -> Result<Array2<f64>, ImageryError> {
    let img = image::open(path)
        .map_err(|e| ImageryError::Decode(format!("{}: {e}", path.display())))?
        .into_luma16();

    let (width, height) = img.dimensions();
    let mut data = Array2::<f64>::zeros((height as usize, width as usize));
    for (x, y, pixel) in img.enumerate_pixels() {
        let value = pixel[0];
        data[[y as usize, x as usize]] = if value == nodata {
            f64::NAN
        } else {
            value as f64
        };
    }
    Ok(data)
}

impl ImageryArchive for DirectoryArchive {
    fn query_scenes(
        &self,
        bounds: &BoundingBox,
        max_cloud_cover_percent: f64,
    ) -> Result<Vec<SceneDescriptor>, ImageryError> {
        let found: Vec<SceneDescriptor> = self
            .catalog
            .scenes
            .iter()
            .map(|s| &s.descriptor)
            .filter(|d| d.footprint.intersects(bounds))
            .filter(|d| d.cloud_cover_percent < max_cloud_cover_percent)
            .cloned()
            .collect();
        debug!(
            "{} of {} scenes match the query",
            found.len(),
            self.catalog.scenes.len()
        );
        Ok(found)
    }

    fn band(&self, scene_id: &str, band: SpectralBand) -> Result<Option<BandImage>, ImageryError> {
        let scene = self.scene(scene_id)?;
        let Some(relative) = scene.bands.get(&band) else {
            return Ok(None);
        };

        let path = self.root.join(relative);
        if !path.exists() {
            warn!(
                "Catalog lists {band} for {scene_id} but {} is missing",
                path.display()
            );
            return Ok(None);
        }

        let data = load_band_file(&path, scene.nodata)?;
        let (rows, cols) = data.dim();
        Ok(Some(BandImage {
            data,
            transform: GeoTransform::from_footprint(&scene.descriptor.footprint, rows, cols),
        }))
    }

    fn descriptor(&self, scene_id: &str) -> Result<Option<SceneDescriptor>, ImageryError> {
        Ok(self.scene(scene_id).ok().map(|s| s.descriptor.clone()))
    }
}
