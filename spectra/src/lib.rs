//! Band-ratio mineral target detection on multispectral satellite imagery
//!
//! A scan resolves a locality to a region, picks the most recent clear
//! Sentinel-2 capture over it, computes a mineral's band ratio with dense
//! vegetation excluded, and samples the detections into ranked candidate
//! targets ready for display and export.

pub mod band;
pub mod config;
pub mod config_storage;
pub mod error;
pub mod evaluator;
pub mod geo;
pub mod geocoding;
pub mod imagery;
pub mod minerals;
pub mod pipeline;
pub mod presenter;
pub mod raster;
pub mod render;
pub mod selection;
pub mod test_util;

pub use band::SpectralBand;
pub use config::ScanConfig;
pub use config_storage::ConfigStorage;
pub use error::{Result, ScanError};
pub use evaluator::{CandidateTarget, SpectralEvaluation, SpectralEvaluator};
pub use geo::{BoundingBox, GeoPoint, RegionOfInterest};
pub use geocoding::{AreaResolver, GeocodeError, Geocoder};
pub use imagery::{BandImage, ImageryArchive, ImageryError, InMemoryArchive, SceneDescriptor};
pub use minerals::{MineralRegistry, MineralSignature};
pub use pipeline::{ScanReport, ScanRequest, Scanner};
pub use presenter::{PresentationBundle, Presenter};
pub use raster::{GeoTransform, MaskedRaster};
pub use selection::{MostRecentClear, SceneSelector};
