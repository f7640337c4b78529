//! Turns an evaluation into what the operator sees: metrics, map layers and a
//! CSV of candidate targets.

use crate::band::SpectralBand;
use crate::config::DisplayConfig;
use crate::error::{Result, ScanError};
use crate::evaluator::{CandidateTarget, SpectralEvaluation};
use crate::geo::GeoPoint;
use crate::imagery::SceneDescriptor;
use log::debug;
use serde::{Deserialize, Serialize};

/// File name offered for the target table
pub const EXPORT_FILENAME: &str = "Relatorio_Geospectra.csv";

/// Capture date format shown to the operator
pub const DISPLAY_DATE_FORMAT: &str = "%d/%m/%Y";

/// Basemap drawn under the layers
pub const DEFAULT_BASEMAP: &str = "HYBRID";

/// Linear colour ramp through evenly spaced stops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorRamp {
    pub stops: Vec<[u8; 3]>,
}

impl ColorRamp {
    /// Blue, yellow, red
    pub fn detection() -> Self {
        Self {
            stops: vec![[0, 0, 255], [255, 255, 0], [255, 0, 0]],
        }
    }

    /// Colour for `value` on a ramp from `min` to `max`. Values outside are clamped.
    pub fn color_at(&self, value: f64, min: f64, max: f64) -> [u8; 3] {
        match self.stops.len() {
            0 => return [0, 0, 0],
            1 => return self.stops[0],
            _ => {}
        }

        let t = if max > min {
            ((value - min) / (max - min)).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let t = if t.is_nan() { 0.0 } else { t };

        let segments = (self.stops.len() - 1) as f64;
        let position = t * segments;
        let lower = (position.floor() as usize).min(self.stops.len() - 2);
        let frac = position - lower as f64;

        let a = self.stops[lower];
        let b = self.stops[lower + 1];
        let mut out = [0u8; 3];
        for i in 0..3 {
            let channel = a[i] as f64 + (b[i] as f64 - a[i] as f64) * frac;
            out[i] = channel.round().clamp(0.0, 255.0) as u8;
        }
        out
    }

    /// Stops as `#rrggbb` strings
    pub fn hex_palette(&self) -> Vec<String> {
        self.stops
            .iter()
            .map(|[r, g, b]| format!("#{r:02x}{g:02x}{b:02x}"))
            .collect()
    }
}

/// Description of one map layer for an external renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MapLayer {
    /// False-colour composite of three bands stretched from 0 to `max`
    SatelliteComposite {
        name: String,
        bands: [SpectralBand; 3],
        min: f64,
        max: f64,
    },
    /// Detection intensity coloured from `min` to `max`
    Detection {
        name: String,
        min: f64,
        max: f64,
        palette: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapView {
    pub center: GeoPoint,
    pub zoom: u8,
    pub basemap: String,
}

/// CSV of candidate targets, ready to be saved or offered for download.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetExport {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl TargetExport {
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.bytes).ok()
    }
}

/// Everything needed to show a scan result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PresentationBundle {
    pub mineral: String,
    pub target_count: usize,
    /// Capture date as dd/mm/YYYY
    pub capture_date: String,
    pub scene_id: String,
    pub cloud_cover_percent: f64,
    pub map: MapView,
    pub layers: Vec<MapLayer>,
    /// Present only when there is at least one target
    #[serde(skip)]
    pub export: Option<TargetExport>,
}

impl PresentationBundle {
    /// Layers and view as pretty JSON
    pub fn layers_json(&self) -> Result<String> {
        #[derive(Serialize)]
        struct LayerDocument<'a> {
            map: &'a MapView,
            layers: &'a [MapLayer],
        }
        serde_json::to_string_pretty(&LayerDocument {
            map: &self.map,
            layers: &self.layers,
        })
        .map_err(|e| ScanError::Export(e.to_string()))
    }
}

#[derive(Serialize)]
struct TargetRow {
    #[serde(rename = "RK")]
    rank: usize,
    #[serde(rename = "INT")]
    intensity: f64,
    #[serde(rename = "LAT")]
    latitude: f64,
    #[serde(rename = "LON")]
    longitude: f64,
}

impl From<&CandidateTarget> for TargetRow {
    fn from(target: &CandidateTarget) -> Self {
        Self {
            rank: target.rank,
            intensity: target.intensity,
            latitude: target.latitude,
            longitude: target.longitude,
        }
    }
}

/// Serialise targets as UTF-8 CSV with a `RK,INT,LAT,LON` header.
pub fn targets_to_csv(targets: &[CandidateTarget]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for target in targets {
        writer
            .serialize(TargetRow::from(target))
            .map_err(|e| ScanError::Export(e.to_string()))?;
    }
    writer
        .into_inner()
        .map_err(|e| ScanError::Export(e.to_string()))
}

/// Builds presentation bundles from evaluations.
#[derive(Debug, Clone, Default)]
pub struct Presenter {
    display: DisplayConfig,
    ramp: ColorRamp,
}

impl Default for ColorRamp {
    fn default() -> Self {
        Self::detection()
    }
}

impl Presenter {
    pub fn new(display: DisplayConfig) -> Self {
        Self {
            display,
            ramp: ColorRamp::detection(),
        }
    }

    pub fn display(&self) -> &DisplayConfig {
        &self.display
    }

    pub fn ramp(&self) -> &ColorRamp {
        &self.ramp
    }

    /// Overlay range for an evaluation: sensitivity up to sensitivity plus span
    pub fn overlay_range(&self, sensitivity: f64) -> (f64, f64) {
        (sensitivity, sensitivity + self.display.overlay_span)
    }

    /// Build the bundle for `evaluation` of `scene`, centred on `center`.
    pub fn present(
        &self,
        evaluation: &SpectralEvaluation,
        scene: &SceneDescriptor,
        center: GeoPoint,
    ) -> Result<PresentationBundle> {
        let (min, max) = self.overlay_range(evaluation.sensitivity);
        let layers = vec![
            MapLayer::SatelliteComposite {
                name: "Satellite".to_string(),
                bands: self.display.composite_bands,
                min: 0.0,
                max: self.display.composite_max,
            },
            MapLayer::Detection {
                name: evaluation.mineral.clone(),
                min,
                max,
                palette: self.ramp.hex_palette(),
            },
        ];

        let export = if evaluation.has_targets() {
            Some(TargetExport {
                filename: EXPORT_FILENAME.to_string(),
                bytes: targets_to_csv(&evaluation.targets)?,
            })
        } else {
            None
        };
        debug!(
            "Presenting {} targets, export {}",
            evaluation.target_count(),
            if export.is_some() { "attached" } else { "omitted" }
        );

        Ok(PresentationBundle {
            mineral: evaluation.mineral.clone(),
            target_count: evaluation.target_count(),
            capture_date: scene.captured_at.format(DISPLAY_DATE_FORMAT).to_string(),
            scene_id: scene.id.clone(),
            cloud_cover_percent: scene.cloud_cover_percent,
            map: MapView {
                center,
                zoom: self.display.map_zoom,
                basemap: DEFAULT_BASEMAP.to_string(),
            },
            layers,
            export,
        })
    }
}
