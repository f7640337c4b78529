//! Fixtures for tests: fixed geocoders and synthetic Sentinel-2 scenes.

use crate::band::SpectralBand;
use crate::geo::{BoundingBox, GeoPoint};
use crate::geocoding::{GeocodeError, Geocoder};
use crate::imagery::SceneDescriptor;
use chrono::{DateTime, TimeZone, Utc};
use ndarray::{s, Array2};
use std::collections::HashMap;
use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};

pub const CARAJAS: &str = "Canaã dos Carajás, PA";

pub fn carajas_center() -> GeoPoint {
    GeoPoint {
        latitude: -6.497,
        longitude: -49.880,
    }
}

/// Geocoder answering from a fixed table and counting calls.
#[derive(Debug, Default)]
pub struct StaticGeocoder {
    places: HashMap<String, GeoPoint>,
    calls: AtomicUsize,
}

impl StaticGeocoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Knows only Canaã dos Carajás
    pub fn carajas() -> Self {
        Self::new().with_place(CARAJAS, carajas_center())
    }

    pub fn with_place(mut self, name: &str, point: GeoPoint) -> Self {
        self.places.insert(name.to_string(), point);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl Geocoder for StaticGeocoder {
    fn geocode(&self, query: &str) -> Result<Option<GeoPoint>, GeocodeError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Ok(self.places.get(query).copied())
    }
}

/// Geocoder that always fails.
#[derive(Debug)]
pub struct FailingGeocoder {
    status: Option<u16>,
}

impl FailingGeocoder {
    pub fn timing_out() -> Self {
        Self { status: None }
    }

    pub fn server_error(status: u16) -> Self {
        Self {
            status: Some(status),
        }
    }
}

impl Geocoder for FailingGeocoder {
    fn geocode(&self, _query: &str) -> Result<Option<GeoPoint>, GeocodeError> {
        Err(match self.status {
            Some(status) => GeocodeError::ServerError { status },
            None => GeocodeError::Timeout,
        })
    }
}

/// Builds a scene whose bands are uniform except for rectangular patches.
#[derive(Debug, Clone)]
pub struct SceneBuilder {
    descriptor: SceneDescriptor,
    bands: HashMap<SpectralBand, Array2<f64>>,
}

impl SceneBuilder {
    /// Every band starts at a reflectance of 1000
    pub fn new(
        id: &str,
        captured_at: DateTime<Utc>,
        footprint: BoundingBox,
        dim: (usize, usize),
    ) -> Self {
        let bands = SpectralBand::ALL
            .iter()
            .map(|&band| (band, Array2::from_elem(dim, 1000.0)))
            .collect();
        Self {
            descriptor: SceneDescriptor {
                id: id.to_string(),
                captured_at,
                cloud_cover_percent: 0.0,
                footprint,
            },
            bands,
        }
    }

    pub fn cloud_cover(mut self, percent: f64) -> Self {
        self.descriptor.cloud_cover_percent = percent;
        self
    }

    pub fn fill(mut self, band: SpectralBand, value: f64) -> Self {
        if let Some(data) = self.bands.get_mut(&band) {
            data.fill(value);
        }
        self
    }

    pub fn patch(
        mut self,
        band: SpectralBand,
        rows: Range<usize>,
        cols: Range<usize>,
        value: f64,
    ) -> Self {
        if let Some(data) = self.bands.get_mut(&band) {
            data.slice_mut(s![rows, cols]).fill(value);
        }
        self
    }

    /// Replace `band` with a nearest-neighbour copy on a `dim` grid over the
    /// same footprint, as a coarser-resolution band would be stored.
    pub fn coarsen(mut self, band: SpectralBand, dim: (usize, usize)) -> Self {
        let coarse = self.bands.get(&band).map(|data| {
            let (rows, cols) = data.dim();
            Array2::from_shape_fn(dim, |(r, c)| data[[r * rows / dim.0, c * cols / dim.1]])
        });
        if let Some(coarse) = coarse {
            self.bands.insert(band, coarse);
        }
        self
    }

    pub fn without_band(mut self, band: SpectralBand) -> Self {
        self.bands.remove(&band);
        self
    }

    pub fn build(self) -> (SceneDescriptor, HashMap<SpectralBand, Array2<f64>>) {
        (self.descriptor, self.bands)
    }
}

/// Size of the synthetic Carajás scenes; pixels are 0.001 degrees
pub const CARAJAS_SCENE_DIM: (usize, usize) = (400, 400);

/// Rows and columns of the bare outcrop at the scene centre
pub const OUTCROP: (Range<usize>, Range<usize>) = (190..210, 190..210);

/// Rows and columns of the forest with the same band ratio as the outcrop
pub const CANOPY: (Range<usize>, Range<usize>) = (150..170, 190..210);

/// Ratio of B11 to B2 on the outcrop and under the canopy
pub const OUTCROP_RATIO: f64 = 3.0;

/// Synthetic capture around Canaã dos Carajás, taken on the given August 2024 day.
///
/// Background ratio B11/B2 is 1.0 on moderately vegetated ground. A 20 x 20
/// bare outcrop at the centre has B11/B2 = 3.0 and NDVI near 0.09. A forest
/// patch just north shares the ratio but has NDVI near 0.78.
pub fn carajas_scene(id: &str, day: u32) -> SceneBuilder {
    let center = carajas_center();
    let footprint = BoundingBox::new(
        center.longitude - 0.2,
        center.latitude - 0.2,
        center.longitude + 0.2,
        center.latitude + 0.2,
    );
    let captured_at = Utc
        .with_ymd_and_hms(2024, 8, day, 13, 40, 0)
        .single()
        .unwrap_or_else(Utc::now);

    let (outcrop_rows, outcrop_cols) = OUTCROP;
    let (canopy_rows, canopy_cols) = CANOPY;

    SceneBuilder::new(id, captured_at, footprint, CARAJAS_SCENE_DIM)
        .fill(SpectralBand::B8, 2000.0)
        .fill(SpectralBand::B4, 1000.0)
        .patch(SpectralBand::B11, outcrop_rows.clone(), outcrop_cols.clone(), 3000.0)
        .patch(SpectralBand::B8, outcrop_rows, outcrop_cols, 1200.0)
        .patch(SpectralBand::B11, canopy_rows.clone(), canopy_cols.clone(), 3000.0)
        .patch(SpectralBand::B8, canopy_rows.clone(), canopy_cols.clone(), 4000.0)
        .patch(SpectralBand::B4, canopy_rows, canopy_cols, 500.0)
}
