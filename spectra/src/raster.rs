//! Georeferenced rasters.
//!
//! Bands arrive as plain `Array2<f64>` (NaN marks missing data) with a
//! north-up [`GeoTransform`]. Derived products are [`MaskedRaster`]s, where a
//! pixel either carries a value or is absent; absence is never encoded as zero.

use crate::geo::{BoundingBox, GeoPoint, METERS_PER_DEGREE};
use ndarray::{s, Array2, ArrayView2, Zip};
use serde::{Deserialize, Serialize};

/// Affine mapping from pixel indices to geographic coordinates.
///
/// Row 0 is the northern edge and column 0 the western edge. Pixel sizes are
/// positive and expressed in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    /// Longitude of the western edge of column 0
    pub west: f64,
    /// Latitude of the northern edge of row 0
    pub north: f64,
    /// Pixel width in degrees of longitude
    pub pixel_width_deg: f64,
    /// Pixel height in degrees of latitude
    pub pixel_height_deg: f64,
}

impl GeoTransform {
    /// Transform that spreads `rows` x `cols` pixels evenly over `footprint`
    pub fn from_footprint(footprint: &BoundingBox, rows: usize, cols: usize) -> Self {
        Self {
            west: footprint.west,
            north: footprint.north,
            pixel_width_deg: footprint.width_deg() / cols.max(1) as f64,
            pixel_height_deg: footprint.height_deg() / rows.max(1) as f64,
        }
    }

    /// Geographic centre of pixel (row, col)
    pub fn pixel_center(&self, row: usize, col: usize) -> GeoPoint {
        GeoPoint {
            latitude: self.north - (row as f64 + 0.5) * self.pixel_height_deg,
            longitude: self.west + (col as f64 + 0.5) * self.pixel_width_deg,
        }
    }

    /// Approximate ground size of one pixel along the meridian, in metres
    pub fn pixel_size_m(&self) -> f64 {
        self.pixel_height_deg * METERS_PER_DEGREE
    }

    /// Extent covered by a raster of `dim` = (rows, cols)
    pub fn extent(&self, dim: (usize, usize)) -> BoundingBox {
        let (rows, cols) = dim;
        BoundingBox {
            west: self.west,
            south: self.north - rows as f64 * self.pixel_height_deg,
            east: self.west + cols as f64 * self.pixel_width_deg,
            north: self.north,
        }
    }

    /// Pixel window of a `dim` raster that covers `bounds`.
    ///
    /// Partially covered edge pixels are included. Returns `None` when the
    /// window would be empty.
    pub fn window(&self, dim: (usize, usize), bounds: &BoundingBox) -> Option<PixelWindow> {
        let (rows, cols) = dim;
        if !(self.pixel_width_deg > 0.0 && self.pixel_height_deg > 0.0) {
            return None;
        }

        let clamp = |value: f64, max: usize| value.clamp(0.0, max as f64) as usize;

        let col_start = clamp(((bounds.west - self.west) / self.pixel_width_deg).floor(), cols);
        let col_end = clamp(((bounds.east - self.west) / self.pixel_width_deg).ceil(), cols);
        let row_start = clamp(((self.north - bounds.north) / self.pixel_height_deg).floor(), rows);
        let row_end = clamp(((self.north - bounds.south) / self.pixel_height_deg).ceil(), rows);

        if row_start >= row_end || col_start >= col_end {
            return None;
        }

        Some(PixelWindow {
            row_start,
            row_end,
            col_start,
            col_end,
        })
    }

    /// Pixel of a `dim` raster containing `point`, if any
    pub fn pixel_at(&self, dim: (usize, usize), point: &GeoPoint) -> Option<(usize, usize)> {
        let (rows, cols) = dim;
        let col = ((point.longitude - self.west) / self.pixel_width_deg).floor();
        let row = ((self.north - point.latitude) / self.pixel_height_deg).floor();
        if !(row >= 0.0 && col >= 0.0 && row < rows as f64 && col < cols as f64) {
            return None;
        }
        Some((row as usize, col as usize))
    }

    /// True when each pixel size of one grid is a whole multiple of the other's.
    ///
    /// Sentinel-2 grids (10, 20 and 60 m) always qualify.
    pub fn is_commensurate(&self, other: &GeoTransform) -> bool {
        whole_ratio(self.pixel_width_deg, other.pixel_width_deg)
            && whole_ratio(self.pixel_height_deg, other.pixel_height_deg)
    }

    /// Transform of the sub-raster starting at the window's top-left pixel
    pub fn cropped(&self, window: &PixelWindow) -> Self {
        Self {
            west: self.west + window.col_start as f64 * self.pixel_width_deg,
            north: self.north - window.row_start as f64 * self.pixel_height_deg,
            ..*self
        }
    }
}

fn whole_ratio(a: f64, b: f64) -> bool {
    const TOLERANCE: f64 = 1e-6;
    let ratio = a.max(b) / a.min(b);
    (ratio - ratio.round()).abs() <= TOLERANCE * ratio
}

/// Nearest-neighbour resampling of `data`, georeferenced by `from`, onto the
/// `dim` grid of `to`.
///
/// Target pixels whose centre falls outside the source raster are NaN.
pub fn resample_nearest(
    data: ArrayView2<f64>,
    from: &GeoTransform,
    to: &GeoTransform,
    dim: (usize, usize),
) -> Array2<f64> {
    let source_dim = data.dim();
    let mut out = Array2::from_elem(dim, f64::NAN);
    Zip::indexed(&mut out).par_for_each(|(row, col), value| {
        if let Some((r, c)) = from.pixel_at(source_dim, &to.pixel_center(row, col)) {
            *value = data[[r, c]];
        }
    });
    out
}

/// Mark pixels whose centre lies outside `bounds` as missing (NaN)
pub fn clear_outside(data: &mut Array2<f64>, transform: &GeoTransform, bounds: &BoundingBox) {
    Zip::indexed(data).par_for_each(|(row, col), value| {
        if !bounds.contains(&transform.pixel_center(row, col)) {
            *value = f64::NAN;
        }
    });
}

/// Half-open pixel window `[row_start, row_end) x [col_start, col_end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelWindow {
    pub row_start: usize,
    pub row_end: usize,
    pub col_start: usize,
    pub col_end: usize,
}

impl PixelWindow {
    /// (rows, cols) of the window
    pub fn dim(&self) -> (usize, usize) {
        (self.row_end - self.row_start, self.col_end - self.col_start)
    }

    /// Copy the window out of `data`
    pub fn crop(&self, data: ArrayView2<f64>) -> Array2<f64> {
        data.slice(s![self.row_start..self.row_end, self.col_start..self.col_end])
            .to_owned()
    }
}

/// Raster whose pixels may be absent.
///
/// Equality compares the masks and the present values only.
#[derive(Debug, Clone)]
pub struct MaskedRaster {
    values: Array2<f64>,
    mask: Array2<bool>,
}

impl PartialEq for MaskedRaster {
    fn eq(&self, other: &Self) -> bool {
        self.mask == other.mask && self.iter_valid().eq(other.iter_valid())
    }
}

impl MaskedRaster {
    /// Pair values with a validity mask of the same shape.
    ///
    /// # Panics
    /// Panics if the shapes differ.
    pub fn new(values: Array2<f64>, mask: Array2<bool>) -> Self {
        assert_eq!(
            values.dim(),
            mask.dim(),
            "values and mask must have the same shape"
        );
        Self { values, mask }
    }

    /// Build from optional per-pixel values, computed in parallel.
    pub fn from_options(options: &Array2<Option<f64>>) -> Self {
        let values = Zip::from(options).par_map_collect(|v| v.unwrap_or(f64::NAN));
        let mask = Zip::from(options).par_map_collect(|v| v.is_some());
        Self { values, mask }
    }

    /// (rows, cols)
    pub fn dim(&self) -> (usize, usize) {
        self.values.dim()
    }

    /// Value at (row, col), `None` when absent or out of bounds
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        match self.mask.get((row, col)) {
            Some(true) => self.values.get((row, col)).copied(),
            _ => None,
        }
    }

    pub fn mask(&self) -> ArrayView2<'_, bool> {
        self.mask.view()
    }

    /// Raw values. Entries under a false mask are unspecified.
    pub fn values(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }

    /// Number of pixels carrying a value
    pub fn valid_count(&self) -> usize {
        self.mask.iter().filter(|&&m| m).count()
    }

    /// Restrict to pixels where `mask` is also true.
    ///
    /// # Panics
    /// Panics if the shapes differ.
    pub fn update_mask(&self, mask: ArrayView2<bool>) -> Self {
        assert_eq!(self.dim(), mask.dim(), "mask shape mismatch");
        let combined = Zip::from(&self.mask)
            .and(mask)
            .par_map_collect(|&a, &b| a && b);
        Self {
            values: self.values.clone(),
            mask: combined,
        }
    }

    /// Present pixels as ((row, col), value) in row-major order
    pub fn iter_valid(&self) -> impl Iterator<Item = ((usize, usize), f64)> + '_ {
        self.values
            .indexed_iter()
            .zip(self.mask.iter())
            .filter(|(_, valid)| **valid)
            .map(|((index, &value), _)| (index, value))
    }

    /// Smallest and largest present value
    pub fn min_max(&self) -> Option<(f64, f64)> {
        self.iter_valid().fold(None, |acc, (_, v)| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
    }
}
