//! Geographic primitives: points, bounding boxes and the region of interest.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Mean length of one degree of latitude in metres
pub const METERS_PER_DEGREE: f64 = 111_320.0;

/// Radius of every region of interest, in metres
pub const DEFAULT_RADIUS_M: f64 = 10_000.0;

/// Latitude/longitude pair in decimal degrees (WGS84).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    /// Create a validated coordinate.
    ///
    /// Returns an error message when latitude is outside [-90, 90] or longitude
    /// outside [-180, 180].
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, String> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(format!("Latitude {latitude} out of range [-90, 90]"));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(format!("Longitude {longitude} out of range [-180, 180]"));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.5}, {:.5})", self.latitude, self.longitude)
    }
}

/// Axis-aligned rectangle in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl BoundingBox {
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    pub fn width_deg(&self) -> f64 {
        self.east - self.west
    }

    pub fn height_deg(&self) -> f64 {
        self.north - self.south
    }

    /// True when the boxes share an area of positive size
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.west < other.east
            && self.east > other.west
            && self.south < other.north
            && self.north > other.south
    }

    /// Overlapping area, or `None` when the boxes do not intersect
    pub fn intersection(&self, other: &BoundingBox) -> Option<BoundingBox> {
        if !self.intersects(other) {
            return None;
        }
        Some(BoundingBox {
            west: self.west.max(other.west),
            south: self.south.max(other.south),
            east: self.east.min(other.east),
            north: self.north.min(other.north),
        })
    }

    pub fn contains(&self, point: &GeoPoint) -> bool {
        (self.west..=self.east).contains(&point.longitude)
            && (self.south..=self.north).contains(&point.latitude)
    }
}

/// Circular area around a resolved locality.
///
/// Created per scan request and discarded afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegionOfInterest {
    pub center: GeoPoint,
    pub radius_m: f64,
}

impl RegionOfInterest {
    pub fn new(center: GeoPoint, radius_m: f64) -> Self {
        Self { center, radius_m }
    }

    /// Region with the standard 10 km radius
    pub fn around(center: GeoPoint) -> Self {
        Self::new(center, DEFAULT_RADIUS_M)
    }

    /// Bounding rectangle of the circle.
    ///
    /// Uses a spherical approximation: the latitude half-extent is constant and
    /// the longitude half-extent widens with the cosine of latitude. Latitude is
    /// clamped at the poles.
    pub fn bounding_box(&self) -> BoundingBox {
        let half_lat = self.radius_m / METERS_PER_DEGREE;
        let cos_lat = self.center.latitude.to_radians().cos().max(1e-6);
        let half_lon = (half_lat / cos_lat).min(180.0);

        BoundingBox {
            west: (self.center.longitude - half_lon).max(-180.0),
            south: (self.center.latitude - half_lat).max(-90.0),
            east: (self.center.longitude + half_lon).min(180.0),
            north: (self.center.latitude + half_lat).min(90.0),
        }
    }
}
