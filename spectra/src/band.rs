//! Sentinel-2 MSI spectral band identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One band of the Sentinel-2 MultiSpectral Instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SpectralBand {
    /// Coastal aerosol, 443 nm
    B1,
    /// Blue, 490 nm
    B2,
    /// Green, 560 nm
    B3,
    /// Red, 665 nm
    B4,
    /// Vegetation red edge, 705 nm
    B5,
    /// Vegetation red edge, 740 nm
    B6,
    /// Vegetation red edge, 783 nm
    B7,
    /// Near infrared, 842 nm
    B8,
    /// Narrow near infrared, 865 nm
    B8A,
    /// Water vapour, 945 nm
    B9,
    /// SWIR cirrus, 1375 nm
    B10,
    /// Short-wave infrared, 1610 nm
    B11,
    /// Short-wave infrared, 2190 nm
    B12,
}

impl SpectralBand {
    pub const ALL: [SpectralBand; 13] = [
        SpectralBand::B1,
        SpectralBand::B2,
        SpectralBand::B3,
        SpectralBand::B4,
        SpectralBand::B5,
        SpectralBand::B6,
        SpectralBand::B7,
        SpectralBand::B8,
        SpectralBand::B8A,
        SpectralBand::B9,
        SpectralBand::B10,
        SpectralBand::B11,
        SpectralBand::B12,
    ];

    /// Near infrared band used by the vegetation index
    pub const NIR: SpectralBand = SpectralBand::B8;

    /// Red band used by the vegetation index
    pub const RED: SpectralBand = SpectralBand::B4;

    /// Catalog name of the band, e.g. `"B8A"`
    pub fn name(&self) -> &'static str {
        match self {
            SpectralBand::B1 => "B1",
            SpectralBand::B2 => "B2",
            SpectralBand::B3 => "B3",
            SpectralBand::B4 => "B4",
            SpectralBand::B5 => "B5",
            SpectralBand::B6 => "B6",
            SpectralBand::B7 => "B7",
            SpectralBand::B8 => "B8",
            SpectralBand::B8A => "B8A",
            SpectralBand::B9 => "B9",
            SpectralBand::B10 => "B10",
            SpectralBand::B11 => "B11",
            SpectralBand::B12 => "B12",
        }
    }
}

impl fmt::Display for SpectralBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SpectralBand {
    type Err = String;

    /// Accepts `B8`, `b8` and zero-padded forms such as `B02`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        let digits = upper
            .strip_prefix('B')
            .ok_or_else(|| format!("Band name must start with 'B': {s}"))?;
        let normalized = format!("B{}", digits.trim_start_matches('0'));

        SpectralBand::ALL
            .iter()
            .copied()
            .find(|band| band.name() == normalized)
            .ok_or_else(|| format!("Unknown spectral band: {s}"))
    }
}
