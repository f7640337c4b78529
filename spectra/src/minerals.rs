//! Mineral spectral signature registry.
//!
//! A signature pairs two Sentinel-2 bands whose reflectance ratio acts as a
//! proxy for a mineral (or its host rock) with the ratio above which a pixel
//! is considered anomalous. The registry is built once and handed to the scan
//! pipeline by reference; it is never mutated afterwards.

use crate::band::SpectralBand;
use crate::error::{Result, ScanError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Detection rule for one mineral.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MineralSignature {
    /// Registry key, shown to the operator
    pub name: String,
    /// Band in the numerator of the diagnostic ratio
    pub numerator: SpectralBand,
    /// Band in the denominator of the diagnostic ratio
    pub denominator: SpectralBand,
    /// Ratio above which a pixel is flagged when no sensitivity is given
    pub default_threshold: f64,
}

impl MineralSignature {
    /// Create a validated signature.
    ///
    /// Fails when the bands coincide, the threshold is not strictly positive,
    /// or the name is blank.
    pub fn new(
        name: impl Into<String>,
        numerator: SpectralBand,
        denominator: SpectralBand,
        default_threshold: f64,
    ) -> Result<Self> {
        let signature = Self {
            name: name.into(),
            numerator,
            denominator,
            default_threshold,
        };
        signature.validate()?;
        Ok(signature)
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ScanError::InvalidSignature(
                "signature name cannot be empty".to_string(),
            ));
        }
        if self.numerator == self.denominator {
            return Err(ScanError::InvalidSignature(format!(
                "{}: numerator and denominator are both {}",
                self.name, self.numerator
            )));
        }
        if !(self.default_threshold.is_finite() && self.default_threshold > 0.0) {
            return Err(ScanError::InvalidSignature(format!(
                "{}: default threshold must be positive, got {}",
                self.name, self.default_threshold
            )));
        }
        Ok(())
    }

    /// The two bands of the diagnostic ratio, numerator first
    pub fn bands(&self) -> (SpectralBand, SpectralBand) {
        (self.numerator, self.denominator)
    }
}

/// Built-in table: (name, numerator, denominator, default threshold)
const BUILTIN_SIGNATURES: [(&str, SpectralBand, SpectralBand, f64); 14] = [
    ("Ouro (Nativo/Sufetos)", SpectralBand::B11, SpectralBand::B2, 2.15),
    ("Lítio (Pegmatitos)", SpectralBand::B11, SpectralBand::B8, 1.70),
    ("Esmeralda/Berilo", SpectralBand::B3, SpectralBand::B2, 1.55),
    ("Terras Raras (REE)", SpectralBand::B11, SpectralBand::B12, 1.95),
    ("Nióbio (Carbonatitos)", SpectralBand::B12, SpectralBand::B4, 2.25),
    ("Alexandrita", SpectralBand::B8, SpectralBand::B4, 2.50),
    ("Cobre (Porfirítico)", SpectralBand::B12, SpectralBand::B8A, 2.10),
    ("Níquel (Laterítico)", SpectralBand::B8A, SpectralBand::B11, 1.65),
    ("Ferro (Hematita)", SpectralBand::B4, SpectralBand::B2, 1.95),
    ("Diamante Vermelho (Host)", SpectralBand::B12, SpectralBand::B2, 2.65),
    ("Manganês", SpectralBand::B11, SpectralBand::B4, 2.15),
    ("Tântalo/Coltã", SpectralBand::B12, SpectralBand::B11, 1.80),
    ("Ródio (PGM)", SpectralBand::B11, SpectralBand::B8, 1.95),
    ("Platina/Paládio", SpectralBand::B12, SpectralBand::B8, 1.85),
];

/// Immutable catalog of mineral signatures keyed by name.
#[derive(Debug, Clone, PartialEq)]
pub struct MineralRegistry {
    signatures: BTreeMap<String, MineralSignature>,
}

impl MineralRegistry {
    /// The fourteen built-in signatures.
    pub fn builtin() -> Self {
        let signatures = BUILTIN_SIGNATURES
            .iter()
            .map(|&(name, numerator, denominator, default_threshold)| {
                let signature = MineralSignature {
                    name: name.to_string(),
                    numerator,
                    denominator,
                    default_threshold,
                };
                (signature.name.clone(), signature)
            })
            .collect();
        Self { signatures }
    }

    /// Build a registry from arbitrary signatures.
    ///
    /// Every signature is validated and names must be unique.
    pub fn from_signatures(signatures: impl IntoIterator<Item = MineralSignature>) -> Result<Self> {
        let mut table = BTreeMap::new();
        for signature in signatures {
            signature.validate()?;
            let name = signature.name.clone();
            if table.insert(name.clone(), signature).is_some() {
                return Err(ScanError::InvalidSignature(format!(
                    "duplicate mineral name: {name}"
                )));
            }
        }
        if table.is_empty() {
            return Err(ScanError::InvalidSignature(
                "mineral table is empty".to_string(),
            ));
        }
        Ok(Self { signatures: table })
    }

    /// Look up a signature by its exact name.
    pub fn lookup(&self, name: &str) -> Result<&MineralSignature> {
        self.signatures
            .get(name)
            .ok_or_else(|| ScanError::UnknownMineral {
                name: name.to_string(),
            })
    }

    /// All registered names, sorted alphabetically.
    pub fn list_all(&self) -> Vec<&str> {
        self.signatures.keys().map(String::as_str).collect()
    }

    /// Iterate signatures in name order
    pub fn iter(&self) -> impl Iterator<Item = &MineralSignature> {
        self.signatures.values()
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    /// Save the table as a JSON array of signatures
    pub fn save_to_file(&self, path: &Path) -> std::io::Result<()> {
        let entries: Vec<&MineralSignature> = self.iter().collect();
        let json = serde_json::to_string_pretty(&entries)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, json)
    }

    /// Load a table from a JSON array of signatures.
    ///
    /// Entries that violate signature invariants are rejected as invalid data.
    pub fn load_from_file(path: &Path) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let entries: Vec<MineralSignature> = serde_json::from_str(&json)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        Self::from_signatures(entries)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))
    }
}

impl Default for MineralRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
