//! Serialized spectral tables.
//!
//! Material reflectances and emitter curves are stored as JSON arrays of
//! `{ "wavelength": nm, "intensity": value }` rows at whatever resolution
//! they were measured, then resampled onto the renderer's wavelength table.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::spectrum::Spectrum;

/// Errors that can occur while loading a spectral table.
#[derive(Error, Debug)]
pub enum SpectralError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Spectral table has no rows")]
    Empty,

    #[error("Non-finite value in row {0}")]
    NonFinite(usize),

    #[error("Wavelengths must be strictly increasing (row {0})")]
    NotMonotonic(usize),

    #[error("Unknown built-in spectrum: {0}")]
    UnknownBuiltin(String),
}

pub type SpectralResult<T> = Result<T, SpectralError>;

/// One measured row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpectralSample {
    /// Wavelength in nanometres
    pub wavelength: f32,
    /// Value at that wavelength (reflectance, transmittance or radiance)
    pub intensity: f32,
}

/// A validated, wavelength-sorted spectral curve.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralTable {
    samples: Vec<SpectralSample>,
}

impl SpectralTable {
    /// Validate rows: non-empty, finite, strictly increasing wavelength.
    pub fn new(samples: Vec<SpectralSample>) -> SpectralResult<Self> {
        if samples.is_empty() {
            return Err(SpectralError::Empty);
        }
        for (i, s) in samples.iter().enumerate() {
            if !s.wavelength.is_finite() || !s.intensity.is_finite() {
                return Err(SpectralError::NonFinite(i));
            }
            if i > 0 && s.wavelength <= samples[i - 1].wavelength {
                return Err(SpectralError::NotMonotonic(i));
            }
        }
        Ok(Self { samples })
    }

    /// Parse a JSON array of rows.
    pub fn from_json(json: &str) -> SpectralResult<Self> {
        let samples: Vec<SpectralSample> = serde_json::from_str(json)?;
        Self::new(samples)
    }

    /// Load a JSON table from disk.
    pub fn load<P: AsRef<Path>>(path: P) -> SpectralResult<Self> {
        let path = path.as_ref();
        log::info!("Loading spectral table from: {:?}", path);
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn samples(&self) -> &[SpectralSample] {
        &self.samples
    }

    /// Linearly interpolated value at `wavelength`, clamped to the end rows
    /// outside the measured range.
    pub fn sample_at(&self, wavelength: f32) -> f32 {
        let first = self.samples[0];
        let last = self.samples[self.samples.len() - 1];
        if wavelength <= first.wavelength {
            return first.intensity;
        }
        if wavelength >= last.wavelength {
            return last.intensity;
        }

        let upper = self
            .samples
            .partition_point(|s| s.wavelength < wavelength);
        let hi = self.samples[upper];
        let lo = self.samples[upper - 1];
        let t = (wavelength - lo.wavelength) / (hi.wavelength - lo.wavelength);
        lo.intensity + t * (hi.intensity - lo.intensity)
    }

    /// Resample onto the renderer's wavelength table.
    pub fn resample(&self) -> Spectrum {
        Spectrum::from_fn(|lambda| self.sample_at(lambda))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_resample() {
        let table = SpectralTable::from_json(
            r#"[{"wavelength": 400, "intensity": 0.0},
                {"wavelength": 700, "intensity": 3.0}]"#,
        )
        .unwrap();

        let s = table.resample();
        assert_eq!(s[0], 0.0);
        assert!((s[5] - 1.0).abs() < 1e-6); // 500 nm
        assert_eq!(s[15], 3.0);
    }

    #[test]
    fn test_clamps_outside_range() {
        let table = SpectralTable::new(vec![
            SpectralSample { wavelength: 500.0, intensity: 0.2 },
            SpectralSample { wavelength: 600.0, intensity: 0.8 },
        ])
        .unwrap();

        assert_eq!(table.sample_at(380.0), 0.2);
        assert_eq!(table.sample_at(720.0), 0.8);
        assert!((table.sample_at(550.0) - 0.5).abs() < 1e-6);
        assert_eq!(table.sample_at(600.0), 0.8);
    }

    #[test]
    fn test_single_row_is_flat() {
        let table = SpectralTable::from_json(r#"[{"wavelength": 550, "intensity": 0.4}]"#).unwrap();
        assert_eq!(table.resample(), Spectrum::splat(0.4));
    }

    #[test]
    fn test_load_from_disk() {
        let _ = env_logger::builder().is_test(true).try_init();

        let path = std::env::temp_dir().join(format!("lumen_table_{}.json", std::process::id()));
        std::fs::write(&path, r#"[{"wavelength": 450, "intensity": 0.5}]"#).unwrap();
        let table = SpectralTable::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(table.samples().len(), 1);
        assert!(matches!(
            SpectralTable::load(std::env::temp_dir().join("lumen_missing_table.json")),
            Err(SpectralError::Io(_))
        ));
    }

    #[test]
    fn test_rejects_malformed_tables() {
        assert!(matches!(SpectralTable::from_json("[]"), Err(SpectralError::Empty)));
        assert!(matches!(
            SpectralTable::from_json(r#"[{"wavelength": 500}]"#),
            Err(SpectralError::Json(_))
        ));
        assert!(matches!(
            SpectralTable::from_json(
                r#"[{"wavelength": 500, "intensity": 1}, {"wavelength": 500, "intensity": 2}]"#
            ),
            Err(SpectralError::NotMonotonic(1))
        ));
        assert!(matches!(
            SpectralTable::new(vec![SpectralSample { wavelength: 500.0, intensity: f32::NAN }]),
            Err(SpectralError::NonFinite(0))
        ));
    }
}
