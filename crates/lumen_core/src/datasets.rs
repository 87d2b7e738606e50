//! Built-in spectral datasets.
//!
//! Reflectances of the paints used by the box scene and the emission curve
//! of its ceiling light, embedded at compile time.

use std::str::FromStr;

use crate::spectrum::Spectrum;
use crate::table::{SpectralError, SpectralResult, SpectralTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinSpectrum {
    WhitePaint,
    RedPaint,
    GreenPaint,
    /// Relative emission of a warm area light (unnormalized)
    WarmLight,
}

impl BuiltinSpectrum {
    pub const ALL: [BuiltinSpectrum; 4] = [
        BuiltinSpectrum::WhitePaint,
        BuiltinSpectrum::RedPaint,
        BuiltinSpectrum::GreenPaint,
        BuiltinSpectrum::WarmLight,
    ];

    fn json(self) -> &'static str {
        match self {
            BuiltinSpectrum::WhitePaint => include_str!("../data/white_paint.json"),
            BuiltinSpectrum::RedPaint => include_str!("../data/red_paint.json"),
            BuiltinSpectrum::GreenPaint => include_str!("../data/green_paint.json"),
            BuiltinSpectrum::WarmLight => include_str!("../data/warm_light.json"),
        }
    }

    pub fn table(self) -> SpectralResult<SpectralTable> {
        SpectralTable::from_json(self.json())
    }

    /// Parse and resample onto the wavelength table.
    pub fn load(self) -> SpectralResult<Spectrum> {
        Ok(self.table()?.resample())
    }
}

impl FromStr for BuiltinSpectrum {
    type Err = SpectralError;

    fn from_str(s: &str) -> SpectralResult<Self> {
        match s {
            "white_paint" => Ok(Self::WhitePaint),
            "red_paint" => Ok(Self::RedPaint),
            "green_paint" => Ok(Self::GreenPaint),
            "warm_light" => Ok(Self::WarmLight),
            _ => Err(SpectralError::UnknownBuiltin(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_builtins_parse() {
        for builtin in BuiltinSpectrum::ALL {
            let s = builtin.load().unwrap();
            assert!(s.is_finite());
            assert!(s.min_value() >= 0.0);
        }
    }

    #[test]
    fn test_paints_are_valid_reflectances() {
        for builtin in [
            BuiltinSpectrum::WhitePaint,
            BuiltinSpectrum::RedPaint,
            BuiltinSpectrum::GreenPaint,
        ] {
            assert!(builtin.load().unwrap().max_value() <= 1.0);
        }
    }

    #[test]
    fn test_red_reflects_long_wavelengths() {
        let red = BuiltinSpectrum::RedPaint.load().unwrap();
        assert!(red[15] > 10.0 * red[0]);
    }

    #[test]
    fn test_lookup_by_name() {
        assert_eq!(
            "green_paint".parse::<BuiltinSpectrum>().unwrap(),
            BuiltinSpectrum::GreenPaint
        );
        assert!(matches!(
            "chartreuse".parse::<BuiltinSpectrum>(),
            Err(SpectralError::UnknownBuiltin(_))
        ));
    }
}
