//! Display post-processing: white balance, exposure, tone mapping and
//! colour grading of linear RGB.
//!
//! A [`PostProcessor`] is built from user [`PostProcessorSettings`] and the
//! latest [`ReferenceSamples`] (the radiance of a known white wall and of
//! the brightest emitter). It is rebuilt whenever either changes; applying
//! it is a pure per-pixel function.

use std::fmt;
use std::str::FromStr;

use lumen_core::luminance;
use lumen_math::Vec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Luminance below which colours are treated as black.
const BLACK_LUMINANCE: f32 = 1e-6;

#[derive(Error, Debug, PartialEq)]
pub enum ToneMapError {
    #[error("Unknown tone operator: {0}")]
    UnknownOperator(String),
}

/// Luminance compression curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ToneOperator {
    Linear,
    Reinhard,
    /// Reinhard with a white point at the brightest reference sample.
    #[default]
    ReinhardExtended,
}

impl ToneOperator {
    pub const ALL: [ToneOperator; 3] = [
        ToneOperator::Linear,
        ToneOperator::Reinhard,
        ToneOperator::ReinhardExtended,
    ];

    fn name(self) -> &'static str {
        match self {
            ToneOperator::Linear => "linear",
            ToneOperator::Reinhard => "reinhard",
            ToneOperator::ReinhardExtended => "reinhard-extended",
        }
    }

    /// Map luminance `l`; `white` is the luminance that maps to 1.
    fn map(self, l: f32, white: f32) -> f32 {
        match self {
            ToneOperator::Linear => l,
            ToneOperator::Reinhard => l / (1.0 + l),
            ToneOperator::ReinhardExtended => l * (1.0 + l / (white * white)) / (1.0 + l),
        }
    }
}

impl FromStr for ToneOperator {
    type Err = ToneMapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ToneOperator::ALL
            .into_iter()
            .find(|op| op.name() == s)
            .ok_or_else(|| ToneMapError::UnknownOperator(s.to_string()))
    }
}

impl fmt::Display for ToneOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// User-facing grading controls.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PostProcessorSettings {
    pub operator: ToneOperator,
    pub gamma: f32,
    /// Exposure in stops
    pub exposure: f32,
    /// Additive offset after contrast
    pub brightness: f32,
    /// Slope around mid grey (1 = unchanged)
    pub contrast: f32,
    /// 0 = greyscale, 1 = unchanged
    pub saturation: f32,
}

impl Default for PostProcessorSettings {
    fn default() -> Self {
        Self {
            operator: ToneOperator::default(),
            gamma: 2.2,
            exposure: 0.0,
            brightness: 0.0,
            contrast: 1.0,
            saturation: 1.0,
        }
    }
}

/// Linear RGB measurements the processor is calibrated against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferenceSamples {
    /// A surface that should display as neutral white.
    pub white: Vec3,
    /// The brightest thing in view.
    pub bright: Vec3,
}

impl Default for ReferenceSamples {
    fn default() -> Self {
        Self {
            white: Vec3::ONE,
            bright: Vec3::ONE,
        }
    }
}

impl PostProcessorSettings {
    /// Derive the per-pixel transform for the given references.
    pub fn build(&self, references: &ReferenceSamples) -> PostProcessor {
        let balance = Vec3::select(
            references.white.cmpgt(Vec3::splat(BLACK_LUMINANCE)),
            Vec3::ONE / references.white.max(Vec3::splat(BLACK_LUMINANCE)),
            Vec3::ONE,
        );
        let gain = 2f32.powf(self.exposure);
        let bright = references.bright * balance * gain;
        let white_point = luminance(bright.to_array()).max(1.0);

        PostProcessor {
            settings: *self,
            balance: balance * gain,
            white_point,
            inverse_gamma: 1.0 / self.gamma.max(1e-3),
        }
    }
}

/// Calibrated linear RGB to display RGB transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PostProcessor {
    settings: PostProcessorSettings,
    /// White balance and exposure folded together
    balance: Vec3,
    white_point: f32,
    inverse_gamma: f32,
}

impl PostProcessor {
    pub fn settings(&self) -> &PostProcessorSettings {
        &self.settings
    }

    /// Map linear RGB to display RGB in [0, 1].
    pub fn apply(&self, rgb: Vec3) -> Vec3 {
        let s = &self.settings;
        let mut c = rgb * self.balance;

        let l = luminance(c.to_array());
        c = if l > BLACK_LUMINANCE {
            c * (s.operator.map(l, self.white_point) / l)
        } else {
            Vec3::ZERO
        };

        c = (c - Vec3::splat(0.5)) * s.contrast + Vec3::splat(0.5);
        c += Vec3::splat(s.brightness);

        let grey = Vec3::splat(luminance(c.to_array()));
        c = grey + (c - grey) * s.saturation;

        c = c.max(Vec3::ZERO).powf(self.inverse_gamma);
        c.clamp(Vec3::ZERO, Vec3::ONE)
    }

    /// [`apply`](Self::apply) and quantize to 8-bit RGBA.
    pub fn to_rgba8(&self, rgb: Vec3) -> [u8; 4] {
        let c = self.apply(rgb) * 255.0;
        [c.x.round() as u8, c.y.round() as u8, c.z.round() as u8, 255]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear() -> PostProcessorSettings {
        PostProcessorSettings {
            operator: ToneOperator::Linear,
            gamma: 1.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_identity_settings() {
        let pp = linear().build(&ReferenceSamples::default());
        let c = Vec3::new(0.2, 0.4, 0.6);
        assert!((pp.apply(c) - c).length() < 1e-5);
    }

    #[test]
    fn test_white_balance_neutralizes_reference() {
        let references = ReferenceSamples {
            white: Vec3::new(0.8, 0.4, 0.2),
            bright: Vec3::ONE,
        };
        let out = linear().build(&references).apply(references.white);
        assert!((out - Vec3::ONE).length() < 1e-5);
    }

    #[test]
    fn test_exposure_doubles() {
        let settings = PostProcessorSettings {
            exposure: 1.0,
            ..linear()
        };
        let out = settings.build(&ReferenceSamples::default()).apply(Vec3::splat(0.25));
        assert!((out - Vec3::splat(0.5)).length() < 1e-5);
    }

    #[test]
    fn test_reinhard_compresses_highlights() {
        let settings = PostProcessorSettings {
            operator: ToneOperator::Reinhard,
            gamma: 1.0,
            ..Default::default()
        };
        let pp = settings.build(&ReferenceSamples::default());
        assert!((pp.apply(Vec3::ONE) - Vec3::splat(0.5)).length() < 1e-5);
        assert!(pp.apply(Vec3::splat(100.0)).x < 1.0);
    }

    #[test]
    fn test_extended_maps_bright_reference_to_white() {
        let settings = PostProcessorSettings {
            operator: ToneOperator::ReinhardExtended,
            gamma: 1.0,
            ..Default::default()
        };
        let references = ReferenceSamples {
            white: Vec3::ONE,
            bright: Vec3::splat(16.0),
        };
        let pp = settings.build(&references);
        assert!((pp.apply(Vec3::splat(16.0)) - Vec3::ONE).length() < 1e-4);
        assert!(pp.apply(Vec3::splat(4.0)).x < 1.0);
    }

    #[test]
    fn test_saturation_zero_is_grey() {
        let settings = PostProcessorSettings {
            saturation: 0.0,
            ..linear()
        };
        let out = settings
            .build(&ReferenceSamples::default())
            .apply(Vec3::new(0.9, 0.1, 0.1));
        assert!((out.x - out.y).abs() < 1e-6 && (out.y - out.z).abs() < 1e-6);
    }

    #[test]
    fn test_contrast_pivots_on_mid_grey() {
        let settings = PostProcessorSettings {
            contrast: 2.0,
            ..linear()
        };
        let pp = settings.build(&ReferenceSamples::default());
        assert!((pp.apply(Vec3::splat(0.5)) - Vec3::splat(0.5)).length() < 1e-5);
        assert!((pp.apply(Vec3::splat(0.6)) - Vec3::splat(0.7)).length() < 1e-5);
    }

    #[test]
    fn test_output_is_clamped_and_quantized() {
        let pp = linear().build(&ReferenceSamples::default());
        assert_eq!(pp.apply(Vec3::splat(7.0)), Vec3::ONE);
        assert_eq!(pp.to_rgba8(Vec3::splat(7.0)), [255, 255, 255, 255]);
        assert_eq!(pp.to_rgba8(Vec3::ZERO), [0, 0, 0, 255]);
    }

    #[test]
    fn test_operator_names() {
        for op in ToneOperator::ALL {
            assert_eq!(op.to_string().parse::<ToneOperator>().unwrap(), op);
        }
        assert!("filmic".parse::<ToneOperator>().is_err());
    }
}
