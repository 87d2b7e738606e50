//! Radiometric value types.
//!
//! [`Light`] is radiance: it adds and scales. [`Dye`] is a unitless
//! per-wavelength factor in `[0, 1]`: it multiplies and exponentiates, and is
//! applied to a `Light` to filter it.

use std::iter::Sum;
use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};

use crate::spectrum::{Spectrum, SPECTRUM_SAMPLES};

/// Radiance every channel of [`Light::white`] carries.
pub const MAX_LUMINANCE: f32 = 1.0;

/// Channels below this are treated as carrying no energy.
pub const MIN_LUMINANCE: f32 = 1e-6;

/// Spectral radiance.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Light(Spectrum);

impl Light {
    pub fn new(spectrum: Spectrum) -> Self {
        Self(spectrum)
    }

    /// No radiance at any wavelength.
    pub const fn black() -> Self {
        Self(Spectrum::ZERO)
    }

    /// [`MAX_LUMINANCE`] at every wavelength.
    pub const fn white() -> Self {
        Self(Spectrum::splat(MAX_LUMINANCE))
    }

    pub fn spectrum(&self) -> &Spectrum {
        &self.0
    }

    /// Sum of two radiances.
    pub fn mix(&self, other: &Light) -> Light {
        Light(self.0 + other.0)
    }

    pub fn scale(&self, factor: f32) -> Light {
        Light(self.0 * factor)
    }

    /// Filter this light through `dye`.
    pub fn apply(&self, dye: &Dye) -> Light {
        Light(self.0 * dye.0)
    }

    /// True if no channel carries measurable energy.
    pub fn is_black(&self) -> bool {
        self.0.iter().all(|v| v.abs() < MIN_LUMINANCE)
    }
}

impl From<Spectrum> for Light {
    fn from(spectrum: Spectrum) -> Self {
        Self(spectrum)
    }
}

impl Add for Light {
    type Output = Light;

    fn add(self, rhs: Light) -> Light {
        self.mix(&rhs)
    }
}

impl AddAssign for Light {
    fn add_assign(&mut self, rhs: Light) {
        self.0 += rhs.0;
    }
}

impl Sum for Light {
    fn sum<I: Iterator<Item = Light>>(iter: I) -> Light {
        iter.fold(Light::black(), |acc, l| acc + l)
    }
}

/// Wavelength-selective attenuation, every channel in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dye(Spectrum);

impl Dye {
    /// Create a dye, clamping every channel into `[0, 1]`.
    pub fn new(spectrum: Spectrum) -> Self {
        Self(spectrum.map(|v| if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) }))
    }

    /// Create a dye without clamping.
    ///
    /// Used for Monte Carlo weights, which may exceed one for a single
    /// sample while remaining bounded in expectation.
    pub fn weight(spectrum: Spectrum) -> Self {
        Self(spectrum)
    }

    /// Absorbs everything.
    pub const fn black() -> Self {
        Self(Spectrum::ZERO)
    }

    /// Passes everything.
    pub const fn clear() -> Self {
        Self(Spectrum::splat(1.0))
    }

    /// Flat attenuation by `value`.
    pub fn grey(value: f32) -> Self {
        Self::new(Spectrum::splat(value))
    }

    pub fn spectrum(&self) -> &Spectrum {
        &self.0
    }

    /// Additive light mixing: what passes either filter, clamped to one.
    pub fn mix(&self, other: &Dye) -> Dye {
        Dye(self.0.zip_map(&other.0, |a, b| (a + b).min(1.0)))
    }

    /// Multiplicative combination, as if both filters were stacked.
    pub fn combine(&self, other: &Dye) -> Dye {
        Dye(self.0 * other.0)
    }

    /// Per-channel exponent. Values above one deepen the colour (purity);
    /// a path length turns a unit-distance transmittance into Beer-Lambert
    /// attenuation.
    pub fn pow(&self, exponent: f32) -> Dye {
        Dye(self.0.map(|v| v.max(0.0).powf(exponent)))
    }

    pub fn scale(&self, factor: f32) -> Dye {
        Dye(self.0 * factor)
    }

    /// True if every channel is below [`MIN_LUMINANCE`].
    pub fn is_black(&self) -> bool {
        self.0.iter().all(|v| *v < MIN_LUMINANCE)
    }

    /// Mean transmittance over all channels.
    pub fn mean(&self) -> f32 {
        self.0.mean()
    }
}

impl Default for Dye {
    fn default() -> Self {
        Self::clear()
    }
}

impl From<[f32; SPECTRUM_SAMPLES]> for Dye {
    fn from(values: [f32; SPECTRUM_SAMPLES]) -> Self {
        Dye::new(Spectrum(values))
    }
}
