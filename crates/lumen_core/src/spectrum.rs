//! Discrete spectral samples.
//!
//! Every radiometric quantity in Lumen is carried as a fixed-length vector
//! parallel to [`WAVELENGTHS`]. The table is sparse on purpose: 16 samples
//! spanning the visible range are enough for colour reproduction of smooth
//! reflectance and emission curves.

use std::ops::{Add, AddAssign, Div, Index, IndexMut, Mul, Sub};

use serde::{Deserialize, Serialize};

/// Number of samples in every spectrum.
pub const SPECTRUM_SAMPLES: usize = 16;

/// Sample wavelengths in nanometres, ascending.
pub const WAVELENGTHS: [f32; SPECTRUM_SAMPLES] = [
    400.0, 420.0, 440.0, 460.0, 480.0, 500.0, 520.0, 540.0, 560.0, 580.0, 600.0, 620.0, 640.0,
    660.0, 680.0, 700.0,
];

/// Spacing between adjacent wavelength samples in nanometres.
pub const WAVELENGTH_STEP: f32 = 20.0;

/// Values sampled at each entry of [`WAVELENGTHS`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Spectrum(pub [f32; SPECTRUM_SAMPLES]);

impl Spectrum {
    /// All-zero spectrum.
    pub const ZERO: Spectrum = Spectrum([0.0; SPECTRUM_SAMPLES]);

    /// Spectrum with the same value at every wavelength.
    pub const fn splat(value: f32) -> Self {
        Self([value; SPECTRUM_SAMPLES])
    }

    /// Build a spectrum by evaluating `f` at every sample wavelength.
    pub fn from_fn(mut f: impl FnMut(f32) -> f32) -> Self {
        let mut values = [0.0; SPECTRUM_SAMPLES];
        for (value, &lambda) in values.iter_mut().zip(WAVELENGTHS.iter()) {
            *value = f(lambda);
        }
        Self(values)
    }

    /// Apply `f` to every sample.
    pub fn map(&self, f: impl Fn(f32) -> f32) -> Self {
        let mut out = *self;
        out.0.iter_mut().for_each(|v| *v = f(*v));
        out
    }

    /// Combine two spectra sample by sample.
    pub fn zip_map(&self, other: &Spectrum, f: impl Fn(f32, f32) -> f32) -> Self {
        let mut out = *self;
        for (a, b) in out.0.iter_mut().zip(other.0.iter()) {
            *a = f(*a, *b);
        }
        out
    }

    /// Largest sample value.
    pub fn max_value(&self) -> f32 {
        self.0.iter().copied().fold(f32::NEG_INFINITY, f32::max)
    }

    /// Smallest sample value.
    pub fn min_value(&self) -> f32 {
        self.0.iter().copied().fold(f32::INFINITY, f32::min)
    }

    /// Arithmetic mean over all samples.
    pub fn mean(&self) -> f32 {
        self.0.iter().sum::<f32>() / SPECTRUM_SAMPLES as f32
    }

    /// True if every sample is finite.
    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|v| v.is_finite())
    }

    pub fn iter(&self) -> impl Iterator<Item = &f32> {
        self.0.iter()
    }
}

impl Default for Spectrum {
    fn default() -> Self {
        Self::ZERO
    }
}

impl Index<usize> for Spectrum {
    type Output = f32;

    #[inline]
    fn index(&self, i: usize) -> &f32 {
        &self.0[i]
    }
}

impl IndexMut<usize> for Spectrum {
    #[inline]
    fn index_mut(&mut self, i: usize) -> &mut f32 {
        &mut self.0[i]
    }
}

impl Add for Spectrum {
    type Output = Spectrum;

    fn add(self, rhs: Spectrum) -> Spectrum {
        self.zip_map(&rhs, |a, b| a + b)
    }
}

impl AddAssign for Spectrum {
    fn add_assign(&mut self, rhs: Spectrum) {
        *self = *self + rhs;
    }
}

impl Sub for Spectrum {
    type Output = Spectrum;

    fn sub(self, rhs: Spectrum) -> Spectrum {
        self.zip_map(&rhs, |a, b| a - b)
    }
}

impl Mul for Spectrum {
    type Output = Spectrum;

    fn mul(self, rhs: Spectrum) -> Spectrum {
        self.zip_map(&rhs, |a, b| a * b)
    }
}

impl Mul<f32> for Spectrum {
    type Output = Spectrum;

    fn mul(self, rhs: f32) -> Spectrum {
        self.map(|v| v * rhs)
    }
}

impl Div<f32> for Spectrum {
    type Output = Spectrum;

    fn div(self, rhs: f32) -> Spectrum {
        self.map(|v| v / rhs)
    }
}
