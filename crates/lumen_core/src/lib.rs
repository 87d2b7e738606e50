//! Lumen Core - spectral data model for the Lumen renderer.
//!
//! This crate provides:
//!
//! - **Spectra**: the process-wide wavelength table and [`Spectrum`] arithmetic
//! - **Radiometry**: [`Light`] (radiance) and [`Dye`] (attenuation)
//! - **Accumulation**: [`LightAccumulator`], a bounded-memory running average
//! - **Colour**: spectrum to RGB conversion with selectable response curves
//! - **Data**: JSON spectral tables and the built-in paint/light datasets
//!
//! # Example
//!
//! ```ignore
//! use lumen_core::{to_rgb, BuiltinSpectrum, ConversionMode};
//!
//! let red = BuiltinSpectrum::RedPaint.load()?;
//! let rgb = to_rgb(&red, "cie1931/daylight/global".parse()?);
//! ```

pub mod accumulator;
pub mod color;
pub mod datasets;
pub mod light;
pub mod spectrum;
pub mod table;

// Re-export commonly used types
pub use accumulator::LightAccumulator;
pub use color::{
    blackbody, luminance, to_rgb, ColorError, ColorResult, ConversionMode, Normalization, Policy,
    Reference, ResponseCurve,
};
pub use datasets::BuiltinSpectrum;
pub use light::{Dye, Light, MAX_LUMINANCE, MIN_LUMINANCE};
pub use spectrum::{Spectrum, SPECTRUM_SAMPLES, WAVELENGTHS};
pub use table::{SpectralError, SpectralResult, SpectralSample, SpectralTable};
