//! Spectrum to display-colour conversion.
//!
//! A [`ConversionMode`] picks a response-curve family and a normalization
//! policy. Response matrices and reference whites are reductions over the
//! whole wavelength table, so they are computed once and memoized: matrices
//! per curve, whites per `(curve, reference)` key.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use once_cell::sync::{Lazy, OnceCell};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::spectrum::{Spectrum, SPECTRUM_SAMPLES, WAVELENGTHS};

/// Errors raised while configuring colour conversion.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ColorError {
    #[error("Unknown conversion mode: {0}")]
    UnknownMode(String),

    #[error("Unknown response curve: {0}")]
    UnknownCurve(String),

    #[error("Unknown reference illuminant: {0}")]
    UnknownReference(String),

    #[error("Unknown normalization policy: {0}")]
    UnknownPolicy(String),
}

pub type ColorResult<T> = Result<T, ColorError>;

/// Colour temperature of the daylight reference.
pub const DAYLIGHT_TEMPERATURE: f32 = 6504.0;

/// Rec. 709 luminance weights for linear RGB.
pub const LUMINANCE_WEIGHTS: [f32; 3] = [0.2126, 0.7152, 0.0722];

/// CIE XYZ to linear sRGB (D65).
const XYZ_TO_SRGB: [[f32; 3]; 3] = [
    [3.240_454_2, -1.537_138_5, -0.498_531_4],
    [-0.969_266_0, 1.876_010_8, 0.041_556_0],
    [0.055_643_4, -0.204_025_9, 1.057_225_2],
];

/// CIE 1931 2-degree colour matching functions at [`WAVELENGTHS`].
const CIE_1931: [[f32; 3]; SPECTRUM_SAMPLES] = [
    [0.014_31, 0.000_396, 0.067_85],
    [0.134_38, 0.004_000, 0.645_60],
    [0.348_28, 0.023_000, 1.747_06],
    [0.290_80, 0.060_000, 1.669_20],
    [0.095_64, 0.139_02, 0.812_95],
    [0.004_90, 0.323_00, 0.272_00],
    [0.063_27, 0.710_00, 0.078_25],
    [0.290_40, 0.954_00, 0.020_30],
    [0.594_50, 0.995_00, 0.003_90],
    [0.916_30, 0.870_00, 0.001_65],
    [1.062_20, 0.631_00, 0.000_80],
    [0.854_45, 0.381_00, 0.000_19],
    [0.447_90, 0.175_00, 0.000_02],
    [0.164_90, 0.061_00, 0.000_00],
    [0.046_77, 0.017_00, 0.000_00],
    [0.011_35, 0.004_10, 0.000_00],
];

/// Family of spectral response curves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResponseCurve {
    /// Measured CIE 1931 matching functions, projected XYZ to sRGB.
    Cie1931,
    /// One analytic Gaussian per RGB channel.
    Gaussian,
    /// Analytic multi-lobe fit of the CIE functions (Wyman, Sloan and
    /// Shirley 2013), re-projected through XYZ to sRGB.
    FittedXyz,
}

/// Illuminant that normalizes to white.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Reference {
    /// Equal energy at every wavelength.
    Uniform,
    /// Blackbody at [`DAYLIGHT_TEMPERATURE`].
    Daylight,
}

/// How the reference response divides the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Policy {
    /// Raw response, scaled so the uniform spectrum has unit luminance.
    None,
    /// Each channel divided by the reference's same channel.
    PerChannel,
    /// Every channel divided by the reference's largest channel.
    GlobalMax,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Normalization {
    pub reference: Reference,
    pub policy: Policy,
}

/// Complete description of a spectrum to RGB conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversionMode {
    pub curve: ResponseCurve,
    pub normalization: Normalization,
}

impl ConversionMode {
    pub const fn new(curve: ResponseCurve, reference: Reference, policy: Policy) -> Self {
        Self {
            curve,
            normalization: Normalization { reference, policy },
        }
    }
}

impl Default for ConversionMode {
    fn default() -> Self {
        Self::new(ResponseCurve::Cie1931, Reference::Daylight, Policy::GlobalMax)
    }
}

impl FromStr for ResponseCurve {
    type Err = ColorError;

    fn from_str(s: &str) -> ColorResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "cie1931" | "cie" => Ok(Self::Cie1931),
            "gaussian" | "rgb" => Ok(Self::Gaussian),
            "fitted" | "fittedxyz" | "xyz" => Ok(Self::FittedXyz),
            _ => Err(ColorError::UnknownCurve(s.to_string())),
        }
    }
}

impl FromStr for Reference {
    type Err = ColorError;

    fn from_str(s: &str) -> ColorResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "uniform" | "e" => Ok(Self::Uniform),
            "daylight" | "d65" => Ok(Self::Daylight),
            _ => Err(ColorError::UnknownReference(s.to_string())),
        }
    }
}

impl FromStr for Policy {
    type Err = ColorError;

    fn from_str(s: &str) -> ColorResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "channel" | "per-channel" => Ok(Self::PerChannel),
            "global" | "max" => Ok(Self::GlobalMax),
            _ => Err(ColorError::UnknownPolicy(s.to_string())),
        }
    }
}

/// Parses `curve[/reference[/policy]]`, e.g. `cie1931/daylight/global`.
impl FromStr for ConversionMode {
    type Err = ColorError;

    fn from_str(s: &str) -> ColorResult<Self> {
        let parts: Vec<&str> = s.split('/').map(str::trim).collect();
        if parts.is_empty() || parts.len() > 3 || parts.iter().any(|p| p.is_empty()) {
            return Err(ColorError::UnknownMode(s.to_string()));
        }

        let curve = parts[0].parse()?;
        let reference = parts.get(1).map_or(Ok(Reference::Uniform), |p| p.parse())?;
        let policy = parts.get(2).map_or(Ok(Policy::GlobalMax), |p| p.parse())?;
        Ok(Self::new(curve, reference, policy))
    }
}

impl fmt::Display for ConversionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let curve = match self.curve {
            ResponseCurve::Cie1931 => "cie1931",
            ResponseCurve::Gaussian => "gaussian",
            ResponseCurve::FittedXyz => "fitted",
        };
        let reference = match self.normalization.reference {
            Reference::Uniform => "uniform",
            Reference::Daylight => "daylight",
        };
        let policy = match self.normalization.policy {
            Policy::None => "none",
            Policy::PerChannel => "channel",
            Policy::GlobalMax => "global",
        };
        write!(f, "{}/{}/{}", curve, reference, policy)
    }
}

/// Per-wavelength linear RGB weights.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseMatrix {
    rows: [[f32; SPECTRUM_SAMPLES]; 3],
}

impl ResponseMatrix {
    fn from_rgb(mut rgb_at: impl FnMut(usize, f32) -> [f32; 3]) -> Self {
        let mut rows = [[0.0; SPECTRUM_SAMPLES]; 3];
        for (i, &lambda) in WAVELENGTHS.iter().enumerate() {
            let rgb = rgb_at(i, lambda);
            for c in 0..3 {
                rows[c][i] = rgb[c];
            }
        }

        // Unit luminance for the equal-energy spectrum.
        let luminance: f32 = (0..SPECTRUM_SAMPLES)
            .map(|i| (0..3).map(|c| LUMINANCE_WEIGHTS[c] * rows[c][i]).sum::<f32>())
            .sum();
        if luminance.abs() > f32::EPSILON {
            rows.iter_mut()
                .flat_map(|row| row.iter_mut())
                .for_each(|w| *w /= luminance);
        }

        Self { rows }
    }

    fn from_xyz(xyz_at: impl Fn(usize, f32) -> [f32; 3]) -> Self {
        Self::from_rgb(|i, lambda| xyz_to_linear_srgb(xyz_at(i, lambda)))
    }

    /// Apply the matrix to a spectrum.
    pub fn project(&self, spectrum: &Spectrum) -> [f32; 3] {
        let mut rgb = [0.0; 3];
        for (c, row) in self.rows.iter().enumerate() {
            rgb[c] = row.iter().zip(spectrum.iter()).map(|(w, v)| w * v).sum();
        }
        rgb
    }
}

/// Memoized response matrix for `curve`.
pub fn response(curve: ResponseCurve) -> &'static ResponseMatrix {
    static CIE: OnceCell<ResponseMatrix> = OnceCell::new();
    static GAUSSIAN: OnceCell<ResponseMatrix> = OnceCell::new();
    static FITTED: OnceCell<ResponseMatrix> = OnceCell::new();

    match curve {
        ResponseCurve::Cie1931 => CIE.get_or_init(|| {
            log::debug!("Building CIE 1931 response matrix");
            ResponseMatrix::from_xyz(|i, _| CIE_1931[i])
        }),
        ResponseCurve::Gaussian => GAUSSIAN.get_or_init(|| {
            log::debug!("Building Gaussian response matrix");
            ResponseMatrix::from_rgb(|_, lambda| {
                [
                    gaussian(lambda, 605.0, 40.0, 40.0),
                    gaussian(lambda, 545.0, 38.0, 38.0),
                    gaussian(lambda, 455.0, 30.0, 30.0),
                ]
            })
        }),
        ResponseCurve::FittedXyz => FITTED.get_or_init(|| {
            log::debug!("Building fitted XYZ response matrix");
            ResponseMatrix::from_xyz(|_, lambda| fitted_xyz(lambda))
        }),
    }
}

/// Spectrum of a reference illuminant.
pub fn reference_spectrum(reference: Reference) -> Spectrum {
    match reference {
        Reference::Uniform => Spectrum::splat(1.0),
        Reference::Daylight => blackbody(DAYLIGHT_TEMPERATURE),
    }
}

static WHITES: Lazy<RwLock<HashMap<(ResponseCurve, Reference), [f32; 3]>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Memoized response of `curve` to `reference`.
pub fn reference_white(curve: ResponseCurve, reference: Reference) -> [f32; 3] {
    if let Some(white) = WHITES.read().get(&(curve, reference)) {
        return *white;
    }
    let white = response(curve).project(&reference_spectrum(reference));
    WHITES.write().insert((curve, reference), white);
    white
}

/// Map a spectrum to linear RGB under `mode`.
pub fn to_rgb(spectrum: &Spectrum, mode: ConversionMode) -> [f32; 3] {
    let rgb = response(mode.curve).project(spectrum);
    let Normalization { reference, policy } = mode.normalization;

    match policy {
        Policy::None => rgb,
        Policy::PerChannel => {
            let white = reference_white(mode.curve, reference);
            let mut out = [0.0; 3];
            for c in 0..3 {
                out[c] = if white[c].abs() > f32::EPSILON {
                    rgb[c] / white[c]
                } else {
                    0.0
                };
            }
            out
        }
        Policy::GlobalMax => {
            let white = reference_white(mode.curve, reference);
            let max = white.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            if max > f32::EPSILON {
                rgb.map(|v| v / max)
            } else {
                [0.0; 3]
            }
        }
    }
}

/// Relative luminance of a linear RGB triple.
pub fn luminance(rgb: [f32; 3]) -> f32 {
    rgb.iter().zip(LUMINANCE_WEIGHTS.iter()).map(|(v, w)| v * w).sum()
}

/// Planck emission at `temperature_k`, normalized to a peak of one over the
/// wavelength table.
pub fn blackbody(temperature_k: f32) -> Spectrum {
    const H: f64 = 6.626_070_15e-34;
    const C: f64 = 2.997_924_58e8;
    const K: f64 = 1.380_649e-23;

    let t = temperature_k.max(1.0) as f64;
    let raw = Spectrum::from_fn(|lambda_nm| {
        let lambda = lambda_nm as f64 * 1e-9;
        let radiance = 2.0 * H * C * C / lambda.powi(5) / ((H * C / (lambda * K * t)).exp() - 1.0);
        radiance as f32
    });

    let peak = raw.max_value();
    if peak > 0.0 && peak.is_finite() {
        raw / peak
    } else {
        Spectrum::ZERO
    }
}

fn xyz_to_linear_srgb(xyz: [f32; 3]) -> [f32; 3] {
    let mut rgb = [0.0; 3];
    for (c, row) in XYZ_TO_SRGB.iter().enumerate() {
        rgb[c] = row[0] * xyz[0] + row[1] * xyz[1] + row[2] * xyz[2];
    }
    rgb
}

/// Piecewise Gaussian with different widths left and right of the mean.
fn gaussian(lambda: f32, mean: f32, sigma_left: f32, sigma_right: f32) -> f32 {
    let sigma = if lambda < mean { sigma_left } else { sigma_right };
    let t = (lambda - mean) / sigma;
    (-0.5 * t * t).exp()
}

fn fitted_xyz(lambda: f32) -> [f32; 3] {
    let x = 1.056 * gaussian(lambda, 599.8, 37.9, 31.0) + 0.362 * gaussian(lambda, 442.0, 16.0, 26.7)
        - 0.065 * gaussian(lambda, 501.1, 20.4, 26.2);
    let y = 0.821 * gaussian(lambda, 568.8, 46.9, 40.5) + 0.286 * gaussian(lambda, 530.9, 16.3, 31.1);
    let z = 1.217 * gaussian(lambda, 437.0, 11.8, 36.0) + 0.681 * gaussian(lambda, 459.0, 26.0, 13.8);
    [x, y, z]
}

#[cfg(test)]
mod tests {
    use super::*;

    const CURVES: [ResponseCurve; 3] = [
        ResponseCurve::Cie1931,
        ResponseCurve::Gaussian,
        ResponseCurve::FittedXyz,
    ];

    #[test]
    fn test_uniform_reference_global_max_is_normalized() {
        for curve in CURVES {
            let mode = ConversionMode::new(curve, Reference::Uniform, Policy::GlobalMax);
            let rgb = to_rgb(&Spectrum::splat(1.0), mode);

            assert!(rgb.iter().all(|&c| c <= 1.0), "{:?}: {:?}", curve, rgb);
            assert!(rgb.iter().any(|&c| c == 1.0), "{:?}: {:?}", curve, rgb);
        }
    }

    #[test]
    fn test_per_channel_maps_reference_to_white() {
        for curve in CURVES {
            let mode = ConversionMode::new(curve, Reference::Daylight, Policy::PerChannel);
            let rgb = to_rgb(&blackbody(DAYLIGHT_TEMPERATURE), mode);
            for c in rgb {
                assert!((c - 1.0).abs() < 1e-5, "{:?}: {:?}", curve, rgb);
            }
        }
    }

    #[test]
    fn test_uniform_spectrum_has_unit_luminance_unnormalized() {
        for curve in CURVES {
            let mode = ConversionMode::new(curve, Reference::Uniform, Policy::None);
            let y = luminance(to_rgb(&Spectrum::splat(1.0), mode));
            assert!((y - 1.0).abs() < 1e-4, "{:?}: {}", curve, y);
        }
    }

    #[test]
    fn test_conversion_is_linear() {
        let mode = ConversionMode::default();
        let base = Spectrum::from_fn(|l| (l - 400.0) / 300.0);
        let a = to_rgb(&base, mode);
        let b = to_rgb(&(base * 3.0), mode);
        for c in 0..3 {
            assert!((b[c] - 3.0 * a[c]).abs() < 1e-4);
        }
    }

    #[test]
    fn test_long_wavelengths_read_red() {
        let red = Spectrum::from_fn(|l| if l >= 620.0 { 1.0 } else { 0.0 });
        for curve in CURVES {
            let rgb = to_rgb(&red, ConversionMode::new(curve, Reference::Uniform, Policy::None));
            assert!(rgb[0] > rgb[1] && rgb[0] > rgb[2], "{:?}: {:?}", curve, rgb);
        }
    }

    #[test]
    fn test_blackbody_is_peak_normalized() {
        let warm = blackbody(2700.0);
        assert!((warm.max_value() - 1.0).abs() < 1e-6);
        // Incandescent light rises towards the red end.
        assert!(warm[15] > warm[0]);

        let hot = blackbody(10_000.0);
        assert!(hot[0] > hot[15]);
    }

    #[test]
    fn test_mode_parsing() {
        let mode: ConversionMode = "cie1931/daylight/global".parse().unwrap();
        assert_eq!(mode, ConversionMode::default());

        let mode: ConversionMode = "gaussian".parse().unwrap();
        assert_eq!(mode.curve, ResponseCurve::Gaussian);
        assert_eq!(mode.normalization.reference, Reference::Uniform);
        assert_eq!(mode.normalization.policy, Policy::GlobalMax);

        let mode: ConversionMode = "fitted/d65/channel".parse().unwrap();
        assert_eq!(mode.to_string(), "fitted/daylight/channel");
    }

    #[test]
    fn test_unknown_mode_is_an_error() {
        assert!(matches!(
            "sepia".parse::<ConversionMode>(),
            Err(ColorError::UnknownCurve(_))
        ));
        assert!(matches!(
            "cie1931/moonlight".parse::<ConversionMode>(),
            Err(ColorError::UnknownReference(_))
        ));
        assert!(matches!(
            "cie1931/uniform/loud".parse::<ConversionMode>(),
            Err(ColorError::UnknownPolicy(_))
        ));
        assert!(matches!(
            "cie1931//global".parse::<ConversionMode>(),
            Err(ColorError::UnknownMode(_))
        ));
        assert!(matches!(
            "a/b/c/d".parse::<ConversionMode>(),
            Err(ColorError::UnknownMode(_))
        ));
    }

    #[test]
    fn test_reference_white_is_memoized() {
        let first = reference_white(ResponseCurve::FittedXyz, Reference::Daylight);
        let second = reference_white(ResponseCurve::FittedXyz, Reference::Daylight);
        assert_eq!(first, second);
        assert!(std::ptr::eq(
            response(ResponseCurve::Gaussian),
            response(ResponseCurve::Gaussian)
        ));
    }
}
