//! Bounded-memory running average of spectra.

use serde::{Deserialize, Serialize};

use crate::light::Light;
use crate::spectrum::{Spectrum, SPECTRUM_SAMPLES};

/// Online estimator of an average [`Light`].
///
/// For the first `history` samples the accumulator keeps an exact mean using
/// Kahan-Babuska (Neumaier) compensated summation. From sample `history + 1`
/// on it becomes an exponential moving average with smoothing
/// `1 - exp(-1 / history)`, seeded from the exact mean so far, so that drift
/// and memory stay bounded no matter how many samples arrive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightAccumulator {
    history: u64,
    sum: Spectrum,
    compensation: Spectrum,
    count: u64,
}

impl LightAccumulator {
    /// Create an accumulator with target history size `history` (at least 1).
    pub fn new(history: u64) -> Self {
        Self {
            history: history.max(1),
            sum: Spectrum::ZERO,
            compensation: Spectrum::ZERO,
            count: 0,
        }
    }

    /// Smoothing factor of the moving-average regime.
    pub fn smoothing(&self) -> f32 {
        1.0 - (-1.0 / self.history as f64).exp() as f32
    }

    pub fn history(&self) -> u64 {
        self.history
    }

    /// Number of samples accumulated so far.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// True once the accumulator has switched to the moving average.
    pub fn is_smoothing(&self) -> bool {
        self.count > self.history
    }

    pub fn accumulate(&mut self, sample: &Light) {
        let x = sample.spectrum();
        self.count += 1;

        if self.count <= self.history {
            for i in 0..SPECTRUM_SAMPLES {
                let t = self.sum[i] + x[i];
                if self.sum[i].abs() >= x[i].abs() {
                    self.compensation[i] += (self.sum[i] - t) + x[i];
                } else {
                    self.compensation[i] += (x[i] - t) + self.sum[i];
                }
                self.sum[i] = t;
            }
            return;
        }

        if self.count == self.history + 1 {
            // Seed the moving average from the exact mean of the first
            // `history` samples.
            let seen = (self.count - 1) as f32;
            self.sum = (self.sum + self.compensation) / seen;
            self.compensation = Spectrum::ZERO;
        }

        let alpha = self.smoothing();
        for i in 0..SPECTRUM_SAMPLES {
            self.sum[i] += alpha * (x[i] - self.sum[i]);
        }
    }

    /// Current estimate of the average.
    pub fn color(&self) -> Light {
        if self.count == 0 {
            Light::black()
        } else if self.count <= self.history {
            Light::new((self.sum + self.compensation) / self.count as f32)
        } else {
            Light::new(self.sum)
        }
    }

    /// Forget every sample, keeping the history size.
    pub fn reset(&mut self) {
        *self = Self::new(self.history);
    }
}
