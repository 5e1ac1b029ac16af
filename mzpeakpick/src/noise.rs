//! Estimating the Gaussian noise floor of a sample series.

use std::f64::consts::SQRT_2;

use statrs::function::erf::erfc;

use crate::arrayops::OrderedPair;
use crate::PeakPickerError;

/// A Gaussian noise floor estimate.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Noise {
    pub mean: f64,
    pub variance: f64,
    pub standard_deviation: f64,
}

impl Noise {
    pub fn new(mean: f64, variance: f64) -> Self {
        Self {
            mean,
            variance,
            standard_deviation: variance.sqrt(),
        }
    }

    /// The probability of drawing a value at least this large from
    /// `Normal(mean, sd)`: the upper-tail significance of a sample
    /// against the noise floor.
    pub fn pvalue(&self, value: f64) -> f64 {
        0.5 * erfc((value - self.mean) / (self.standard_deviation * SQRT_2))
    }
}

/// Strategy for estimating the noise floor of a pair series.
pub trait NoiseCalculator {
    fn calculate_noise(&self, pairs: &[OrderedPair]) -> Result<Noise, PeakPickerError>;
}

/// Two-pass trimmed noise estimator.
///
/// The first pass takes the mean and variance of every y value; real
/// signal peaks bias both upward. The second pass recomputes them over
/// only the samples at or below `mean + sd·z_value_cutoff`, leaving an
/// approximation of the noise-only baseline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TwoPassNoiseCalculator {
    /// Samples above `mean + sd * z_value_cutoff` of the first pass are
    /// excluded from the second.
    pub z_value_cutoff: f64,
}

impl Default for TwoPassNoiseCalculator {
    fn default() -> Self {
        Self {
            z_value_cutoff: 1.0,
        }
    }
}

impl TwoPassNoiseCalculator {
    pub fn new(z_value_cutoff: f64) -> Self {
        Self { z_value_cutoff }
    }

    fn moments(ys: impl Iterator<Item = f64>) -> Option<Noise> {
        let mut count = 0usize;
        let mut sum = 0.0;
        let mut sum_of_squares = 0.0;
        for y in ys {
            count += 1;
            sum += y;
            sum_of_squares += y * y;
        }
        if count == 0 {
            return None;
        }
        let mean = sum / count as f64;
        let variance = (sum_of_squares / count as f64 - mean * mean).max(0.0);
        Some(Noise::new(mean, variance))
    }
}

impl NoiseCalculator for TwoPassNoiseCalculator {
    /// Fails with [`PeakPickerError::EmptyInput`] when the series is
    /// empty or the second pass retains no samples, rather than letting
    /// a zero count propagate as NaN.
    fn calculate_noise(&self, pairs: &[OrderedPair]) -> Result<Noise, PeakPickerError> {
        let first = Self::moments(pairs.iter().map(|p| p.y)).ok_or(PeakPickerError::EmptyInput)?;
        let cutoff = first.mean + first.standard_deviation * self.z_value_cutoff;
        Self::moments(pairs.iter().map(|p| p.y).filter(|y| *y <= cutoff))
            .ok_or(PeakPickerError::EmptyInput)
    }
}

#[cfg(test)]
mod test {
    use statrs::distribution::{ContinuousCDF, Normal};

    use super::*;

    /// Deterministic Normal(mean, sd) samples from evenly spaced
    /// quantiles.
    fn normal_quantile_samples(mean: f64, sd: f64, count: usize) -> Vec<f64> {
        let normal = Normal::new(mean, sd).unwrap();
        (0..count)
            .map(|i| normal.inverse_cdf((i as f64 + 0.5) / count as f64))
            .collect()
    }

    #[test]
    fn test_pvalue_matches_standard_normal_tails() {
        let noise = Noise::new(0.0, 1.0);
        assert!((noise.pvalue(1.0) - 0.159).abs() < 5e-4);
        assert!((noise.pvalue(2.0) - 0.023).abs() < 5e-4);
        assert!((noise.pvalue(3.0) - 0.001).abs() < 5e-4);
        assert!((noise.pvalue(0.0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_two_pass_recovers_baseline_under_spikes() {
        let mut ys = normal_quantile_samples(10.0, 1.0, 100);
        // spikes the first pass must absorb and the second must trim
        ys[10] += 100.0;
        ys[50] += 100.0;
        ys[90] += 100.0;
        let pairs: Vec<OrderedPair> = ys
            .iter()
            .enumerate()
            .map(|(i, y)| OrderedPair::new(i as f64, *y))
            .collect();

        let noise = TwoPassNoiseCalculator::default()
            .calculate_noise(&pairs)
            .unwrap();
        assert!((noise.mean - 10.0).abs() < 0.2, "mean {}", noise.mean);
        assert!(
            (noise.standard_deviation - 1.0).abs() < 0.2,
            "sd {}",
            noise.standard_deviation
        );
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(
            TwoPassNoiseCalculator::default().calculate_noise(&[]),
            Err(PeakPickerError::EmptyInput)
        );
    }

    #[test]
    fn test_all_samples_trimmed() {
        let pairs = vec![OrderedPair::new(0.0, 1.0), OrderedPair::new(1.0, 2.0)];
        // a cutoff far below the mean retains nothing
        let calculator = TwoPassNoiseCalculator::new(-10.0);
        assert_eq!(
            calculator.calculate_noise(&pairs),
            Err(PeakPickerError::EmptyInput)
        );
    }
}
