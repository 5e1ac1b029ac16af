//! Locating candidate peak positions by signal-to-noise significance.

use itertools::Itertools;
use tracing::debug;

use crate::arrayops::{log_transform, OrderedPair};
use crate::noise::{NoiseCalculator, TwoPassNoiseCalculator};
use crate::PeakPickerError;

/// Strategy for locating candidate peak indices in a pair series.
///
/// Returned indices refer to the series the caller passed in, so a
/// downstream fitter can work on the raw, untransformed samples.
pub trait PeakFinder {
    fn find_peaks(&self, pairs: &[OrderedPair]) -> Result<Vec<usize>, PeakPickerError>;
}

/// Signal-to-noise rolling-product peak finder.
///
/// Each sample is converted into the upper-tail probability of the
/// estimated noise floor producing it, neighbouring p-values are
/// aggregated with a centered rolling product over `2r + 1` samples,
/// and the candidates are the strict local minima of that product that
/// fall below the significance threshold `pvalue(mean + z·sd)^(2r+1)`.
///
/// Intensities may optionally be log-transformed first to compress the
/// heavy-tailed dynamic range before the noise floor is estimated.
///
/// Two boundary behaviors are inherited from the product formulation:
/// windows are truncated at the series edges (fewer multiplicands), and
/// a flat plateau of tied products yields no candidate because the
/// local-minimum comparison is strict.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalToNoisePeakFinder {
    /// Radius of the rolling p-value product window
    pub window_radius: usize,
    /// Significance boundary in noise standard deviations
    pub z_value_threshold: f64,
    /// Log-transform intensities before estimating the noise floor
    pub preprocess_with_logarithm: bool,
}

impl Default for SignalToNoisePeakFinder {
    fn default() -> Self {
        Self {
            window_radius: 2,
            z_value_threshold: 3.0,
            preprocess_with_logarithm: true,
        }
    }
}

impl SignalToNoisePeakFinder {
    pub fn new(window_radius: usize, z_value_threshold: f64) -> Self {
        Self {
            window_radius,
            z_value_threshold,
            ..Self::default()
        }
    }

    pub fn without_logarithm(mut self) -> Self {
        self.preprocess_with_logarithm = false;
        self
    }
}

/// Centered product of `values` over a window of radius `radius`,
/// truncated at the slice boundaries.
pub(crate) fn rolling_products(values: &[f64], radius: usize) -> Vec<f64> {
    (0..values.len())
        .map(|i| {
            let low = i.saturating_sub(radius);
            let high = (i + radius + 1).min(values.len());
            values[low..high].iter().product()
        })
        .collect()
}

impl PeakFinder for SignalToNoisePeakFinder {
    fn find_peaks(&self, pairs: &[OrderedPair]) -> Result<Vec<usize>, PeakPickerError> {
        let transformed;
        let series = if self.preprocess_with_logarithm {
            transformed = log_transform(pairs);
            transformed.as_slice()
        } else {
            pairs
        };

        let noise = TwoPassNoiseCalculator::default().calculate_noise(series)?;
        let pvalues: Vec<f64> = series.iter().map(|p| noise.pvalue(p.y)).collect();
        let products = rolling_products(&pvalues, self.window_radius);

        // expected product at the significance boundary, raised to the
        // window's multiplicand count
        let boundary =
            noise.pvalue(noise.mean + self.z_value_threshold * noise.standard_deviation);
        let threshold = boundary.powi((1 + 2 * self.window_radius) as i32);

        // a peak in intensity is a local minimum in the p-value product
        let candidates: Vec<usize> = products
            .iter()
            .copied()
            .enumerate()
            .tuple_windows()
            .filter_map(|((_, previous), (i, current), (_, next))| {
                (current < previous && current < next && current < threshold).then_some(i)
            })
            .collect();

        debug!(
            candidates = candidates.len(),
            threshold, "scanned p-value products for peak candidates"
        );
        Ok(candidates)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_rolling_product_truncates_at_boundaries() {
        let products = rolling_products(&[0.5, 0.5, 0.5], 1);
        assert_eq!(products, vec![0.25, 0.125, 0.25]);

        let products = rolling_products(&[0.5, 0.5, 0.5, 0.5, 0.5], 2);
        assert_eq!(products[0], 0.125);
        assert_eq!(products[2], 0.03125);
        assert_eq!(products[4], 0.125);
    }

    #[test]
    fn test_finds_an_isolated_spike() {
        let ys = [
            1.0, 1.2, 0.9, 1.1, 1.0, 2.5, 6.0, 2.5, 1.0, 1.2, 0.9, 1.1, 1.0, 1.1,
        ];
        let pairs: Vec<OrderedPair> = ys
            .iter()
            .enumerate()
            .map(|(i, y)| OrderedPair::new(i as f64, *y))
            .collect();

        let finder = SignalToNoisePeakFinder::new(1, 2.0);
        let candidates = finder.find_peaks(&pairs).unwrap();
        assert_eq!(candidates, vec![6]);
    }

    #[test]
    fn test_edge_adjacent_peak_uses_truncated_window() {
        let ys = [
            2.5, 6.0, 2.5, 1.1, 0.9, 1.2, 1.0, 0.9, 1.1, 1.0, 1.2, 0.9,
        ];
        let pairs: Vec<OrderedPair> = ys
            .iter()
            .enumerate()
            .map(|(i, y)| OrderedPair::new(i as f64, *y))
            .collect();

        let finder = SignalToNoisePeakFinder::new(1, 2.0);
        let candidates = finder.find_peaks(&pairs).unwrap();
        assert_eq!(candidates, vec![1]);
    }

    #[test]
    fn test_flat_plateau_yields_no_candidate() {
        let ys = [1.0, 1.2, 0.9, 10.0, 10.0, 1.1, 1.0, 1.2, 0.9, 1.1];
        let pairs: Vec<OrderedPair> = ys
            .iter()
            .enumerate()
            .map(|(i, y)| OrderedPair::new(i as f64, *y))
            .collect();

        let finder = SignalToNoisePeakFinder::new(1, 2.0).without_logarithm();
        let candidates = finder.find_peaks(&pairs).unwrap();
        assert!(candidates.is_empty(), "{candidates:?}");
    }

    #[test]
    fn test_empty_series() {
        let finder = SignalToNoisePeakFinder::default();
        assert_eq!(finder.find_peaks(&[]), Err(PeakPickerError::EmptyInput));
    }
}
