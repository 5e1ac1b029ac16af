//! End-to-end peak extraction: find candidates, then fit them.

use tracing::debug;

use crate::arrayops::{log_transform, OrderedPair};
use crate::finder::PeakFinder;
use crate::fitter::PeakFitter;
use crate::peak::Peak;
use crate::PeakPickerError;

/// A pipeline composing an injected [`PeakFinder`] and [`PeakFitter`].
///
/// Candidate detection may run on a log-transformed copy of the series,
/// but fitting always runs on the original samples, so peak heights and
/// areas are reported in real intensities.
///
/// When `preprocess_with_logarithm` is enabled here the finder receives
/// the already-transformed series; combine it only with a finder whose
/// own preprocessing is disabled, or the series will be transformed
/// twice. The default finder preprocesses for itself, so the extractor
/// flag defaults to off.
#[derive(Debug, Clone)]
pub struct PeakExtractor<F: PeakFinder, T: PeakFitter> {
    finder: F,
    fitter: T,
    preprocess_with_logarithm: bool,
}

impl<F: PeakFinder, T: PeakFitter> PeakExtractor<F, T> {
    pub fn new(finder: F, fitter: T) -> Self {
        Self {
            finder,
            fitter,
            preprocess_with_logarithm: false,
        }
    }

    /// As [`Self::new`], with the extractor-level log transform turned
    /// on.
    pub fn with_logarithm(finder: F, fitter: T) -> Self {
        Self {
            finder,
            fitter,
            preprocess_with_logarithm: true,
        }
    }

    pub fn finder(&self) -> &F {
        &self.finder
    }

    pub fn fitter(&self) -> &T {
        &self.fitter
    }

    pub fn extract_peaks(&self, pairs: &[OrderedPair]) -> Result<Vec<Peak>, PeakPickerError> {
        let indices = if self.preprocess_with_logarithm {
            let transformed = log_transform(pairs);
            self.finder.find_peaks(&transformed)?
        } else {
            self.finder.find_peaks(pairs)?
        };
        debug!(candidates = indices.len(), "fitting candidate peaks");
        self.fitter.fit_peaks(pairs, &indices)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::finder::SignalToNoisePeakFinder;
    use crate::fitter::ParabolaPeakFitter;

    /// A profile spectrum with three isotope-cluster bumps over a noisy
    /// baseline.
    fn isotope_cluster_spectrum() -> Vec<OrderedPair> {
        let centers = [810.41, 810.91, 811.41];
        (0..160)
            .map(|i| {
                let x = 810.0 + 0.01 * i as f64;
                let baseline = 1.0 + 0.5 * (i as f64).sin();
                let signal: f64 = centers
                    .iter()
                    .map(|c| 50.0 * (-(x - c) * (x - c) / (2.0 * 0.02 * 0.02)).exp())
                    .sum();
                OrderedPair::new(x, baseline + signal)
            })
            .collect()
    }

    #[test_log::test]
    fn test_extracts_three_isotope_cluster_peaks() {
        let spectrum = isotope_cluster_spectrum();
        let extractor = PeakExtractor::new(
            SignalToNoisePeakFinder::new(2, 2.0),
            ParabolaPeakFitter::new(1),
        );
        let peaks = extractor.extract_peaks(&spectrum).unwrap();

        assert_eq!(peaks.len(), 3, "{peaks:?}");
        for (peak, expected) in peaks.iter().zip([810.41, 810.91, 811.41]) {
            assert!(
                (peak.mz - expected).abs() < 0.01,
                "mz {} expected {}",
                peak.mz,
                expected
            );
            assert!(peak.intensity > 40.0);
            assert!(!peak.data.is_empty());
        }
    }

    #[test]
    fn test_extractor_level_transform_fits_raw_intensities() {
        let ys = [
            1.0, 1.2, 0.9, 1.1, 1.0, 2.5, 6.0, 2.5, 1.0, 1.2, 0.9, 1.1, 1.0, 1.1,
        ];
        let pairs: Vec<OrderedPair> = ys
            .iter()
            .enumerate()
            .map(|(i, y)| OrderedPair::new(i as f64, *y))
            .collect();

        // the finder's own preprocessing is off; the extractor
        // transforms instead
        let extractor = PeakExtractor::with_logarithm(
            SignalToNoisePeakFinder::new(1, 2.0).without_logarithm(),
            ParabolaPeakFitter::new(1),
        );
        let peaks = extractor.extract_peaks(&pairs).unwrap();
        assert_eq!(peaks.len(), 1);
        // fitting used the raw series, not the log-transformed copy
        assert!((peaks[0].mz - 6.0).abs() < 1e-9);
        assert!((peaks[0].intensity - 6.0).abs() < 1e-9);
    }
}
