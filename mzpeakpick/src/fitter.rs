//! Refining candidate peaks with a local parabolic model.

use crate::arrayops::OrderedPair;
use crate::parabola::Parabola;
use crate::peak::Peak;
use crate::PeakPickerError;

/// Strategy for refining candidate indices into [`Peak`] records.
pub trait PeakFitter {
    fn fit_peak(&self, pairs: &[OrderedPair], index: usize) -> Result<Peak, PeakPickerError>;

    /// Fit every candidate in `indices`, one peak per index, order
    /// preserved.
    fn fit_peaks(
        &self,
        pairs: &[OrderedPair],
        indices: &[usize],
    ) -> Result<Vec<Peak>, PeakPickerError> {
        indices.iter().map(|i| self.fit_peak(pairs, *i)).collect()
    }
}

/// Parabolic peak refinement.
///
/// A symmetric window of `2r + 1` samples around the candidate index,
/// clipped at the series boundaries, is fit with a parabola. The peak
/// center is the parabola's vertex, the intensity its value there, the
/// area the sum of the raw intensities over the window, and the error
/// the RMS residual of the fit. A second, independently sized raw
/// sample window is copied into [`Peak::data`] for provenance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParabolaPeakFitter {
    /// Radius of the fit window around the candidate
    pub window_radius: usize,
    /// Radius of the raw-sample window copied into [`Peak::data`],
    /// independent of the fit window
    pub data_window_radius: usize,
}

impl Default for ParabolaPeakFitter {
    fn default() -> Self {
        Self {
            window_radius: 1,
            data_window_radius: 3,
        }
    }
}

impl ParabolaPeakFitter {
    pub fn new(window_radius: usize) -> Self {
        Self {
            window_radius,
            ..Self::default()
        }
    }

    pub fn with_data_window_radius(mut self, data_window_radius: usize) -> Self {
        self.data_window_radius = data_window_radius;
        self
    }

    fn window(pairs: &[OrderedPair], index: usize, radius: usize) -> &[OrderedPair] {
        let low = index.saturating_sub(radius);
        let high = (index + radius + 1).min(pairs.len());
        &pairs[low..high]
    }
}

impl PeakFitter for ParabolaPeakFitter {
    fn fit_peak(&self, pairs: &[OrderedPair], index: usize) -> Result<Peak, PeakPickerError> {
        if index >= pairs.len() {
            return Err(PeakPickerError::IndexOutOfRange {
                index,
                len: pairs.len(),
            });
        }
        let window = Self::window(pairs, index, self.window_radius);
        if window.len() < 3 {
            return Err(PeakPickerError::InsufficientData {
                required: 3,
                actual: window.len(),
            });
        }

        // fit in coordinates relative to the candidate sample; a
        // narrow window at a large x is otherwise too ill-conditioned
        // for a stable vertex
        let origin = pairs[index].x;
        let shifted: Vec<OrderedPair> = window
            .iter()
            .map(|p| OrderedPair::new(p.x - origin, p.y))
            .collect();
        let parabola = Parabola::fit(&shifted)?;

        let mz = origin + parabola.center();
        let intensity = parabola.center_value();
        let area = window.iter().map(|p| p.y).sum();
        let squared_residuals: f64 = shifted
            .iter()
            .map(|p| {
                let residual = p.y - parabola.y(p.x);
                residual * residual
            })
            .sum();
        let error = (squared_residuals / window.len() as f64).sqrt();
        let data = Self::window(pairs, index, self.data_window_radius).to_vec();

        Ok(Peak::new(mz, 0.0, intensity, area, error, data))
    }
}
