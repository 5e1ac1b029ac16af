//! Self-consistent aggregate error estimation across measurements.

use tracing::debug;

use crate::database::MassDatabase;
use crate::spread::MassSpread;
use crate::CalibrationError;

/// Iteratively re-estimates the RMS relative measurement error of a
/// set of neutral-mass measurements against a reference database.
///
/// Each [`iterate`](Self::iterate) call rebuilds every per-measurement
/// [`MassSpread`] using the *current* error estimate as the Gaussian
/// width, then adopts `sqrt(Σ spreadᵢ.error / N)` as the next
/// estimate. Feeding the estimate back into the widths makes this a
/// fixed-point refinement, not a guaranteed descent; callers run a
/// fixed iteration count rather than testing for convergence.
#[derive(Debug)]
pub struct ErrorEstimator<'a, D: MassDatabase + ?Sized> {
    database: &'a D,
    measurements: Vec<f64>,
    error: f64,
    spreads: Vec<MassSpread>,
}

impl<'a, D: MassDatabase + ?Sized> ErrorEstimator<'a, D> {
    /// `measurements` are neutral masses; `initial_error` seeds the
    /// first iteration's Gaussian width. An empty measurement list
    /// fails fast rather than dividing by zero later.
    pub fn new(
        database: &'a D,
        measurements: Vec<f64>,
        initial_error: f64,
    ) -> Result<Self, CalibrationError> {
        if measurements.is_empty() {
            return Err(CalibrationError::NoMeasurements);
        }
        if !(initial_error > 0.0 && initial_error.is_finite()) {
            return Err(CalibrationError::InvalidErrorEstimate(initial_error));
        }
        Ok(Self {
            database,
            measurements,
            error: initial_error,
            spreads: Vec::new(),
        })
    }

    /// One fixed-point step; returns the updated aggregate error.
    pub fn iterate(&mut self) -> Result<f64, CalibrationError> {
        let mut spreads = Vec::with_capacity(self.measurements.len());
        let mut total = 0.0;
        for measurement in &self.measurements {
            let spread = MassSpread::from_database(*measurement, self.error, self.database)?;
            total += spread.error();
            spreads.push(spread);
        }
        self.spreads = spreads;
        self.error = (total / self.measurements.len() as f64).sqrt();
        debug!(error = self.error, "error estimator step");
        Ok(self.error)
    }

    /// The current aggregate error estimate.
    pub fn error(&self) -> f64 {
        self.error
    }

    pub fn measurement_count(&self) -> usize {
        self.measurements.len()
    }

    /// Per-measurement detail from the most recent iteration.
    pub fn mass_spread(&self, index: usize) -> Result<&MassSpread, CalibrationError> {
        self.spreads
            .get(index)
            .ok_or(CalibrationError::IndexOutOfRange {
                index,
                len: self.spreads.len(),
            })
    }

    pub(crate) fn into_mass_spreads(self) -> Vec<MassSpread> {
        self.spreads
    }
}
