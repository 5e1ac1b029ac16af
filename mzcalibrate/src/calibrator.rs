//! The outer calibration loop, from raw frequency measurements to
//! calibrated masses.

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use chemical_elements::PROTON;
use nalgebra::{Matrix2, Vector2};
use tracing::{debug, warn};

use crate::database::MassDatabase;
use crate::error_estimator::ErrorEstimator;
use crate::params::{ion_neutral_mass, CalibrationParameters};
use crate::spread::MassSpread;
use crate::CalibrationError;

/// One raw observation: an excitation frequency and the ion's charge.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Measurement {
    pub frequency: f64,
    pub charge: i32,
}

impl Measurement {
    pub fn new(frequency: f64, charge: i32) -> Self {
        Self { frequency, charge }
    }
}

/// Iterative frequency-to-mass calibrator.
///
/// Each [`iterate`](Self::iterate) call converts the raw frequencies to
/// neutral masses under the current parameters, refines the aggregate
/// error estimate against the reference database, and re-solves the
/// probability-weighted normal equations for (A, B). A singular system
/// skips the parameter update for that iteration, keeping the previous
/// parameters, but the refreshed error estimate is still adopted;
/// single degenerate iterations can be transient.
///
/// There is no automatic convergence test. Callers iterate a fixed
/// count and inspect the [`error`](Self::error) trend.
#[derive(Debug)]
pub struct Calibrator<'a, D: MassDatabase + ?Sized> {
    database: &'a D,
    measurements: Vec<Measurement>,
    parameters: CalibrationParameters,
    error: f64,
    error_estimator_iteration_count: usize,
    iteration: usize,
    spreads: Vec<MassSpread>,
    output_directory: Option<PathBuf>,
}

impl<'a, D: MassDatabase + ?Sized> Calibrator<'a, D> {
    pub fn new(
        database: &'a D,
        measurements: Vec<Measurement>,
        initial_parameters: CalibrationParameters,
        initial_error: f64,
        error_estimator_iteration_count: usize,
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
            parameters: initial_parameters,
            error: initial_error,
            error_estimator_iteration_count,
            iteration: 0,
            spreads: Vec::new(),
            output_directory: None,
        })
    }

    /// Write a small per-iteration state snapshot into `directory`.
    pub fn with_output_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.output_directory = Some(directory.into());
        self
    }

    /// One outer calibration step.
    pub fn iterate(&mut self) -> Result<(), CalibrationError> {
        let masses: Vec<f64> = self
            .measurements
            .iter()
            .map(|m| ion_neutral_mass(self.parameters.mz(m.frequency), m.charge))
            .collect();

        let mut estimator = ErrorEstimator::new(self.database, masses, self.error)?;
        for _ in 0..self.error_estimator_iteration_count {
            estimator.iterate()?;
        }
        self.error = estimator.error();
        self.spreads = estimator.into_mass_spreads();

        self.update_parameters();
        self.iteration += 1;

        if let Some(directory) = self.output_directory.clone() {
            self.write_snapshot(&directory)?;
        }
        debug!(
            iteration = self.iteration,
            a = self.parameters.a,
            b = self.parameters.b,
            error = self.error,
            "calibrator step"
        );
        Ok(())
    }

    /// Solve the probability-weighted normal equations for (A, B),
    /// minimizing `Σᵢ E[((mᵢ(A, B) − a)/a)²]` over each measurement's
    /// posterior. With `u = z/f` and `v = z/f²` the neutral mass is
    /// `A·u + B·v − z·proton`, which makes the system linear in the
    /// parameters.
    fn update_parameters(&mut self) {
        let mut uu = 0.0;
        let mut uv = 0.0;
        let mut vv = 0.0;
        let mut ru = 0.0;
        let mut rv = 0.0;
        for (measurement, spread) in self.measurements.iter().zip(&self.spreads) {
            let z = measurement.charge as f64;
            let f = measurement.frequency;
            let u = z / f;
            let v = z / (f * f);
            let p1 = spread.sum_probability_over_mass();
            let p2 = spread.sum_probability_over_mass2();
            let target = p1 + z * PROTON * p2;
            uu += u * u * p2;
            uv += u * v * p2;
            vv += v * v * p2;
            ru += u * target;
            rv += v * target;
        }

        let matrix = Matrix2::new(uu, uv, uv, vv);
        let rhs = Vector2::new(ru, rv);
        match matrix.lu().solve(&rhs) {
            Some(solution) => {
                self.parameters = CalibrationParameters::new(solution[0], solution[1]);
            }
            None => {
                warn!(
                    iteration = self.iteration,
                    "singular calibration system, parameters unchanged"
                );
            }
        }
    }

    fn write_snapshot(&self, directory: &PathBuf) -> Result<(), CalibrationError> {
        fs::create_dir_all(directory)?;
        let path = directory.join(format!("calibration_{:03}.txt", self.iteration));
        let mut file = fs::File::create(path)?;
        writeln!(file, "iteration {}", self.iteration)?;
        writeln!(file, "A {:.10e}", self.parameters.a)?;
        writeln!(file, "B {:.10e}", self.parameters.b)?;
        writeln!(file, "error {:.10e}", self.error)?;
        Ok(())
    }

    pub fn parameters(&self) -> CalibrationParameters {
        self.parameters
    }

    /// The aggregate error estimate from the most recent iteration.
    pub fn error(&self) -> f64 {
        self.error
    }

    /// How many [`iterate`](Self::iterate) calls have completed.
    pub fn iteration_count(&self) -> usize {
        self.iteration
    }

    pub fn measurement_count(&self) -> usize {
        self.measurements.len()
    }

    pub fn measurement(&self, index: usize) -> Result<&Measurement, CalibrationError> {
        self.measurements
            .get(index)
            .ok_or(CalibrationError::IndexOutOfRange {
                index,
                len: self.measurements.len(),
            })
    }

    /// Per-measurement posterior detail from the most recent
    /// iteration.
    pub fn mass_spread(&self, index: usize) -> Result<&MassSpread, CalibrationError> {
        self.spreads
            .get(index)
            .ok_or(CalibrationError::IndexOutOfRange {
                index,
                len: self.spreads.len(),
            })
    }
}
