//! The truncated-Lorentzian lineshape and its parameter estimation.

use std::f64::consts::TAU;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

use nalgebra::DVector;
use num_complex::Complex64;
use num_traits::Zero;
use tracing::trace;

use mzpeakpick::arrayops::OrderedPair;
use mzpeakpick::parabola::Parabola;

use crate::estimator::{ParameterEstimator, ParametrizedFunction};
use crate::CalibrationError;

/// Parameters of the truncated-Lorentzian lineshape
/// `L(f) = α · (1 − e^(−T·s)) / s` with `s = 1/τ + 2πi·(f − f0)`,
/// the frequency-domain profile of a resonance observed over a finite
/// window of duration T.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TruncatedLorentzianParameters {
    /// Complex amplitude
    pub alpha: Complex64,
    /// Decay constant (seconds)
    pub tau: f64,
    /// Observation duration (seconds)
    pub t: f64,
    /// Resonance center frequency (Hz)
    pub f0: f64,
}

impl TruncatedLorentzianParameters {
    pub fn new(alpha: Complex64, tau: f64, t: f64, f0: f64) -> Self {
        Self { alpha, tau, t, f0 }
    }

    /// The lineshape value at frequency `f`.
    pub fn value(&self, f: f64) -> Complex64 {
        let s = Complex64::new(1.0 / self.tau, TAU * (f - self.f0));
        self.alpha * (Complex64::new(1.0, 0.0) - (-s * self.t).exp()) / s
    }

    /// Flatten to `[Re α, Im α, τ, f0]`, dividing the amplitude by
    /// `scale` and shifting the center by `-shift`.
    pub fn to_vector(&self, shift: f64, scale: Complex64) -> DVector<f64> {
        let alpha = self.alpha / scale;
        DVector::from_vec(vec![alpha.re, alpha.im, self.tau, self.f0 - shift])
    }

    /// Rebuild from a flat vector produced by [`Self::to_vector`].
    pub fn from_vector(vector: &DVector<f64>, t: f64, shift: f64, scale: Complex64) -> Self {
        Self::new(
            Complex64::new(vector[0], vector[1]) * scale,
            vector[2],
            t,
            vector[3] + shift,
        )
    }
}

/// The lineshape as a [`ParametrizedFunction`] over
/// `[Re α, Im α, τ, f0]` with a fixed observation duration.
#[derive(Debug, Clone, Copy)]
pub struct TruncatedLorentzian {
    /// Observation duration (seconds)
    pub t: f64,
}

impl ParametrizedFunction for TruncatedLorentzian {
    fn parameter_count(&self) -> usize {
        4
    }

    fn value(&self, f: f64, parameters: &DVector<f64>) -> Complex64 {
        let alpha = Complex64::new(parameters[0], parameters[1]);
        let s = Complex64::new(1.0 / parameters[2], TAU * (f - parameters[3]));
        alpha * (Complex64::new(1.0, 0.0) - (-s * self.t).exp()) / s
    }

    fn gradient(&self, f: f64, parameters: &DVector<f64>) -> DVector<Complex64> {
        let alpha = Complex64::new(parameters[0], parameters[1]);
        let tau = parameters[2];
        let s = Complex64::new(1.0 / tau, TAU * (f - parameters[3]));
        let decay = (-s * self.t).exp();
        let envelope = (Complex64::new(1.0, 0.0) - decay) / s;
        // d/ds of (1 − e^(−Ts))/s
        let envelope_ds = (self.t * decay - envelope) / s;
        DVector::from_vec(vec![
            envelope,
            Complex64::i() * envelope,
            alpha * envelope_ds * Complex64::new(-1.0 / (tau * tau), 0.0),
            alpha * envelope_ds * Complex64::new(0.0, -TAU),
        ])
    }
}

/// Estimates truncated-Lorentzian parameters from frequency-domain
/// samples `(frequency, complex amplitude)`.
///
/// The sample window is shift/scale normalized before refinement:
/// frequencies are taken relative to the initial center estimate and
/// amplitudes relative to the largest observed magnitude, keeping the
/// Newton system well conditioned. Estimates are denormalized on the
/// way out.
#[derive(Debug)]
pub struct TruncatedLorentzianEstimator {
    estimator: ParameterEstimator<TruncatedLorentzian>,
    t: f64,
    shift: f64,
    scale: Complex64,
    output_directory: Option<PathBuf>,
    iteration: usize,
}

impl TruncatedLorentzianEstimator {
    /// Build an estimator seeded with [`Self::initial_estimate`].
    pub fn new(
        data: &[(f64, Complex64)],
        observation_duration: f64,
    ) -> Result<Self, CalibrationError> {
        let initial = Self::initial_estimate(data, observation_duration)?;

        let shift = initial.f0;
        let magnitude = data.iter().map(|(_, y)| y.norm()).fold(0.0, f64::max);
        let scale = Complex64::new(if magnitude > 0.0 { magnitude } else { 1.0 }, 0.0);
        let normalized: Vec<(f64, Complex64)> = data
            .iter()
            .map(|(f, y)| (f - shift, y / scale))
            .collect();

        let estimator = ParameterEstimator::new(
            TruncatedLorentzian {
                t: observation_duration,
            },
            normalized,
            initial.to_vector(shift, scale),
        )?;
        Ok(Self {
            estimator,
            t: observation_duration,
            shift,
            scale,
            output_directory: None,
            iteration: 0,
        })
    }

    /// Write a parameter snapshot into `directory` after every
    /// iteration.
    pub fn with_output_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.output_directory = Some(directory.into());
        self
    }

    /// The current denormalized estimate.
    pub fn estimate(&self) -> TruncatedLorentzianParameters {
        TruncatedLorentzianParameters::from_vector(
            self.estimator.estimate(),
            self.t,
            self.shift,
            self.scale,
        )
    }

    pub fn set_estimate(
        &mut self,
        parameters: &TruncatedLorentzianParameters,
    ) -> Result<(), CalibrationError> {
        self.estimator
            .set_estimate(parameters.to_vector(self.shift, self.scale))
    }

    /// Squared-residual error at the current estimate, in normalized
    /// units.
    pub fn error(&self) -> f64 {
        self.estimator.error()
    }

    /// One Newton step; see [`ParameterEstimator::iterate`].
    pub fn iterate(&mut self) -> Result<f64, CalibrationError> {
        let change = self.estimator.iterate()?;
        self.iteration += 1;
        if let Some(directory) = self.output_directory.clone() {
            self.write_snapshot(&directory)?;
        }
        trace!(
            iteration = self.iteration,
            change,
            "lorentzian estimator step"
        );
        Ok(change)
    }

    /// Run up to `iteration_count` Newton steps, stopping early when a
    /// step fails to reduce the error, and return the final estimate.
    pub fn refine(
        &mut self,
        iteration_count: usize,
    ) -> Result<TruncatedLorentzianParameters, CalibrationError> {
        for _ in 0..iteration_count {
            if self.iterate()? >= 0.0 {
                break;
            }
        }
        Ok(self.estimate())
    }

    /// First-pass estimate from the raw window: τ = T, the center from
    /// a parabolic fit of 1/|y|² around the magnitude maximum (the
    /// Lorentzian magnitude squared is parabolic in frequency near
    /// resonance), and the amplitude from projecting the data onto a
    /// unit-amplitude model.
    pub fn initial_estimate(
        data: &[(f64, Complex64)],
        observation_duration: f64,
    ) -> Result<TruncatedLorentzianParameters, CalibrationError> {
        if observation_duration == 0.0 {
            return Err(CalibrationError::ZeroObservationDuration);
        }
        if data.len() < 3 {
            return Err(CalibrationError::InsufficientData {
                required: 3,
                actual: data.len(),
            });
        }

        let tau = observation_duration;

        // the endpoints are excluded so a parabola can straddle the max
        let max_index = (1..data.len() - 1)
            .max_by(|a, b| data[*a].1.norm_sqr().total_cmp(&data[*b].1.norm_sqr()))
            .ok_or(CalibrationError::InsufficientData {
                required: 3,
                actual: data.len(),
            })?;

        let center = data[max_index].0;
        let window: Vec<OrderedPair> = data[max_index - 1..=max_index + 1]
            .iter()
            .map(|(f, y)| OrderedPair::new(f - center, y.norm_sqr().recip()))
            .collect();
        let f0 = center + Parabola::fit(&window)?.center();

        let unit = TruncatedLorentzianParameters::new(
            Complex64::new(1.0, 0.0),
            tau,
            observation_duration,
            f0,
        );
        let mut numerator = Complex64::zero();
        let mut denominator = 0.0;
        for (f, y) in data {
            let model = unit.value(*f);
            numerator += y * model.conj();
            denominator += model.norm_sqr();
        }
        let alpha = if denominator > 0.0 {
            numerator / denominator
        } else {
            Complex64::zero()
        };

        Ok(TruncatedLorentzianParameters::new(
            alpha,
            tau,
            observation_duration,
            f0,
        ))
    }

    fn write_snapshot(&self, directory: &PathBuf) -> Result<(), CalibrationError> {
        fs::create_dir_all(directory)?;
        let path = directory.join(format!("estimate_{:03}.txt", self.iteration));
        let estimate = self.estimate();
        let mut file = fs::File::create(path)?;
        writeln!(file, "iteration {}", self.iteration)?;
        writeln!(
            file,
            "alpha {:.10e} {:.10e}",
            estimate.alpha.re, estimate.alpha.im
        )?;
        writeln!(file, "tau {:.10e}", estimate.tau)?;
        writeln!(file, "T {:.10e}", estimate.t)?;
        writeln!(file, "f0 {:.10e}", estimate.f0)?;
        writeln!(file, "error {:.10e}", self.error())?;
        Ok(())
    }
}
