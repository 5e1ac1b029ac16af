//! `mzcalibrate` refines raw FT mass spectrometry frequency
//! measurements into calibrated neutral masses.
//!
//! The central loop is the [`Calibrator`]: given `(frequency, charge)`
//! measurements, a [`MassDatabase`] of reference masses, and an initial
//! guess at the two [`CalibrationParameters`], each
//! [`iterate`](Calibrator::iterate) call converts the frequencies to
//! neutral masses, re-estimates the aggregate measurement error with an
//! [`ErrorEstimator`] (itself a fixed point over per-measurement
//! Bayesian [`MassSpread`] posteriors), and re-solves the
//! probability-weighted normal equations for the parameters. There is
//! no automatic convergence test; callers run a fixed iteration count
//! and inspect the [`error`](Calibrator::error) trend.
//!
//! The crate also provides a generic Newton-style
//! [`ParameterEstimator`] over complex-valued models, instantiated for
//! the truncated-Lorentzian lineshape by
//! [`TruncatedLorentzianEstimator`] to refine resonance parameters from
//! frequency-domain samples.
//!
//! Everything here is single-threaded and deterministic: identical
//! inputs produce bit-for-bit identical outputs.

pub mod calibrator;
pub mod database;
pub mod error_estimator;
pub mod estimator;
pub mod lorentzian;
pub mod params;
pub mod spread;

pub use crate::calibrator::{Calibrator, Measurement};
pub use crate::database::{
    IntegerMassDatabase, MassDatabase, MassEntry, PeptideMassDatabase, PeptideRecord,
    TextMassDatabase,
};
pub use crate::error_estimator::ErrorEstimator;
pub use crate::estimator::{ParameterEstimator, ParametrizedFunction};
pub use crate::lorentzian::{
    TruncatedLorentzian, TruncatedLorentzianEstimator, TruncatedLorentzianParameters,
};
pub use crate::params::{ion_mz, ion_neutral_mass, CalibrationParameters};
pub use crate::spread::{MassProbability, MassSpread};

use thiserror::Error;

/// An error that might occur during calibration or lineshape
/// estimation
#[derive(Debug, Error)]
pub enum CalibrationError {
    #[error("index {index} is out of range ({len} available)")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("no measurements to estimate from")]
    NoMeasurements,
    #[error("the error estimate must be positive and finite, got {0}")]
    InvalidErrorEstimate(f64),
    #[error("the observation duration must be non-zero")]
    ZeroObservationDuration,
    #[error("at least {required} samples are required, found {actual}")]
    InsufficientData { required: usize, actual: usize },
    #[error("expected {expected} parameters, found {actual}")]
    ParameterCountMismatch { expected: usize, actual: usize },
    #[error("the normal equations were singular")]
    SingularSystem,
    #[error("no real frequency produces m/z {0} under the current parameters")]
    NegativeDiscriminant(f64),
    #[error("parabolic center estimate failed: {0}")]
    CenterEstimate(#[from] mzpeakpick::PeakPickerError),
    #[error("failed to read mass database: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to decode mass database: {0}")]
    Decode(#[from] bincode::error::DecodeError),
    #[error("failed to encode mass database: {0}")]
    Encode(#[from] bincode::error::EncodeError),
}
