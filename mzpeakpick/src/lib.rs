//! `mzpeakpick` is a library for converting ordered (x, y) signal data
//! into discrete, locally refined peak records.
//!
//! The pipeline has three pluggable stages. A [`NoiseCalculator`]
//! estimates a Gaussian noise floor, a [`PeakFinder`] locates candidate
//! peak indices by signal-to-noise significance, and a [`PeakFitter`]
//! refines each candidate with a local model fit. [`PeakExtractor`]
//! composes a finder and a fitter into a single operation, running the
//! finder on a (possibly log-transformed) view of the series and the
//! fitter on the raw samples.
//!
//! # Usage
//! ```
//! use mzpeakpick::{OrderedPair, ParabolaPeakFitter, PeakFitter};
//!
//! let series: Vec<OrderedPair> = [
//!     (1.0, 1.0),
//!     (2.0, 4.0),
//!     (3.0, 9.0),
//!     (4.0, 4.0),
//!     (5.0, 1.0),
//! ]
//! .into_iter()
//! .map(OrderedPair::from)
//! .collect();
//!
//! let fitter = ParabolaPeakFitter::default();
//! let peak = fitter.fit_peak(&series, 2).unwrap();
//! assert!((peak.mz - 3.0).abs() < 1e-9);
//! assert!((peak.intensity - 9.0).abs() < 1e-9);
//! ```
//!
//! ## Data ownership
//! Every stage borrows the caller's `&[OrderedPair]` slice and returns
//! freshly allocated results; candidate indices always refer to the
//! series the caller passed in, so a fitter can be pointed back at the
//! raw, untransformed samples.

pub mod arrayops;
pub mod extractor;
pub mod finder;
pub mod fitter;
pub mod noise;
pub mod parabola;
pub mod peak;

pub use crate::arrayops::OrderedPair;
pub use crate::extractor::PeakExtractor;
pub use crate::finder::{PeakFinder, SignalToNoisePeakFinder};
pub use crate::fitter::{ParabolaPeakFitter, PeakFitter};
pub use crate::noise::{Noise, NoiseCalculator, TwoPassNoiseCalculator};
pub use crate::parabola::Parabola;
pub use crate::peak::Peak;

use thiserror::Error;

/// An error that might occur while picking peaks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PeakPickerError {
    #[error("the input series was empty or no samples survived trimming")]
    EmptyInput,
    #[error("at least {required} samples are required, found {actual}")]
    InsufficientData { required: usize, actual: usize },
    #[error("index {index} is out of range for a series of length {len}")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("the fitted system was singular")]
    SingularFit,
}
