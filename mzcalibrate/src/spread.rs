//! The posterior probability of candidate true masses given one
//! measurement.

use statrs::distribution::{Continuous, Normal};

use crate::database::MassDatabase;
use crate::CalibrationError;

/// Half-width of the candidate window, in multiples of
/// `measurement * error`.
const WINDOW_RADIUS_MULTIPLIER: f64 = 5.0;

/// One candidate mass and its posterior probability.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MassProbability {
    pub mass: f64,
    pub probability: f64,
}

/// Posterior distribution over candidate true masses for a single
/// measured mass, under a Gaussian relative measurement-error model
/// with a [`MassDatabase`] prior.
///
/// The computed form ([`Self::from_database`]) arrives normalized,
/// sorted descending by probability, with the summary statistics
/// filled in. The manual form ([`Self::new`] + [`Self::push`]) leaves
/// the statistics stale until [`Self::recalculate`] is called.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MassSpread {
    measurement: f64,
    distribution: Vec<MassProbability>,
    error: f64,
    sum_probability_over_mass: f64,
    sum_probability_over_mass2: f64,
}

impl MassSpread {
    /// An empty spread for manual construction.
    pub fn new(measurement: f64) -> Self {
        Self {
            measurement,
            ..Self::default()
        }
    }

    /// Compute the posterior for `measurement` against `database`,
    /// using `error` as the relative Gaussian width: each candidate
    /// mass `a` in the window `measurement ± 5·measurement·error` is
    /// scored by `Normal(measurement; a, a·error) · weight(a)` and the
    /// scores normalized into probabilities.
    ///
    /// An empty window yields an empty distribution with zero
    /// statistics, so the measurement contributes nothing downstream.
    pub fn from_database<D: MassDatabase + ?Sized>(
        measurement: f64,
        error: f64,
        database: &D,
    ) -> Result<Self, CalibrationError> {
        if !(error > 0.0 && error.is_finite()) {
            return Err(CalibrationError::InvalidErrorEstimate(error));
        }

        let radius = measurement * error * WINDOW_RADIUS_MULTIPLIER;
        let candidates = database.range(measurement - radius, measurement + radius);

        let mut spread = Self::new(measurement);
        if candidates.is_empty() {
            return Ok(spread);
        }

        let mut total = 0.0;
        for candidate in candidates {
            let width = candidate.mass * error;
            let likelihood = Normal::new(candidate.mass, width)
                .map_err(|_| CalibrationError::InvalidErrorEstimate(error))?
                .pdf(measurement);
            let score = likelihood * candidate.weight;
            spread.distribution.push(MassProbability {
                mass: candidate.mass,
                probability: score,
            });
            total += score;
        }

        if total > 0.0 {
            for pair in &mut spread.distribution {
                pair.probability /= total;
            }
        }
        spread
            .distribution
            .sort_by(|p, q| q.probability.total_cmp(&p.probability));
        spread.recalculate();
        Ok(spread)
    }

    /// Append a candidate. The summary statistics are stale until
    /// [`Self::recalculate`] runs.
    pub fn push(&mut self, mass: f64, probability: f64) {
        self.distribution.push(MassProbability { mass, probability });
    }

    /// Recompute the summary statistics from the current distribution.
    /// Idempotent, and does not renormalize the probabilities.
    pub fn recalculate(&mut self) {
        let mut error = 0.0;
        let mut sum_probability_over_mass = 0.0;
        let mut sum_probability_over_mass2 = 0.0;
        for pair in &self.distribution {
            let relative = (self.measurement - pair.mass) / pair.mass;
            error += pair.probability * relative * relative;
            sum_probability_over_mass += pair.probability / pair.mass;
            sum_probability_over_mass2 += pair.probability / (pair.mass * pair.mass);
        }
        self.error = error;
        self.sum_probability_over_mass = sum_probability_over_mass;
        self.sum_probability_over_mass2 = sum_probability_over_mass2;
    }

    pub fn measurement(&self) -> f64 {
        self.measurement
    }

    /// Candidates, sorted descending by probability in the computed
    /// form.
    pub fn distribution(&self) -> &[MassProbability] {
        &self.distribution
    }

    /// `Σ p(a) · ((measurement − a)/a)²`, the posterior-weighted
    /// relative squared error.
    pub fn error(&self) -> f64 {
        self.error
    }

    /// `Σ p(a)/a`
    pub fn sum_probability_over_mass(&self) -> f64 {
        self.sum_probability_over_mass
    }

    /// `Σ p(a)/a²`
    pub fn sum_probability_over_mass2(&self) -> f64 {
        self.sum_probability_over_mass2
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::database::IntegerMassDatabase;

    #[test]
    fn test_recalculate_is_idempotent() {
        let mut spread = MassSpread::new(2.0);
        spread.push(1.0, 1.0);
        spread.push(2.0, 2.0);
        spread.push(3.0, 3.0);

        spread.recalculate();
        let first = (
            spread.error(),
            spread.sum_probability_over_mass(),
            spread.sum_probability_over_mass2(),
        );
        spread.recalculate();
        let second = (
            spread.error(),
            spread.sum_probability_over_mass(),
            spread.sum_probability_over_mass2(),
        );

        assert_eq!(first, second);
        assert!((spread.sum_probability_over_mass() - 3.0).abs() < 1e-10);
        assert!((spread.sum_probability_over_mass2() - (1.0 + 5.0 / 6.0)).abs() < 1e-10);
    }

    #[test]
    fn test_statistics_are_stale_until_recalculated() {
        let mut spread = MassSpread::new(2.0);
        spread.push(2.0, 1.0);
        assert_eq!(spread.sum_probability_over_mass(), 0.0);
        spread.recalculate();
        assert!((spread.sum_probability_over_mass() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_single_candidate_posterior() {
        let database = IntegerMassDatabase::default();
        // radius 0.05 captures only the mass 1000
        let spread = MassSpread::from_database(1000.0034, 1e-5, &database).unwrap();

        assert_eq!(spread.distribution().len(), 1);
        assert!((spread.distribution()[0].probability - 1.0).abs() < 1e-12);
        let relative = 0.0034 / 1000.0;
        assert!((spread.error() - relative * relative).abs() < 1e-16);
        assert!((spread.sum_probability_over_mass() - 1.0 / 1000.0).abs() < 1e-12);
    }

    #[test]
    fn test_multi_candidate_posterior_is_normalized_and_sorted() {
        let database = IntegerMassDatabase::default();
        let spread = MassSpread::from_database(1000.2, 1e-3, &database).unwrap();

        assert!(spread.distribution().len() > 3);
        let total: f64 = spread.distribution().iter().map(|p| p.probability).sum();
        assert!((total - 1.0).abs() < 1e-9);
        // sorted descending, the closest mass first
        assert_eq!(spread.distribution()[0].mass, 1000.0);
        for window in spread.distribution().windows(2) {
            assert!(window[0].probability >= window[1].probability);
        }
    }

    #[test]
    fn test_empty_window_is_tolerated() {
        let database = IntegerMassDatabase::default();
        let spread = MassSpread::from_database(5000.0, 1e-6, &database).unwrap();
        assert!(spread.distribution().is_empty());
        assert_eq!(spread.error(), 0.0);
        assert_eq!(spread.sum_probability_over_mass(), 0.0);
    }

    #[test]
    fn test_invalid_error_estimate() {
        let database = IntegerMassDatabase::default();
        assert!(matches!(
            MassSpread::from_database(1000.0, 0.0, &database),
            Err(CalibrationError::InvalidErrorEstimate(_))
        ));
        assert!(matches!(
            MassSpread::from_database(1000.0, f64::NAN, &database),
            Err(CalibrationError::InvalidErrorEstimate(_))
        ));
    }
}
