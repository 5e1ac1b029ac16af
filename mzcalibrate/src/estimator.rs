//! Newton-style least-squares refinement of a small parameter vector
//! against complex-valued samples.

use nalgebra::{DMatrix, DVector};
use num_complex::Complex64;

use crate::CalibrationError;

/// A complex-valued model `y = f(x; p)` with analytic first derivatives
/// with respect to its parameters.
pub trait ParametrizedFunction {
    /// Number of real parameters.
    fn parameter_count(&self) -> usize;

    /// Model value at `x` under `parameters`.
    fn value(&self, x: f64, parameters: &DVector<f64>) -> Complex64;

    /// Partial derivatives of the model value with respect to each
    /// parameter, evaluated at `x`.
    fn gradient(&self, x: f64, parameters: &DVector<f64>) -> DVector<Complex64>;
}

/// Iterative least-squares estimator for a [`ParametrizedFunction`]
/// over samples `(x, y)` with complex y.
///
/// Each [`iterate`](Self::iterate) call performs one Gauss–Newton step
/// on the squared residual `Σ |f(xᵢ; p) − yᵢ|²` and returns the change
/// in that error. A descending sequence of steps has strictly negative
/// changes; a non-negative change signals convergence or numerical
/// trouble and should terminate the caller's loop.
#[derive(Debug, Clone)]
pub struct ParameterEstimator<F: ParametrizedFunction> {
    function: F,
    data: Vec<(f64, Complex64)>,
    parameters: DVector<f64>,
}

impl<F: ParametrizedFunction> ParameterEstimator<F> {
    pub fn new(
        function: F,
        data: Vec<(f64, Complex64)>,
        initial: DVector<f64>,
    ) -> Result<Self, CalibrationError> {
        if data.is_empty() {
            return Err(CalibrationError::InsufficientData {
                required: 1,
                actual: 0,
            });
        }
        if initial.len() != function.parameter_count() {
            return Err(CalibrationError::ParameterCountMismatch {
                expected: function.parameter_count(),
                actual: initial.len(),
            });
        }
        Ok(Self {
            function,
            data,
            parameters: initial,
        })
    }

    /// The current parameter estimate.
    pub fn estimate(&self) -> &DVector<f64> {
        &self.parameters
    }

    pub fn set_estimate(&mut self, parameters: DVector<f64>) -> Result<(), CalibrationError> {
        if parameters.len() != self.function.parameter_count() {
            return Err(CalibrationError::ParameterCountMismatch {
                expected: self.function.parameter_count(),
                actual: parameters.len(),
            });
        }
        self.parameters = parameters;
        Ok(())
    }

    /// Total squared residual at the current estimate.
    pub fn error(&self) -> f64 {
        self.data
            .iter()
            .map(|(x, y)| (self.function.value(*x, &self.parameters) - y).norm_sqr())
            .sum()
    }

    /// One Gauss–Newton step; returns the change in error (new − old).
    pub fn iterate(&mut self) -> Result<f64, CalibrationError> {
        let n = self.parameters.len();
        let before = self.error();

        let mut hessian = DMatrix::<f64>::zeros(n, n);
        let mut gradient = DVector::<f64>::zeros(n);
        for (x, y) in &self.data {
            let residual = self.function.value(*x, &self.parameters) - y;
            let model_gradient = self.function.gradient(*x, &self.parameters);
            for j in 0..n {
                gradient[j] += 2.0 * (residual.conj() * model_gradient[j]).re;
                for k in j..n {
                    hessian[(j, k)] +=
                        2.0 * (model_gradient[j].conj() * model_gradient[k]).re;
                }
            }
        }
        for j in 0..n {
            for k in 0..j {
                hessian[(j, k)] = hessian[(k, j)];
            }
        }

        let step = hessian
            .lu()
            .solve(&(-gradient))
            .ok_or(CalibrationError::SingularSystem)?;
        self.parameters += step;

        Ok(self.error() - before)
    }
}

#[cfg(test)]
mod test {
    use num_traits::Zero;

    use super::*;

    /// `f(x; p) = (p0 + i·p1) · e^(ix)`, linear in its parameters, so
    /// one Gauss–Newton step is exact.
    struct RotatingAmplitude;

    impl ParametrizedFunction for RotatingAmplitude {
        fn parameter_count(&self) -> usize {
            2
        }

        fn value(&self, x: f64, parameters: &DVector<f64>) -> Complex64 {
            Complex64::new(parameters[0], parameters[1]) * Complex64::new(0.0, x).exp()
        }

        fn gradient(&self, x: f64, _parameters: &DVector<f64>) -> DVector<Complex64> {
            let phase = Complex64::new(0.0, x).exp();
            DVector::from_vec(vec![phase, Complex64::i() * phase])
        }
    }

    /// A model that ignores its parameter entirely.
    struct Constant;

    impl ParametrizedFunction for Constant {
        fn parameter_count(&self) -> usize {
            1
        }

        fn value(&self, _x: f64, _parameters: &DVector<f64>) -> Complex64 {
            Complex64::new(1.0, 0.0)
        }

        fn gradient(&self, _x: f64, _parameters: &DVector<f64>) -> DVector<Complex64> {
            DVector::from_vec(vec![Complex64::zero()])
        }
    }

    fn samples_from(parameters: (f64, f64)) -> Vec<(f64, Complex64)> {
        (0..10)
            .map(|i| {
                let x = 0.3 * i as f64;
                (
                    x,
                    Complex64::new(parameters.0, parameters.1) * Complex64::new(0.0, x).exp(),
                )
            })
            .collect()
    }

    #[test]
    fn test_linear_model_converges_in_one_step() {
        let data = samples_from((2.0, 3.0));
        let mut estimator =
            ParameterEstimator::new(RotatingAmplitude, data, DVector::from_vec(vec![0.0, 0.0]))
                .unwrap();

        let before = estimator.error();
        assert!(before > 1.0);
        let change = estimator.iterate().unwrap();
        assert!(change < 0.0);
        assert!(estimator.error() < 1e-20, "{}", estimator.error());
        assert!((estimator.estimate()[0] - 2.0).abs() < 1e-10);
        assert!((estimator.estimate()[1] - 3.0).abs() < 1e-10);

        // at the optimum a further step changes nothing
        let change = estimator.iterate().unwrap();
        assert!(change.abs() < 1e-20);
    }

    #[test]
    fn test_singular_hessian() {
        let data = samples_from((1.0, 0.0));
        let mut estimator =
            ParameterEstimator::new(Constant, data, DVector::from_vec(vec![0.0])).unwrap();
        assert!(matches!(
            estimator.iterate(),
            Err(CalibrationError::SingularSystem)
        ));
    }

    #[test]
    fn test_parameter_count_mismatch() {
        let data = samples_from((1.0, 0.0));
        assert!(matches!(
            ParameterEstimator::new(RotatingAmplitude, data, DVector::from_vec(vec![0.0])),
            Err(CalibrationError::ParameterCountMismatch {
                expected: 2,
                actual: 1
            })
        ));
    }

    #[test]
    fn test_empty_data() {
        assert!(matches!(
            ParameterEstimator::new(RotatingAmplitude, vec![], DVector::from_vec(vec![0.0, 0.0])),
            Err(CalibrationError::InsufficientData { .. })
        ));
    }
}
