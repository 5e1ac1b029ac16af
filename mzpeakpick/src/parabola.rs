//! Least-squares fitting of a parabola to a short run of samples.

use nalgebra::{Matrix3, Vector3};

use crate::arrayops::OrderedPair;
use crate::PeakPickerError;

/// The quadratic `y = a·x² + b·x + c`, fit to three or more samples.
///
/// The fit solves the unweighted normal equations directly, which is
/// exact for three distinct samples. A narrow window far from the
/// origin makes the quadratic basis nearly collinear, so callers
/// fitting such windows should shift x toward zero first; both the
/// peak fitter and the lineshape center estimate do.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Parabola {
    /// Coefficients ordered `[a, b, c]`
    pub coefficients: [f64; 3],
}

impl Parabola {
    pub fn new(a: f64, b: f64, c: f64) -> Self {
        Self {
            coefficients: [a, b, c],
        }
    }

    /// Least-squares fit over the given samples.
    pub fn fit(pairs: &[OrderedPair]) -> Result<Self, PeakPickerError> {
        if pairs.len() < 3 {
            return Err(PeakPickerError::InsufficientData {
                required: 3,
                actual: pairs.len(),
            });
        }

        // normal equations over the quadratic basis {x², x, 1}
        let mut sx = [0.0f64; 5];
        let mut sxy = [0.0f64; 3];
        for p in pairs {
            let x2 = p.x * p.x;
            sx[0] += 1.0;
            sx[1] += p.x;
            sx[2] += x2;
            sx[3] += x2 * p.x;
            sx[4] += x2 * x2;
            sxy[0] += p.y;
            sxy[1] += p.x * p.y;
            sxy[2] += x2 * p.y;
        }

        let matrix = Matrix3::new(
            sx[4], sx[3], sx[2], //
            sx[3], sx[2], sx[1], //
            sx[2], sx[1], sx[0],
        );
        let rhs = Vector3::new(sxy[2], sxy[1], sxy[0]);
        let solution = matrix
            .lu()
            .solve(&rhs)
            .ok_or(PeakPickerError::SingularFit)?;
        Ok(Self::new(solution[0], solution[1], solution[2]))
    }

    /// Evaluate the parabola at `x`.
    #[inline]
    pub fn y(&self, x: f64) -> f64 {
        let [a, b, c] = self.coefficients;
        (a * x + b) * x + c
    }

    /// The x coordinate of the vertex, `-b / 2a`.
    #[inline]
    pub fn center(&self) -> f64 {
        let [a, b, _] = self.coefficients;
        -b / (2.0 * a)
    }

    /// The parabola's value at its vertex.
    #[inline]
    pub fn center_value(&self) -> f64 {
        self.y(self.center())
    }
}
