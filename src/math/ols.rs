//! Ordinary least squares.
//!
//! Coefficient fits solve
//!
//! ```text
//! minimize Σ (y_i - φ_i^T β)^2
//! ```
//!
//! where each row `φ_i` is the formula's response to unit coefficients at one
//! grid node. The design matrix is tall (one row per node) and can be close to
//! rank deficient when two terms behave alike over the mesh, so we solve it
//! through the SVD rather than a QR factorisation.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` when no tolerance yields a finite solution.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    if x.nrows() == 0 || x.nrows() != y.len() {
        return None;
    }
    let svd = x.clone().svd(true, true);

    // Singular values below `tol` are treated as zero; loosen until it solves.
    for &tol in &[1e-12, 1e-10, 1e-8] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Residual statistics of a fitted linear model: `(rmse, max |residual|)`.
pub fn residual_stats(x: &DMatrix<f64>, y: &DVector<f64>, beta: &DVector<f64>) -> (f64, f64) {
    let residuals = y - x * beta;
    if residuals.is_empty() {
        return (0.0, 0.0);
    }
    let rmse = (residuals.norm_squared() / residuals.len() as f64).sqrt();
    let max = residuals.iter().fold(0.0_f64, |m, r| m.max(r.abs()));
    (rmse, max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn least_squares_solves_simple_system() {
        // Fit y = 2 + 3x on x = [0,1,2]
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert!((beta[1] - 3.0).abs() < 1e-10);

        let (rmse, max) = residual_stats(&x, &y, &beta);
        assert!(rmse < 1e-10 && max < 1e-10);
    }

    #[test]
    fn mismatched_or_empty_systems_are_rejected() {
        let x = DMatrix::<f64>::zeros(0, 2);
        assert!(solve_least_squares(&x, &DVector::zeros(0)).is_none());
        let x = DMatrix::from_row_slice(2, 1, &[1.0, 1.0]);
        assert!(solve_least_squares(&x, &DVector::zeros(3)).is_none());
    }
}
