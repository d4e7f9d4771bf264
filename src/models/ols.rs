//! Ordinary least squares used for the Hannan–Rissanen start of the ARIMA fit.
//!
//! Design matrices here are tall and tiny (a handful of lag columns), so an
//! SVD solve is cheap and copes with near-collinear lags.

use nalgebra::{DMatrix, DVector};

/// Solve `min ||X β - y||²` using SVD.
///
/// Regression designs are tall (rows > cols), and nalgebra's `QR::solve` only
/// handles square systems and panics otherwise, so the pseudo-inverse goes
/// through the SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    if x.nrows() == 0 || x.nrows() != y.len() {
        return None;
    }

    let svd = x.clone().svd(true, true);

    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Regress `series[t]` on its own `order` lags; returns coefficients and residuals.
///
/// Residuals are aligned with `series` and zero for the first `order` points.
pub fn fit_long_ar(series: &[f64], order: usize) -> Option<(Vec<f64>, Vec<f64>)> {
    let n = series.len();
    if order == 0 || n <= order + 1 {
        return None;
    }

    let rows = n - order;
    let x = DMatrix::from_fn(rows, order, |r, c| series[r + order - 1 - c]);
    let y = DVector::from_iterator(rows, series[order..].iter().copied());

    let beta = solve_least_squares(&x, &y)?;
    let fitted = &x * &beta;

    let mut residuals = vec![0.0; n];
    for r in 0..rows {
        residuals[r + order] = y[r] - fitted[r];
    }

    Some((beta.iter().copied().collect(), residuals))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_least_squares_solves_simple_system() {
        // Fit y = 2 + 3x on x = [0,1,2]
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert!((beta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn test_mismatched_shapes() {
        let x = DMatrix::from_row_slice(2, 1, &[1.0, 2.0]);
        let y = DVector::from_row_slice(&[1.0, 2.0, 3.0]);
        assert!(solve_least_squares(&x, &y).is_none());
    }

    #[test]
    fn test_long_ar_recovers_ar1() {
        // x_t = 0.5 x_{t-1} + shock, shocks from a fixed-seed LCG
        let mut state: u64 = 42;
        let mut series = vec![1.0];
        for t in 1..2000 {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            let shock = (state >> 11) as f64 / (1u64 << 53) as f64 - 0.5;
            series.push(0.5 * series[t - 1] + shock);
        }

        let (beta, residuals) = fit_long_ar(&series, 1).unwrap();
        assert!((beta[0] - 0.5).abs() < 0.1);
        assert_eq!(residuals.len(), series.len());
        assert_eq!(residuals[0], 0.0);
    }

    #[test]
    fn test_long_ar_too_short() {
        assert!(fit_long_ar(&[1.0, 2.0], 2).is_none());
    }
}
