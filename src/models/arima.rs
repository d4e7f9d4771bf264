//! ARIMA(p,d,q) estimation and forecasting.
//!
//! Estimation is conditional sum of squares (CSS) on the `d`-times
//! differenced series:
//!
//! ```text
//! z_t = φ1 z_{t-1} + … + φp z_{t-p} + e_t + θ1 e_{t-1} + … + θq e_{t-q}
//! ```
//!
//! - start values come from Hannan–Rissanen (long AR by OLS, then a second
//!   regression on lagged values and lagged long-AR residuals)
//! - Nelder–Mead refines them; parameters outside the stationary/invertible
//!   region score `+∞`
//! - a mean is estimated only when `d = 0`
//!
//! Forecast intervals use the ψ-weights of the integrated process.

use nalgebra::{DMatrix, DVector};
use tracing::debug;
use crate::error::PipelineError;
use crate::models::ols::{fit_long_ar, solve_least_squares};
use crate::models::optimize::{nelder_mead, NelderMeadOptions};

/// Two-sided 95% normal quantile
const Z_95: f64 = 1.959963984540054;
/// Largest root modulus (companion form) accepted as stationary/invertible
const ROOT_LIMIT: f64 = 0.999;
const MAX_AR_MA: usize = 3;
const MAX_DIFF: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArimaOrder {
    pub p: usize,
    pub d: usize,
    pub q: usize,
}

impl ArimaOrder {
    pub const fn new(p: usize, d: usize, q: usize) -> Self {
        Self { p, d, q }
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.p > MAX_AR_MA || self.q > MAX_AR_MA || self.d > MAX_DIFF {
            return Err(PipelineError::Fit(format!(
                "unsupported ARIMA order {} (p,q <= {}, d <= {})",
                self, MAX_AR_MA, MAX_DIFF
            )));
        }
        Ok(())
    }

    pub fn min_observations(&self) -> usize {
        self.p + self.d + self.q + 8
    }
}

impl Default for ArimaOrder {
    fn default() -> Self {
        Self::new(1, 1, 1)
    }
}

impl From<[usize; 3]> for ArimaOrder {
    fn from(order: [usize; 3]) -> Self {
        Self::new(order[0], order[1], order[2])
    }
}

impl std::fmt::Display for ArimaOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({},{},{})", self.p, self.d, self.q)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArimaForecast {
    pub mean: Vec<f64>,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct FittedArima {
    order: ArimaOrder,
    ar: Vec<f64>,
    ma: Vec<f64>,
    mean: f64,
    sigma2: f64,
    /// Last value of the series at each differencing level `0..d`
    level_tails: Vec<f64>,
    /// Centered differenced series and its CSS residuals
    centered: Vec<f64>,
    residuals: Vec<f64>,
    iterations: usize,
}

impl FittedArima {
    pub fn order(&self) -> ArimaOrder {
        self.order
    }

    pub fn ar(&self) -> &[f64] {
        &self.ar
    }

    pub fn ma(&self) -> &[f64] {
        &self.ma
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn sigma2(&self) -> f64 {
        self.sigma2
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Point forecasts and 95% intervals for the next `steps` periods
    pub fn forecast(&self, steps: usize) -> ArimaForecast {
        let mut z = self.centered.clone();
        let mut e = self.residuals.clone();

        let mut levels = self.level_tails.clone();
        let mut mean = Vec::with_capacity(steps);

        for _ in 0..steps {
            let t = z.len();
            let mut z_hat = 0.0;
            for (i, phi) in self.ar.iter().enumerate() {
                if t > i {
                    z_hat += phi * z[t - 1 - i];
                }
            }
            for (j, theta) in self.ma.iter().enumerate() {
                if t > j {
                    z_hat += theta * e[t - 1 - j];
                }
            }
            z.push(z_hat);
            e.push(0.0);

            // Undo differencing from the innermost level outwards
            let mut value = z_hat + self.mean;
            for k in (0..self.order.d).rev() {
                value += levels[k];
                levels[k] = value;
            }
            mean.push(value);
        }

        let psi = self.psi_weights(steps);
        let mut cumulative = 0.0;
        let mut lower = Vec::with_capacity(steps);
        let mut upper = Vec::with_capacity(steps);
        for (h, point) in mean.iter().enumerate() {
            cumulative += psi[h] * psi[h];
            let half_width = Z_95 * (self.sigma2 * cumulative).sqrt();
            lower.push(point - half_width);
            upper.push(point + half_width);
        }

        ArimaForecast { mean, lower, upper }
    }

    /// MA(∞) weights of φ(B)(1-B)^d y_t = θ(B) e_t
    fn psi_weights(&self, count: usize) -> Vec<f64> {
        // Coefficients of φ(B)(1-B)^d as a polynomial in B
        let mut poly = vec![1.0];
        poly.extend(self.ar.iter().map(|phi| -phi));
        for _ in 0..self.order.d {
            poly = multiply_polynomials(&poly, &[1.0, -1.0]);
        }
        let phi_star: Vec<f64> = poly.iter().skip(1).map(|c| -c).collect();

        let mut psi = Vec::with_capacity(count);
        for j in 0..count {
            if j == 0 {
                psi.push(1.0);
                continue;
            }
            let mut value = if j <= self.ma.len() { self.ma[j - 1] } else { 0.0 };
            for (i, phi) in phi_star.iter().enumerate() {
                let lag = i + 1;
                if lag > j {
                    break;
                }
                value += phi * psi[j - lag];
            }
            psi.push(value);
        }
        psi
    }
}

pub fn fit(series: &[f64], order: ArimaOrder, max_iterations: usize) -> Result<FittedArima, PipelineError> {
    order.validate()?;

    if series.len() < order.min_observations() {
        return Err(PipelineError::Fit(format!(
            "ARIMA{} needs at least {} observations, got {}",
            order,
            order.min_observations(),
            series.len()
        )));
    }
    if series.iter().any(|v| !v.is_finite()) {
        return Err(PipelineError::Fit("series contains non-finite values".to_string()));
    }

    let mut level_tails = Vec::with_capacity(order.d);
    let mut differenced = series.to_vec();
    for _ in 0..order.d {
        level_tails.push(differenced[differenced.len() - 1]);
        differenced = difference(&differenced);
    }

    let mean = if order.d == 0 {
        differenced.iter().sum::<f64>() / differenced.len() as f64
    } else {
        0.0
    };
    let centered: Vec<f64> = differenced.iter().map(|w| w - mean).collect();

    let (p, q) = (order.p, order.q);
    let (params, iterations) = if p + q == 0 {
        (Vec::new(), 0)
    } else {
        let start = hannan_rissanen(&centered, p, q);
        let objective = |params: &[f64]| {
            let (ar, ma) = params.split_at(p);
            if !is_stationary(ar) || !is_invertible(ma) {
                return f64::INFINITY;
            }
            conditional_sum_of_squares(&centered, ar, ma)
        };

        let opts = NelderMeadOptions {
            max_iterations,
            ..NelderMeadOptions::default()
        };
        let min = nelder_mead(objective, &start, &opts);

        if !min.converged {
            return Err(PipelineError::Fit(format!(
                "ARIMA{} did not converge after {} iterations",
                order, min.iterations
            )));
        }
        if !min.value.is_finite() || min.x.iter().any(|v| !v.is_finite()) {
            return Err(PipelineError::Fit(format!(
                "ARIMA{} produced non-finite parameters",
                order
            )));
        }
        (min.x, min.iterations)
    };

    let (ar, ma) = params.split_at(p);
    let residuals = css_residuals(&centered, ar, ma);
    let effective = centered.len().saturating_sub(p).max(1);
    let sigma2 = residuals.iter().skip(p).map(|e| e * e).sum::<f64>() / effective as f64;

    if !sigma2.is_finite() {
        return Err(PipelineError::Fit("innovation variance is not finite".to_string()));
    }

    debug!(
        "ARIMA{} fitted: ar={:?} ma={:?} sigma2={:.6} iterations={}",
        order, ar, ma, sigma2, iterations
    );

    Ok(FittedArima {
        order,
        ar: ar.to_vec(),
        ma: ma.to_vec(),
        mean,
        sigma2,
        level_tails,
        centered,
        residuals,
        iterations,
    })
}

pub fn difference(series: &[f64]) -> Vec<f64> {
    series.windows(2).map(|w| w[1] - w[0]).collect()
}

/// Residuals conditioned on zero pre-sample shocks; the first `p` are zero
pub fn css_residuals(z: &[f64], ar: &[f64], ma: &[f64]) -> Vec<f64> {
    let p = ar.len();
    let mut e = vec![0.0; z.len()];
    for t in p..z.len() {
        let mut value = z[t];
        for (i, phi) in ar.iter().enumerate() {
            value -= phi * z[t - 1 - i];
        }
        for (j, theta) in ma.iter().enumerate() {
            if t > j {
                value -= theta * e[t - 1 - j];
            }
        }
        e[t] = value;
    }
    e
}

pub fn conditional_sum_of_squares(z: &[f64], ar: &[f64], ma: &[f64]) -> f64 {
    css_residuals(z, ar, ma)
        .iter()
        .skip(ar.len())
        .map(|e| e * e)
        .sum()
}

/// Start values `[φ.., θ..]`; zeros whenever the regressions are unusable
fn hannan_rissanen(z: &[f64], p: usize, q: usize) -> Vec<f64> {
    let zeros = vec![0.0; p + q];
    let n = z.len();

    let estimate = if q == 0 {
        fit_long_ar(z, p).map(|(beta, _)| beta)
    } else {
        let long_order = (p + q + 1).max((n / 4).min(8));
        fit_long_ar(z, long_order).and_then(|(_, long_residuals)| {
            let start = long_order + q;
            if n <= start + p + q {
                return None;
            }
            let rows = n - start;
            let x = DMatrix::from_fn(rows, p + q, |r, c| {
                let t = start + r;
                if c < p {
                    z[t - 1 - c]
                } else {
                    long_residuals[t - 1 - (c - p)]
                }
            });
            let y = DVector::from_iterator(rows, z[start..].iter().copied());
            solve_least_squares(&x, &y).map(|beta| beta.iter().copied().collect())
        })
    };

    match estimate {
        Some(params) if params.len() == p + q => {
            let (ar, ma) = params.split_at(p);
            if is_stationary(ar) && is_invertible(ma) {
                params
            } else {
                zeros
            }
        }
        _ => zeros,
    }
}

fn is_stationary(ar: &[f64]) -> bool {
    roots_inside(ar)
}

/// `1 + θ1 B + …` is `1 - (-θ1) B - …`
fn is_invertible(ma: &[f64]) -> bool {
    let negated: Vec<f64> = ma.iter().map(|theta| -theta).collect();
    roots_inside(&negated)
}

/// True when every companion-matrix eigenvalue of `1 - c1 B - … - ck B^k`
/// lies inside the unit circle
fn roots_inside(coeffs: &[f64]) -> bool {
    match coeffs.len() {
        0 => true,
        1 => coeffs[0].abs() < ROOT_LIMIT,
        k => {
            let companion = DMatrix::from_fn(k, k, |r, c| {
                if r == 0 {
                    coeffs[c]
                } else if r == c + 1 {
                    1.0
                } else {
                    0.0
                }
            });
            companion
                .complex_eigenvalues()
                .iter()
                .all(|lambda| lambda.norm() < ROOT_LIMIT)
        }
    }
}

fn multiply_polynomials(a: &[f64], b: &[f64]) -> Vec<f64> {
    let mut out = vec![0.0; a.len() + b.len() - 1];
    for (i, x) in a.iter().enumerate() {
        for (j, y) in b.iter().enumerate() {
            out[i + j] += x * y;
        }
    }
    out
}
