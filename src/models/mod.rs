pub mod arima;
pub mod forecaster;
pub mod ols;
pub mod optimize;
pub mod regression;

/// Round half away from zero to `decimals` places
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
