//! Market trend forecaster over the quarterly HPI series.
//!
//! The forecaster is fitted once at startup and read-only afterwards. A
//! failed load or fit leaves it `Unfitted`, in which state every forecast
//! call returns `ModelUnavailable` and callers fall back to
//! [`ForecastSummary::fallback`].

use std::path::{Path, PathBuf};
use std::time::Duration;
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{error, info, warn};
use crate::config::ForecastConfig;
use crate::data::hpi::{next_quarter_end, HpiSeries};
use crate::error::PipelineError;
use crate::models::arima::{self, ArimaOrder, FittedArima};

const MONTHS_PER_QUARTER: u32 = 3;

/// Forty years of quarters
pub const MAX_FORECAST_QUARTERS: usize = 160;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RiskLabel {
    Low,
    Moderate,
    High,
}

impl RiskLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLabel::Low => "Low",
            RiskLabel::Moderate => "Moderate",
            RiskLabel::High => "High",
        }
    }
}

impl std::fmt::Display for RiskLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastPoint {
    pub period_end: NaiveDate,
    pub value: f64,
    pub lower: f64,
    pub upper: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForecastSummary {
    pub growth_rate: f64,
    pub volatility: f64,
    pub risk_label: RiskLabel,
    pub series: Option<Vec<ForecastPoint>>,
}

impl ForecastSummary {
    /// Stand-in used whenever the forecaster cannot answer
    pub fn fallback(growth_rate: f64, volatility: f64) -> Self {
        Self {
            growth_rate,
            volatility,
            risk_label: RiskLabel::Moderate,
            series: None,
        }
    }
}

enum ForecasterState {
    Unfitted { reason: String },
    Fitted { history: HpiSeries, model: FittedArima },
}

pub struct MarketForecaster {
    state: ForecasterState,
}

impl MarketForecaster {
    pub fn unfitted(reason: impl Into<String>) -> Self {
        Self {
            state: ForecasterState::Unfitted { reason: reason.into() },
        }
    }

    pub fn fit(history: HpiSeries, order: ArimaOrder, max_iterations: usize) -> Result<Self, PipelineError> {
        let model = arima::fit(&history.values(), order, max_iterations)?;
        info!(
            "ARIMA{} fitted on {} quarters (ar={:?}, ma={:?}, {} iterations)",
            order,
            history.len(),
            model.ar(),
            model.ma(),
            model.iterations()
        );

        Ok(Self {
            state: ForecasterState::Fitted { history, model },
        })
    }

    pub fn load_and_fit(path: &Path, order: ArimaOrder, max_iterations: usize) -> Result<Self, PipelineError> {
        let history = HpiSeries::from_path(path)?;
        Self::fit(history, order, max_iterations)
    }

    pub fn is_fitted(&self) -> bool {
        matches!(self.state, ForecasterState::Fitted { .. })
    }

    pub fn unavailable_reason(&self) -> Option<&str> {
        match &self.state {
            ForecasterState::Unfitted { reason } => Some(reason),
            ForecasterState::Fitted { .. } => None,
        }
    }

    pub fn history(&self) -> Option<&HpiSeries> {
        match &self.state {
            ForecasterState::Fitted { history, .. } => Some(history),
            ForecasterState::Unfitted { .. } => None,
        }
    }

    /// `steps` quarters ahead, dated one period past the last observation
    pub fn forecast(&self, steps: usize) -> Result<Vec<ForecastPoint>, PipelineError> {
        let (history, model) = self.fitted()?;
        if steps == 0 || steps > MAX_FORECAST_QUARTERS {
            return Err(PipelineError::Validation(format!(
                "forecast horizon must be between 1 and {} periods, got {}",
                MAX_FORECAST_QUARTERS, steps
            )));
        }

        let forecast = model.forecast(steps);
        let mut period_end = history.last().period_end;
        let mut points = Vec::with_capacity(steps);
        for h in 0..steps {
            period_end = next_quarter_end(period_end).ok_or_else(|| {
                PipelineError::Validation(format!(
                    "forecast period {} runs past the last representable date",
                    h + 1
                ))
            })?;
            points.push(ForecastPoint {
                period_end,
                value: forecast.mean[h],
                lower: forecast.lower[h],
                upper: forecast.upper[h],
            });
        }

        Ok(points)
    }

    pub fn forecast_summary(&self, steps: usize) -> Result<ForecastSummary, PipelineError> {
        let (history, _) = self.fitted()?;
        let points = self.forecast(steps)?;

        let last_hist = history.last().value;
        if last_hist == 0.0 {
            return Err(PipelineError::DataSource(
                "last index value is zero, growth is undefined".to_string(),
            ));
        }
        let last_fore = points
            .last()
            .map(|p| p.value)
            .ok_or_else(|| PipelineError::Fit("empty forecast".to_string()))?;

        let growth_rate = (last_fore - last_hist) / last_hist;
        let volatility = history.return_volatility();

        Ok(ForecastSummary {
            growth_rate,
            volatility,
            risk_label: classify_risk(growth_rate, volatility),
            series: Some(points),
        })
    }

    fn fitted(&self) -> Result<(&HpiSeries, &FittedArima), PipelineError> {
        match &self.state {
            ForecasterState::Fitted { history, model } => Ok((history, model)),
            ForecasterState::Unfitted { reason } => Err(PipelineError::ModelUnavailable(format!(
                "market forecast model not fitted: {}",
                reason
            ))),
        }
    }
}

/// Thresholds are strict: growth of exactly 5% is not Low
pub fn classify_risk(growth_rate: f64, volatility: f64) -> RiskLabel {
    if growth_rate > 0.05 && volatility < 0.02 {
        RiskLabel::Low
    } else if growth_rate > -0.02 {
        RiskLabel::Moderate
    } else {
        RiskLabel::High
    }
}

/// Monthly horizon to whole quarters, never less than one
pub fn months_to_quarters(months: u32) -> usize {
    (months.div_ceil(MONTHS_PER_QUARTER)).max(1) as usize
}

/// Load and fit on a blocking thread; any failure or timeout leaves the
/// forecaster unfitted so the service can still start
pub async fn fit_at_startup(path: PathBuf, config: &ForecastConfig) -> MarketForecaster {
    let order = ArimaOrder::from(config.order);
    let max_iterations = config.max_iterations;
    let timeout = Duration::from_secs(config.fit_timeout_secs);

    let task = tokio::task::spawn_blocking(move || {
        MarketForecaster::load_and_fit(&path, order, max_iterations)
    });

    let result = match tokio::time::timeout(timeout, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(PipelineError::Fit(format!("fit task failed: {}", join_err))),
        Err(_) => Err(PipelineError::Fit(format!(
            "fit exceeded startup timeout of {}s",
            config.fit_timeout_secs
        ))),
    };

    match result {
        Ok(forecaster) => forecaster,
        Err(e @ PipelineError::DataSource(_)) => {
            error!("HPI series unavailable: {}", e);
            MarketForecaster::unfitted(e.to_string())
        }
        Err(e) => {
            warn!("ARIMA model not fitted at startup: {}", e);
            MarketForecaster::unfitted(e.to_string())
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Datelike;
    use crate::data::types::HpiObservation;

    /// Index around 100 with AR(1) quarterly changes and fixed-seed shocks
    pub(crate) fn sample_history(quarters: usize) -> HpiSeries {
        let mut state: u64 = 2024;
        let mut period_end = NaiveDate::from_ymd_opt(2008, 3, 31).unwrap();
        let mut value = 100.0;
        let mut change = 0.0;
        let mut observations = Vec::with_capacity(quarters);

        for _ in 0..quarters {
            observations.push(HpiObservation { period_end, value });
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            let shock = (state >> 11) as f64 / (1u64 << 53) as f64 - 0.5;
            change = 0.4 * change + shock;
            value += change;
            period_end = next_quarter_end(period_end).unwrap();
        }

        HpiSeries::from_observations(observations).unwrap()
    }

    pub(crate) fn fitted_forecaster() -> MarketForecaster {
        MarketForecaster::fit(sample_history(60), ArimaOrder::default(), 2000).unwrap()
    }

    #[test]
    fn test_risk_label_thresholds() {
        assert_eq!(classify_risk(0.08, 0.01), RiskLabel::Low);
        assert_eq!(classify_risk(0.00, 0.05), RiskLabel::Moderate);
        assert_eq!(classify_risk(-0.05, 0.05), RiskLabel::High);
        // Strict inequalities at the boundaries
        assert_eq!(classify_risk(0.05, 0.01), RiskLabel::Moderate);
        assert_eq!(classify_risk(0.08, 0.02), RiskLabel::Moderate);
        assert_eq!(classify_risk(-0.02, 0.01), RiskLabel::High);
    }

    #[test]
    fn test_months_to_quarters() {
        assert_eq!(months_to_quarters(0), 1);
        assert_eq!(months_to_quarters(1), 1);
        assert_eq!(months_to_quarters(3), 1);
        assert_eq!(months_to_quarters(7), 3);
        assert_eq!(months_to_quarters(12), 4);
    }

    #[test]
    fn test_unfitted_forecaster_is_unavailable() {
        let forecaster = MarketForecaster::unfitted("no data");

        assert!(!forecaster.is_fitted());
        assert_eq!(forecaster.unavailable_reason(), Some("no data"));
        assert!(matches!(
            forecaster.forecast_summary(4),
            Err(PipelineError::ModelUnavailable(_))
        ));
        assert!(forecaster.forecast(4).is_err());
    }

    #[test]
    fn test_forecast_dates_continue_quarterly() {
        let forecaster = fitted_forecaster();
        let last = forecaster.history().unwrap().last().period_end;
        let points = forecaster.forecast(5).unwrap();

        assert_eq!(points.len(), 5);
        assert_eq!(Some(points[0].period_end), next_quarter_end(last));
        for pair in points.windows(2) {
            assert!(pair[1].period_end > pair[0].period_end);
            assert_eq!(Some(pair[1].period_end), next_quarter_end(pair[0].period_end));
        }
        for p in &points {
            assert!(p.lower <= p.value && p.value <= p.upper);
        }
    }

    #[test]
    fn test_zero_steps_rejected() {
        let forecaster = fitted_forecaster();
        assert!(forecaster.forecast(0).unwrap_err().is_validation());
    }

    #[test]
    fn test_oversized_horizon_rejected() {
        let forecaster = fitted_forecaster();

        assert_eq!(forecaster.forecast(MAX_FORECAST_QUARTERS).unwrap().len(), MAX_FORECAST_QUARTERS);
        assert!(forecaster
            .forecast(months_to_quarters(3_300_000))
            .unwrap_err()
            .is_validation());
    }

    #[test]
    fn test_forecast_past_calendar_limit_is_error() {
        // Same values, re-dated so the last quarter is the last representable day
        let values = sample_history(60).values();
        let mut period_end = NaiveDate::from_ymd_opt(NaiveDate::MAX.year() - 14, 3, 31).unwrap();
        let mut observations = Vec::with_capacity(values.len());
        for value in values {
            observations.push(HpiObservation { period_end, value });
            period_end = next_quarter_end(period_end).unwrap_or(period_end);
        }
        let history = HpiSeries::from_observations(observations).unwrap();
        assert_eq!(history.last().period_end, NaiveDate::MAX);

        let forecaster = MarketForecaster::fit(history, ArimaOrder::default(), 2000).unwrap();
        let err = forecaster.forecast(2).unwrap_err();

        assert!(err.is_validation());
        assert!(forecaster.forecast_summary(2).is_err());
    }

    #[test]
    fn test_summary_matches_definitions() {
        let forecaster = fitted_forecaster();
        let history = forecaster.history().unwrap();
        let summary = forecaster.forecast_summary(4).unwrap();

        let series = summary.series.as_ref().unwrap();
        let last_hist = history.last().value;
        let expected_growth = (series[3].value - last_hist) / last_hist;

        assert!((summary.growth_rate - expected_growth).abs() < 1e-12);
        assert_eq!(summary.volatility, history.return_volatility());
        assert_eq!(
            summary.risk_label,
            classify_risk(summary.growth_rate, summary.volatility)
        );
    }

    #[test]
    fn test_summary_is_deterministic() {
        let forecaster = fitted_forecaster();

        assert_eq!(
            forecaster.forecast_summary(4).unwrap(),
            forecaster.forecast_summary(4).unwrap()
        );
    }

    #[test]
    fn test_fallback_summary() {
        let summary = ForecastSummary::fallback(0.0, 0.0);

        assert_eq!(summary.risk_label, RiskLabel::Moderate);
        assert!(summary.series.is_none());
    }

    #[test]
    fn test_short_history_is_fit_error() {
        let result = MarketForecaster::fit(sample_history(5), ArimaOrder::default(), 2000);
        assert!(matches!(result, Err(PipelineError::Fit(_))));
    }

    #[tokio::test]
    async fn test_startup_with_missing_csv_stays_unfitted() {
        let forecaster = fit_at_startup(
            PathBuf::from("/nonexistent/bangalore_hpi.csv"),
            &ForecastConfig::default(),
        )
        .await;

        assert!(!forecaster.is_fitted());
        assert!(forecaster
            .unavailable_reason()
            .unwrap()
            .contains("Data source error"));
    }

    #[tokio::test]
    async fn test_startup_fit_timeout_is_fit_error() {
        let config = ForecastConfig {
            fit_timeout_secs: 0,
            ..ForecastConfig::default()
        };
        let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("artifacts/bangalore_hpi.csv");

        let forecaster = fit_at_startup(path, &config).await;

        assert!(!forecaster.is_fitted());
        let reason = forecaster.unavailable_reason().unwrap();
        assert!(reason.contains("Model fit failed"));
        assert!(reason.contains("timeout"));
    }
}
