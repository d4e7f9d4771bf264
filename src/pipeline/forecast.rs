//! Request-scoped orchestration over the startup-loaded models.
//!
//! Price estimation is the only mandatory step. The market forecast and the
//! sentiment signal are enrichments: when either fails the response carries
//! the configured fallback values instead.

use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};
use crate::data::sentiment::{SentimentResolution, SentimentResolver};
use crate::data::types::{PropertyQuery, SentimentLabel, SentimentSignal};
use crate::error::PipelineError;
use crate::models::forecaster::{months_to_quarters, ForecastPoint, ForecastSummary, MarketForecaster};
use crate::models::regression::PriceEstimator;
use crate::models::round_to;
use crate::monitoring::PredictionLogger;
use crate::risk::{LocationFactors, RiskScorer};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FuturePriceResponse {
    pub current_price: f64,
    pub future_price: f64,
    pub expected_growth_percent: f64,
    pub volatility: f64,
    pub market_risk: String,
    pub composite_risk_score: f64,
    pub risk_level: String,
    pub risk_category: String,
    pub risk_message: String,
    pub recommendation: String,
    pub prescription_explanation: String,
    pub sentiment_label: SentimentLabel,
    pub sentiment_score: f64,
    pub location_factor: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forecast_series: Option<Vec<ForecastPoint>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub price_model_loaded: bool,
    pub forecast_model_fitted: bool,
    pub forecast_unavailable_reason: Option<String>,
}

/// Owns every model for the process lifetime; shared read-only across requests
pub struct ForecastPipeline {
    estimator: PriceEstimator,
    forecaster: MarketForecaster,
    sentiment: SentimentResolver,
    risk: Box<dyn RiskScorer>,
    locations: LocationFactors,
    fallback_growth_rate: f64,
    fallback_volatility: f64,
    logger: Option<PredictionLogger>,
}

impl ForecastPipeline {
    pub fn new(
        estimator: PriceEstimator,
        forecaster: MarketForecaster,
        sentiment: SentimentResolver,
        risk: Box<dyn RiskScorer>,
        locations: LocationFactors,
    ) -> Self {
        Self {
            estimator,
            forecaster,
            sentiment,
            risk,
            locations,
            fallback_growth_rate: 0.0,
            fallback_volatility: 0.0,
            logger: None,
        }
    }

    pub fn with_fallback(mut self, growth_rate: f64, volatility: f64) -> Self {
        self.fallback_growth_rate = growth_rate;
        self.fallback_volatility = volatility;
        self
    }

    pub fn with_logger(mut self, logger: PredictionLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn location_names(&self) -> Vec<String> {
        self.estimator.location_names()
    }

    pub fn predict_home_price(
        &self,
        location: &str,
        area_sqft: f64,
        bedrooms: u32,
        baths: u32,
    ) -> Result<f64, PipelineError> {
        self.estimator.estimate(location, area_sqft, bedrooms, baths)
    }

    pub async fn predict_future_price(
        &self,
        query: &PropertyQuery,
        text: Option<&str>,
    ) -> Result<FuturePriceResponse, PipelineError> {
        // 1. Current price, the only fatal step
        let current_price =
            self.estimator
                .estimate(&query.location, query.area_sqft, query.bedrooms, query.baths)?;

        // 2. Market forecast over whole quarters
        let steps = months_to_quarters(query.horizon_months);
        let summary = self.forecast_or_fallback(steps);

        // 3. Future price
        let future_price = current_price * (1.0 + summary.growth_rate);

        // 4. Locality multiplier
        let location_factor = self.locations.factor_for(&query.location);

        // 5. Sentiment, neutral when the engine cannot answer
        let sentiment = self
            .sentiment
            .resolve(text, &query.location)
            .await
            .or_neutral();

        // 6. Risk and prescription
        let assessment = self.risk.analyze_risk(
            current_price,
            summary.growth_rate,
            summary.volatility,
            sentiment.label,
            sentiment.score,
            location_factor,
        );
        let prescription = self.risk.get_prescription(assessment.score, summary.growth_rate);

        let response = FuturePriceResponse {
            current_price: round_to(current_price, 2),
            future_price: round_to(future_price, 2),
            expected_growth_percent: round_to(summary.growth_rate * 100.0, 2),
            volatility: round_to(summary.volatility, 4),
            market_risk: summary.risk_label.to_string(),
            composite_risk_score: round_to(assessment.score, 2),
            risk_level: assessment.level.to_string(),
            risk_category: assessment.category,
            risk_message: assessment.message,
            recommendation: prescription.action.to_string(),
            prescription_explanation: prescription.explanation,
            sentiment_label: sentiment.label,
            sentiment_score: round_to(sentiment.score, 2),
            location_factor,
            forecast_series: summary.series,
        };

        info!(
            "Forecast for '{}': {:.2} -> {:.2} ({} risk, {})",
            query.location,
            response.current_price,
            response.future_price,
            response.risk_level,
            response.recommendation
        );

        if let Some(logger) = &self.logger {
            if let Err(e) = logger.log_prediction(query, &response) {
                warn!("Failed to write prediction log: {}", e);
            }
        }

        Ok(response)
    }

    /// Blank text is a validation error; an unavailable engine yields the
    /// neutral signal with the reason in `raw`
    pub async fn analyze_sentiment(&self, text: &str) -> Result<SentimentSignal, PipelineError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(PipelineError::Validation("text is required".to_string()));
        }

        match self.sentiment.analyze_text(text).await {
            SentimentResolution::Signal(signal) => Ok(signal),
            SentimentResolution::Unavailable(e) => Ok(SentimentSignal {
                raw: json!({ "unavailable": e.to_string() }),
                ..SentimentSignal::neutral()
            }),
        }
    }

    pub fn health(&self) -> HealthReport {
        let price_model_loaded = self.estimator.is_loaded();
        let forecast_model_fitted = self.forecaster.is_fitted();

        HealthReport {
            status: if price_model_loaded && forecast_model_fitted {
                "healthy"
            } else {
                "degraded"
            },
            price_model_loaded,
            forecast_model_fitted,
            forecast_unavailable_reason: self.forecaster.unavailable_reason().map(str::to_string),
        }
    }

    fn forecast_or_fallback(&self, steps: usize) -> ForecastSummary {
        match self.forecaster.forecast_summary(steps) {
            Ok(summary) => summary,
            Err(e) => {
                warn!("Forecast unavailable, using fallback: {}", e);
                ForecastSummary::fallback(self.fallback_growth_rate, self.fallback_volatility)
            }
        }
    }
}
