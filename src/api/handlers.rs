use std::sync::Arc;
use axum::extract::State;
use axum::Json;
use serde::Serialize;
use tracing::{debug, error};
use crate::api::error::ApiError;
use crate::api::extract::{FuturePriceRequest, HomePriceRequest, JsonOrForm, SentimentRequest};
use crate::data::types::SentimentLabel;
use crate::pipeline::{ForecastPipeline, FuturePriceResponse, HealthReport};

const FUTURE_PRICE_ROUTE: &str = "/predict_future_price";

#[derive(Debug, Serialize)]
pub struct LocationsResponse {
    pub locations: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct HomePriceResponse {
    pub estimated_price: f64,
}

#[derive(Debug, Serialize)]
pub struct SentimentResponse {
    pub sentiment: SentimentLabel,
    pub score: f64,
    pub raw: serde_json::Value,
}

pub async fn get_location_names(
    State(pipeline): State<Arc<ForecastPipeline>>,
) -> Json<LocationsResponse> {
    Json(LocationsResponse {
        locations: pipeline.location_names(),
    })
}

pub async fn predict_home_price(
    State(pipeline): State<Arc<ForecastPipeline>>,
    JsonOrForm(request): JsonOrForm<HomePriceRequest>,
) -> Result<Json<HomePriceResponse>, ApiError> {
    let (bhk, bath) = request.counts()?;
    debug!("Price request for '{}' ({} sqft)", request.location, request.total_sqft);

    let estimated_price = pipeline.predict_home_price(&request.location, request.total_sqft, bhk, bath)?;
    Ok(Json(HomePriceResponse { estimated_price }))
}

pub async fn predict_future_price(
    State(pipeline): State<Arc<ForecastPipeline>>,
    request: Result<JsonOrForm<FuturePriceRequest>, ApiError>,
) -> Result<Json<FuturePriceResponse>, ApiError> {
    let JsonOrForm(request) = request.map_err(|e| e.with_trace(FUTURE_PRICE_ROUTE))?;

    let (query, text) = request
        .into_query()
        .map_err(|e| ApiError::from(e).with_trace(FUTURE_PRICE_ROUTE))?;

    match pipeline.predict_future_price(&query, text.as_deref()).await {
        Ok(response) => Ok(Json(response)),
        Err(e) => {
            error!("Future price for '{}' failed: {}", query.location, e);
            Err(ApiError::from(e).with_trace(FUTURE_PRICE_ROUTE))
        }
    }
}

pub async fn analyze_sentiment(
    State(pipeline): State<Arc<ForecastPipeline>>,
    JsonOrForm(request): JsonOrForm<SentimentRequest>,
) -> Result<Json<SentimentResponse>, ApiError> {
    let text = request
        .text
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("text is required"))?;

    let signal = pipeline.analyze_sentiment(&text).await?;
    Ok(Json(SentimentResponse {
        sentiment: signal.label,
        score: signal.score,
        raw: signal.raw,
    }))
}

pub async fn health(State(pipeline): State<Arc<ForecastPipeline>>) -> Json<HealthReport> {
    Json(pipeline.health())
}
