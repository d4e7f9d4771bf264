mod api;
mod config;
mod data;
mod error;
mod models;
mod monitoring;
mod pipeline;
mod risk;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use anyhow::{Context, Result};
use config::{Config, EnvConfig};
use data::sentiment::{SentimentEngine, SentimentResolver};
use models::forecaster::fit_at_startup;
use models::regression::PriceEstimator;
use monitoring::PredictionLogger;
use pipeline::ForecastPipeline;
use risk::{LocationFactors, WeightedRiskScorer};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    tracing::info!("🚀 HPI forecaster starting...");

    // Load configuration
    tracing::info!("Loading configuration...");
    let mut config = Config::load("config.toml")?;
    let env_config = EnvConfig::load()?;
    config.apply_env(&env_config);

    tracing::info!("Forecast order: {:?}", config.forecast.order);
    tracing::info!("Sentiment backend: {:?}", config.sentiment.backend);
    tracing::info!("Prediction log: {}", config.monitoring.csv_logging);

    // Price model; the service still starts without it
    let estimator = match PriceEstimator::load(
        Path::new(&config.artifacts.columns_path),
        Path::new(&config.artifacts.model_path),
    ) {
        Ok(estimator) => estimator,
        Err(e) => {
            tracing::error!("Price model unavailable: {}", e);
            PriceEstimator::unloaded()
        }
    };

    // Market forecaster, fitted once before serving
    tracing::info!("Fitting market model on {}", config.artifacts.hpi_csv_path);
    let forecaster = fit_at_startup(PathBuf::from(&config.artifacts.hpi_csv_path), &config.forecast).await;

    let engine = SentimentEngine::from_config(&config.sentiment)?;
    let sentiment = SentimentResolver::new(
        engine,
        Duration::from_secs(config.sentiment.cache_ttl_secs),
        config.sentiment.default_topic.clone(),
    )
    .with_cache_capacity(config.sentiment.cache_capacity);

    let locations = LocationFactors::new(&config.locations, config.risk.default_location_factor);
    tracing::info!("Location factors: {}", locations.len());

    let mut pipeline = ForecastPipeline::new(
        estimator,
        forecaster,
        sentiment,
        Box::new(WeightedRiskScorer::new(config.risk.clone())),
        locations,
    )
    .with_fallback(
        config.forecast.fallback_growth_rate,
        config.forecast.fallback_volatility,
    );

    if config.monitoring.csv_logging {
        pipeline = pipeline.with_logger(PredictionLogger::new(&config.monitoring.csv_log_path)?);
    }

    let health = pipeline.health();
    tracing::info!(
        "✅ Models ready (status: {}, price model: {}, forecast model: {})",
        health.status,
        health.price_model_loaded,
        health.forecast_model_fitted
    );

    let app = api::router(Arc::new(pipeline));
    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind_addr))?;

    tracing::info!("Listening on {}", config.server.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Shutting down...");
        })
        .await?;

    Ok(())
}
