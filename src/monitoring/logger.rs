use anyhow::{Context, Result};
use chrono::Utc;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use crate::data::types::PropertyQuery;
use crate::pipeline::FuturePriceResponse;

const HEADER: [&str; 13] = [
    "timestamp",
    "location",
    "total_sqft",
    "bhk",
    "bath",
    "horizon_months",
    "current_price",
    "future_price",
    "expected_growth_percent",
    "composite_risk_score",
    "risk_level",
    "recommendation",
    "sentiment_label",
];

/// Append-only CSV audit trail of future-price predictions
pub struct PredictionLogger {
    log_path: PathBuf,
}

impl PredictionLogger {
    pub fn new(log_path: impl AsRef<Path>) -> Result<Self> {
        let log_path = log_path.as_ref().to_path_buf();

        // Create CSV file with headers if it doesn't exist
        if !log_path.exists() {
            let mut writer = csv::Writer::from_path(&log_path)
                .with_context(|| format!("Failed to create {}", log_path.display()))?;
            writer.write_record(HEADER)?;
            writer.flush()?;
        }

        Ok(Self { log_path })
    }

    pub fn path(&self) -> &Path {
        &self.log_path
    }

    pub fn log_prediction(&self, query: &PropertyQuery, response: &FuturePriceResponse) -> Result<()> {
        let file = OpenOptions::new()
            .append(true)
            .open(&self.log_path)
            .with_context(|| format!("Failed to open {}", self.log_path.display()))?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        writer.write_record([
            Utc::now().to_rfc3339(),
            query.location.clone(),
            format!("{:.2}", query.area_sqft),
            query.bedrooms.to_string(),
            query.baths.to_string(),
            query.horizon_months.to_string(),
            format!("{:.2}", response.current_price),
            format!("{:.2}", response.future_price),
            format!("{:.2}", response.expected_growth_percent),
            format!("{:.2}", response.composite_risk_score),
            response.risk_level.clone(),
            response.recommendation.clone(),
            response.sentiment_label.to_string(),
        ])?;
        writer.flush()?;

        Ok(())
    }
}
