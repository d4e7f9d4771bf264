use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use crate::error::PipelineError;

pub const DEFAULT_HORIZON_MONTHS: u32 = 12;
pub const MAX_HORIZON_MONTHS: u32 = 120;

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyQuery {
    pub location: String,
    pub area_sqft: f64,
    pub bedrooms: u32,
    pub baths: u32,
    pub horizon_months: u32,
}

impl PropertyQuery {
    pub fn new(
        location: impl Into<String>,
        area_sqft: f64,
        bedrooms: u32,
        baths: u32,
        horizon_months: u32,
    ) -> Result<Self, PipelineError> {
        if !area_sqft.is_finite() || area_sqft <= 0.0 {
            return Err(PipelineError::Validation(format!(
                "total_sqft must be a positive number, got {}",
                area_sqft
            )));
        }
        if horizon_months == 0 || horizon_months > MAX_HORIZON_MONTHS {
            return Err(PipelineError::Validation(format!(
                "horizon_months must be between 1 and {}, got {}",
                MAX_HORIZON_MONTHS, horizon_months
            )));
        }

        Ok(Self {
            location: location.into(),
            area_sqft,
            bedrooms,
            baths,
            horizon_months,
        })
    }
}

/// One quarter of the historical price index
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HpiObservation {
    pub period_end: NaiveDate,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SentimentLabel {
    Positive,
    Neutral,
    Negative,
}

impl SentimentLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Positive => "Positive",
            SentimentLabel::Neutral => "Neutral",
            SentimentLabel::Negative => "Negative",
        }
    }

    /// Lenient parse for labels coming back from external engines
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "positive" | "pos" | "bullish" => Some(SentimentLabel::Positive),
            "neutral" | "neu" | "mixed" => Some(SentimentLabel::Neutral),
            "negative" | "neg" | "bearish" => Some(SentimentLabel::Negative),
            _ => None,
        }
    }
}

impl std::fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentimentSignal {
    pub label: SentimentLabel,
    pub score: f64,
    pub raw: serde_json::Value,
}

impl SentimentSignal {
    pub fn neutral() -> Self {
        Self {
            label: SentimentLabel::Neutral,
            score: 50.0,
            raw: serde_json::Value::Null,
        }
    }
}
