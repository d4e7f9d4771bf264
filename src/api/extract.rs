//! Request bodies for the price routes.
//!
//! Clients post either JSON or urlencoded forms, and numeric fields show up
//! as numbers or as strings depending on the client, so both are accepted.

use axum::async_trait;
use axum::body::Bytes;
use axum::extract::{FromRequest, Request};
use axum::http::header;
use axum::Form;
use serde::de::{self, DeserializeOwned, Deserializer};
use serde::Deserialize;
use crate::api::error::ApiError;
use crate::data::types::{PropertyQuery, DEFAULT_HORIZON_MONTHS};
use crate::error::PipelineError;

/// Body parsed as a form when the content type says so, JSON otherwise
pub struct JsonOrForm<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonOrForm<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_form = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.starts_with("application/x-www-form-urlencoded"))
            .unwrap_or(false);

        if is_form {
            let Form(value) = Form::<T>::from_request(req, state)
                .await
                .map_err(|e| invalid_body(e.body_text()))?;
            return Ok(JsonOrForm(value));
        }

        let body = Bytes::from_request(req, state)
            .await
            .map_err(|e| invalid_body(e.body_text()))?;
        let body: &[u8] = if body.iter().all(u8::is_ascii_whitespace) {
            b"{}"
        } else {
            &body
        };

        serde_json::from_slice(body)
            .map(JsonOrForm)
            .map_err(|e| invalid_body(e.to_string()))
    }
}

fn invalid_body(reason: String) -> ApiError {
    PipelineError::Validation(format!("Invalid request body: {}", reason)).into()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Numeric {
    Number(f64),
    Text(String),
}

impl Numeric {
    fn into_f64(self) -> Result<f64, String> {
        match self {
            Numeric::Number(n) => Ok(n),
            Numeric::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| format!("'{}' is not a number", s)),
        }
    }
}

fn number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Numeric::deserialize(deserializer)?
        .into_f64()
        .map_err(de::Error::custom)
}

fn optional_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    match Option::<Numeric>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Numeric::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(n) => n.into_f64().map(Some).map_err(de::Error::custom),
    }
}

/// Whole non-negative count carried as a float on the wire
fn to_count(value: f64, field: &str) -> Result<u32, PipelineError> {
    if !value.is_finite() || value < 0.0 || value.fract() != 0.0 || value > u32::MAX as f64 {
        return Err(PipelineError::Validation(format!(
            "{} must be a non-negative integer, got {}",
            field, value
        )));
    }
    Ok(value as u32)
}

#[derive(Debug, Deserialize)]
pub struct HomePriceRequest {
    #[serde(deserialize_with = "number")]
    pub total_sqft: f64,
    pub location: String,
    #[serde(deserialize_with = "number")]
    pub bhk: f64,
    #[serde(deserialize_with = "number")]
    pub bath: f64,
}

impl HomePriceRequest {
    pub fn counts(&self) -> Result<(u32, u32), PipelineError> {
        Ok((to_count(self.bhk, "bhk")?, to_count(self.bath, "bath")?))
    }
}

#[derive(Debug, Deserialize)]
pub struct FuturePriceRequest {
    #[serde(deserialize_with = "number")]
    pub total_sqft: f64,
    pub location: String,
    #[serde(deserialize_with = "number")]
    pub bhk: f64,
    #[serde(deserialize_with = "number")]
    pub bath: f64,
    #[serde(default, deserialize_with = "optional_number")]
    pub horizon_months: Option<f64>,
    #[serde(default)]
    pub text: Option<String>,
}

impl FuturePriceRequest {
    pub fn into_query(self) -> Result<(PropertyQuery, Option<String>), PipelineError> {
        let horizon = match self.horizon_months {
            Some(h) => to_count(h, "horizon_months")?,
            None => DEFAULT_HORIZON_MONTHS,
        };
        let query = PropertyQuery::new(
            self.location,
            self.total_sqft,
            to_count(self.bhk, "bhk")?,
            to_count(self.bath, "bath")?,
            horizon,
        )?;

        Ok((query, self.text))
    }
}

#[derive(Debug, Deserialize)]
pub struct SentimentRequest {
    #[serde(default)]
    pub text: Option<String>,
}
