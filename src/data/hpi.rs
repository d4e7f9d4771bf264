//! Quarterly house price index ingest.
//!
//! The CSV needs a time column (`Quarter` or `Date`, abbreviated month-year
//! such as `Mar-19`) and a value column (`ALL` or `HPI`). Rows whose date
//! cannot be parsed are dropped; a value that is not a number is an error.
//! Dates are moved onto quarter ends and the latest row wins when several
//! land in the same quarter.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use chrono::{Datelike, NaiveDate};
use csv::StringRecord;
use tracing::{debug, info};
use crate::data::types::HpiObservation;
use crate::error::PipelineError;

pub const TIME_COLUMNS: [&str; 2] = ["quarter", "date"];
pub const VALUE_COLUMNS: [&str; 2] = ["all", "hpi"];

#[derive(Debug, Clone, PartialEq)]
pub struct HpiSeries {
    observations: Vec<HpiObservation>,
}

impl HpiSeries {
    pub fn from_path(path: &Path) -> Result<Self, PipelineError> {
        let file = File::open(path).map_err(|e| {
            PipelineError::DataSource(format!("HPI CSV not found at {}: {}", path.display(), e))
        })?;

        let series = Self::from_reader(file)?;
        info!(
            "Loaded {} quarterly HPI observations from {}",
            series.len(),
            path.display()
        );
        Ok(series)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, PipelineError> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = reader
            .headers()
            .map_err(|e| PipelineError::DataSource(format!("Failed to read CSV headers: {}", e)))?
            .clone();
        let header_map = build_header_map(&headers);

        let time_idx = find_column(&header_map, &TIME_COLUMNS).ok_or_else(|| {
            PipelineError::DataSource("CSV must contain a 'Quarter' or 'Date' column".to_string())
        })?;
        let value_idx = find_column(&header_map, &VALUE_COLUMNS).ok_or_else(|| {
            PipelineError::DataSource("CSV must contain an 'ALL' or 'HPI' column".to_string())
        })?;

        let mut observations = Vec::new();
        let mut skipped = 0usize;

        for (idx, result) in reader.records().enumerate() {
            // Header is line 1
            let line = idx + 2;
            let record = result.map_err(|e| {
                PipelineError::DataSource(format!("CSV parse error on line {}: {}", line, e))
            })?;

            let Some(period) = record.get(time_idx).and_then(parse_month_year) else {
                skipped += 1;
                continue;
            };

            let raw_value = record.get(value_idx).unwrap_or("");
            let value = raw_value.parse::<f64>().map_err(|_| {
                PipelineError::DataSource(format!(
                    "Non-numeric index value '{}' on line {}",
                    raw_value, line
                ))
            })?;

            observations.push(HpiObservation { period_end: period, value });
        }

        if skipped > 0 {
            debug!("Dropped {} HPI rows with unparseable dates", skipped);
        }

        Self::from_observations(observations)
    }

    /// Sort, snap to quarter ends, and collapse duplicates
    pub fn from_observations(mut observations: Vec<HpiObservation>) -> Result<Self, PipelineError> {
        if let Some(bad) = observations.iter().find(|o| !o.value.is_finite()) {
            return Err(PipelineError::DataSource(format!(
                "Non-finite index value for {}",
                bad.period_end
            )));
        }

        observations.sort_by_key(|o| o.period_end);

        let mut normalized: Vec<HpiObservation> = Vec::with_capacity(observations.len());
        for obs in observations {
            let snapped = HpiObservation {
                period_end: quarter_end(obs.period_end),
                value: obs.value,
            };
            match normalized.last_mut() {
                Some(prev) if prev.period_end == snapped.period_end => *prev = snapped,
                _ => normalized.push(snapped),
            }
        }

        if normalized.is_empty() {
            return Err(PipelineError::DataSource(
                "No parseable rows in HPI series".to_string(),
            ));
        }

        Ok(Self { observations: normalized })
    }

    pub fn observations(&self) -> &[HpiObservation] {
        &self.observations
    }

    pub fn values(&self) -> Vec<f64> {
        self.observations.iter().map(|o| o.value).collect()
    }

    /// Latest observation; the series is never empty
    pub fn last(&self) -> HpiObservation {
        self.observations[self.observations.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Sample standard deviation of period-over-period percentage changes
    pub fn return_volatility(&self) -> f64 {
        let returns: Vec<f64> = self
            .observations
            .windows(2)
            .filter(|w| w[0].value != 0.0)
            .map(|w| (w[1].value - w[0].value) / w[0].value)
            .collect();

        if returns.len() < 2 {
            return 0.0;
        }

        let mean = returns.iter().sum::<f64>() / returns.len() as f64;
        let variance = returns
            .iter()
            .map(|r| (r - mean).powi(2))
            .sum::<f64>()
            / (returns.len() - 1) as f64;
        variance.sqrt()
    }
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let name = name.trim().trim_start_matches('\u{feff}').to_lowercase();
            (name, idx)
        })
        .collect()
}

fn find_column(header_map: &HashMap<String, usize>, candidates: &[&str]) -> Option<usize> {
    candidates.iter().find_map(|c| header_map.get(*c).copied())
}

/// Parse an abbreviated month-year stamp like `Jun-13`
pub fn parse_month_year(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(&format!("01-{}", raw), "%d-%b-%y").ok()
}

/// Last calendar day of the quarter containing `date`
pub fn quarter_end(date: NaiveDate) -> NaiveDate {
    let end_month = (date.month0() / 3 + 1) * 3;
    let last_day = if end_month == 12 {
        31
    } else {
        NaiveDate::from_ymd_opt(date.year(), end_month + 1, 1)
            .and_then(|d| d.pred_opt())
            .map(|d| d.day())
            .unwrap_or(30)
    };

    NaiveDate::from_ymd_opt(date.year(), end_month, last_day).unwrap_or(date)
}

/// Quarter end one full period after `date`; `None` past the last
/// representable date
pub fn next_quarter_end(date: NaiveDate) -> Option<NaiveDate> {
    quarter_end(date).succ_opt().map(quarter_end)
}
