use std::fs;
use std::path::Path;
use serde::Deserialize;
use tracing::info;
use crate::error::PipelineError;

/// Slots reserved ahead of the location flags: area, bath, bedrooms
pub const RESERVED_COLUMNS: usize = 3;

/// Ordered feature-column names the regression model was trained on
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ColumnManifest {
    pub data_columns: Vec<String>,
}

impl ColumnManifest {
    pub fn from_path(path: &Path) -> Result<Self, PipelineError> {
        let contents = fs::read_to_string(path).map_err(|e| {
            PipelineError::DataSource(format!("Failed to read column manifest {}: {}", path.display(), e))
        })?;
        Self::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> Result<Self, PipelineError> {
        let mut manifest: ColumnManifest = serde_json::from_str(contents)
            .map_err(|e| PipelineError::DataSource(format!("Invalid column manifest: {}", e)))?;

        if manifest.data_columns.len() < RESERVED_COLUMNS {
            return Err(PipelineError::DataSource(format!(
                "Column manifest needs at least {} columns, found {}",
                RESERVED_COLUMNS,
                manifest.data_columns.len()
            )));
        }

        for column in manifest.data_columns.iter_mut() {
            *column = normalize_location(column);
        }

        Ok(manifest)
    }

    pub fn len(&self) -> usize {
        self.data_columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data_columns.is_empty()
    }

    /// Column index of a location flag, if the location is known
    pub fn location_index(&self, location: &str) -> Option<usize> {
        let key = normalize_location(location);
        self.data_columns
            .iter()
            .enumerate()
            .skip(RESERVED_COLUMNS)
            .find(|(_, column)| **column == key)
            .map(|(idx, _)| idx)
    }

    /// Location columns title-cased for display
    pub fn location_names(&self) -> Vec<String> {
        self.data_columns
            .iter()
            .skip(RESERVED_COLUMNS)
            .map(|c| title_case(c))
            .collect()
    }
}

/// Anything that maps a feature vector to a price
pub trait Regressor: Send + Sync {
    fn predict(&self, features: &[f64]) -> f64;

    fn n_features(&self) -> usize;
}

/// Linear model exported as `{"intercept": .., "coefficients": [..]}`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LinearRegressor {
    pub intercept: f64,
    pub coefficients: Vec<f64>,
}

impl LinearRegressor {
    pub fn from_path(path: &Path) -> Result<Self, PipelineError> {
        let contents = fs::read_to_string(path).map_err(|e| {
            PipelineError::DataSource(format!("Failed to read model artifact {}: {}", path.display(), e))
        })?;
        let model = Self::from_json(&contents)?;
        info!(
            "Loaded linear price model with {} coefficients from {}",
            model.coefficients.len(),
            path.display()
        );
        Ok(model)
    }

    pub fn from_json(contents: &str) -> Result<Self, PipelineError> {
        let model: LinearRegressor = serde_json::from_str(contents)
            .map_err(|e| PipelineError::DataSource(format!("Invalid model artifact: {}", e)))?;

        if !model.intercept.is_finite() || model.coefficients.iter().any(|c| !c.is_finite()) {
            return Err(PipelineError::DataSource(
                "Model artifact contains non-finite parameters".to_string(),
            ));
        }
        Ok(model)
    }
}

impl Regressor for LinearRegressor {
    fn predict(&self, features: &[f64]) -> f64 {
        self.intercept
            + self
                .coefficients
                .iter()
                .zip(features)
                .map(|(c, x)| c * x)
                .sum::<f64>()
    }

    fn n_features(&self) -> usize {
        self.coefficients.len()
    }
}

/// Lowercase, trim, collapse inner whitespace
pub fn normalize_location(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn title_case(raw: &str) -> String {
    raw.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_lookup_is_case_and_space_insensitive() {
        let manifest = ColumnManifest::from_json(
            r#"{"data_columns": ["total_sqft", "bath", "bhk", "1st phase jp nagar", "whitefield"]}"#,
        )
        .unwrap();

        assert_eq!(manifest.location_index("  WhiteField "), Some(4));
        assert_eq!(manifest.location_index("1st  Phase JP nagar"), Some(3));
        assert_eq!(manifest.location_index("atlantis"), None);
        // Reserved slots are never matched as locations
        assert_eq!(manifest.location_index("bath"), None);
    }

    #[test]
    fn test_location_names_title_cased() {
        let manifest = ColumnManifest::from_json(
            r#"{"data_columns": ["total_sqft", "bath", "bhk", "1st phase jp nagar", "whitefield"]}"#,
        )
        .unwrap();

        assert_eq!(manifest.location_names(), vec!["1st Phase Jp Nagar", "Whitefield"]);
    }

    #[test]
    fn test_short_manifest_rejected() {
        let err = ColumnManifest::from_json(r#"{"data_columns": ["total_sqft"]}"#).unwrap_err();
        assert!(matches!(err, PipelineError::DataSource(_)));
    }

    #[test]
    fn test_linear_predict() {
        let model = LinearRegressor::from_json(
            r#"{"intercept": 10.0, "coefficients": [0.05, 2.0, 3.0, 7.5]}"#,
        )
        .unwrap();

        let price = model.predict(&[1000.0, 2.0, 2.0, 1.0]);
        assert!((price - (10.0 + 50.0 + 4.0 + 6.0 + 7.5)).abs() < 1e-9);
        assert_eq!(model.n_features(), 4);
    }
}
