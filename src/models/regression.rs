use std::path::Path;
use tracing::{info, warn};
use crate::data::artifacts::{ColumnManifest, LinearRegressor, Regressor};
use crate::error::PipelineError;
use crate::models::round_to;

const AREA_SLOT: usize = 0;
const BATH_SLOT: usize = 1;
const BEDROOM_SLOT: usize = 2;

struct LoadedPriceModel {
    manifest: ColumnManifest,
    model: Box<dyn Regressor>,
}

/// Point-price estimator over a pre-trained regression model
pub struct PriceEstimator {
    loaded: Option<LoadedPriceModel>,
}

impl PriceEstimator {
    pub fn new(manifest: ColumnManifest, model: Box<dyn Regressor>) -> Result<Self, PipelineError> {
        if model.n_features() != manifest.len() {
            return Err(PipelineError::DataSource(format!(
                "Model expects {} features but manifest lists {} columns",
                model.n_features(),
                manifest.len()
            )));
        }

        Ok(Self {
            loaded: Some(LoadedPriceModel { manifest, model }),
        })
    }

    pub fn load(columns_path: &Path, model_path: &Path) -> Result<Self, PipelineError> {
        info!("Loading saved artifacts...");
        let manifest = ColumnManifest::from_path(columns_path)?;
        let model = LinearRegressor::from_path(model_path)?;
        let estimator = Self::new(manifest, Box::new(model))?;
        info!(
            "Price model ready ({} known locations)",
            estimator.location_names().len()
        );
        Ok(estimator)
    }

    /// Estimator with no model; every estimate fails with `ModelUnavailable`
    pub fn unloaded() -> Self {
        Self { loaded: None }
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    pub fn location_names(&self) -> Vec<String> {
        self.loaded
            .as_ref()
            .map(|l| l.manifest.location_names())
            .unwrap_or_default()
    }

    /// Fixed-width features; unknown locations leave every flag at zero
    pub fn feature_vector(
        &self,
        location: &str,
        area_sqft: f64,
        bedrooms: u32,
        baths: u32,
    ) -> Result<Vec<f64>, PipelineError> {
        let loaded = self.require_loaded()?;

        let mut features = vec![0.0; loaded.manifest.len()];
        features[AREA_SLOT] = area_sqft;
        features[BATH_SLOT] = baths as f64;
        features[BEDROOM_SLOT] = bedrooms as f64;

        match loaded.manifest.location_index(location) {
            Some(idx) => features[idx] = 1.0,
            None => warn!("Unknown location '{}', using base price", location),
        }

        Ok(features)
    }

    pub fn estimate(
        &self,
        location: &str,
        area_sqft: f64,
        bedrooms: u32,
        baths: u32,
    ) -> Result<f64, PipelineError> {
        if !area_sqft.is_finite() || area_sqft <= 0.0 {
            return Err(PipelineError::Validation(format!(
                "total_sqft must be a positive number, got {}",
                area_sqft
            )));
        }

        let loaded = self.require_loaded()?;
        let features = self.feature_vector(location, area_sqft, bedrooms, baths)?;
        let raw = loaded.model.predict(&features);

        if !raw.is_finite() {
            return Err(PipelineError::ModelUnavailable(
                "price model returned a non-finite value".to_string(),
            ));
        }
        if raw < 0.0 {
            warn!("Price model returned {:.2} for '{}', clamping to 0", raw, location);
            return Ok(0.0);
        }

        Ok(round_to(raw, 2))
    }

    fn require_loaded(&self) -> Result<&LoadedPriceModel, PipelineError> {
        self.loaded.as_ref().ok_or_else(|| {
            PipelineError::ModelUnavailable("price model artifacts were not loaded".to_string())
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const MANIFEST: &str =
        r#"{"data_columns": ["total_sqft", "bath", "bhk", "indiranagar", "whitefield", "rajaji nagar"]}"#;

    /// price = 5 + 0.04*sqft + 2*bath + 3*bhk + location premium
    pub(crate) fn test_estimator() -> PriceEstimator {
        let manifest = ColumnManifest::from_json(MANIFEST).unwrap();
        let model = LinearRegressor {
            intercept: 5.0,
            coefficients: vec![0.04, 2.0, 3.0, 60.0, 20.0, 35.0],
        };
        PriceEstimator::new(manifest, Box::new(model)).unwrap()
    }

    #[test]
    fn test_feature_vector_layout() {
        let estimator = test_estimator();
        let features = estimator.feature_vector(" WHITEFIELD ", 1500.0, 3, 2).unwrap();

        assert_eq!(features, vec![1500.0, 2.0, 3.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_estimate_known_location() {
        let estimator = test_estimator();
        let price = estimator.estimate("Whitefield", 1500.0, 3, 3).unwrap();

        // 5 + 60 + 6 + 9 + 20
        assert_eq!(price, 100.0);
    }

    #[test]
    fn test_estimate_rounds_to_cents() {
        let estimator = test_estimator();
        let price = estimator.estimate("indiranagar", 1000.123, 2, 2).unwrap();

        // 5 + 40.00492 + 4 + 6 + 60
        assert_eq!(price, 115.0);
        let price = estimator.estimate("indiranagar", 1000.5, 2, 2).unwrap();
        assert_eq!(price, 115.02);
    }

    #[test]
    fn test_unknown_location_uses_zero_flags() {
        let estimator = test_estimator();
        let price = estimator.estimate("Atlantis", 1500.0, 3, 3).unwrap();

        assert_eq!(price, 80.0);
    }

    #[test]
    fn test_unloaded_estimator() {
        let estimator = PriceEstimator::unloaded();

        assert!(!estimator.is_loaded());
        assert!(estimator.location_names().is_empty());
        assert!(matches!(
            estimator.estimate("Whitefield", 1500.0, 3, 3),
            Err(PipelineError::ModelUnavailable(_))
        ));
    }

    #[test]
    fn test_rejects_bad_area() {
        let estimator = test_estimator();
        let err = estimator.estimate("Whitefield", -10.0, 3, 3).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_mismatched_artifacts() {
        let manifest = ColumnManifest::from_json(MANIFEST).unwrap();
        let model = LinearRegressor {
            intercept: 0.0,
            coefficients: vec![1.0, 2.0],
        };
        assert!(matches!(
            PriceEstimator::new(manifest, Box::new(model)),
            Err(PipelineError::DataSource(_))
        ));
    }

    #[test]
    fn test_negative_prediction_clamped() {
        let manifest = ColumnManifest::from_json(MANIFEST).unwrap();
        let model = LinearRegressor {
            intercept: -500.0,
            coefficients: vec![0.0; 6],
        };
        let estimator = PriceEstimator::new(manifest, Box::new(model)).unwrap();
        assert_eq!(estimator.estimate("Whitefield", 1500.0, 3, 3).unwrap(), 0.0);
    }

    #[test]
    fn test_shipped_artifacts_load() {
        let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("artifacts");
        let estimator =
            PriceEstimator::load(&root.join("columns.json"), &root.join("home_prices_model.json"))
                .unwrap();

        assert!(estimator.location_names().contains(&"Whitefield".to_string()));
        assert!(estimator.estimate("Whitefield", 1500.0, 3, 3).unwrap() > 0.0);
    }
}
