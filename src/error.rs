/// Failure taxonomy shared by the estimator, forecaster and pipeline
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PipelineError {
    #[error("Data source error: {0}")]
    DataSource(String),

    #[error("Model fit failed: {0}")]
    Fit(String),

    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("External service error: {0}")]
    ExternalService(String),
}

impl PipelineError {
    pub fn is_validation(&self) -> bool {
        matches!(self, PipelineError::Validation(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::DataSource(_) => "DataSourceError",
            PipelineError::Fit(_) => "FitError",
            PipelineError::ModelUnavailable(_) => "ModelUnavailable",
            PipelineError::Validation(_) => "ValidationError",
            PipelineError::ExternalService(_) => "ExternalServiceError",
        }
    }
}
