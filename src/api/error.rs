use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use crate::error::PipelineError;

/// JSON error payload; validation failures are 400, everything else 500
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    kind: &'static str,
    message: String,
    trace: Option<Vec<String>>,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            kind: "ValidationError",
            message: message.into(),
            trace: None,
        }
    }

    /// Attach a diagnostic trace naming the route and the error kind
    pub fn with_trace(mut self, route: &str) -> Self {
        self.trace = Some(vec![
            format!("route: {}", route),
            format!("kind: {}", self.kind),
            self.message.clone(),
        ]);
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        let status = if err.is_validation() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };

        Self {
            status,
            kind: err.kind(),
            message: err.to_string(),
            trace: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match self.trace {
            Some(trace) => json!({ "error": self.message, "trace": trace }),
            None => json!({ "error": self.message }),
        };

        (self.status, Json(body)).into_response()
    }
}
