pub mod error;
pub mod extract;
pub mod handlers;

use std::sync::Arc;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use crate::pipeline::ForecastPipeline;

pub fn router(pipeline: Arc<ForecastPipeline>) -> Router {
    Router::new()
        .route("/get_location_names", get(handlers::get_location_names))
        .route("/predict_home_price", post(handlers::predict_home_price))
        .route("/predict_future_price", post(handlers::predict_future_price))
        .route("/analyze_sentiment", post(handlers::analyze_sentiment))
        .route("/health", get(handlers::health))
        .layer(CorsLayer::permissive())
        .with_state(pipeline)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;
    use crate::pipeline::forecast::tests::{fallback_pipeline, fitted_pipeline};

    fn app() -> Router {
        router(Arc::new(fallback_pipeline()))
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "*"
        );

        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn post_form(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_location_names() {
        let (status, body) = send(app(), get_request("/get_location_names")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["locations"],
            serde_json::json!(["Indiranagar", "Whitefield", "Rajaji Nagar"])
        );
    }

    #[tokio::test]
    async fn test_home_price_json() {
        let (status, body) = send(
            app(),
            post_json(
                "/predict_home_price",
                r#"{"total_sqft": 1500, "location": "Whitefield", "bhk": 3, "bath": 3}"#,
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["estimated_price"], 100.0);
    }

    #[tokio::test]
    async fn test_home_price_form_with_string_numbers() {
        let (status, body) = send(
            app(),
            post_form(
                "/predict_home_price",
                "total_sqft=1500&location=Whitefield&bhk=3&bath=3",
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["estimated_price"], 100.0);
    }

    #[tokio::test]
    async fn test_home_price_missing_field_is_bad_request() {
        let (status, body) = send(
            app(),
            post_json("/predict_home_price", r#"{"location": "Whitefield"}"#),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("total_sqft"));
    }

    #[tokio::test]
    async fn test_future_price_with_fallback_forecast() {
        let (status, body) = send(
            app(),
            post_json(
                "/predict_future_price",
                r#"{"total_sqft": "1500", "location": "Whitefield", "bhk": 3, "bath": 3, "horizon_months": 12}"#,
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["current_price"], 100.0);
        assert_eq!(body["future_price"], 100.0);
        assert_eq!(body["market_risk"], "Moderate");
        assert_eq!(body["location_factor"], 0.95);
        assert_eq!(body["sentiment_label"], "Neutral");
        assert_eq!(body["sentiment_score"], 50.0);
        for field in [
            "expected_growth_percent",
            "volatility",
            "composite_risk_score",
            "risk_level",
            "risk_category",
            "risk_message",
            "recommendation",
            "prescription_explanation",
        ] {
            assert!(!body[field].is_null(), "missing {}", field);
        }
        assert!(body.get("forecast_series").is_none());
    }

    #[tokio::test]
    async fn test_future_price_with_fitted_forecast() {
        let (status, body) = send(
            router(Arc::new(fitted_pipeline())),
            post_form(
                "/predict_future_price",
                "total_sqft=1500&location=Whitefield&bhk=3&bath=3&horizon_months=7",
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["forecast_series"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_future_price_error_carries_trace() {
        let (status, body) = send(
            app(),
            post_json(
                "/predict_future_price",
                r#"{"total_sqft": -5, "location": "Whitefield", "bhk": 3, "bath": 3}"#,
            ),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
        let trace = body["trace"].as_array().unwrap();
        assert_eq!(trace[0], "route: /predict_future_price");
        assert_eq!(trace[1], "kind: ValidationError");
    }

    #[tokio::test]
    async fn test_analyze_sentiment_requires_text() {
        let (status, body) = send(app(), post_json("/analyze_sentiment", r#"{"text": "  "}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());

        let (status, _) = send(app(), post_json("/analyze_sentiment", "{}")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_analyze_sentiment_engine_down_is_neutral() {
        let (status, body) = send(
            app(),
            post_json("/analyze_sentiment", r#"{"text": "prices are rising"}"#),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["sentiment"], "Neutral");
        assert_eq!(body["score"], 50.0);
        assert!(body["raw"]["unavailable"].is_string());
    }

    #[tokio::test]
    async fn test_health_reports_degraded_forecaster() {
        let (status, body) = send(app(), get_request("/health")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["price_model_loaded"], true);
        assert_eq!(body["forecast_model_fitted"], false);
    }

    #[tokio::test]
    async fn test_oversized_horizon_is_bad_request() {
        let (status, body) = send(
            router(Arc::new(fitted_pipeline())),
            post_json(
                "/predict_future_price",
                r#"{"total_sqft": 1500, "location": "Whitefield", "bhk": 3, "bath": 3, "horizon_months": 3300000}"#,
            ),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        let trace = body["trace"].as_array().unwrap();
        assert_eq!(trace[1], "kind: ValidationError");
        assert!(trace[2].as_str().unwrap().contains("horizon_months"));
    }

    #[tokio::test]
    async fn test_preflight_request() {
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/predict_home_price")
            .header(header::ORIGIN, "http://localhost:3000")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .header(
                header::ACCESS_CONTROL_REQUEST_HEADERS,
                "content-type, x-requested-with, authorization",
            )
            .body(Body::empty())
            .unwrap();
        let response = app().oneshot(request).await.unwrap();

        assert!(response.status().is_success());
        let headers = response.headers();
        assert_eq!(headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(), "*");
        assert_eq!(headers.get(header::ACCESS_CONTROL_ALLOW_HEADERS).unwrap(), "*");
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_found() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/no_such_route")
            .header(header::ORIGIN, "http://localhost:3000")
            .body(Body::empty())
            .unwrap();
        let response = app().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
