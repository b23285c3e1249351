//! HTTP-level tests: the envelope, the protocol checks, and the metrics
//! endpoint, driven through the router.

mod helpers;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use tower::ServiceExt;

use cxgate::config::{Config, GeneralConfig, ServiceConfig};
use cxgate::metrics::Metrics;
use cxgate::server::{router, AppState};
use cxgate_core::{GeneratorConfig, NetworkDescription, ParserConfig};

use helpers::MockService;

const SINGLE_NETWORK_BODY: &str = r#"[[{"numberVerification":[{"longNumber":281474976710655}]},{"metaData":[{"name":"nodes"}]},{"nodes":[{"@id":1,"n":"a"},{"@id":2,"n":"b"}]}]]"#;

const SINGLE_NETWORK_DATA: &str = r#"[[{"numberVerification":[{"longNumber":281474976710655}]},{"metaData":[{"name":"nodes"}]},{"nodes":[{"@id":"1","n":"a"},{"@id":"2","n":"b"}]}]]"#;

fn description(label: &str, aspects: &[&str]) -> NetworkDescription {
    NetworkDescription {
        label: label.to_string(),
        description: String::new(),
        aspects: aspects.iter().map(|s| s.to_string()).collect(),
    }
}

fn test_config() -> Config {
    let mut config = Config {
        general: GeneralConfig {
            location: "127.0.0.1:0".to_string(),
            ..Default::default()
        },
        service: ServiceConfig {
            location: "mock".to_string(),
            title: "Echo".to_string(),
            version: "1.0.0".to_string(),
            input: ParserConfig(vec![description("X", &["nodes"])]),
            output: GeneratorConfig(vec![description("X", &["nodes"])]),
            ..Default::default()
        },
    };
    config.validate().unwrap();
    config
}

fn app(mock: MockService) -> (axum::Router, Arc<Metrics>) {
    let metrics = Arc::new(Metrics::new());
    let state = AppState::new(test_config(), Arc::new(mock), metrics.clone());
    (router(state), metrics)
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn post(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_round_trip_envelope() {
    let (app, _) = app(MockService::echo());
    let response = app.oneshot(post(SINGLE_NETWORK_BODY)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(
        std::str::from_utf8(&bytes).unwrap(),
        format!("{{\"data\":{SINGLE_NETWORK_DATA},\"errors\":[]}}")
    );
}

#[tokio::test]
async fn test_get_method_is_rejected_with_envelope() {
    let (app, _) = app(MockService::echo());
    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    let envelope = body_json(response).await;
    let errors = envelope["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["status"], 405);
}

#[tokio::test]
async fn test_wrong_content_type_is_rejected_with_envelope() {
    let (app, _) = app(MockService::echo());
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/")
                .header(header::CONTENT_TYPE, "text/plain")
                .body(Body::from(SINGLE_NETWORK_BODY))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    let envelope = body_json(response).await;
    assert_eq!(envelope["errors"][0]["status"], 415);
}

#[tokio::test]
async fn test_bad_long_number_yields_500_envelope() {
    let (app, _) = app(MockService::echo());
    let body = SINGLE_NETWORK_BODY.replace("281474976710655", "1");
    let response = app.oneshot(post(&body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let envelope = body_json(response).await;
    assert_eq!(envelope["data"], "");
    let errors = envelope["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 1);
    assert!(errors[0]["message"]
        .as_str()
        .unwrap()
        .contains("expected long number"));
    assert_eq!(errors[0]["status"], 500);
}

#[tokio::test]
async fn test_unopenable_stream_yields_424_envelope() {
    let (app, _) = app(MockService::failing_open());
    let response = app.oneshot(post(SINGLE_NETWORK_BODY)).await.unwrap();
    assert_eq!(response.status(), StatusCode::FAILED_DEPENDENCY);
    let envelope = body_json(response).await;
    assert_eq!(envelope["errors"][0]["status"], 424);
}

#[tokio::test]
async fn test_query_parameters_reach_the_service() {
    let mock = MockService::echo();
    let metrics = Arc::new(Metrics::new());
    let mut config = test_config();
    config.service.parameters = cxgate_core::ParameterConfig(vec![cxgate_core::ParameterDef {
        name: "k".to_string(),
        default: "7".to_string(),
        description: "a count".to_string(),
        kind: "integer".to_string(),
        format: String::new(),
    }]);
    let state = AppState::new(config, Arc::new(mock.clone()), metrics);
    let response = router(state)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/?k=3&k=5")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(SINGLE_NETWORK_BODY))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    // Drain the streamed body so the exchange fully settles.
    let _ = axum::body::to_bytes(response.into_body(), usize::MAX).await;

    let captured = mock.captured();
    assert!(captured.len() >= 4, "expected parameters plus nodes");
    assert!(matches!(
        captured[0].element,
        Some(cxgate_core::Element::Parameter(_))
    ));
    assert!(matches!(
        captured[1].element,
        Some(cxgate_core::Element::Parameter(_))
    ));
}

#[tokio::test]
async fn test_metrics_endpoint_reports_requests() {
    let (app, _) = app(MockService::echo());
    let response = app
        .clone()
        .oneshot(post(SINGLE_NETWORK_BODY))
        .await
        .unwrap();
    let _ = axum::body::to_bytes(response.into_body(), usize::MAX).await;

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = std::str::from_utf8(&bytes).unwrap();
    assert!(text.contains("cxgate_requests_total"));
    assert!(text.contains("cxgate_elements_total"));
}
