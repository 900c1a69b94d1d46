use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use checker_core::{AutomationDriver, CheckStatus, DriverConfig};
use checker_worker::{ClassifierSettings, HttpAutomationDriver, StatusClassifier};
use serde_json::{json, Value};

async fn render(headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    if headers.get("authorization").and_then(|v| v.to_str().ok()) != Some("Bearer secret") {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "unauthorized"})));
    }

    let url = body["url"].as_str().unwrap_or_default();
    let page = if url.ends_with("/gone") {
        json!({"finalUrl": url, "httpStatus": 404, "title": null, "bodyText": ""})
    } else if url.ends_with("/broken") {
        return (StatusCode::BAD_GATEWAY, Json(json!({"error": "browser crashed"})));
    } else {
        json!({
            "finalUrl": url,
            "httpStatus": 200,
            "title": "Road Bike",
            "bodyText": "Contact seller for details"
        })
    };
    (StatusCode::OK, Json(page))
}

async fn screenshot() -> Vec<u8> {
    vec![1, 2, 3]
}

async fn spawn_render_service() -> SocketAddr {
    let app = Router::new()
        .route("/render", post(render))
        .route("/screenshot", post(screenshot));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn driver_for(addr: SocketAddr, token: Option<&str>) -> HttpAutomationDriver {
    let config = DriverConfig {
        endpoint: format!("http://{addr}/"),
        api_token: token.map(str::to_string),
        ..DriverConfig::default()
    };
    HttpAutomationDriver::new(&config).unwrap()
}

#[tokio::test]
async fn test_render_parses_snapshot() {
    let addr = spawn_render_service().await;
    let driver = driver_for(addr, Some("secret"));

    let snapshot = driver
        .render("https://shop.example/item/1", Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(snapshot.http_status, Some(200));
    assert_eq!(snapshot.title.as_deref(), Some("Road Bike"));

    let bytes = driver
        .capture_artifact("https://shop.example/item/1", Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(bytes, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_error_status_is_automation_error() {
    let addr = spawn_render_service().await;

    let unauthorized = driver_for(addr, None)
        .render("https://shop.example/item/1", Duration::from_secs(5))
        .await;
    assert!(unauthorized.is_err());

    let broken = driver_for(addr, Some("secret"))
        .render("https://shop.example/broken", Duration::from_secs(5))
        .await;
    assert!(broken.is_err());
}

#[tokio::test]
async fn test_classifier_over_http_driver() {
    let addr = spawn_render_service().await;
    let driver = Arc::new(driver_for(addr, Some("secret")));
    let settings = ClassifierSettings {
        capture_artifacts: false,
        ..ClassifierSettings::default()
    };
    let classifier = StatusClassifier::new(driver, settings);

    let live = classifier
        .classify("https://shop.example/item/1", Duration::from_secs(5))
        .await;
    assert_eq!(live.status, CheckStatus::Live);
    assert_eq!(live.extracted_text.as_deref(), Some("Road Bike"));

    let gone = classifier
        .classify("https://shop.example/gone", Duration::from_secs(5))
        .await;
    assert_eq!(gone.status, CheckStatus::Missing);

    let broken = classifier
        .classify("https://shop.example/broken", Duration::from_secs(5))
        .await;
    assert_eq!(broken.status, CheckStatus::Error);
}

#[tokio::test]
async fn test_unreachable_service_is_error_result() {
    let config = DriverConfig {
        endpoint: "http://127.0.0.1:1".to_string(),
        connect_timeout_seconds: 1,
        ..DriverConfig::default()
    };
    let driver = Arc::new(HttpAutomationDriver::new(&config).unwrap());
    let classifier = StatusClassifier::new(
        driver,
        ClassifierSettings {
            capture_artifacts: false,
            ..ClassifierSettings::default()
        },
    );

    let result = classifier
        .classify("https://shop.example/item/1", Duration::from_secs(3))
        .await;
    assert_eq!(result.status, CheckStatus::Error);
}
