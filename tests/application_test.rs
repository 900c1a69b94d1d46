use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use checker::{Application, ShutdownManager};
use checker_core::{AppConfig, CheckStatus};
use checker_testing_utils::{MockAutomationDriver, MockRecordStore, TestEnv};
use serde_json::Value;
use tower::ServiceExt;

const WAIT: Duration = Duration::from_secs(10);

fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.api.bind_address = "127.0.0.1:0".to_string();
    config.automation.capture_artifacts = false;
    config.automation.classification_timeout_ms = 2_000;
    config.automation.shutdown_grace_seconds = 2;
    config
}

#[tokio::test]
async fn test_router_runs_checks_end_to_end() {
    let store = MockRecordStore::with_ids(["r1", "r2", "r3"]);
    let app = Application::with_components(
        test_config(),
        Arc::new(MockAutomationDriver::new()),
        Arc::new(store.clone()),
    );

    let response = app
        .router()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/checks/start")
                .header("X-User-Id", "u1")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"recordIds":["r1","r2","r3"],"concurrency":3}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    assert!(TestEnv::wait_for(|| store.saved_results().len() == 3, WAIT).await);
    let automation = app.automation().clone();
    assert!(TestEnv::wait_for(|| !automation.get_queue_stats().running, WAIT).await);

    let stats = app.automation().get_queue_stats();
    assert_eq!(stats.total_completed, 3);
    assert_eq!(stats.total_succeeded, 3);

    let response = app
        .router()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["service"], "listing-checker");
}

#[tokio::test]
async fn test_seeded_application_with_unreachable_browser_service() {
    let dir = tempfile::tempdir().unwrap();
    let seed = dir.path().join("records.json");
    std::fs::write(
        &seed,
        r#"[{"id":"a","url":"https://listings.example/a"},{"id":"b","url":"https://listings.example/b"}]"#,
    )
    .unwrap();

    let mut config = test_config();
    config.store.seed_file = Some(seed.to_string_lossy().into_owned());
    config.driver.endpoint = "http://127.0.0.1:9".to_string();
    config.driver.connect_timeout_seconds = 1;

    let app = Application::new(config).await.unwrap();
    let outcome = app
        .automation()
        .start_checks(vec!["a".into(), "b".into(), "missing".into()], "u1", None)
        .await
        .unwrap();
    assert_eq!(outcome.enqueued, 2);

    let automation = app.automation().clone();
    assert!(
        TestEnv::wait_for(
            || automation.get_queue_stats().total_completed == 2,
            WAIT
        )
        .await
    );

    let results = app.automation().get_recent_results();
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.status == CheckStatus::Error));
    assert_eq!(app.automation().get_queue_stats().total_failed, 2);
}

#[tokio::test]
async fn test_missing_seed_file_fails_startup() {
    let mut config = test_config();
    config.store.seed_file = Some("/definitely/not/here.json".to_string());

    assert!(Application::new(config).await.is_err());
}

#[tokio::test]
async fn test_run_stops_on_shutdown_signal() {
    let mut config = test_config();
    config.locks.sweep_interval_seconds = 1;

    let app = Arc::new(Application::with_components(
        config,
        Arc::new(MockAutomationDriver::new()),
        Arc::new(MockRecordStore::with_ids(["r1"])),
    ));
    let shutdown = ShutdownManager::new();
    let shutdown_rx = shutdown.subscribe().await;

    let handle = {
        let app = Arc::clone(&app);
        tokio::spawn(async move { app.run(shutdown_rx).await })
    };

    app.locks().acquire("r1", "u1", "Alice").unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown.shutdown().await;

    let result = tokio::time::timeout(WAIT, handle)
        .await
        .expect("application should stop")
        .unwrap();
    assert!(result.is_ok());
    assert!(app
        .automation()
        .start_checks(vec!["r1".into()], "u1", None)
        .await
        .is_err());
}
