use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use checker_core::RecordStore;
use checker_dispatcher::{AutomationService, LockManager};
use checker_infrastructure::{EventBus, MetricsCollector};

use crate::error::ApiError;
use crate::handlers::{
    checks::{get_status, reset_queue, start_checks, stop_checks, update_concurrency},
    health::health_check,
    locks::{acquire_lock, list_locks, release_lock},
    records::review_record,
};
use crate::stream::event_stream;

/// API应用状态
#[derive(Clone)]
pub struct AppState {
    pub automation: AutomationService,
    pub locks: Arc<LockManager>,
    pub store: Arc<dyn RecordStore>,
    pub bus: EventBus,
    pub metrics: MetricsCollector,
    /// SSE 心跳间隔
    pub keep_alive: Duration,
}

/// 创建API路由
pub fn create_routes(state: AppState) -> Router {
    Router::new()
        // 健康检查
        .route("/health", get(health_check))
        // 检查运行控制
        .route("/api/checks/start", post(start_checks))
        .route("/api/checks/concurrency", post(update_concurrency))
        .route("/api/checks/stop", post(stop_checks))
        .route("/api/checks/reset", post(reset_queue))
        .route("/api/checks/status", get(get_status))
        // 记录锁
        .route("/api/locks", get(list_locks))
        .route(
            "/api/locks/{record_id}",
            post(acquire_lock).delete(release_lock),
        )
        // 人工复核
        .route("/api/records/{record_id}/review", post(review_record))
        // 事件推送
        .route("/api/events", get(event_stream))
        .fallback(not_found)
        .with_state(state)
}

async fn not_found() -> ApiError {
    ApiError::NotFound
}
