//! # Checker API
//!
//! 检查自动化服务的HTTP边界：把运行控制、记录锁、人工复核和事件推送暴露为REST/SSE接口。
//!
//! ## API 端点
//!
//! ### 检查运行
//! - `POST /api/checks/start` - 开启检查 `{recordIds, concurrency?}`，返回 202
//! - `POST /api/checks/concurrency` - 修改并发上限 `{concurrency}`
//! - `POST /api/checks/stop` - 协作式停止
//! - `POST /api/checks/reset` - 清空队列并开启新代次
//! - `GET /api/checks/status` - 运行状态与最近结果
//!
//! ### 记录锁
//! - `GET /api/locks` - 所有有效锁
//! - `POST /api/locks/{recordId}` - 获取或续期锁，冲突时返回 409 与持有者
//! - `DELETE /api/locks/{recordId}` - 释放锁
//!
//! ### 人工复核
//! - `POST /api/records/{recordId}/review` - 需持有锁，否则返回 428 或 409
//!
//! ### 事件推送
//! - `GET /api/events` - SSE：`connected`、`result`、`stats`、`system-complete`、
//!   `lock-update`、`review-updated`
//!
//! ## 身份
//!
//! 除 `/health`、状态与锁列表外，所有接口都要求 `X-User-Id` 请求头，缺失时返回 401。
//!
//! ## 错误响应
//!
//! ```json
//! {
//!   "error": {
//!     "message": "...",
//!     "type": "LOCK_CONFLICT",
//!     "code": 409,
//!     "suggestions": [],
//!     "timestamp": "2024-01-01T00:00:00Z",
//!     "details": { "lockedBy": { "userId": "u1", "name": "Alice" } }
//!   }
//! }
//! ```

pub mod auth;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod routes;
pub mod stream;

use axum::Router;
use checker_core::ApiConfig;
use tower::ServiceBuilder;

pub use auth::ActingUser;
pub use error::{ApiError, ApiResult};
pub use middleware::{cors_layer, request_logging, trace_layer};
pub use response::ApiResponse;
pub use routes::{create_routes, AppState};

/// 创建带中间件的应用路由
pub fn create_app(state: AppState, api_config: &ApiConfig) -> Router {
    let router = create_routes(state).layer(
        ServiceBuilder::new()
            .layer(trace_layer())
            .layer(axum::middleware::from_fn(request_logging)),
    );

    if api_config.cors_enabled {
        router.layer(cors_layer(api_config))
    } else {
        router
    }
}
