use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use checker_core::CheckerError;
use serde_json::{json, Value};
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("检查服务错误: {0}")]
    Checker(#[from] CheckerError),

    #[error("未认证: {0}")]
    Unauthorized(String),

    #[error("请求参数错误: {0}")]
    BadRequest(String),

    #[error("未找到资源")]
    NotFound,
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

struct ErrorParts {
    status: StatusCode,
    message: String,
    error_type: &'static str,
    suggestions: Vec<String>,
    details: Option<Value>,
}

impl ErrorParts {
    fn new(status: StatusCode, message: String, error_type: &'static str) -> Self {
        Self {
            status,
            message,
            error_type,
            suggestions: Vec::new(),
            details: None,
        }
    }

    fn suggest(mut self, suggestions: &[&str]) -> Self {
        self.suggestions = suggestions.iter().map(|s| s.to_string()).collect();
        self
    }

    fn internal(detail: String) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "系统内部错误".to_string(),
            "INTERNAL_ERROR",
        )
        .suggest(&["系统遇到内部错误，请稍后重试", "查看 GET /health 检查系统状态"])
        .with_details(json!({ "detail": detail }))
    }

    fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl ApiError {
    fn parts(&self) -> ErrorParts {
        match self {
            ApiError::Checker(err) => checker_error_parts(err),
            ApiError::Unauthorized(msg) => {
                ErrorParts::new(StatusCode::UNAUTHORIZED, msg.clone(), "UNAUTHORIZED")
                    .suggest(&["请在请求头中提供 X-User-Id（可选 X-User-Name）"])
            }
            ApiError::BadRequest(msg) => ErrorParts::new(
                StatusCode::BAD_REQUEST,
                format!("请求参数错误: {msg}"),
                "BAD_REQUEST",
            )
            .suggest(&["请检查请求格式和参数", "确保Content-Type正确设置"]),
            ApiError::NotFound => ErrorParts::new(
                StatusCode::NOT_FOUND,
                "请求的资源不存在".to_string(),
                "NOT_FOUND",
            ),
        }
    }
}

fn checker_error_parts(err: &CheckerError) -> ErrorParts {
    match err {
        CheckerError::Validation(msg) => {
            ErrorParts::new(StatusCode::BAD_REQUEST, msg.clone(), "VALIDATION_ERROR")
                .suggest(&["请检查请求参数是否符合要求"])
        }
        CheckerError::InvalidConcurrency { allowed, .. } => ErrorParts::new(
            StatusCode::BAD_REQUEST,
            err.to_string(),
            "INVALID_CONCURRENCY",
        )
        .with_details(json!({ "allowed": allowed })),
        CheckerError::AlreadyRunning => {
            ErrorParts::new(StatusCode::CONFLICT, err.to_string(), "ALREADY_RUNNING").suggest(&[
                "等待当前运行结束",
                "或调用 POST /api/checks/stop 停止后再继续",
            ])
        }
        CheckerError::LockConflict { owner, .. } => {
            ErrorParts::new(StatusCode::CONFLICT, err.to_string(), "LOCK_CONFLICT")
                .with_details(json!({ "lockedBy": owner }))
        }
        CheckerError::LockRequired { .. } => ErrorParts::new(
            StatusCode::PRECONDITION_REQUIRED,
            err.to_string(),
            "LOCK_REQUIRED",
        )
        .suggest(&["先调用 POST /api/locks/{recordId} 获取锁"]),
        CheckerError::RecordNotFound { .. } => {
            ErrorParts::new(StatusCode::NOT_FOUND, err.to_string(), "RECORD_NOT_FOUND")
        }
        CheckerError::Automation(_)
        | CheckerError::Persistence(_)
        | CheckerError::Serialization(_)
        | CheckerError::Configuration(_)
        | CheckerError::Internal(_) => ErrorParts::internal(err.to_string()),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let parts = self.parts();
        if parts.status.is_server_error() {
            error!("API request failed: {}", self);
        }

        let mut body = json!({
            "error": {
                "message": parts.message,
                "type": parts.error_type,
                "code": parts.status.as_u16(),
                "suggestions": parts.suggestions,
                "timestamp": chrono::Utc::now().to_rfc3339(),
            }
        });
        if let Some(details) = parts.details {
            body["error"]["details"] = details;
        }

        (parts.status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
