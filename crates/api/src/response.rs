use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl<T> ApiResponse<T>
where
    T: Serialize,
{
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn success_with_message(data: T, message: String) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: Some(message),
            timestamp: chrono::Utc::now(),
        }
    }

    /// 业务上被拒绝但仍需返回数据的响应（例如锁被他人持有）
    pub fn rejected(data: T, message: String) -> Self {
        Self {
            success: false,
            data: Some(data),
            message: Some(message),
            timestamp: chrono::Utc::now(),
        }
    }
}

impl<T> IntoResponse for ApiResponse<T>
where
    T: Serialize,
{
    fn into_response(self) -> axum::response::Response {
        Json(self).into_response()
    }
}

pub fn success<T: Serialize>(data: T) -> impl IntoResponse {
    (StatusCode::OK, ApiResponse::success(data))
}

pub fn accepted<T: Serialize>(data: T, message: String) -> impl IntoResponse {
    (
        StatusCode::ACCEPTED,
        ApiResponse::success_with_message(data, message),
    )
}

pub fn conflict<T: Serialize>(data: T, message: String) -> impl IntoResponse {
    (StatusCode::CONFLICT, ApiResponse::rejected(data, message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_api_response_success() {
        let response = ApiResponse::success("test_data");

        assert!(response.success);
        assert_eq!(response.data, Some("test_data"));
        assert!(response.message.is_none());
        assert!(response.timestamp <= Utc::now());
    }

    #[test]
    fn test_api_response_rejected() {
        let response = ApiResponse::rejected(1, "已被锁定".to_string());

        assert!(!response.success);
        assert_eq!(response.data, Some(1));
        assert_eq!(response.message.as_deref(), Some("已被锁定"));
    }

    #[test]
    fn test_api_response_serialization() {
        let response = ApiResponse::success("test_data");
        let json = serde_json::to_string(&response).unwrap();

        assert!(json.contains("\"success\":true"));
        assert!(json.contains("\"data\":\"test_data\""));
        assert!(json.contains("\"timestamp\""));
    }

    #[test]
    fn test_status_helpers() {
        assert_eq!(success("x").into_response().status(), StatusCode::OK);
        assert_eq!(
            accepted("x", "ok".to_string()).into_response().status(),
            StatusCode::ACCEPTED
        );
        assert_eq!(
            conflict("x", "busy".to_string()).into_response().status(),
            StatusCode::CONFLICT
        );
    }
}
