use axum::{extract::FromRequestParts, http::request::Parts};

use crate::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_NAME_HEADER: &str = "x-user-name";

/// 当前操作用户
///
/// 身份由上游身份服务注入请求头：`X-User-Id` 必填，`X-User-Name` 可选，缺省时取用户ID。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActingUser {
    pub user_id: String,
    pub name: String,
}

fn header_value(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

impl<S> FromRequestParts<S> for ActingUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = header_value(parts, USER_ID_HEADER)
            .ok_or_else(|| ApiError::Unauthorized("缺少用户标识 X-User-Id".to_string()))?;
        let name = header_value(parts, USER_NAME_HEADER).unwrap_or_else(|| user_id.clone());

        Ok(ActingUser { user_id, name })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(request: Request<()>) -> Result<ActingUser, ApiError> {
        let (mut parts, _) = request.into_parts();
        ActingUser::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_user_from_headers() {
        let request = Request::builder()
            .header("X-User-Id", "u1")
            .header("X-User-Name", "Alice")
            .body(())
            .unwrap();

        let user = extract(request).await.unwrap();
        assert_eq!(user.user_id, "u1");
        assert_eq!(user.name, "Alice");
    }

    #[tokio::test]
    async fn test_name_defaults_to_id() {
        let request = Request::builder()
            .header("X-User-Id", "u2")
            .body(())
            .unwrap();

        assert_eq!(extract(request).await.unwrap().name, "u2");
    }

    #[tokio::test]
    async fn test_missing_or_blank_id_rejected() {
        let missing = Request::builder().body(()).unwrap();
        assert!(matches!(
            extract(missing).await,
            Err(ApiError::Unauthorized(_))
        ));

        let blank = Request::builder()
            .header("X-User-Id", "  ")
            .body(())
            .unwrap();
        assert!(extract(blank).await.is_err());
    }
}
