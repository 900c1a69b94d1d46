use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::{
    auth::ActingUser,
    error::ApiResult,
    response::{conflict, success},
    routes::AppState,
};

#[derive(Debug, Serialize)]
pub struct ReleaseResponse {
    pub released: bool,
}

/// 获取或续期锁；被他人持有时返回 409 并携带持有者
pub async fn acquire_lock(
    State(state): State<AppState>,
    Path(record_id): Path<String>,
    user: ActingUser,
) -> ApiResult<Response> {
    let outcome = state
        .locks
        .acquire(&record_id, &user.user_id, &user.name)?;

    if outcome.success {
        return Ok(success(outcome).into_response());
    }

    let holder = outcome
        .locked_by
        .as_ref()
        .map(|owner| owner.name.clone())
        .unwrap_or_default();
    Ok(conflict(outcome, format!("记录 {record_id} 已被 {holder} 锁定")).into_response())
}

pub async fn release_lock(
    State(state): State<AppState>,
    Path(record_id): Path<String>,
    user: ActingUser,
) -> ApiResult<impl IntoResponse> {
    let released = state.locks.release(&record_id, &user.user_id);
    Ok(success(ReleaseResponse { released }))
}

pub async fn list_locks(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    Ok(success(state.locks.get_all_locks()))
}
