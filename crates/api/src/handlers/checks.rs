use axum::{
    extract::{rejection::JsonRejection, State},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    auth::ActingUser,
    error::ApiResult,
    response::{accepted, success, ApiResponse},
    routes::AppState,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartChecksRequest {
    #[serde(default)]
    pub record_ids: Vec<String>,
    pub concurrency: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateConcurrencyRequest {
    pub concurrency: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConcurrencyResponse {
    pub concurrency: u32,
    pub allowed: Vec<u32>,
}

pub async fn start_checks(
    State(state): State<AppState>,
    user: ActingUser,
    payload: Result<Json<StartChecksRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = payload?;
    info!(
        user_id = %user.user_id,
        records = request.record_ids.len(),
        concurrency = ?request.concurrency,
        "Start checks requested"
    );

    let outcome = state
        .automation
        .start_checks(request.record_ids, &user.user_id, request.concurrency)
        .await?;
    let message = outcome.message.clone();

    Ok(accepted(outcome, message))
}

pub async fn update_concurrency(
    State(state): State<AppState>,
    _user: ActingUser,
    payload: Result<Json<UpdateConcurrencyRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = payload?;
    let concurrency = state.automation.update_concurrency(request.concurrency)?;

    Ok(success(ConcurrencyResponse {
        concurrency,
        allowed: state.automation.allowed_concurrency().to_vec(),
    }))
}

pub async fn stop_checks(
    State(state): State<AppState>,
    user: ActingUser,
) -> ApiResult<impl IntoResponse> {
    info!(user_id = %user.user_id, "Stop checks requested");
    let stats = state.automation.stop_checks();

    Ok(ApiResponse::success_with_message(
        stats,
        "已停止派发新任务，进行中的检查将继续完成".to_string(),
    ))
}

pub async fn reset_queue(
    State(state): State<AppState>,
    user: ActingUser,
) -> ApiResult<impl IntoResponse> {
    info!(user_id = %user.user_id, "Queue reset requested");
    let stats = state.automation.reset_queue(&user.user_id);

    Ok(ApiResponse::success_with_message(
        stats,
        "队列已重置".to_string(),
    ))
}

pub async fn get_status(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    Ok(success(state.automation.get_status()))
}
