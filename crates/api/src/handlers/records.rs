use axum::{
    extract::{rejection::JsonRejection, Path, State},
    response::IntoResponse,
    Json,
};
use checker_core::{BusEvent, CheckerError, ReviewRecord};
use serde::Deserialize;
use tracing::info;

use crate::{auth::ActingUser, error::ApiResult, response::success, routes::AppState};

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub reviewed: bool,
    #[serde(default)]
    pub note: Option<String>,
}

/// 写入复核状态，调用者必须持有该记录的有效锁
pub async fn review_record(
    State(state): State<AppState>,
    Path(record_id): Path<String>,
    user: ActingUser,
    payload: Result<Json<ReviewRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = payload?;
    if state.store.listing_url(&record_id).await?.is_none() {
        return Err(CheckerError::RecordNotFound { id: record_id }.into());
    }

    state.locks.ensure_owner(&record_id, &user.user_id)?;

    let review = ReviewRecord {
        record_id,
        reviewed: request.reviewed,
        note: request.note.filter(|note| !note.trim().is_empty()),
        reviewed_by: user.user_id,
        reviewed_at: chrono::Utc::now(),
    };
    state.store.save_review(&review).await?;

    info!(
        record_id = %review.record_id,
        reviewed = review.reviewed,
        reviewed_by = %review.reviewed_by,
        "Review saved"
    );

    state.bus.publish(BusEvent::ReviewUpdated(review.clone()));
    Ok(success(review))
}
