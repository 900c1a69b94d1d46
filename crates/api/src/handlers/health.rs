use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::routes::AppState;

pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let stats = state.automation.get_queue_stats();

    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "service": "listing-checker",
        "version": env!("CARGO_PKG_VERSION"),
        "checks": {
            "running": stats.running,
            "pending": stats.pending,
            "inFlight": stats.in_flight,
            "concurrency": stats.concurrency_limit,
        },
        "activeLocks": state.locks.get_all_locks().len(),
    }))
}
