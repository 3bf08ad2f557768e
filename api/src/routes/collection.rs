use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use collector::repositories::candle_repository;
use collector::CollectionJob;
use serde_json::{json, Value};
use tracing::{error, info};

use crate::error::ApiError;
use crate::state::AppState;

pub async fn status(State(state): State<Arc<AppState>>) -> Json<Value> {
    let status = state.scheduler.status().await;
    Json(json!({
        "status": if status.running { "running" } else { "stopped" },
        "jobs": status.jobs,
    }))
}

async fn trigger(state: &AppState, job: CollectionJob, message: &str) -> Result<Json<Value>, ApiError> {
    info!("Manual trigger: {}", job.name());
    match state.service.run(job).await {
        Ok(report) => Ok(Json(json!({
            "status": "success",
            "message": message,
            "report": report,
        }))),
        Err(e) => {
            error!("Manual {} failed: {:#}", job.id(), e);
            Err(ApiError::envelope(format!("{:#}", e)))
        }
    }
}

pub async fn trigger_current(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    trigger(&state, CollectionJob::CurrentCandles, "Current candles collection triggered").await
}

pub async fn trigger_historical(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    trigger(
        &state,
        CollectionJob::HistoricalCandles,
        "Historical candles collection triggered",
    )
    .await
}

pub async fn stats(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let stats = candle_repository::collection_stats(state.db.as_ref())
        .await
        .map_err(ApiError::envelope)?;
    Ok(Json(json!(stats)))
}
