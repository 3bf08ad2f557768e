use std::sync::Arc;

use axum::extract::State;
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use tracing::warn;

use crate::state::AppState;

const API_NAME: &str = "Candle Collector API";

/// Dashboard from `STATIC_DIR/index.html` when present.
pub async fn root(State(state): State<Arc<AppState>>) -> Response {
    let index = state.static_dir.join("index.html");
    match tokio::fs::read_to_string(&index).await {
        Ok(page) => Html(page).into_response(),
        Err(_) => Json(json!({ "message": API_NAME, "status": "running" })).into_response(),
    }
}

pub async fn api_root() -> Json<Value> {
    Json(json!({ "message": API_NAME, "status": "running" }))
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

pub async fn db_status(State(state): State<Arc<AppState>>) -> Json<Value> {
    match state.db.ping().await {
        Ok(()) => Json(json!({ "database": "connected", "status": "healthy" })),
        Err(e) => {
            warn!("Database ping failed: {}", e);
            Json(json!({
                "database": "disconnected",
                "status": "error",
                "error": e.to_string(),
            }))
        }
    }
}
