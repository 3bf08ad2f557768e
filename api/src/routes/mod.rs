pub mod candles;
pub mod collection;
pub mod system;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Assemble the HTTP router.
pub fn app_router(state: Arc<AppState>) -> Router {
    let static_files = ServeDir::new(&state.static_dir);

    Router::new()
        .route("/", get(system::root))
        .route("/api", get(system::api_root))
        .route("/health", get(system::health))
        .route("/db-status", get(system::db_status))
        .route("/data-collection-status", get(collection::status))
        .route("/trigger-current-collection", post(collection::trigger_current))
        .route("/trigger-historical-collection", post(collection::trigger_historical))
        .route("/stats", get(collection::stats))
        .route("/candles", get(candles::list))
        .nest_service("/static", static_files)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use collector::{DataCollectionService, Scheduler};
    use migration::{Migrator, MigratorTrait};
    use sea_orm::{ConnectOptions, Database};
    use serde_json::Value;
    use shared::CollectionSettings;
    use tower::ServiceExt;

    async fn test_app() -> Router {
        let mut opts = ConnectOptions::new("sqlite::memory:");
        opts.max_connections(1).min_connections(1).sqlx_logging(false);
        let db = Database::connect(opts).await.unwrap();
        Migrator::up(&db, None).await.unwrap();

        let service = Arc::new(DataCollectionService::new(
            Arc::new(db),
            CollectionSettings::default(),
        ));
        let scheduler = Scheduler::new(service);
        app_router(AppState::new(scheduler, "does-not-exist"))
    }

    async fn call(app: Router, method: &str, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health_and_api_root() {
        let (status, body) = call(test_app().await, "GET", "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");

        let (_, body) = call(test_app().await, "GET", "/api").await;
        assert_eq!(body["status"], "running");
    }

    #[tokio::test]
    async fn test_root_without_dashboard_returns_json() {
        let (status, body) = call(test_app().await, "GET", "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "running");
    }

    #[tokio::test]
    async fn test_db_status_connected() {
        let (_, body) = call(test_app().await, "GET", "/db-status").await;
        assert_eq!(body["database"], "connected");
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_collection_status_lists_jobs() {
        let (_, body) = call(test_app().await, "GET", "/data-collection-status").await;
        assert_eq!(body["status"], "stopped");
        let jobs = body["jobs"].as_array().unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0]["id"], "collect_current_candles");
        assert_eq!(jobs[1]["id"], "collect_historical_candles");
        assert!(jobs[0]["next_run"].is_null());
    }

    #[tokio::test]
    async fn test_triggers_return_success_envelope() {
        let app = test_app().await;
        let (status, body) = call(app.clone(), "POST", "/trigger-current-collection").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert_eq!(body["report"]["candles_inserted"], 0);

        let (_, body) = call(app, "POST", "/trigger-historical-collection").await;
        assert_eq!(body["status"], "success");
        assert_eq!(body["message"], "Historical candles collection triggered");
    }

    #[tokio::test]
    async fn test_stats_on_empty_store() {
        let (_, body) = call(test_app().await, "GET", "/stats").await;
        assert_eq!(body["total_candles"], 0);
        assert_eq!(body["total_exchanges"], 0);
        assert!(body["latest_updates"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_candles_ignores_unknown_symbol() {
        let (status, body) = call(test_app().await, "GET", "/candles?symbol=NOPE/USDT&limit=5000").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.as_array().unwrap().is_empty());
    }

    #[test]
    fn test_error_envelope_shape() {
        use axum::response::IntoResponse;
        let response = crate::error::ApiError::envelope("boom").into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
