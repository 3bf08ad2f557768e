use std::path::PathBuf;
use std::sync::Arc;

use collector::{DataCollectionService, Scheduler};
use sea_orm::DatabaseConnection;

/// Shared application state, passed to all route handlers via `axum::extract::State`.
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub service: Arc<DataCollectionService>,
    pub scheduler: Arc<Scheduler>,
    pub static_dir: PathBuf,
}

impl AppState {
    pub fn new(scheduler: Arc<Scheduler>, static_dir: impl Into<PathBuf>) -> Arc<Self> {
        let service = Arc::clone(scheduler.service());
        Arc::new(Self {
            db: service.db_handle(),
            service,
            scheduler,
            static_dir: static_dir.into(),
        })
    }
}
