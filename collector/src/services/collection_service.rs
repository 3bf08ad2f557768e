//! Data Collection Service - owns the exchange clients and serializes job runs

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use sea_orm::DatabaseConnection;
use shared::CollectionSettings;
use tokio::sync::Mutex;

use crate::exchange::{ExchangeClientCache, ExchangeRegistry, TransportSettings};
use crate::services::backfill::{self, BackfillOptions};
use crate::services::live_update;
use crate::services::report::{CollectionJob, CollectionReport};

pub struct DataCollectionService {
    db: Arc<DatabaseConnection>,
    clients: ExchangeClientCache,
    settings: CollectionSettings,
    current_lock: Mutex<()>,
    historical_lock: Mutex<()>,
    stop: AtomicBool,
}

impl DataCollectionService {
    pub fn new(db: Arc<DatabaseConnection>, settings: CollectionSettings) -> Self {
        Self::with_registry(db, settings, ExchangeRegistry::new())
    }

    pub fn with_registry(
        db: Arc<DatabaseConnection>,
        settings: CollectionSettings,
        registry: ExchangeRegistry,
    ) -> Self {
        let transport = TransportSettings::from(&settings);
        Self {
            db,
            clients: ExchangeClientCache::new(registry, transport),
            settings,
            current_lock: Mutex::new(()),
            historical_lock: Mutex::new(()),
            stop: AtomicBool::new(false),
        }
    }

    pub fn db(&self) -> &DatabaseConnection {
        self.db.as_ref()
    }

    pub fn db_handle(&self) -> Arc<DatabaseConnection> {
        Arc::clone(&self.db)
    }

    pub fn settings(&self) -> &CollectionSettings {
        &self.settings
    }

    pub fn clients(&self) -> &ExchangeClientCache {
        &self.clients
    }

    fn lock_for(&self, job: CollectionJob) -> &Mutex<()> {
        match job {
            CollectionJob::CurrentCandles => &self.current_lock,
            CollectionJob::HistoricalCandles => &self.historical_lock,
        }
    }

    /// Runs `job`, waiting for an in-flight run of the same job to finish first.
    pub async fn run(&self, job: CollectionJob) -> anyhow::Result<CollectionReport> {
        let _guard = self.lock_for(job).lock().await;
        self.execute(job).await
    }

    /// Runs `job` unless it is already running, in which case `None`.
    pub async fn try_run(&self, job: CollectionJob) -> Option<anyhow::Result<CollectionReport>> {
        let _guard = self.lock_for(job).try_lock().ok()?;
        Some(self.execute(job).await)
    }

    pub async fn collect_current_candles(&self) -> anyhow::Result<CollectionReport> {
        self.run(CollectionJob::CurrentCandles).await
    }

    pub async fn collect_historical_candles(&self) -> anyhow::Result<CollectionReport> {
        self.run(CollectionJob::HistoricalCandles).await
    }

    async fn execute(&self, job: CollectionJob) -> anyhow::Result<CollectionReport> {
        match job {
            CollectionJob::CurrentCandles => {
                live_update::run_live_update(self.db(), &self.clients, &self.stop).await
            }
            CollectionJob::HistoricalCandles => {
                let options = BackfillOptions {
                    floor: self.settings.floor_date,
                    page_limit: self.settings.page_limit,
                };
                backfill::run_backfill(self.db(), &self.clients, &options, &self.stop).await
            }
        }
    }

    pub fn is_running(&self, job: CollectionJob) -> bool {
        self.lock_for(job).try_lock().is_err()
    }

    /// Asks in-flight runs to return after their current series.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn clear_stop(&self) {
        self.stop.store(false, Ordering::SeqCst);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Resolves once no run of either job is in flight.
    pub async fn wait_idle(&self) {
        let _current = self.current_lock.lock().await;
        let _historical = self.historical_lock.lock().await;
    }
}
