use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::repositories::WriteOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionJob {
    CurrentCandles,
    HistoricalCandles,
}

impl CollectionJob {
    pub fn id(self) -> &'static str {
        match self {
            CollectionJob::CurrentCandles => "collect_current_candles",
            CollectionJob::HistoricalCandles => "collect_historical_candles",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CollectionJob::CurrentCandles => "Collect Current Candles",
            CollectionJob::HistoricalCandles => "Collect Historical Candles",
        }
    }
}

/// Counters for one collection run.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionReport {
    pub run_id: Uuid,
    pub job: CollectionJob,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub exchanges_processed: u32,
    pub exchanges_failed: u32,
    pub pairs_failed: u32,
    pub leaves_processed: u32,
    pub leaves_skipped: u32,
    pub leaves_failed: u32,
    pub candles_inserted: u64,
    pub candles_updated: u64,
    pub candles_unchanged: u64,
    pub row_failures: u64,
    pub pages_fetched: u64,
    /// Set when a stop request cut the run short.
    pub interrupted: bool,
}

impl CollectionReport {
    pub fn new(job: CollectionJob) -> Self {
        Self::with_run_id(job, Uuid::new_v4())
    }

    pub fn with_run_id(job: CollectionJob, run_id: Uuid) -> Self {
        Self {
            run_id,
            job,
            started_at: Utc::now(),
            finished_at: None,
            exchanges_processed: 0,
            exchanges_failed: 0,
            pairs_failed: 0,
            leaves_processed: 0,
            leaves_skipped: 0,
            leaves_failed: 0,
            candles_inserted: 0,
            candles_updated: 0,
            candles_unchanged: 0,
            row_failures: 0,
            pages_fetched: 0,
            interrupted: false,
        }
    }

    pub fn record_write(&mut self, outcome: WriteOutcome) {
        match outcome {
            WriteOutcome::Inserted => self.candles_inserted += 1,
            WriteOutcome::Updated => self.candles_updated += 1,
            WriteOutcome::Unchanged => self.candles_unchanged += 1,
        }
    }

    pub fn candles_written(&self) -> u64 {
        self.candles_inserted + self.candles_updated
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn summary(&self) -> String {
        format!(
            "{} exchanges ({} failed), {} leaves ({} skipped, {} failed), {} inserted, {} updated",
            self.exchanges_processed,
            self.exchanges_failed,
            self.leaves_processed,
            self.leaves_skipped,
            self.leaves_failed,
            self.candles_inserted,
            self.candles_updated,
        )
    }
}
