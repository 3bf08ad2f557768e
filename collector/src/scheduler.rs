//! Dispatches the two collection jobs: current candles on a fixed interval,
//! historical backfill once a day at a wall-clock time.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::services::{CollectionJob, DataCollectionService};

#[derive(Debug, Clone, Serialize)]
pub struct JobStatus {
    pub id: &'static str,
    pub name: &'static str,
    pub next_run: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub running: bool,
    pub jobs: Vec<JobStatus>,
}

pub struct Scheduler {
    service: Arc<DataCollectionService>,
    running: AtomicBool,
    shutdown: watch::Sender<bool>,
    next_runs: RwLock<HashMap<CollectionJob, DateTime<Utc>>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(service: Arc<DataCollectionService>) -> Arc<Self> {
        let (shutdown, _) = watch::channel(false);
        Arc::new(Self {
            service,
            running: AtomicBool::new(false),
            shutdown,
            next_runs: RwLock::new(HashMap::new()),
            handles: Mutex::new(Vec::new()),
        })
    }

    pub fn service(&self) -> &Arc<DataCollectionService> {
        &self.service
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub async fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Scheduler already running");
            return;
        }
        self.service.clear_stop();
        self.shutdown.send_replace(false);

        let current = tokio::spawn(Arc::clone(self).current_loop(self.shutdown.subscribe()));
        let historical = tokio::spawn(Arc::clone(self).historical_loop(self.shutdown.subscribe()));
        self.handles.lock().await.extend([current, historical]);

        let settings = self.service.settings();
        info!(
            "Scheduler started: current candles every {:?}, historical daily at {:02}:{:02} {}",
            settings.live_update_interval,
            settings.backfill_hour,
            settings.backfill_minute,
            settings.scheduler_timezone
        );
    }

    /// Halts dispatch and waits for in-flight runs to return.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        self.shutdown.send_replace(true);
        self.service.request_stop();

        let handles: Vec<_> = self.handles.lock().await.drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                error!("Scheduler loop ended abnormally: {}", e);
            }
        }
        self.service.wait_idle().await;
        self.next_runs.write().await.clear();
        info!("Scheduler stopped");
    }

    pub async fn status(&self) -> SchedulerStatus {
        let next_runs = self.next_runs.read().await;
        let jobs = [CollectionJob::CurrentCandles, CollectionJob::HistoricalCandles]
            .into_iter()
            .map(|job| JobStatus {
                id: job.id(),
                name: job.name(),
                next_run: next_runs.get(&job).copied(),
            })
            .collect();
        SchedulerStatus {
            running: self.is_running(),
            jobs,
        }
    }

    async fn set_next_run(&self, job: CollectionJob, at: DateTime<Utc>) {
        self.next_runs.write().await.insert(job, at);
    }

    /// Starts `job` on its own task; skipped with a warning if still running.
    fn dispatch(&self, job: CollectionJob) {
        let service = Arc::clone(&self.service);
        tokio::spawn(async move {
            match service.try_run(job).await {
                None => warn!(
                    "Execution of job \"{}\" skipped: maximum number of running instances reached (1)",
                    job.name()
                ),
                Some(Ok(report)) => debug!(job = job.id(), run_id = %report.run_id, "job finished"),
                Some(Err(e)) => error!(job = job.id(), "Job failed: {:#}", e),
            }
        });
    }

    async fn current_loop(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let period = self.service.settings().live_update_interval;
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => break,
            }
            if *shutdown.borrow() {
                break;
            }
            let next = Utc::now() + Duration::from_std(period).unwrap_or_else(|_| Duration::seconds(15));
            self.set_next_run(CollectionJob::CurrentCandles, next).await;
            self.dispatch(CollectionJob::CurrentCandles);
        }
    }

    async fn historical_loop(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let settings = self.service.settings().clone();
        let mut last_fire: Option<DateTime<Utc>> = None;

        loop {
            let now = match last_fire {
                Some(fired) => Utc::now().max(fired + Duration::minutes(1)),
                None => Utc::now(),
            };
            let next = next_daily_run(
                now,
                settings.backfill_hour,
                settings.backfill_minute,
                settings.scheduler_timezone,
            );
            self.set_next_run(CollectionJob::HistoricalCandles, next).await;

            let wait = (next - Utc::now()).to_std().unwrap_or_default();
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = shutdown.changed() => break,
            }
            if *shutdown.borrow() {
                break;
            }
            last_fire = Some(next);
            self.dispatch(CollectionJob::HistoricalCandles);
        }
    }
}

/// First instant strictly after `now` whose wall-clock time in `tz` is
/// `hour:minute`. A time skipped by a DST jump fires an hour later.
pub fn next_daily_run(now: DateTime<Utc>, hour: u32, minute: u32, tz: Tz) -> DateTime<Utc> {
    let mut date = now.with_timezone(&tz).date_naive();
    for _ in 0..3 {
        if let Some(candidate) = local_occurrence(date, hour, minute, tz) {
            if candidate > now {
                return candidate;
            }
        }
        match date.succ_opt() {
            Some(next) => date = next,
            None => break,
        }
    }
    now + Duration::days(1)
}

fn local_occurrence(date: NaiveDate, hour: u32, minute: u32, tz: Tz) -> Option<DateTime<Utc>> {
    let naive = date.and_hms_opt(hour, minute, 0)?;
    tz.from_local_datetime(&naive)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(naive + Duration::hours(1))).earliest())
        .map(|t| t.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn test_next_run_later_today() {
        let next = next_daily_run(utc(2024, 5, 1, 0, 10), 0, 30, chrono_tz::UTC);
        assert_eq!(next, utc(2024, 5, 1, 0, 30));
    }

    #[test]
    fn test_next_run_tomorrow_when_time_passed_or_now() {
        assert_eq!(
            next_daily_run(utc(2024, 5, 1, 12, 0), 0, 30, chrono_tz::UTC),
            utc(2024, 5, 2, 0, 30)
        );
        assert_eq!(
            next_daily_run(utc(2024, 5, 1, 0, 30), 0, 30, chrono_tz::UTC),
            utc(2024, 5, 2, 0, 30)
        );
    }

    #[test]
    fn test_next_run_in_other_timezone() {
        // 23:00 in Moscow (UTC+3)
        let next = next_daily_run(utc(2024, 1, 1, 20, 0), 0, 30, chrono_tz::Europe::Moscow);
        assert_eq!(next, utc(2024, 1, 1, 21, 30));
    }

    #[test]
    fn test_next_run_across_dst_gap() {
        // 02:30 does not exist in New York on 2024-03-10
        let next = next_daily_run(utc(2024, 3, 10, 5, 0), 2, 30, chrono_tz::America::New_York);
        assert_eq!(next, utc(2024, 3, 10, 7, 30));
    }

    #[test]
    fn test_status_serializes_jobs() {
        let status = SchedulerStatus {
            running: true,
            jobs: vec![JobStatus {
                id: CollectionJob::CurrentCandles.id(),
                name: CollectionJob::CurrentCandles.name(),
                next_run: Some(utc(2024, 5, 1, 0, 0)),
            }],
        };
        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["jobs"][0]["id"], "collect_current_candles");
        assert_eq!(value["jobs"][0]["next_run"], "2024-05-01T00:00:00Z");
    }
}
