use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;
use dotenv::dotenv;

pub struct Config {
    pub database_url: String,
    pub api_bind_addr: String,
    pub static_dir: String,
    pub run_migrations: bool,
    pub log_format: String,
    pub live_update_interval_secs: u64,
    pub backfill_hour: u32,
    pub backfill_minute: u32,
    pub scheduler_timezone: Tz,
    pub backfill_floor_date: DateTime<Utc>,
    pub backfill_page_limit: u32,
    pub exchange_request_timeout_secs: u64,
    pub exchange_max_retries: u32,
    pub exchange_min_request_interval_ms: u64,
}

/// Runtime knobs consumed by the collector crate.
#[derive(Debug, Clone)]
pub struct CollectionSettings {
    pub live_update_interval: Duration,
    pub backfill_hour: u32,
    pub backfill_minute: u32,
    pub scheduler_timezone: Tz,
    /// Historical candles earlier than this are never requested.
    pub floor_date: DateTime<Utc>,
    pub page_limit: u32,
    pub request_timeout: Duration,
    pub max_retries: u32,
    pub min_request_interval: Duration,
}

impl Default for CollectionSettings {
    fn default() -> Self {
        Self {
            live_update_interval: Duration::from_secs(15),
            backfill_hour: 0,
            backfill_minute: 30,
            scheduler_timezone: chrono_tz::UTC,
            floor_date: default_floor_date(),
            page_limit: 1000,
            request_timeout: Duration::from_secs(30),
            max_retries: 3,
            min_request_interval: Duration::from_millis(100),
        }
    }
}

fn default_floor_date() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenv().ok();

        let scheduler_timezone = match std::env::var("SCHEDULER_TIMEZONE") {
            Ok(name) => Tz::from_str(name.trim())
                .map_err(|e| anyhow::anyhow!("invalid SCHEDULER_TIMEZONE {}: {}", name, e))?,
            Err(_) => chrono_tz::UTC,
        };

        let backfill_floor_date = match std::env::var("BACKFILL_FLOOR_DATE") {
            Ok(raw) => DateTime::parse_from_rfc3339(raw.trim())
                .with_context(|| format!("invalid BACKFILL_FLOOR_DATE {}", raw))?
                .with_timezone(&Utc),
            Err(_) => default_floor_date(),
        };

        Ok(Config {
            database_url: std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            api_bind_addr: std::env::var("API_BIND_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:8000".to_string()),
            static_dir: std::env::var("STATIC_DIR").unwrap_or_else(|_| "static".to_string()),
            run_migrations: env_or("RUN_MIGRATIONS", true),
            log_format: std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string()),
            live_update_interval_secs: env_or("LIVE_UPDATE_INTERVAL_SECS", 15u64).max(1),
            backfill_hour: env_or("BACKFILL_HOUR", 0u32).min(23),
            backfill_minute: env_or("BACKFILL_MINUTE", 30u32).min(59),
            scheduler_timezone,
            backfill_floor_date,
            backfill_page_limit: env_or("BACKFILL_PAGE_LIMIT", 1000u32).max(1),
            exchange_request_timeout_secs: env_or("EXCHANGE_REQUEST_TIMEOUT_SECS", 30u64).max(1),
            exchange_max_retries: env_or("EXCHANGE_MAX_RETRIES", 3u32),
            exchange_min_request_interval_ms: env_or("EXCHANGE_MIN_REQUEST_INTERVAL_MS", 100u64),
        })
    }

    pub fn collection_settings(&self) -> CollectionSettings {
        CollectionSettings {
            live_update_interval: Duration::from_secs(self.live_update_interval_secs),
            backfill_hour: self.backfill_hour,
            backfill_minute: self.backfill_minute,
            scheduler_timezone: self.scheduler_timezone,
            floor_date: self.backfill_floor_date,
            page_limit: self.backfill_page_limit,
            request_timeout: Duration::from_secs(self.exchange_request_timeout_secs),
            max_retries: self.exchange_max_retries,
            min_request_interval: Duration::from_millis(self.exchange_min_request_interval_ms),
        }
    }
}
