#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use collector::exchange::{ExchangeError, ExchangeRegistry, MarketDataClient, Ohlcv};
use migration::{Migrator, MigratorTrait};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ActiveValue, ConnectOptions, ConnectionTrait, Database, DatabaseConnection};
use shared::entity::{currency_pairs, exchanges, symbols, time_periods};
use shared::Timeframe;

/// Fresh migrated in-memory database. A single pooled connection keeps every
/// query on the same SQLite instance.
pub async fn setup_db() -> DatabaseConnection {
    let mut opts = ConnectOptions::new("sqlite::memory:");
    opts.max_connections(1).min_connections(1).sqlx_logging(false);
    let db = Database::connect(opts).await.expect("connect sqlite");
    Migrator::up(&db, None).await.expect("run migrations");
    db
}

pub async fn seed_symbol(db: &DatabaseConnection, ticker: &str) -> i32 {
    symbols::ActiveModel {
        name: ActiveValue::Set(ticker.to_string()),
        symbol: ActiveValue::Set(ticker.to_string()),
        description: ActiveValue::Set(None),
        is_active: ActiveValue::Set(true),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("insert symbol")
    .id
}

pub async fn seed_exchange(db: &DatabaseConnection, name: &str, code: &str) -> i32 {
    exchanges::ActiveModel {
        name: ActiveValue::Set(name.to_string()),
        code: ActiveValue::Set(code.to_string()),
        environment: ActiveValue::Set("production".to_string()),
        api_key: ActiveValue::Set(None),
        api_secret: ActiveValue::Set(None),
        api_passphrase: ActiveValue::Set(None),
        is_active: ActiveValue::Set(true),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("insert exchange")
    .id
}

pub async fn seed_pair(db: &DatabaseConnection, base_id: i32, quote_id: i32) -> i32 {
    seed_pair_of_type(db, base_id, quote_id, "spot").await
}

pub async fn seed_pair_of_type(db: &DatabaseConnection, base_id: i32, quote_id: i32, pair_type: &str) -> i32 {
    currency_pairs::ActiveModel {
        base_symbol_id: ActiveValue::Set(base_id),
        quote_symbol_id: ActiveValue::Set(quote_id),
        pair_type: ActiveValue::Set(pair_type.to_string()),
        is_active: ActiveValue::Set(true),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("insert currency pair")
    .id
}

pub async fn seed_period(db: &DatabaseConnection, name: &str, minutes: i32) -> i32 {
    time_periods::ActiveModel {
        name: ActiveValue::Set(name.to_string()),
        minutes: ActiveValue::Set(minutes),
        description: ActiveValue::Set(None),
        is_active: ActiveValue::Set(true),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("insert time period")
    .id
}

/// BTC/USDT pair with ids (pair, btc, usdt).
pub async fn seed_btc_usdt(db: &DatabaseConnection) -> (i32, i32, i32) {
    let btc = seed_symbol(db, "BTC").await;
    let usdt = seed_symbol(db, "USDT").await;
    let pair = seed_pair(db, btc, usdt).await;
    (pair, btc, usdt)
}

/// Makes the store refuse candle rows matching `condition` (SQL over `NEW`).
pub async fn reject_candles_where(db: &DatabaseConnection, condition: &str) {
    let sql = format!(
        "CREATE TRIGGER reject_candle BEFORE INSERT ON candles WHEN {} \
         BEGIN SELECT RAISE(ABORT, 'candle rejected'); END;",
        condition
    );
    db.execute_unprepared(&sql).await.expect("create trigger");
}

pub fn minute(ts: DateTime<Utc>) -> DateTime<Utc> {
    let secs = ts.timestamp();
    Utc.timestamp_opt(secs - secs.rem_euclid(60), 0).unwrap()
}

pub fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
}

pub fn candle(open_time: DateTime<Utc>, close: i64) -> Ohlcv {
    let close = Decimal::from(close);
    let mut c = Ohlcv::new(
        open_time,
        close - Decimal::ONE,
        close + Decimal::ONE,
        close - Decimal::TWO,
        close,
        Decimal::from(10),
    );
    c.close_time = Some(open_time + Duration::seconds(59));
    c
}

/// Serves a configurable "latest" candle.
pub struct LatestClient {
    pub latest: Mutex<Option<Ohlcv>>,
    pub calls: Mutex<Vec<(String, Timeframe)>>,
    pub fail_on: Option<Timeframe>,
}

impl LatestClient {
    pub fn new(latest: Option<Ohlcv>) -> Arc<Self> {
        Arc::new(Self {
            latest: Mutex::new(latest),
            calls: Mutex::new(Vec::new()),
            fail_on: None,
        })
    }

    pub fn failing_on(latest: Option<Ohlcv>, timeframe: Timeframe) -> Arc<Self> {
        Arc::new(Self {
            latest: Mutex::new(latest),
            calls: Mutex::new(Vec::new()),
            fail_on: Some(timeframe),
        })
    }

    pub fn set_latest(&self, candle: Option<Ohlcv>) {
        *self.latest.lock().unwrap() = candle;
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl MarketDataClient for LatestClient {
    fn exchange_code(&self) -> &str {
        "stub"
    }

    async fn fetch_range(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        _since: Option<DateTime<Utc>>,
        _limit: u32,
    ) -> Result<Vec<Ohlcv>, ExchangeError> {
        self.calls.lock().unwrap().push((symbol.to_string(), timeframe));
        if self.fail_on == Some(timeframe) {
            return Err(ExchangeError::Timeout {
                exchange: "stub".to_string(),
            });
        }
        Ok(self.latest.lock().unwrap().clone().into_iter().collect())
    }
}

/// One candle per timeframe step over `[data_start, data_end)`.
pub struct SeriesClient {
    pub data_start: DateTime<Utc>,
    pub data_end: DateTime<Utc>,
    pub fail_from_call: Option<usize>,
    pub since_calls: Mutex<Vec<DateTime<Utc>>>,
}

impl SeriesClient {
    pub fn new(data_start: DateTime<Utc>, data_end: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self {
            data_start,
            data_end,
            fail_from_call: None,
            since_calls: Mutex::new(Vec::new()),
        })
    }

    pub fn failing_from(data_start: DateTime<Utc>, data_end: DateTime<Utc>, call: usize) -> Arc<Self> {
        Arc::new(Self {
            data_start,
            data_end,
            fail_from_call: Some(call),
            since_calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<DateTime<Utc>> {
        self.since_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl MarketDataClient for SeriesClient {
    fn exchange_code(&self) -> &str {
        "series"
    }

    async fn fetch_range(
        &self,
        _symbol: &str,
        timeframe: Timeframe,
        since: Option<DateTime<Utc>>,
        limit: u32,
    ) -> Result<Vec<Ohlcv>, ExchangeError> {
        let since = since.unwrap_or(self.data_start);
        let call_index = {
            let mut calls = self.since_calls.lock().unwrap();
            calls.push(since);
            calls.len() - 1
        };
        if matches!(self.fail_from_call, Some(n) if call_index >= n) {
            return Err(ExchangeError::Status {
                exchange: "series".to_string(),
                status: 503,
                body: "maintenance".to_string(),
            });
        }

        let step = timeframe.duration();
        let mut t = since.max(self.data_start);
        let mut out = Vec::new();
        while t < self.data_end && out.len() < limit as usize {
            out.push(candle(t, 100 + out.len() as i64));
            t = t + step;
        }
        Ok(out)
    }
}

/// Always answers with a single candle opening exactly at `since`.
pub struct StallingClient {
    pub since_calls: Mutex<Vec<DateTime<Utc>>>,
}

impl StallingClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            since_calls: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl MarketDataClient for StallingClient {
    fn exchange_code(&self) -> &str {
        "stalling"
    }

    async fn fetch_range(
        &self,
        _symbol: &str,
        _timeframe: Timeframe,
        since: Option<DateTime<Utc>>,
        _limit: u32,
    ) -> Result<Vec<Ohlcv>, ExchangeError> {
        let since = since.unwrap_or_else(Utc::now);
        self.since_calls.lock().unwrap().push(since);
        Ok(vec![candle(since, 42)])
    }
}

/// Registry serving `client` for `code` and failing construction for "broken".
pub fn registry_with(code: &str, client: Arc<dyn MarketDataClient>) -> ExchangeRegistry {
    let mut registry = ExchangeRegistry::empty();
    registry.register(code, move |_| Ok(Arc::clone(&client)));
    registry.register("broken", |settings| {
        Err(ExchangeError::Configuration {
            exchange: settings.code.clone(),
            reason: "missing credentials".to_string(),
        })
    });
    registry
}
