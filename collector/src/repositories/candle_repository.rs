use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, ConnectionTrait, DbErr, EntityTrait,
    IntoActiveModel, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
};
use serde::Serialize;
use shared::entity::{candles, currency_pairs, exchanges, time_periods};

use crate::exchange::Ohlcv;

/// The (pair, exchange, timeframe) triple a candle series belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SeriesKey {
    pub currency_pair_id: i32,
    pub exchange_id: i32,
    pub time_period_id: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Inserted,
    Updated,
    /// Row already present and left as is.
    Unchanged,
}

#[derive(Debug, Clone, Default)]
pub struct CandleFilter {
    pub currency_pair_id: Option<i32>,
    pub exchange_id: Option<i32>,
    pub time_period_id: Option<i32>,
    pub skip: u64,
    pub limit: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExchangeLatestUpdate {
    pub exchange: String,
    pub last_update: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CandleStats {
    pub total_candles: u64,
    pub total_exchanges: u64,
    pub total_currency_pairs: u64,
    pub total_time_periods: u64,
    pub latest_updates: Vec<ExchangeLatestUpdate>,
}

pub async fn find_candle<C: ConnectionTrait>(
    conn: &C,
    key: SeriesKey,
    open_time: DateTime<Utc>,
) -> Result<Option<candles::Model>, DbErr> {
    candles::Entity::find()
        .filter(candles::Column::CurrencyPairId.eq(key.currency_pair_id))
        .filter(candles::Column::ExchangeId.eq(key.exchange_id))
        .filter(candles::Column::TimePeriodId.eq(key.time_period_id))
        .filter(candles::Column::OpenTime.eq(open_time))
        .one(conn)
        .await
}

fn new_row(key: SeriesKey, candle: &Ohlcv, now: DateTime<Utc>) -> candles::ActiveModel {
    candles::ActiveModel {
        currency_pair_id: ActiveValue::Set(key.currency_pair_id),
        exchange_id: ActiveValue::Set(key.exchange_id),
        time_period_id: ActiveValue::Set(key.time_period_id),
        open_time: ActiveValue::Set(candle.open_time),
        close_time: ActiveValue::Set(candle.close_time.unwrap_or(candle.open_time)),
        open_price: ActiveValue::Set(candle.open),
        high_price: ActiveValue::Set(candle.high),
        low_price: ActiveValue::Set(candle.low),
        close_price: ActiveValue::Set(candle.close),
        volume: ActiveValue::Set(candle.volume),
        quote_volume: ActiveValue::Set(candle.quote_volume.unwrap_or_default()),
        trades_count: ActiveValue::Set(candle.trades_count.unwrap_or_default()),
        created_at: ActiveValue::Set(Some(now)),
        updated_at: ActiveValue::Set(Some(now)),
        ..Default::default()
    }
}

fn same_values(row: &candles::Model, candle: &Ohlcv) -> bool {
    row.open_price == candle.open
        && row.high_price == candle.high
        && row.low_price == candle.low
        && row.close_price == candle.close
        && row.volume == candle.volume
        && row.quote_volume == candle.quote_volume.unwrap_or_default()
        && row.trades_count == candle.trades_count.unwrap_or_default()
        && candle.close_time.map_or(true, |t| t == row.close_time)
}

/// Inserts `candle` or overwrites the stored row with the same natural key,
/// stamping `updated_at` on every re-observation.
pub async fn upsert_candle<C: ConnectionTrait>(
    conn: &C,
    key: SeriesKey,
    candle: &Ohlcv,
) -> Result<WriteOutcome, DbErr> {
    write_candle(conn, key, candle, false).await
}

/// Like [`upsert_candle`], but a stored row that already holds identical
/// values is left untouched and reported as [`WriteOutcome::Unchanged`].
pub async fn upsert_if_changed<C: ConnectionTrait>(
    conn: &C,
    key: SeriesKey,
    candle: &Ohlcv,
) -> Result<WriteOutcome, DbErr> {
    write_candle(conn, key, candle, true).await
}

async fn write_candle<C: ConnectionTrait>(
    conn: &C,
    key: SeriesKey,
    candle: &Ohlcv,
    skip_identical: bool,
) -> Result<WriteOutcome, DbErr> {
    let now = Utc::now();
    match find_candle(conn, key, candle.open_time).await? {
        None => {
            candles::Entity::insert(new_row(key, candle, now))
                .exec(conn)
                .await?;
            Ok(WriteOutcome::Inserted)
        }
        Some(existing) if skip_identical && same_values(&existing, candle) => {
            Ok(WriteOutcome::Unchanged)
        }
        Some(existing) => {
            let mut row = existing.into_active_model();
            row.open_price = ActiveValue::Set(candle.open);
            row.high_price = ActiveValue::Set(candle.high);
            row.low_price = ActiveValue::Set(candle.low);
            row.close_price = ActiveValue::Set(candle.close);
            row.volume = ActiveValue::Set(candle.volume);
            row.quote_volume = ActiveValue::Set(candle.quote_volume.unwrap_or_default());
            row.trades_count = ActiveValue::Set(candle.trades_count.unwrap_or_default());
            if let Some(close_time) = candle.close_time {
                row.close_time = ActiveValue::Set(close_time);
            }
            row.updated_at = ActiveValue::Set(Some(now));
            row.update(conn).await?;
            Ok(WriteOutcome::Updated)
        }
    }
}

/// Stored open times for the series at or after `floor`, ascending.
pub async fn open_times_since<C: ConnectionTrait>(
    conn: &C,
    key: SeriesKey,
    floor: DateTime<Utc>,
) -> Result<Vec<DateTime<Utc>>, DbErr> {
    candles::Entity::find()
        .select_only()
        .column(candles::Column::OpenTime)
        .filter(candles::Column::CurrencyPairId.eq(key.currency_pair_id))
        .filter(candles::Column::ExchangeId.eq(key.exchange_id))
        .filter(candles::Column::TimePeriodId.eq(key.time_period_id))
        .filter(candles::Column::OpenTime.gte(floor))
        .order_by_asc(candles::Column::OpenTime)
        .into_tuple::<DateTime<Utc>>()
        .all(conn)
        .await
}

pub async fn list_candles<C: ConnectionTrait>(
    conn: &C,
    filter: &CandleFilter,
) -> Result<Vec<candles::Model>, DbErr> {
    let mut query = candles::Entity::find();
    if let Some(id) = filter.currency_pair_id {
        query = query.filter(candles::Column::CurrencyPairId.eq(id));
    }
    if let Some(id) = filter.exchange_id {
        query = query.filter(candles::Column::ExchangeId.eq(id));
    }
    if let Some(id) = filter.time_period_id {
        query = query.filter(candles::Column::TimePeriodId.eq(id));
    }
    query
        .order_by_desc(candles::Column::OpenTime)
        .offset(filter.skip)
        .limit(filter.limit)
        .all(conn)
        .await
}

pub async fn count_candles<C: ConnectionTrait>(conn: &C, key: SeriesKey) -> Result<u64, DbErr> {
    candles::Entity::find()
        .filter(candles::Column::CurrencyPairId.eq(key.currency_pair_id))
        .filter(candles::Column::ExchangeId.eq(key.exchange_id))
        .filter(candles::Column::TimePeriodId.eq(key.time_period_id))
        .count(conn)
        .await
}

/// Table totals plus the newest candle insert per exchange, newest first.
pub async fn collection_stats<C: ConnectionTrait>(conn: &C) -> Result<CandleStats, DbErr> {
    let total_candles = candles::Entity::find().count(conn).await?;
    let total_currency_pairs = currency_pairs::Entity::find().count(conn).await?;
    let total_time_periods = time_periods::Entity::find().count(conn).await?;
    let all_exchanges = exchanges::Entity::find()
        .order_by_asc(exchanges::Column::Id)
        .all(conn)
        .await?;

    let mut latest_updates = Vec::new();
    for exchange in &all_exchanges {
        let newest = candles::Entity::find()
            .filter(candles::Column::ExchangeId.eq(exchange.id))
            .filter(candles::Column::CreatedAt.is_not_null())
            .order_by_desc(candles::Column::CreatedAt)
            .one(conn)
            .await?;
        if let Some(last_update) = newest.and_then(|c| c.created_at) {
            latest_updates.push(ExchangeLatestUpdate {
                exchange: exchange.name.clone(),
                last_update,
            });
        }
    }
    latest_updates.sort_by(|a, b| b.last_update.cmp(&a.last_update));

    Ok(CandleStats {
        total_candles,
        total_exchanges: all_exchanges.len() as u64,
        total_currency_pairs,
        total_time_periods,
        latest_updates,
    })
}
