//! Finds the time ranges of a candle series that have no stored rows.
//!
//! The walk advances by a fixed minute after every stored candle regardless
//! of the series timeframe, so for coarser timeframes the space between two
//! adjacent candles is reported as a gap and backfill simply re-reads it.
//!
//! A window that is already closed (`floor >= now`) has no gaps, even when
//! the series is empty.

use chrono::{DateTime, Duration, Utc};
use sea_orm::ConnectionTrait;
use serde::Serialize;

use crate::error::Result;
use crate::repositories::{candle_repository, reference_repository, SeriesKey};

/// Half-open `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

fn cursor_step() -> Duration {
    Duration::minutes(1)
}

/// Gaps between `floor` and `now` given the ascending `open_times` of stored
/// candles.
pub fn compute_gaps(
    open_times: &[DateTime<Utc>],
    floor: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Vec<TimeRange> {
    if open_times.is_empty() {
        return if floor < now {
            vec![TimeRange::new(floor, now)]
        } else {
            Vec::new()
        };
    }

    let mut gaps = Vec::new();
    let mut cursor = floor;
    for &open_time in open_times {
        if open_time > cursor {
            gaps.push(TimeRange::new(cursor, open_time));
        }
        cursor = cursor.max(open_time + cursor_step());
    }
    if cursor < now {
        gaps.push(TimeRange::new(cursor, now));
    }
    gaps
}

/// Missing ranges of one stored series between `floor` and `now`.
pub async fn missing_ranges_for<C: ConnectionTrait>(
    conn: &C,
    key: SeriesKey,
    floor: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<Vec<TimeRange>> {
    let open_times = candle_repository::open_times_since(conn, key, floor).await?;
    Ok(compute_gaps(&open_times, floor, now))
}

/// Missing ranges for `pair_symbol` ("BASE/QUOTE") on one exchange and time
/// period. Fails when the symbol cannot be resolved to a stored pair.
pub async fn missing_ranges<C: ConnectionTrait>(
    conn: &C,
    pair_symbol: &str,
    exchange_id: i32,
    time_period_id: i32,
    floor: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<Vec<TimeRange>> {
    let currency_pair_id = reference_repository::resolve_currency_pair_id(conn, pair_symbol).await?;
    let key = SeriesKey {
        currency_pair_id,
        exchange_id,
        time_period_id,
    };
    missing_ranges_for(conn, key, floor, now).await
}
