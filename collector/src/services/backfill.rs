//! Historical backfill: walks every gap of every active series and pages
//! through the exchange until the gap is covered.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Duration, Utc};
use sea_orm::{DatabaseConnection, TransactionTrait};
use shared::Timeframe;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::error::Result;
use crate::exchange::{ExchangeClientCache, MarketDataClient, Ohlcv};
use crate::repositories::{candle_repository, reference_repository, ActivePair, ActivePeriod, SeriesKey};
use crate::services::gap_detector::{self, TimeRange};
use crate::services::report::{CollectionJob, CollectionReport};

/// Candles to skip ahead when a page does not move past the cursor.
pub const STALL_ADVANCE_CANDLES: i32 = 100;

#[derive(Debug, Clone)]
pub struct BackfillOptions {
    pub floor: DateTime<Utc>,
    pub page_limit: u32,
}

/// Next fetch position after a page whose newest candle opened at `last_open`.
pub fn next_cursor(cursor: DateTime<Utc>, last_open: DateTime<Utc>, step: Duration) -> DateTime<Utc> {
    if last_open > cursor {
        last_open + step
    } else {
        cursor + step * STALL_ADVANCE_CANDLES
    }
}

pub async fn run_backfill(
    db: &DatabaseConnection,
    clients: &ExchangeClientCache,
    options: &BackfillOptions,
    stop: &AtomicBool,
) -> anyhow::Result<CollectionReport> {
    let mut report = CollectionReport::new(CollectionJob::HistoricalCandles);
    let span = info_span!("historical_collection", run_id = %report.run_id);

    async move {
        info!("📚 Starting historical candles collection from {}", options.floor);
        match collect(db, clients, options, stop, &mut report).await {
            Ok(()) => {
                report.finish();
                info!("✅ Historical candles collection completed: {}", report.summary());
                Ok::<_, anyhow::Error>(report)
            }
            Err(e) => {
                error!("Error in historical candles collection: {}", e);
                Err(e.into())
            }
        }
    }
    .instrument(span)
    .await
}

async fn collect(
    db: &DatabaseConnection,
    clients: &ExchangeClientCache,
    options: &BackfillOptions,
    stop: &AtomicBool,
    report: &mut CollectionReport,
) -> Result<()> {
    let active = reference_repository::load_active_set(db).await?;

    'exchanges: for exchange in &active.exchanges {
        if stop.load(Ordering::SeqCst) {
            report.interrupted = true;
            break;
        }

        let client = match clients.get_or_create(exchange).await {
            Ok(client) => client,
            Err(e) => {
                error!(exchange = %exchange.name, "Error with exchange {}: {}", exchange.name, e);
                report.exchanges_failed += 1;
                continue;
            }
        };
        report.exchanges_processed += 1;

        for pair in &active.pairs {
            let pair = match active.pair_symbol(pair) {
                Ok(pair) => pair,
                Err(e) => {
                    warn!(exchange = %exchange.name, "Skipping currency pair {}: {}", pair.id, e);
                    report.pairs_failed += 1;
                    continue;
                }
            };

            for period in &active.periods {
                if stop.load(Ordering::SeqCst) {
                    report.interrupted = true;
                    break 'exchanges;
                }

                let result = backfill_series(
                    db,
                    client.as_ref(),
                    exchange.id,
                    &pair,
                    period,
                    options,
                    report,
                )
                .await;

                match result {
                    Ok(()) => report.leaves_processed += 1,
                    Err(e) => {
                        report.leaves_failed += 1;
                        error!(
                            exchange = %exchange.name,
                            symbol = %pair.symbol,
                            timeframe = %period.timeframe,
                            "Error collecting historical candles: {}",
                            e
                        );
                    }
                }
            }
        }
    }

    Ok(())
}

async fn backfill_series(
    db: &DatabaseConnection,
    client: &dyn MarketDataClient,
    exchange_id: i32,
    pair: &ActivePair,
    period: &ActivePeriod,
    options: &BackfillOptions,
    report: &mut CollectionReport,
) -> Result<()> {
    let key = SeriesKey {
        currency_pair_id: pair.id,
        exchange_id,
        time_period_id: period.id,
    };
    let gaps = gap_detector::missing_ranges_for(db, key, options.floor, Utc::now()).await?;
    debug!(symbol = %pair.symbol, timeframe = %period.timeframe, gaps = gaps.len(), "gaps detected");

    for gap in gaps {
        backfill_range(
            db,
            client,
            key,
            &pair.symbol,
            period.timeframe,
            gap,
            options.page_limit,
            report,
        )
        .await?;
    }
    Ok(())
}

/// Pages through `range`, committing each page on its own. Candles already
/// stored are refreshed in place when the exchange reports different values.
#[allow(clippy::too_many_arguments)]
pub async fn backfill_range(
    db: &DatabaseConnection,
    client: &dyn MarketDataClient,
    key: SeriesKey,
    symbol: &str,
    timeframe: Timeframe,
    range: TimeRange,
    page_limit: u32,
    report: &mut CollectionReport,
) -> Result<()> {
    let step = timeframe.duration();
    let limit = page_limit.min(client.max_page_size()).max(1);
    let mut cursor = range.start;

    while cursor < range.end {
        let page = client
            .fetch_range(symbol, timeframe, Some(cursor), limit)
            .await?;
        report.pages_fetched += 1;

        let Some(last_open) = page.last().map(|c| c.open_time) else {
            debug!(%symbol, %timeframe, %cursor, "empty page, gap closed");
            break;
        };

        persist_page(db, key, &page, report).await?;
        cursor = next_cursor(cursor, last_open, step);
    }
    Ok(())
}

async fn persist_page(
    db: &DatabaseConnection,
    key: SeriesKey,
    page: &[Ohlcv],
    report: &mut CollectionReport,
) -> Result<()> {
    let txn = db.begin().await?;
    let mut outcomes = Vec::with_capacity(page.len());
    let mut failures = 0u64;

    for candle in page {
        let savepoint = txn.begin().await?;
        match candle_repository::upsert_if_changed(&savepoint, key, candle).await {
            Ok(outcome) => {
                savepoint.commit().await?;
                outcomes.push(outcome);
            }
            Err(e) => {
                savepoint.rollback().await?;
                failures += 1;
                warn!(open_time = %candle.open_time, "Failed to store candle: {}", e);
            }
        }
    }

    txn.commit().await?;
    for outcome in outcomes {
        report.record_write(outcome);
    }
    report.row_failures += failures;
    Ok(())
}
