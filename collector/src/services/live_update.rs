//! Current-candle collection: fetch the newest candle of every active series
//! and upsert it, all inside one transaction per run.

use std::sync::atomic::{AtomicBool, Ordering};

use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};
use shared::Timeframe;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::error::{CollectorError, Result};
use crate::exchange::{ExchangeClientCache, MarketDataClient};
use crate::repositories::{candle_repository, reference_repository, SeriesKey, WriteOutcome};
use crate::services::report::{CollectionJob, CollectionReport};

pub async fn run_live_update(
    db: &DatabaseConnection,
    clients: &ExchangeClientCache,
    stop: &AtomicBool,
) -> anyhow::Result<CollectionReport> {
    let mut report = CollectionReport::new(CollectionJob::CurrentCandles);
    let span = info_span!("current_collection", run_id = %report.run_id);

    async move {
        debug!("Starting current candles collection");
        let txn = db.begin().await?;

        match collect(&txn, clients, stop, &mut report).await {
            Ok(()) => {
                txn.commit().await?;
                report.finish();
                info!("Current candles collection completed: {}", report.summary());
                Ok::<_, anyhow::Error>(report)
            }
            Err(e) => {
                error!("Error in current candles collection: {}", e);
                if let Err(rollback_err) = txn.rollback().await {
                    error!("Rollback failed: {}", rollback_err);
                }
                Err(e.into())
            }
        }
    }
    .instrument(span)
    .await
}

async fn collect(
    txn: &DatabaseTransaction,
    clients: &ExchangeClientCache,
    stop: &AtomicBool,
    report: &mut CollectionReport,
) -> Result<()> {
    let active = reference_repository::load_active_set(txn).await?;

    'exchanges: for exchange in &active.exchanges {
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

                let key = SeriesKey {
                    currency_pair_id: pair.id,
                    exchange_id: exchange.id,
                    time_period_id: period.id,
                };
                match update_series(txn, client.as_ref(), key, &pair.symbol, period.timeframe).await {
                    Ok(Some(outcome)) => {
                        report.leaves_processed += 1;
                        report.record_write(outcome);
                    }
                    Ok(None) => report.leaves_skipped += 1,
                    Err(e) => {
                        report.leaves_failed += 1;
                        if matches!(e, CollectorError::Database(_)) {
                            report.row_failures += 1;
                        }
                        error!(
                            exchange = %exchange.name,
                            symbol = %pair.symbol,
                            timeframe = %period.timeframe,
                            "Error collecting current candle: {}",
                            e
                        );
                    }
                }
            }
        }
    }

    Ok(())
}

/// Fetches and stores the newest candle of one series inside a savepoint.
/// `Ok(None)` when the exchange has nothing for the series.
pub async fn update_series(
    txn: &DatabaseTransaction,
    client: &dyn MarketDataClient,
    key: SeriesKey,
    symbol: &str,
    timeframe: Timeframe,
) -> Result<Option<WriteOutcome>> {
    let Some(candle) = client.fetch_latest(symbol, timeframe).await? else {
        return Ok(None);
    };

    let savepoint = txn.begin().await?;
    match candle_repository::upsert_candle(&savepoint, key, &candle).await {
        Ok(outcome) => {
            savepoint.commit().await?;
            Ok(Some(outcome))
        }
        Err(e) => {
            savepoint.rollback().await?;
            Err(e.into())
        }
    }
}
