//! Lookups over the reference tables (exchanges, symbols, pairs, periods).

use std::collections::HashMap;

use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder};
use shared::entity::{currency_pairs, exchanges, symbols, time_periods};
use shared::Timeframe;
use tracing::debug;

use crate::error::{CollectorError, Result};

/// A stored time period that maps onto an exchange timeframe.
#[derive(Debug, Clone)]
pub struct ActivePeriod {
    pub id: i32,
    pub name: String,
    pub timeframe: Timeframe,
}

/// A currency pair together with its "BASE/QUOTE" text form.
#[derive(Debug, Clone)]
pub struct ActivePair {
    pub id: i32,
    pub symbol: String,
    pub pair_type: String,
}

/// Snapshot of everything a collection run iterates over.
#[derive(Debug, Clone, Default)]
pub struct ActiveSet {
    pub exchanges: Vec<exchanges::Model>,
    pub pairs: Vec<currency_pairs::Model>,
    pub periods: Vec<ActivePeriod>,
    /// symbol id -> ticker
    pub tickers: HashMap<i32, String>,
}

impl ActiveSet {
    /// Text form of `pair`, or an error naming the missing symbol id.
    pub fn pair_symbol(&self, pair: &currency_pairs::Model) -> Result<ActivePair> {
        let ticker = |symbol_id: i32| {
            self.tickers
                .get(&symbol_id)
                .ok_or(CollectorError::DanglingSymbol {
                    pair_id: pair.id,
                    symbol_id,
                })
        };
        Ok(ActivePair {
            id: pair.id,
            symbol: format!("{}/{}", ticker(pair.base_symbol_id)?, ticker(pair.quote_symbol_id)?),
            pair_type: pair.pair_type.clone(),
        })
    }
}

pub async fn active_exchanges<C: ConnectionTrait>(conn: &C) -> Result<Vec<exchanges::Model>> {
    let rows = exchanges::Entity::find()
        .filter(exchanges::Column::IsActive.eq(true))
        .order_by_asc(exchanges::Column::Id)
        .all(conn)
        .await?;
    Ok(rows)
}

pub async fn active_currency_pairs<C: ConnectionTrait>(
    conn: &C,
) -> Result<Vec<currency_pairs::Model>> {
    let rows = currency_pairs::Entity::find()
        .filter(currency_pairs::Column::IsActive.eq(true))
        .order_by_asc(currency_pairs::Column::Id)
        .all(conn)
        .await?;
    Ok(rows)
}

/// Active periods whose duration has a timeframe token; the rest are
/// skipped with a debug line.
pub async fn active_periods<C: ConnectionTrait>(conn: &C) -> Result<Vec<ActivePeriod>> {
    let rows = time_periods::Entity::find()
        .filter(time_periods::Column::IsActive.eq(true))
        .order_by_asc(time_periods::Column::Minutes)
        .all(conn)
        .await?;

    Ok(rows
        .into_iter()
        .filter_map(|period| match period.timeframe() {
            Some(timeframe) => Some(ActivePeriod {
                id: period.id,
                name: period.name,
                timeframe,
            }),
            None => {
                debug!(
                    time_period_id = period.id,
                    minutes = period.minutes,
                    "no timeframe token for duration, skipping"
                );
                None
            }
        })
        .collect())
}

pub async fn symbol_tickers<C: ConnectionTrait>(conn: &C) -> Result<HashMap<i32, String>> {
    let rows = symbols::Entity::find().all(conn).await?;
    Ok(rows.into_iter().map(|s| (s.id, s.symbol)).collect())
}

pub async fn load_active_set<C: ConnectionTrait>(conn: &C) -> Result<ActiveSet> {
    Ok(ActiveSet {
        exchanges: active_exchanges(conn).await?,
        pairs: active_currency_pairs(conn).await?,
        periods: active_periods(conn).await?,
        tickers: symbol_tickers(conn).await?,
    })
}

pub async fn find_symbol<C: ConnectionTrait>(conn: &C, ticker: &str) -> Result<Option<symbols::Model>> {
    let row = symbols::Entity::find()
        .filter(symbols::Column::Symbol.eq(ticker))
        .one(conn)
        .await?;
    Ok(row)
}

/// Resolves "BASE/QUOTE" to a currency pair id via two symbol lookups and a
/// pair lookup. When spot and futures pairs share the symbols the oldest pair
/// wins; drivers that already hold a pair id never go through this.
pub async fn resolve_currency_pair_id<C: ConnectionTrait>(conn: &C, pair_symbol: &str) -> Result<i32> {
    let (base, quote) = match pair_symbol.split_once('/') {
        Some((b, q)) if !b.is_empty() && !q.is_empty() && !q.contains('/') => (b, q),
        _ => return Err(CollectorError::InvalidSymbol(pair_symbol.to_string())),
    };

    let base_symbol = find_symbol(conn, base)
        .await?
        .ok_or_else(|| CollectorError::SymbolNotFound {
            role: "Base",
            symbol: base.to_string(),
        })?;
    let quote_symbol = find_symbol(conn, quote)
        .await?
        .ok_or_else(|| CollectorError::SymbolNotFound {
            role: "Quote",
            symbol: quote.to_string(),
        })?;

    let pair = currency_pairs::Entity::find()
        .filter(currency_pairs::Column::BaseSymbolId.eq(base_symbol.id))
        .filter(currency_pairs::Column::QuoteSymbolId.eq(quote_symbol.id))
        .order_by_asc(currency_pairs::Column::Id)
        .one(conn)
        .await?
        .ok_or_else(|| CollectorError::CurrencyPairNotFound(pair_symbol.to_string()))?;

    Ok(pair.id)
}
