use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use collector::repositories::{candle_repository, reference_repository, CandleFilter};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::entity::candles;
use tracing::debug;

use crate::error::ApiError;
use crate::state::AppState;

const DEFAULT_LIMIT: u64 = 100;
const MAX_LIMIT: u64 = 1000;

#[derive(Debug, Default, Deserialize)]
pub struct CandleQuery {
    pub symbol: Option<String>,
    pub currency_pair_id: Option<i32>,
    pub exchange_id: Option<i32>,
    pub time_period_id: Option<i32>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct CandleView {
    pub id: i32,
    pub currency_pair_id: i32,
    pub exchange_id: i32,
    pub time_period_id: i32,
    pub open_time: DateTime<Utc>,
    pub close_time: DateTime<Utc>,
    pub open_price: Decimal,
    pub high_price: Decimal,
    pub low_price: Decimal,
    pub close_price: Decimal,
    pub volume: Decimal,
    pub quote_volume: Decimal,
    pub trades_count: i32,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<candles::Model> for CandleView {
    fn from(c: candles::Model) -> Self {
        Self {
            id: c.id,
            currency_pair_id: c.currency_pair_id,
            exchange_id: c.exchange_id,
            time_period_id: c.time_period_id,
            open_time: c.open_time,
            close_time: c.close_time,
            open_price: c.open_price,
            high_price: c.high_price,
            low_price: c.low_price,
            close_price: c.close_price,
            volume: c.volume,
            quote_volume: c.quote_volume,
            trades_count: c.trades_count,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

/// Stored candles, newest first. A `symbol` that does not resolve is ignored.
pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CandleQuery>,
) -> Result<Json<Vec<CandleView>>, ApiError> {
    let db = state.db.as_ref();

    let mut currency_pair_id = query.currency_pair_id;
    if let Some(symbol) = query.symbol.as_deref().filter(|s| !s.is_empty()) {
        match reference_repository::resolve_currency_pair_id(db, symbol).await {
            Ok(resolved) => match currency_pair_id {
                Some(explicit) if explicit != resolved => return Ok(Json(Vec::new())),
                _ => currency_pair_id = Some(resolved),
            },
            Err(e) => debug!("Ignoring symbol filter {}: {}", symbol, e),
        }
    }

    let filter = CandleFilter {
        currency_pair_id,
        exchange_id: query.exchange_id,
        time_period_id: query.time_period_id,
        skip: query.skip.unwrap_or(0),
        limit: query.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT),
    };

    let rows = candle_repository::list_candles(db, &filter)
        .await
        .map_err(ApiError::internal)?;
    Ok(Json(rows.into_iter().map(CandleView::from).collect()))
}
