use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use serde_json::Value;
use shared::Timeframe;

use super::client::{split_symbol, ExchangeError, ExchangeSettings, MarketDataClient, Ohlcv};
use super::http::{first_filled_window, HttpTransport, Row};

const MAINNET_URL: &str = "https://api.bybit.com";
const TESTNET_URL: &str = "https://api-testnet.bybit.com";
const MAX_LIMIT: u32 = 1000;

pub struct BybitClient {
    code: String,
    transport: HttpTransport,
}

impl BybitClient {
    pub fn new(settings: &ExchangeSettings) -> Result<Self, ExchangeError> {
        let base_url = if settings.sandbox { TESTNET_URL } else { MAINNET_URL };
        Ok(Self {
            code: settings.code.clone(),
            transport: HttpTransport::new(settings, base_url, HeaderMap::new())?,
        })
    }

    /// One kline request; `window` is `[start, end)`.
    async fn klines(
        &self,
        symbol: &str,
        interval: &str,
        limit: u32,
        window: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> Result<Vec<Ohlcv>, ExchangeError> {
        let mut query = vec![
            ("category", "spot".to_string()),
            ("symbol", symbol.to_string()),
            ("interval", interval.to_string()),
            ("limit", limit.to_string()),
        ];
        if let Some((start, end)) = window {
            query.push(("start", start.timestamp_millis().to_string()));
            query.push(("end", (end.timestamp_millis() - 1).to_string()));
        }

        let payload = self.transport.get_json("/v5/market/kline", &query).await?;
        parse_klines(&self.code, &payload)
    }
}

pub(crate) fn interval(timeframe: Timeframe) -> Option<&'static str> {
    use Timeframe::*;
    Some(match timeframe {
        OneMinute => "1",
        ThreeMinutes => "3",
        FiveMinutes => "5",
        FifteenMinutes => "15",
        ThirtyMinutes => "30",
        OneHour => "60",
        TwoHours => "120",
        FourHours => "240",
        SixHours => "360",
        TwelveHours => "720",
        OneDay => "D",
        OneWeek => "W",
        OneMonth => "M",
        EightHours => return None,
    })
}

/// Decodes `{"retCode":0,"result":{"list":[[start,o,h,l,c,volume,turnover],...]}}`.
/// The list is newest first.
pub(crate) fn parse_klines(exchange: &str, payload: &Value) -> Result<Vec<Ohlcv>, ExchangeError> {
    let ret_code = payload.get("retCode").and_then(Value::as_i64).unwrap_or(0);
    if ret_code != 0 {
        return Err(ExchangeError::Api {
            exchange: exchange.to_string(),
            code: ret_code.to_string(),
            message: payload
                .get("retMsg")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        });
    }

    let rows = payload
        .pointer("/result/list")
        .and_then(Value::as_array)
        .ok_or_else(|| ExchangeError::decode(exchange, "missing result.list"))?;

    let mut candles = Vec::with_capacity(rows.len());
    for raw in rows {
        let row = Row::new(exchange, raw)?;
        let mut candle = Ohlcv::new(
            row.millis(0)?,
            row.decimal(1)?,
            row.decimal(2)?,
            row.decimal(3)?,
            row.decimal(4)?,
            row.decimal(5)?,
        );
        candle.quote_volume = row.opt_decimal(6);
        candles.push(candle);
    }
    candles.sort_by_key(|c| c.open_time);
    Ok(candles)
}

#[async_trait]
impl MarketDataClient for BybitClient {
    fn exchange_code(&self) -> &str {
        &self.code
    }

    fn max_page_size(&self) -> u32 {
        MAX_LIMIT
    }

    async fn fetch_range(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        since: Option<DateTime<Utc>>,
        limit: u32,
    ) -> Result<Vec<Ohlcv>, ExchangeError> {
        let interval = interval(timeframe).ok_or_else(|| ExchangeError::UnsupportedTimeframe {
            exchange: self.code.clone(),
            timeframe,
        })?;
        let (base, quote) = split_symbol(symbol)?;
        let limit = limit.clamp(1, MAX_LIMIT);

        let symbol = format!("{}{}", base, quote).to_uppercase();

        let Some(since) = since else {
            return self.klines(&symbol, interval, limit, None).await;
        };
        let span = timeframe.duration() * limit as i32;
        let symbol = symbol.as_str();
        first_filled_window(since, span, Utc::now(), |start| {
            self.klines(symbol, interval, limit, Some((start, start + span)))
        })
        .await
    }
}
