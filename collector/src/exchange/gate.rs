use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::header::HeaderMap;
use serde_json::Value;
use shared::Timeframe;

use super::client::{split_symbol, ExchangeError, ExchangeSettings, MarketDataClient, Ohlcv};
use super::http::{first_filled_window, HttpTransport, Row};

const BASE_URL: &str = "https://api.gateio.ws";
const MAX_LIMIT: u32 = 1000;

pub struct GateClient {
    code: String,
    transport: HttpTransport,
}

impl GateClient {
    pub fn new(settings: &ExchangeSettings) -> Result<Self, ExchangeError> {
        if settings.sandbox {
            return Err(ExchangeError::Configuration {
                exchange: settings.code.clone(),
                reason: "no public sandbox for spot market data".to_string(),
            });
        }
        Ok(Self {
            code: settings.code.clone(),
            transport: HttpTransport::new(settings, BASE_URL, HeaderMap::new())?,
        })
    }

    async fn candlesticks(&self, pair: &str, interval: &str, bounds: Bounds) -> Result<Vec<Ohlcv>, ExchangeError> {
        let mut query = vec![
            ("currency_pair", pair.to_string()),
            ("interval", interval.to_string()),
        ];
        // `limit` conflicts with from/to on this endpoint
        match bounds {
            Bounds::Latest(limit) => query.push(("limit", limit.to_string())),
            Bounds::Window(from, to) => {
                query.push(("from", from.timestamp().to_string()));
                query.push(("to", to.timestamp().to_string()));
            }
        }

        let payload = self
            .transport
            .get_json("/api/v4/spot/candlesticks", &query)
            .await?;
        parse_candlesticks(&self.code, &payload)
    }
}

pub(crate) fn interval(timeframe: Timeframe) -> Option<&'static str> {
    use Timeframe::*;
    match timeframe {
        OneMinute => Some("1m"),
        FiveMinutes => Some("5m"),
        FifteenMinutes => Some("15m"),
        ThirtyMinutes => Some("30m"),
        OneHour => Some("1h"),
        FourHours => Some("4h"),
        EightHours => Some("8h"),
        OneDay => Some("1d"),
        OneWeek => Some("7d"),
        OneMonth => Some("30d"),
        _ => None,
    }
}

/// Decodes `[[t_secs, quote_volume, close, high, low, open, base_volume, closed], ...]`.
pub(crate) fn parse_candlesticks(exchange: &str, payload: &Value) -> Result<Vec<Ohlcv>, ExchangeError> {
    let rows = payload.as_array().ok_or_else(|| {
        let message = payload
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("expected an array of candlesticks");
        ExchangeError::decode(exchange, message)
    })?;

    let mut candles = Vec::with_capacity(rows.len());
    for raw in rows {
        let row = Row::new(exchange, raw)?;
        let seconds = row.int(0)?;
        let open_time = Utc
            .timestamp_opt(seconds, 0)
            .single()
            .ok_or_else(|| ExchangeError::decode(exchange, format!("timestamp out of range: {}", seconds)))?;
        let mut candle = Ohlcv::new(
            open_time,
            row.decimal(5)?,
            row.decimal(3)?,
            row.decimal(4)?,
            row.decimal(2)?,
            row.decimal(6)?,
        );
        candle.quote_volume = row.opt_decimal(1);
        candles.push(candle);
    }
    candles.sort_by_key(|c| c.open_time);
    Ok(candles)
}

#[async_trait]
impl MarketDataClient for GateClient {
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

        let pair = format!("{}_{}", base, quote).to_uppercase();

        let Some(since) = since else {
            return self.candlesticks(&pair, interval, Bounds::Latest(limit)).await;
        };
        let step = timeframe.duration();
        let span = step * limit as i32;
        let pair = pair.as_str();
        first_filled_window(since, span, Utc::now(), |start| {
            // `to` is inclusive
            self.candlesticks(pair, interval, Bounds::Window(start, start + span - step))
        })
        .await
    }
}

enum Bounds {
    Latest(u32),
    Window(DateTime<Utc>, DateTime<Utc>),
}
