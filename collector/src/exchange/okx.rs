use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::Value;
use shared::Timeframe;

use super::client::{split_symbol, ExchangeError, ExchangeSettings, MarketDataClient, Ohlcv};
use super::http::{first_filled_window, HttpTransport, Row};

const BASE_URL: &str = "https://www.okx.com";
const LATEST_LIMIT: u32 = 300;
const HISTORY_LIMIT: u32 = 100;

pub struct OkxClient {
    code: String,
    transport: HttpTransport,
}

impl OkxClient {
    pub fn new(settings: &ExchangeSettings) -> Result<Self, ExchangeError> {
        let mut headers = HeaderMap::new();
        if settings.sandbox {
            headers.insert("x-simulated-trading", HeaderValue::from_static("1"));
        }
        Ok(Self {
            code: settings.code.clone(),
            transport: HttpTransport::new(settings, BASE_URL, headers)?,
        })
    }

    async fn history_window(
        &self,
        inst_id: &str,
        bar: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Ohlcv>, ExchangeError> {
        // `after`/`before` are exclusive bounds on ts
        let query = [
            ("instId", inst_id.to_string()),
            ("bar", bar.to_string()),
            ("limit", limit.to_string()),
            ("after", end.timestamp_millis().to_string()),
            ("before", (start.timestamp_millis() - 1).to_string()),
        ];
        let payload = self
            .transport
            .get_json("/api/v5/market/history-candles", &query)
            .await?;
        parse_candles(&self.code, &payload)
    }
}

pub(crate) fn instrument_id(symbol: &str) -> Result<String, ExchangeError> {
    let (base, quote) = split_symbol(symbol)?;
    Ok(format!("{}-{}", base, quote).to_uppercase())
}

pub(crate) fn bar(timeframe: Timeframe) -> Option<&'static str> {
    use Timeframe::*;
    Some(match timeframe {
        OneMinute => "1m",
        ThreeMinutes => "3m",
        FiveMinutes => "5m",
        FifteenMinutes => "15m",
        ThirtyMinutes => "30m",
        OneHour => "1H",
        TwoHours => "2H",
        FourHours => "4H",
        SixHours => "6H",
        TwelveHours => "12H",
        OneDay => "1D",
        OneWeek => "1W",
        OneMonth => "1M",
        EightHours => return None,
    })
}

/// Decodes `{"code":"0","data":[[ts,o,h,l,c,vol,volCcy,volCcyQuote,confirm],...]}`.
/// Rows arrive newest first.
pub(crate) fn parse_candles(exchange: &str, payload: &Value) -> Result<Vec<Ohlcv>, ExchangeError> {
    let code = payload.get("code").and_then(Value::as_str).unwrap_or("0");
    if code != "0" {
        return Err(ExchangeError::Api {
            exchange: exchange.to_string(),
            code: code.to_string(),
            message: payload
                .get("msg")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        });
    }

    let rows = payload
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| ExchangeError::decode(exchange, "missing data array"))?;

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
        if row.len() > 7 {
            candle.quote_volume = row.opt_decimal(7);
        }
        candles.push(candle);
    }
    candles.sort_by_key(|c| c.open_time);
    Ok(candles)
}

#[async_trait]
impl MarketDataClient for OkxClient {
    fn exchange_code(&self) -> &str {
        &self.code
    }

    fn max_page_size(&self) -> u32 {
        HISTORY_LIMIT
    }

    async fn fetch_range(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        since: Option<DateTime<Utc>>,
        limit: u32,
    ) -> Result<Vec<Ohlcv>, ExchangeError> {
        let bar = bar(timeframe).ok_or_else(|| ExchangeError::UnsupportedTimeframe {
            exchange: self.code.clone(),
            timeframe,
        })?;
        let inst_id = instrument_id(symbol)?;

        let Some(since) = since else {
            let query = [
                ("instId", inst_id),
                ("bar", bar.to_string()),
                ("limit", limit.clamp(1, LATEST_LIMIT).to_string()),
            ];
            let payload = self.transport.get_json("/api/v5/market/candles", &query).await?;
            return parse_candles(&self.code, &payload);
        };

        let limit = limit.clamp(1, HISTORY_LIMIT);
        let span = timeframe.duration() * limit as i32;
        let inst_id = inst_id.as_str();
        first_filled_window(since, span, Utc::now(), |start| {
            self.history_window(inst_id, bar, start, start + span, limit)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal::Decimal;
    use serde_json::json;

    #[tokio::test]
    async fn test_history_skips_windows_before_listing() {
        let since = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let span = Timeframe::OneMinute.duration() * HISTORY_LIMIT as i32;
        let empty = json!({"code": "0", "msg": "", "data": []});
        let listed = json!({"code": "0", "msg": "", "data": [
            [(since + span + chrono::Duration::minutes(1)).timestamp_millis().to_string(), "2", "3", "1", "2.5", "4", "8", "8", "1"],
            [(since + span).timestamp_millis().to_string(), "1", "2", "0.5", "2", "3", "6", "6", "1"]
        ]});
        let mut windows = Vec::new();

        let candles = first_filled_window(since, span, Utc::now(), |start| {
            windows.push(start);
            let payload = if start < since + span { empty.clone() } else { listed.clone() };
            async move { parse_candles("okx", &payload) }
        })
        .await
        .unwrap();

        assert_eq!(windows, vec![since, since + span]);
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].open_time, since + span);
    }

    #[test]
    fn test_instrument_id_and_bar() {
        assert_eq!(instrument_id("eth/usdt").unwrap(), "ETH-USDT");
        assert_eq!(bar(Timeframe::OneHour), Some("1H"));
        assert_eq!(bar(Timeframe::OneMinute), Some("1m"));
        assert_eq!(bar(Timeframe::EightHours), None);
    }

    #[test]
    fn test_parse_candles_orders_ascending() {
        let payload = json!({
            "code": "0",
            "msg": "",
            "data": [
                ["1700000060000", "2", "3", "1", "2.5", "10", "25", "25.5", "0"],
                ["1700000000000", "1", "2", "0.5", "2", "8", "16", "16.1", "1"]
            ]
        });
        let candles = parse_candles("okx", &payload).unwrap();
        assert_eq!(candles.len(), 2);
        assert!(candles[0].open_time < candles[1].open_time);
        assert_eq!(candles[1].close, "2.5".parse::<Decimal>().unwrap());
        assert_eq!(candles[0].quote_volume, Some("16.1".parse::<Decimal>().unwrap()));
        assert_eq!(candles[0].trades_count, None);
    }

    #[test]
    fn test_parse_candles_api_error() {
        let payload = json!({"code": "51001", "msg": "Instrument ID does not exist", "data": []});
        match parse_candles("okx", &payload) {
            Err(ExchangeError::Api { code, .. }) => assert_eq!(code, "51001"),
            other => panic!("unexpected: {:?}", other),
        }
    }
}
